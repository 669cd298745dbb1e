//! Deed info panel.
//!
//! The panel sits in the top-left corner of the game window. The capture
//! covers the whole corner and the text block is a fixed rectangle inside it.

use anyhow::Result;
use image::{GrayImage, RgbImage};

use crate::ocr::{read_text, TextRecognizer};
use crate::{crop, preprocess, Rect};

/// Text block inside a 445x445 corner capture.
pub const DEFAULT_PANEL: Rect = Rect::new(20, 110, 410, 180);

const WRITE_IMAGE_ENV: &str = "DEEDSCOUT_WRITE_IMAGE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeedPanel {
    pub panel: Rect,
}

impl Default for DeedPanel {
    fn default() -> Self {
        Self { panel: DEFAULT_PANEL }
    }
}

impl DeedPanel {
    pub fn new(panel: Rect) -> Self {
        Self { panel }
    }

    /// Crop the text block and prepare it for OCR. `None` when the block lies
    /// outside the capture.
    pub fn prepare(&self, corner: &RgbImage) -> Result<Option<GrayImage>> {
        let Some(roi) = crop(corner, self.panel) else {
            log::debug!("deed panel {:?} outside {}x{} capture", self.panel, corner.width(), corner.height());
            return Ok(None);
        };
        let prepared = preprocess::preprocess_deed(&roi)?;
        if write_image_enabled() {
            report("deed_roi.png", roi.save("deed_roi.png"));
            report("deed_preprocessed.png", prepared.save("deed_preprocessed.png"));
        }
        Ok(Some(prepared))
    }

    /// OCR text of the panel. Empty when nothing could be read.
    pub fn read(&self, corner: &RgbImage, engine: &dyn TextRecognizer) -> Result<String> {
        Ok(match self.prepare(corner)? {
            Some(prepared) => read_text(engine, &prepared),
            None => String::new(),
        })
    }
}

fn write_image_enabled() -> bool {
    std::env::var(WRITE_IMAGE_ENV).is_ok_and(|v| v == "1")
}

fn report(name: &str, result: image::ImageResult<()>) {
    if let Err(err) = result {
        log::warn!("failed to write {name}: {err}");
    }
}
