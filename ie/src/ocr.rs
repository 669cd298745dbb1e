//! OCR wrapper.
//!
//! Recognition goes through the [`TextRecognizer`] trait so the screen readers
//! can be tested without an engine installed. The shipped backend shells out
//! to the `tesseract` CLI on a temporary PNG.
//!
//! OCR engines are sensitive to input quality, so all preprocessing happens in
//! `crate::preprocess` before calling into this module.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;

use anyhow::{anyhow, bail, Context, Result};
use image::GrayImage;
use regex::Regex;
use tempfile::NamedTempFile;

/// Page segmentation hint passed to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// One uniform block of text.
    UniformBlock,
    /// A single column of text of variable sizes.
    SingleColumn,
}

impl Layout {
    pub fn psm(self) -> u8 {
        match self {
            Layout::UniformBlock => 6,
            Layout::SingleColumn => 4,
        }
    }
}

pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, image: &GrayImage, layout: Layout) -> Result<String>;
}

/// Characters the compass coordinate readout can contain.
pub const COORDS_WHITELIST: &str = "0123456789:,LatLon ";

#[derive(Debug, Clone)]
pub struct Tesseract {
    executable: PathBuf,
    whitelist: Option<String>,
}

impl Tesseract {
    /// Find the executable. `explicit` wins when given; otherwise `PATH` is
    /// searched, then a few common install locations.
    pub fn locate(explicit: Option<&Path>) -> Result<Self> {
        let executable = find_executable(explicit)?;
        log::info!("using tesseract at {}", executable.display());
        Ok(Self { executable, whitelist: None })
    }

    /// Restrict recognition to `chars`.
    pub fn with_whitelist(mut self, chars: impl Into<String>) -> Self {
        self.whitelist = Some(chars.into());
        self
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn whitelist(&self) -> Option<&str> {
        self.whitelist.as_deref()
    }

    fn args(&self, input: &Path, layout: Layout) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![input.into(), "stdout".into()];
        args.extend(["-l", "eng", "--oem", "1", "--psm"].map(OsString::from));
        args.push(layout.psm().to_string().into());
        if let Some(whitelist) = &self.whitelist {
            args.push("-c".into());
            args.push(format!("tessedit_char_whitelist={whitelist}").into());
        }
        args
    }
}

impl TextRecognizer for Tesseract {
    fn recognize(&self, image: &GrayImage, layout: Layout) -> Result<String> {
        let input = NamedTempFile::with_suffix(".png").context("create temp png")?;
        image.save(input.path()).context("write temp png")?;

        let output = Command::new(&self.executable)
            .args(self.args(input.path(), layout))
            .output()
            .with_context(|| format!("spawn {:?}", self.executable))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("tesseract failed ({}): {}", output.status, stderr.trim()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(windows)]
const EXE_NAME: &str = "tesseract.exe";
#[cfg(not(windows))]
const EXE_NAME: &str = "tesseract";

#[cfg(windows)]
const COMMON_PATHS: &[&str] = &[
    r"C:\Program Files\Tesseract-OCR\tesseract.exe",
    r"C:\Program Files (x86)\Tesseract-OCR\tesseract.exe",
];
#[cfg(not(windows))]
const COMMON_PATHS: &[&str] = &[
    "/usr/bin/tesseract",
    "/usr/local/bin/tesseract",
    "/opt/homebrew/bin/tesseract",
];

fn find_executable(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        bail!("configured tesseract path {} does not exist", path.display());
    }

    let from_path = std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).map(|dir| dir.join(EXE_NAME)).collect::<Vec<_>>())
        .unwrap_or_default();

    let mut searched = Vec::new();
    for candidate in from_path.into_iter().chain(COMMON_PATHS.iter().map(PathBuf::from)) {
        if candidate.is_file() {
            return Ok(candidate);
        }
        searched.push(candidate);
    }

    bail!(
        "tesseract not found. Install it or set `tesseract` in the config. Searched:\n{}",
        searched.iter().map(|p| format!("  - {}", p.display())).collect::<Vec<_>>().join("\n")
    )
}

// ----------

static RE_SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+").unwrap());

fn collapse_spaces(text: &str) -> String {
    text.lines()
        .map(|line| RE_SPACES.replace_all(line.trim(), " ").into_owned())
        .collect::<Vec<_>>()
        .join("\n")
}

fn pass(engine: &dyn TextRecognizer, image: &GrayImage, layout: Layout) -> String {
    match engine.recognize(image, layout) {
        Ok(text) => text.trim().to_owned(),
        Err(err) => {
            log::warn!("ocr pass (psm {}) failed: {err:#}", layout.psm());
            String::new()
        }
    }
}

/// Run a uniform-block pass and a single-column pass and keep the longer
/// result. The first pass wins ties. Never fails: engine errors read as empty.
pub fn read_text(engine: &dyn TextRecognizer, image: &GrayImage) -> String {
    let block = pass(engine, image, Layout::UniformBlock);
    let column = pass(engine, image, Layout::SingleColumn);
    let best = if column.chars().count() > block.chars().count() { column } else { block };
    collapse_spaces(&best)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fake {
        block: Result<&'static str, &'static str>,
        column: Result<&'static str, &'static str>,
    }

    impl TextRecognizer for Fake {
        fn recognize(&self, _image: &GrayImage, layout: Layout) -> Result<String> {
            let out = match layout {
                Layout::UniformBlock => self.block,
                Layout::SingleColumn => self.column,
            };
            out.map(str::to_owned).map_err(|e| anyhow!(e))
        }
    }

    fn img() -> GrayImage {
        GrayImage::new(4, 4)
    }

    fn tesseract() -> Tesseract {
        Tesseract { executable: PathBuf::from("tesseract"), whitelist: None }
    }

    #[test]
    fn command_line_carries_layout() {
        let args = tesseract().args(Path::new("in.png"), Layout::SingleColumn);
        let args: Vec<_> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args, ["in.png", "stdout", "-l", "eng", "--oem", "1", "--psm", "4"]);
    }

    #[test]
    fn whitelist_is_passed_as_config_variable() {
        let engine = tesseract().with_whitelist(COORDS_WHITELIST);
        assert_eq!(engine.whitelist(), Some(COORDS_WHITELIST));
        let args = engine.args(Path::new("in.png"), Layout::UniformBlock);
        let tail: Vec<_> = args[args.len() - 2..].iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(tail, ["-c".to_string(), format!("tessedit_char_whitelist={COORDS_WHITELIST}")]);
    }

    #[test]
    fn longer_pass_wins() {
        let fake = Fake { block: Ok("Depth: 12"), column: Ok("Depth: 12 m\nSize: Small (3)") };
        assert_eq!(read_text(&fake, &img()), "Depth: 12 m\nSize: Small (3)");
    }

    #[test]
    fn first_pass_wins_ties() {
        let fake = Fake { block: Ok("  abc  "), column: Ok("xyz") };
        assert_eq!(read_text(&fake, &img()), "abc");
    }

    #[test]
    fn collapses_spaces_but_keeps_lines() {
        let fake = Fake { block: Ok("Lon:   12345 \t Lat:  678\n\nnext   line"), column: Ok("") };
        assert_eq!(read_text(&fake, &img()), "Lon: 12345 Lat: 678\n\nnext line");
    }

    #[test]
    fn engine_errors_read_as_empty() {
        let fake = Fake { block: Err("boom"), column: Ok("Lat: 5") };
        assert_eq!(read_text(&fake, &img()), "Lat: 5");

        let broken = Fake { block: Err("boom"), column: Err("bang") };
        assert_eq!(read_text(&broken, &img()), "");
    }

    #[test]
    fn psm_values() {
        assert_eq!(Layout::UniformBlock.psm(), 6);
        assert_eq!(Layout::SingleColumn.psm(), 4);
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Tesseract::locate(Some(&dir.path().join("nope"))).err().unwrap();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn explicit_path_is_used_as_is() {
        let file = NamedTempFile::new().unwrap();
        let engine = Tesseract::locate(Some(file.path())).unwrap();
        assert_eq!(engine.executable(), file.path());
    }
}
