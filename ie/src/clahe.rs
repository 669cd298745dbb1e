//! Contrast-limited adaptive histogram equalization.
//!
//! The image is split into a grid of tiles. Each tile gets its own equalization
//! curve with the histogram clipped at `clip_limit` times the uniform bin
//! height, and every pixel blends the curves of its four nearest tile centres.

use image::{GrayImage, Luma};

pub fn clahe(image: &GrayImage, clip_limit: f32, tiles: (u32, u32)) -> GrayImage {
	let (width, height) = image.dimensions();
	if width == 0 || height == 0 {
		return image.clone();
	}

	let tiles_x = tiles.0.clamp(1, width);
	let tiles_y = tiles.1.clamp(1, height);
	// Tile edges are spread evenly so no tile ends up a sliver.
	let edge = |i: u32, n: u32, len: u32| (i as u64 * len as u64 / n as u64) as u32;
	let tile_w = width as f32 / tiles_x as f32;
	let tile_h = height as f32 / tiles_y as f32;

	let mut luts = vec![[0u8; 256]; (tiles_x * tiles_y) as usize];
	for ty in 0..tiles_y {
		for tx in 0..tiles_x {
			let bounds = (
				edge(tx, tiles_x, width),
				edge(ty, tiles_y, height),
				edge(tx + 1, tiles_x, width),
				edge(ty + 1, tiles_y, height),
			);
			luts[(ty * tiles_x + tx) as usize] = tile_lut(image, bounds, clip_limit);
		}
	}

	let mut out = GrayImage::new(width, height);
	for y in 0..height {
		// Position relative to tile centres, in tile units.
		let gy = (y as f32 + 0.5) / tile_h - 0.5;
		let (ty0, ty1, wy) = neighbours(gy, tiles_y);
		for x in 0..width {
			let gx = (x as f32 + 0.5) / tile_w - 0.5;
			let (tx0, tx1, wx) = neighbours(gx, tiles_x);

			let v = image.get_pixel(x, y).0[0] as usize;
			let at = |tx: u32, ty: u32| luts[(ty * tiles_x + tx) as usize][v] as f32;

			let top = at(tx0, ty0) * (1.0 - wx) + at(tx1, ty0) * wx;
			let bottom = at(tx0, ty1) * (1.0 - wx) + at(tx1, ty1) * wx;
			let value = top * (1.0 - wy) + bottom * wy;
			out.put_pixel(x, y, Luma([value.round().clamp(0.0, 255.0) as u8]));
		}
	}
	out
}

/// Indices of the two tiles surrounding `g` and the weight of the second one.
fn neighbours(g: f32, count: u32) -> (u32, u32, f32) {
	if g <= 0.0 {
		return (0, 0, 0.0);
	}
	let last = count - 1;
	let i0 = (g.floor() as u32).min(last);
	let i1 = (i0 + 1).min(last);
	let w = if i0 == i1 { 0.0 } else { g - i0 as f32 };
	(i0, i1, w)
}

fn tile_lut(image: &GrayImage, (x0, y0, x1, y1): (u32, u32, u32, u32), clip_limit: f32) -> [u8; 256] {
	let mut hist = [0u32; 256];
	for y in y0..y1 {
		for x in x0..x1 {
			hist[image.get_pixel(x, y).0[0] as usize] += 1;
		}
	}
	let area = (x1 - x0) * (y1 - y0);

	if clip_limit > 0.0 {
		let limit = ((clip_limit * area as f32 / 256.0) as u32).max(1);
		let mut excess = 0u32;
		for bin in hist.iter_mut() {
			if *bin > limit {
				excess += *bin - limit;
				*bin = limit;
			}
		}
		let share = excess / 256;
		let remainder = (excess % 256) as usize;
		for (i, bin) in hist.iter_mut().enumerate() {
			*bin += share + u32::from(i < remainder);
		}
	}

	let mut lut = [0u8; 256];
	let scale = 255.0 / area.max(1) as f32;
	let mut cdf = 0u32;
	for (i, bin) in hist.iter().enumerate() {
		cdf += bin;
		lut[i] = (cdf as f32 * scale).round().min(255.0) as u8;
	}
	lut
}
