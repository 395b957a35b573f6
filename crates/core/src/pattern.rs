//! Deterministic test pattern written into the shared buffer.
//!
//! A checkerboard of 32-pixel cells alternating between a horizontal red
//! gradient and a vertical blue gradient, fully opaque.

/// Edge length of one checkerboard cell in pixels.
pub const CELL_SIZE: u32 = 32;

/// ARGB8888 color of pixel `(x, y)` in a `width` x `height` pattern.
pub fn pixel(x: u32, y: u32, width: u32, height: u32) -> u32 {
	let parity = (x / CELL_SIZE + y / CELL_SIZE) % 2;
	let (r, g, b) = if parity == 1 {
		(gradient(x, width), 50, 50)
	} else {
		(50, gradient(y, height), 200)
	};
	0xFF00_0000 | (r << 16) | (g << 8) | b
}

fn gradient(pos: u32, extent: u32) -> u32 {
	((u64::from(pos) * 255) / u64::from(extent.max(1))) as u32 & 0xFF
}

/// Fills `pixels` (tightly packed rows, 4 bytes per pixel) with the pattern.
///
/// Colors are stored little-endian, the byte order `wl_shm` formats are
/// defined in.
pub fn fill(pixels: &mut [u8], width: u32, height: u32) {
	if width == 0 {
		return;
	}
	for (index, chunk) in pixels.chunks_exact_mut(4).enumerate() {
		let index = index as u64;
		let x = (index % u64::from(width)) as u32;
		let y = (index / u64::from(width)) as u32;
		if y >= height {
			break;
		}
		chunk.copy_from_slice(&pixel(x, y, width, height).to_le_bytes());
	}
}
