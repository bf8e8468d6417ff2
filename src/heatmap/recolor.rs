//! Intensity to red/green recolor pass.
//!
//! Each pixel's red channel is taken as its intensity `v` and rewritten to
//! `(v, max(0, 255 - v * k), 0)` with alpha untouched. The map only looks at
//! one pixel at a time, so rows are recolored in parallel.

use image::RgbaImage;
use rayon::prelude::*;

/// Green channel for intensity `v` under scale `k`.
///
/// Fractional values round half to even, matching how a canvas clamps
/// float writes into its byte buffer.
fn green(v: u8, k: f32) -> u8 {
    (255.0 - v as f32 * k).clamp(0.0, 255.0).round_ties_even() as u8
}

/// Recolored `[r, g, b]` for a pixel whose red channel is `v`
pub fn recolor_pixel(v: u8, k: f32) -> [u8; 3] {
    [v, green(v, k), 0]
}

/// Precomputed green channel for every possible intensity
#[derive(Debug, Clone)]
pub struct GreenTable([u8; 256]);

impl GreenTable {
    pub fn new(k: f32) -> Self {
        let mut table = [0u8; 256];
        for (v, slot) in table.iter_mut().enumerate() {
            *slot = green(v as u8, k);
        }
        Self(table)
    }

    #[inline]
    pub fn get(&self, v: u8) -> u8 {
        self.0[v as usize]
    }
}

/// Recolor every pixel of `surface` in place
pub fn recolor(surface: &mut RgbaImage, k: f32) {
    let stride = surface.width() as usize * 4;
    if stride == 0 || surface.height() == 0 {
        return;
    }
    let table = GreenTable::new(k);
    let pixels: &mut [u8] = &mut **surface;

    pixels.par_chunks_mut(stride).for_each(|row| {
        for px in row.chunks_exact_mut(4) {
            px[1] = table.get(px[0]);
            px[2] = 0;
        }
    });
}
