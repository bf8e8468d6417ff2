//! JET false-color palette (blue → cyan → yellow → red)

use image::{GrayImage, Rgb, RgbImage};
use rayon::prelude::*;

/// JET color for a normalised value in `[0, 1]`
pub fn jet(t: f32) -> Rgb<u8> {
    let t = t.clamp(0.0, 1.0);
    let channel = |center: f32| {
        let v = (1.5 - (4.0 * t - center).abs()).clamp(0.0, 1.0);
        (v * 255.0).round() as u8
    };
    Rgb([channel(3.0), channel(2.0), channel(1.0)])
}

/// Map every intensity of `gray` through the JET palette
pub fn jet_colormap(gray: &GrayImage) -> RgbImage {
    let lut: Vec<Rgb<u8>> = (0..=255u8).map(|v| jet(v as f32 / 255.0)).collect();
    let (w, h) = gray.dimensions();
    let mut out = RgbImage::new(w, h);
    if w == 0 || h == 0 {
        return out;
    }

    let src_stride = w as usize;
    let dst: &mut [u8] = &mut out;
    dst.par_chunks_mut(src_stride * 3)
        .zip(gray.as_raw().par_chunks(src_stride))
        .for_each(|(dst_row, src_row)| {
            for (px, &v) in dst_row.chunks_exact_mut(3).zip(src_row) {
                px.copy_from_slice(&lut[v as usize].0);
            }
        });
    out
}
