//! Difference analysis between a "before" and an "after" image.
//!
//! Produces the difference heatmap that the renderer later recolors, plus
//! the share of pixels that changed noticeably.

pub mod colormap;
pub mod report;

pub use colormap::{jet, jet_colormap};
pub use report::AnalysisReport;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, GrayImage, ImageBuffer, Pixel, RgbImage};
use log::{debug, info};
use rayon::prelude::*;
use std::time::{Duration, Instant};

/// Grayscale difference above which a pixel counts as changed
pub const DEFAULT_THRESHOLD: u8 = 25;

/// Knobs for [`analyze`]
#[derive(Debug, Clone, Copy)]
pub struct AnalyzeOptions {
    pub threshold: u8,
    /// Color the difference with the JET palette instead of leaving it gray
    pub false_color: bool,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            false_color: true,
        }
    }
}

/// Outcome of comparing two images
#[derive(Debug, Clone)]
pub struct Analysis {
    /// Difference image, the size of the first input
    pub heatmap: RgbImage,
    /// Percentage of changed pixels, two decimals
    pub change_percentage: f64,
    pub processing_time: Duration,
}

/// Absolute per-channel difference; `b` is resized to `a` when they differ
pub fn difference(a: &DynamicImage, b: &DynamicImage) -> RgbImage {
    let a = a.to_rgb8();
    let b = matched_to(b.to_rgb8(), a.dimensions());
    absdiff(&a, &b)
}

/// Percentage of pixels whose grayscale difference exceeds `threshold`,
/// rounded to two decimals. An empty image has no changes.
pub fn change_percentage(a: &DynamicImage, b: &DynamicImage, threshold: u8) -> f64 {
    let a = luma(&a.to_rgb8());
    let b = matched_to(luma(&b.to_rgb8()), a.dimensions());
    let total = a.as_raw().len();
    if total == 0 {
        return 0.0;
    }

    let changed = a
        .as_raw()
        .par_iter()
        .zip(b.as_raw().par_iter())
        .filter(|(x, y)| x.abs_diff(**y) > threshold)
        .count();

    let pct = changed as f64 / total as f64 * 100.0;
    (pct * 100.0).round() / 100.0
}

/// Compute the difference heatmap and change percentage in one pass
pub fn analyze(a: &DynamicImage, b: &DynamicImage, options: AnalyzeOptions) -> Analysis {
    let start = Instant::now();
    if a.dimensions() != b.dimensions() {
        debug!(
            "resizing second image from {:?} to {:?}",
            b.dimensions(),
            a.dimensions()
        );
    }

    let diff = difference(a, b);
    let heatmap = if options.false_color {
        jet_colormap(&intensity(&diff))
    } else {
        diff
    };
    let change_percentage = change_percentage(a, b, options.threshold);
    let processing_time = start.elapsed();

    info!(
        "analysis finished: {:.2}% changed in {:.2}s",
        change_percentage,
        processing_time.as_secs_f64()
    );
    Analysis {
        heatmap,
        change_percentage,
        processing_time,
    }
}

fn matched_to<P>(img: ImageBuffer<P, Vec<u8>>, dims: (u32, u32)) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    if img.dimensions() == dims {
        img
    } else {
        imageops::resize(&img, dims.0, dims.1, FilterType::Triangle)
    }
}

fn absdiff(a: &RgbImage, b: &RgbImage) -> RgbImage {
    let (w, h) = a.dimensions();
    let data: Vec<u8> = a
        .as_raw()
        .par_iter()
        .zip(b.as_raw().par_iter())
        .map(|(x, y)| x.abs_diff(*y))
        .collect();
    // same length as `a` by construction
    RgbImage::from_raw(w, h, data).unwrap_or_else(|| RgbImage::new(w, h))
}

/// Grayscale view of a difference image, brightest where change is largest
pub fn intensity(diff: &RgbImage) -> GrayImage {
    luma(diff)
}

/// BT.601 luma in 14-bit fixed point (0.299, 0.587, 0.114).
///
/// `to_luma8` weighs with Rec.709, which undercounts red and blue changes.
pub fn luma(rgb: &RgbImage) -> GrayImage {
    const R: u32 = 4899;
    const G: u32 = 9617;
    const B: u32 = 1868;

    let (w, h) = rgb.dimensions();
    let data: Vec<u8> = rgb
        .as_raw()
        .par_chunks_exact(3)
        .map(|px| {
            let y = px[0] as u32 * R + px[1] as u32 * G + px[2] as u32 * B;
            ((y + (1 << 13)) >> 14) as u8
        })
        .collect();
    GrayImage::from_raw(w, h, data).unwrap_or_else(|| GrayImage::new(w, h))
}
