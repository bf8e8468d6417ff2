//! Fit-to-container transform for drawing an image onto a surface

use crate::Size;

/// Uniform scale plus centring offset that fits an image inside a surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    /// `min(surface.width / image.width, surface.height / image.height)`
    pub ratio: f64,
    /// Image size after scaling, never larger than the surface
    pub drawn: Size,
    /// Top-left corner of the drawn image on the surface
    pub offset: (u32, u32),
}

impl Letterbox {
    /// Compute the letterbox for `image` drawn onto `surface`.
    ///
    /// Returns `None` when either size has a zero dimension; the ratio would
    /// be degenerate and nothing can be drawn.
    pub fn fit(surface: Size, image: Size) -> Option<Self> {
        if surface.is_empty() || image.is_empty() {
            return None;
        }

        let ratio = f64::min(
            surface.width as f64 / image.width as f64,
            surface.height as f64 / image.height as f64,
        );

        let scale = |dim: u32, limit: u32| ((dim as f64 * ratio).round() as u32).clamp(1, limit);
        let drawn = Size::new(
            scale(image.width, surface.width),
            scale(image.height, surface.height),
        );
        let offset = (
            (surface.width - drawn.width) / 2,
            (surface.height - drawn.height) / 2,
        );

        Some(Self {
            ratio,
            drawn,
            offset,
        })
    }
}
