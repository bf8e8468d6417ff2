//! Heatmap renderer
//!
//! Loads a difference image, letterboxes it onto an off-screen RGBA surface
//! the size of its container and recolors the whole surface so intensity
//! reads as a red/green gradient.

pub mod letterbox;
pub mod loader;
pub mod recolor;

pub use letterbox::Letterbox;
pub use loader::{load_image, ImageSource};
pub use recolor::{recolor, recolor_pixel};

use crate::{Error, Result, Size};
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, RgbaImage};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::Duration;

/// Resampling filter used when scaling the source onto the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    Nearest,
    Triangle,
    Lanczos3,
}

impl From<Filter> for FilterType {
    fn from(f: Filter) -> Self {
        match f {
            Filter::Nearest => FilterType::Nearest,
            Filter::Triangle => FilterType::Triangle,
            Filter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Heatmap renderer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HeatmapConfig {
    /// `k` in `green = max(0, 255 - intensity * k)`
    pub green_scale: f32,
    /// Container size used when the caller does not give one
    pub container: Size,
    /// Resampling filter for the fit-to-container scale
    pub filter: Filter,
    /// Timeout for URL sources in milliseconds
    pub fetch_timeout_ms: u64,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            green_scale: 1.0,
            container: Size::default(),
            filter: Filter::Triangle,
            fetch_timeout_ms: 30000,
        }
    }
}

/// Owns one drawing surface and renders heatmaps into it
pub struct HeatmapRenderer {
    config: HeatmapConfig,
    surface: RgbaImage,
    letterbox: Option<Letterbox>,
}

impl HeatmapRenderer {
    /// Create a renderer with a transparent surface of `container` size
    pub fn new(container: Size, config: HeatmapConfig) -> Self {
        Self {
            config,
            surface: RgbaImage::new(container.width, container.height),
            letterbox: None,
        }
    }

    pub fn config(&self) -> &HeatmapConfig {
        &self.config
    }

    pub fn surface(&self) -> &RgbaImage {
        &self.surface
    }

    pub fn surface_size(&self) -> Size {
        Size::new(self.surface.width(), self.surface.height())
    }

    /// Placement of the last successful render
    pub fn letterbox(&self) -> Option<Letterbox> {
        self.letterbox
    }

    /// Load `source` and render it.
    ///
    /// Returns `Ok(false)` without touching the surface when the surface or
    /// the decoded image has a zero dimension. Load and decode failures are
    /// returned before anything is drawn.
    pub fn render(&mut self, source: &ImageSource) -> Result<bool> {
        if self.surface_size().is_empty() {
            debug!("skipping {}: surface has no area", source);
            return Ok(false);
        }
        let timeout = Duration::from_millis(self.config.fetch_timeout_ms);
        let image = load_image(source, timeout)?;
        Ok(self.render_image(&image))
    }

    /// Render an already decoded image
    pub fn render_image(&mut self, image: &DynamicImage) -> bool {
        let (w, h) = image.dimensions();
        let Some(lb) = Letterbox::fit(self.surface_size(), Size::new(w, h)) else {
            debug!("skipping render: degenerate letterbox for {}x{}", w, h);
            return false;
        };

        let scaled = imageops::resize(
            image,
            lb.drawn.width,
            lb.drawn.height,
            self.config.filter.into(),
        );

        for px in self.surface.pixels_mut() {
            px.0 = [0, 0, 0, 0];
        }
        imageops::replace(
            &mut self.surface,
            &scaled,
            lb.offset.0 as i64,
            lb.offset.1 as i64,
        );
        recolor(&mut self.surface, self.config.green_scale);

        info!(
            "rendered {}x{} image at ratio {:.3} into {}x{} surface",
            w,
            h,
            lb.ratio,
            self.surface.width(),
            self.surface.height()
        );
        self.letterbox = Some(lb);
        true
    }

    /// Write the surface as an image; the format follows the extension
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        self.surface
            .save(path)
            .map_err(|e| Error::RenderError(format!("{}: {}", path.display(), e)))
    }

    /// SHA-256 of the raw surface buffer, hex encoded
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.surface.width().to_le_bytes());
        hasher.update(self.surface.height().to_le_bytes());
        hasher.update(self.surface.as_raw());
        hex::encode(hasher.finalize())
    }
}
