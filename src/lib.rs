//! Landsnap
//!
//! Client-side building blocks for an image change-detection service: a
//! guard for the two-image upload form, a poller that follows the
//! server-side analysis, and a renderer that turns a difference image into
//! a red/green heatmap.
//!
//! # Features
//!
//! - **http** (default): URL image loading, HTTP status polling and the
//!   multipart upload client, backed by `reqwest`
//!
//! # Example
//!
//! ```no_run
//! use landsnap::heatmap::{HeatmapRenderer, ImageSource};
//! use landsnap::{HeatmapConfig, Size};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut renderer = HeatmapRenderer::new(Size::new(400, 200), HeatmapConfig::default());
//! let source = ImageSource::parse("diff.png");
//! if renderer.render(&source)? {
//!     renderer.save("heatmap.png")?;
//! }
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

pub mod error;
pub use error::{Error, Result};

// Element-id contract shared with the upload/result markup
pub mod dom;

pub mod diff;
pub mod heatmap;
pub mod progress;
pub mod upload;

pub use heatmap::HeatmapConfig;
pub use progress::PollerConfig;
pub use upload::UploadLimits;

/// Width/height of a drawing surface or an image, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either dimension is zero
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl Default for Size {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
        }
    }
}

/// Top-level configuration
///
/// Every section has a conservative default, so a config file only needs
/// to name what it overrides:
///
/// ```
/// let cfg = landsnap::LandsnapConfig::from_json(r#"{ "upload": { "max_bytes": 1024 } }"#).unwrap();
/// assert_eq!(cfg.upload.max_bytes, 1024);
/// assert_eq!(cfg.poller.interval_ms, 2000);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LandsnapConfig {
    /// Upload guard limits
    pub upload: UploadLimits,
    /// Heatmap renderer settings
    pub heatmap: HeatmapConfig,
    /// Progress poller settings
    pub poller: PollerConfig,
}

impl LandsnapConfig {
    /// Parse a JSON document; unknown sections are rejected
    pub fn from_json(text: &str) -> Result<Self> {
        let cfg: LandsnapConfig =
            serde_json::from_str(text).map_err(|e| Error::ConfigError(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load and validate a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.upload.max_bytes == 0 {
            return Err(Error::ConfigError("upload.max_bytes must be positive".into()));
        }
        if self.upload.accepted_types.is_empty() {
            return Err(Error::ConfigError(
                "upload.accepted_types must not be empty".into(),
            ));
        }
        if !self.heatmap.green_scale.is_finite() || self.heatmap.green_scale < 0.0 {
            return Err(Error::ConfigError(format!(
                "heatmap.green_scale must be a non-negative number, got {}",
                self.heatmap.green_scale
            )));
        }
        if self.heatmap.fetch_timeout_ms == 0 {
            return Err(Error::ConfigError(
                "heatmap.fetch_timeout_ms must be positive".into(),
            ));
        }
        if self.poller.interval_ms == 0 {
            return Err(Error::ConfigError("poller.interval_ms must be positive".into()));
        }
        if self.poller.request_timeout_ms == 0 {
            return Err(Error::ConfigError(
                "poller.request_timeout_ms must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LandsnapConfig::default();
        assert_eq!(config.upload.max_bytes, 5 * 1024 * 1024);
        assert_eq!(config.heatmap.green_scale, 1.0);
        assert_eq!(config.poller.interval_ms, 2000);
        assert!(config.poller.max_consecutive_failures.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_size() {
        let size = Size::new(1920, 1080);
        assert_eq!(size.width, 1920);
        assert!(!size.is_empty());
        assert!(Size::new(0, 10).is_empty());
    }

    #[test]
    fn config_rejects_negative_scale() {
        let err = LandsnapConfig::from_json(r#"{ "heatmap": { "green_scale": -1.0 } }"#)
            .unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn config_rejects_unknown_section() {
        assert!(LandsnapConfig::from_json(r#"{ "theme": "dark" }"#).is_err());
    }

    #[test]
    fn config_rejects_unknown_keys_inside_sections() {
        for text in [
            r#"{ "upload": { "max_byte": 1024 } }"#,
            r#"{ "heatmap": { "greenscale": 2.0 } }"#,
            r#"{ "poller": { "interval": 500 } }"#,
        ] {
            let err = LandsnapConfig::from_json(text).unwrap_err();
            assert!(matches!(err, Error::ConfigError(_)), "{}", text);
        }
    }

    #[test]
    fn config_rejects_zero_timeouts() {
        for text in [
            r#"{ "heatmap": { "fetch_timeout_ms": 0 } }"#,
            r#"{ "poller": { "request_timeout_ms": 0 } }"#,
        ] {
            let err = LandsnapConfig::from_json(text).unwrap_err();
            assert!(err.to_string().contains("timeout_ms must be positive"), "{}", err);
        }
    }
}
