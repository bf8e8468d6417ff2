//! Image sources for the renderer: filesystem paths, http(s) URLs and
//! `data:` URLs (the form the upload preview produces).

use crate::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::DynamicImage;
use log::debug;
use std::path::PathBuf;
use std::time::Duration;

/// Where a heatmap image comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Path(PathBuf),
    Url(String),
    DataUrl(String),
}

impl ImageSource {
    /// Classify a user-supplied location string
    pub fn parse(location: &str) -> Self {
        let lower = location.trim_start().to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            ImageSource::Url(location.trim().to_string())
        } else if lower.starts_with("data:") {
            ImageSource::DataUrl(location.trim().to_string())
        } else {
            ImageSource::Path(PathBuf::from(location))
        }
    }

    /// Fetch the raw, still encoded bytes
    pub fn read_bytes(&self, timeout: Duration) -> Result<Vec<u8>> {
        match self {
            ImageSource::Path(path) => std::fs::read(path)
                .map_err(|e| Error::LoadError(format!("{}: {}", path.display(), e))),
            ImageSource::Url(url) => fetch_url(url, timeout),
            ImageSource::DataUrl(data) => decode_data_url(data).map(|(_, bytes)| bytes),
        }
    }
}

impl std::fmt::Display for ImageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageSource::Path(p) => write!(f, "{}", p.display()),
            ImageSource::Url(u) => f.write_str(u),
            ImageSource::DataUrl(d) => write!(f, "{}…", d.chars().take(32).collect::<String>()),
        }
    }
}

/// Load and decode an image from any source
pub fn load_image(source: &ImageSource, timeout: Duration) -> Result<DynamicImage> {
    let bytes = source.read_bytes(timeout)?;
    debug!("decoding {} bytes from {}", bytes.len(), source);
    image::load_from_memory(&bytes)
        .map_err(|e| Error::DecodeError(format!("{}: {}", source, e)))
}

#[cfg(feature = "http")]
fn fetch_url(url: &str, timeout: Duration) -> Result<Vec<u8>> {
    use reqwest::blocking::Client;

    let parsed = url::Url::parse(url).map_err(|e| Error::LoadError(format!("{}: {}", url, e)))?;
    let client = Client::builder()
        .timeout(timeout)
        .user_agent(concat!("landsnap/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| Error::LoadError(format!("Failed to build HTTP client: {}", e)))?;

    let res = client
        .get(parsed)
        .send()
        .map_err(|e| Error::LoadError(format!("HTTP GET failed: {}", e)))?;
    let status = res.status();
    if !status.is_success() {
        return Err(Error::LoadError(format!("{} returned {}", url, status)));
    }
    let body = res
        .bytes()
        .map_err(|e| Error::LoadError(format!("Failed to read response body: {}", e)))?;
    Ok(body.to_vec())
}

#[cfg(not(feature = "http"))]
fn fetch_url(url: &str, _timeout: Duration) -> Result<Vec<u8>> {
    Err(Error::LoadError(format!(
        "{}: URL sources require the `http` feature",
        url
    )))
}

/// Encode bytes as a `data:<mime>;base64,...` URL
pub fn encode_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Split a base64 `data:` URL into its media type and decoded payload
pub fn decode_data_url(data: &str) -> Result<(String, Vec<u8>)> {
    let rest = data
        .strip_prefix("data:")
        .ok_or_else(|| Error::LoadError("not a data URL".into()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| Error::LoadError("data URL has no payload".into()))?;
    let mime = meta
        .strip_suffix(";base64")
        .ok_or_else(|| Error::LoadError("only base64 data URLs are supported".into()))?;
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| Error::LoadError(format!("invalid base64 payload: {}", e)))?;
    Ok((mime.to_string(), bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_classifies_locations() {
        assert_eq!(
            ImageSource::parse("https://example.com/a.png"),
            ImageSource::Url("https://example.com/a.png".into())
        );
        assert!(matches!(
            ImageSource::parse("data:image/png;base64,AAAA"),
            ImageSource::DataUrl(_)
        ));
        assert_eq!(
            ImageSource::parse("media/results/heatmap.png"),
            ImageSource::Path(PathBuf::from("media/results/heatmap.png"))
        );
    }

    #[test]
    fn data_url_round_trip() {
        let url = encode_data_url("image/png", b"\x89PNG");
        assert_eq!(url, "data:image/png;base64,iVBORw==");
        let (mime, bytes) = decode_data_url(&url).unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(bytes, b"\x89PNG");
    }

    #[test]
    fn non_base64_data_url_is_rejected() {
        assert!(decode_data_url("data:text/plain,hello").is_err());
        assert!(decode_data_url("image/png;base64,AAAA").is_err());
    }

    #[test]
    fn undecodable_bytes_are_a_decode_error() {
        let src = ImageSource::DataUrl(encode_data_url("image/png", b"definitely not a png"));
        let err = load_image(&src, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, Error::DecodeError(_)));
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let src = ImageSource::Path(PathBuf::from("/nonexistent/landsnap/heatmap.png"));
        let err = load_image(&src, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, Error::LoadError(_)));
    }
}
