//! Multipart submission of a validated form

use super::UploadForm;
use crate::{Error, Result};
use log::{debug, info};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use std::time::Duration;

/// Where the server sent us after accepting the upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReceipt {
    /// Final URL after following redirects (processing or result page)
    pub location: String,
    pub status: u16,
}

/// Posts the two images as `multipart/form-data`
pub struct UploadClient {
    client: Client,
    endpoint: url::Url,
}

impl UploadClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let endpoint = url::Url::parse(endpoint)
            .map_err(|e| Error::ConfigError(format!("invalid upload endpoint {}: {}", endpoint, e)))?;
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("landsnap/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::NetworkError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, endpoint })
    }

    /// Send every selected file of `form`.
    ///
    /// The caller is expected to have run [`UploadForm::submit`] first; this
    /// only transports what is selected.
    pub async fn submit(&self, form: &UploadForm) -> Result<SubmitReceipt> {
        let mut body = Form::new();
        for (name, file) in form.files() {
            let bytes = file.read().await?;
            debug!("attaching {} as {} ({} bytes)", file.name, name, bytes.len());
            let part = Part::bytes(bytes)
                .file_name(file.name.clone())
                .mime_str(&file.mime)?;
            body = body.part(name.to_string(), part);
        }

        let res = self
            .client
            .post(self.endpoint.clone())
            .multipart(body)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            return Err(Error::NetworkError(format!(
                "upload to {} returned {}",
                self.endpoint, status
            )));
        }

        let location = res.url().to_string();
        info!("upload accepted, now at {}", location);
        Ok(SubmitReceipt {
            location,
            status: status.as_u16(),
        })
    }
}
