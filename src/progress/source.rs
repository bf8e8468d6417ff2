use super::ProgressRecord;
use crate::Result;
use futures::future::BoxFuture;
use std::sync::Arc;

/// Something that can report the current analysis status
pub trait StatusSource: Send + Sync + 'static {
    fn fetch(&self) -> BoxFuture<'_, Result<ProgressRecord>>;
}

impl<T: StatusSource> StatusSource for Arc<T> {
    fn fetch(&self) -> BoxFuture<'_, Result<ProgressRecord>> {
        (**self).fetch()
    }
}

#[cfg(feature = "http")]
pub use http::HttpStatusSource;

#[cfg(feature = "http")]
mod http {
    use super::StatusSource;
    use crate::progress::ProgressRecord;
    use crate::{Error, Result};
    use futures::future::{BoxFuture, FutureExt};
    use log::debug;
    use reqwest::Client;
    use std::time::Duration;

    /// Polls `GET <url>` and parses the JSON status body
    pub struct HttpStatusSource {
        client: Client,
        url: url::Url,
        timeout: Duration,
    }

    impl HttpStatusSource {
        pub fn new(url: &str, timeout: Duration) -> Result<Self> {
            let url = url::Url::parse(url)
                .map_err(|e| Error::ConfigError(format!("invalid status URL {}: {}", url, e)))?;
            let client = Client::builder()
                .timeout(timeout)
                .user_agent(concat!("landsnap/", env!("CARGO_PKG_VERSION")))
                .build()
                .map_err(|e| Error::NetworkError(format!("Failed to build HTTP client: {}", e)))?;
            Ok(Self {
                client,
                url,
                timeout,
            })
        }

        pub fn url(&self) -> &str {
            self.url.as_str()
        }

        async fn fetch_once(&self) -> Result<ProgressRecord> {
            let res = self
                .client
                .get(self.url.clone())
                .header("Accept", "application/json")
                .send()
                .await
                .map_err(|e| self.classify(e))?;

            let status = res.status();
            if !status.is_success() {
                return Err(Error::NetworkError(format!(
                    "{} returned {}",
                    self.url, status
                )));
            }

            let body = res.text().await.map_err(|e| self.classify(e))?;
            debug!("status body: {}", body);
            ProgressRecord::parse(&body)
        }
    }

    impl HttpStatusSource {
        fn classify(&self, err: reqwest::Error) -> Error {
            if err.is_timeout() {
                Error::Timeout(self.timeout.as_millis() as u64)
            } else {
                err.into()
            }
        }
    }

    impl StatusSource for HttpStatusSource {
        fn fetch(&self) -> BoxFuture<'_, Result<ProgressRecord>> {
            self.fetch_once().boxed()
        }
    }
}
