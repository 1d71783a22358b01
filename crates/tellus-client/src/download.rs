//! HTTP and local-file downloads for payloads and catalog documents.

use std::path::Path;

use futures::StreamExt;
use reqwest::{Client, Url};
use serde_json::Value;
use tellus_core::HttpConfig;
use tellus_core::change::Locator;
use tellus_core::error::AppError;
use tellus_core::traits::{CatalogSource, PayloadFetcher};

/// Upper bound on the buffer reserved up front from `Content-Length`.
const MAX_PREALLOC: u64 = 8 * 1024 * 1024;

/// Downloads payloads and catalog documents.
///
/// Implements both [`PayloadFetcher`] and [`CatalogSource`], so one client
/// serves the walker and the harvest service.
#[derive(Clone)]
pub struct DownloadClient {
    client: Client,
    timeout_secs: u64,
}

impl DownloadClient {
    /// Creates a client with the default HTTP configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ClientError` if the HTTP client cannot be built.
    pub fn new() -> Result<Self, AppError> {
        Self::with_config(&HttpConfig::default())
    }

    /// Creates a client with a custom timeout and user agent.
    pub fn with_config(config: &HttpConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::ClientError(e.to_string()))?;

        Ok(Self {
            client,
            timeout_secs: config.timeout.as_secs(),
        })
    }

    /// Reads everything behind `locator`.
    pub async fn read(&self, locator: &Locator) -> Result<Vec<u8>, AppError> {
        match locator {
            Locator::Local(path) => read_local(path).await,
            Locator::Remote(url) => self.read_remote(url).await,
        }
    }

    async fn read_remote(&self, url: &Url) -> Result<Vec<u8>, AppError> {
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        // Content-Length is only a hint; a lying server must not size our buffer
        let hint = resp.content_length().unwrap_or(0).min(MAX_PREALLOC);
        let mut body = Vec::with_capacity(usize::try_from(hint).unwrap_or(0));
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| self.request_error(e))?;
            body.extend_from_slice(&chunk);
        }

        tracing::debug!(url = %url, bytes = body.len(), "Downloaded");
        Ok(body)
    }

    fn request_error(&self, e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::Timeout(self.timeout_secs)
        } else if e.is_connect() {
            AppError::NetworkError(format!("Connection failed: {}", e))
        } else {
            AppError::ClientError(e.to_string())
        }
    }
}

async fn read_local(path: &Path) -> Result<Vec<u8>, AppError> {
    let bytes = tokio::fs::read(path).await?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "Read local file");
    Ok(bytes)
}

impl PayloadFetcher for DownloadClient {
    async fn fetch_payload(&self, locator: &Locator) -> Result<Vec<u8>, AppError> {
        self.read(locator).await
    }
}

impl CatalogSource for DownloadClient {
    async fn load_catalog(&self, locator: &Locator) -> Result<Value, AppError> {
        let bytes = self.read(locator).await?;
        let document: Value = serde_json::from_slice(&bytes)?;
        if !document.is_object() {
            return Err(AppError::Generic(format!(
                "catalog document at {} is not a JSON object",
                locator
            )));
        }
        Ok(document)
    }
}
