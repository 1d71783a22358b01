//! Payload change detection for distributions.
//!
//! A distribution is re-indexed only when its payload changed since the
//! last run. The check hashes the whole payload (SHA-512, hex encoded), so
//! any change anywhere in the file is noticed without understanding its
//! format.
//!
//! Nothing here persists: [`ChangeDetector::fetch`] returns a
//! [`ContentChange`] value which the walker folds into the node and writes
//! once, together with the node's other attributes.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha512};
use url::Url;

use crate::error::AppError;
use crate::models::{Node, StagedPayload};
use crate::traits::PayloadFetcher;

// =============================================================================
// Locator
// =============================================================================

/// Where a payload or a catalog document is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// Filesystem path, used for offline and deterministic runs.
    Local(PathBuf),
    /// http(s) URL, fetched with a streamed GET.
    Remote(Url),
}

impl Locator {
    /// Interprets a download URL.
    ///
    /// `file://` URLs and strings without a scheme are local paths. With
    /// `read_local` every location that is not a `file://` URL is taken as a
    /// path verbatim.
    pub fn parse(location: &str, read_local: bool) -> Result<Self, AppError> {
        let location = location.trim();
        if location.is_empty() {
            return Err(AppError::InvalidUrl("empty location".to_string()));
        }

        if location.starts_with("file://") {
            return file_url_path(location).map(Locator::Local);
        }

        if read_local {
            return Ok(Locator::Local(PathBuf::from(location)));
        }

        match Url::parse(location) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(Locator::Remote(url)),
            Ok(url) => Err(AppError::InvalidUrl(format!(
                "unsupported scheme '{}' in {}",
                url.scheme(),
                location
            ))),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                Ok(Locator::Local(PathBuf::from(location)))
            }
            Err(e) => Err(AppError::InvalidUrl(format!("{}: {}", location, e))),
        }
    }
}

/// Converts a `file://` URL to a path, decoding percent escapes.
fn file_url_path(location: &str) -> Result<PathBuf, AppError> {
    let url = Url::parse(location)
        .map_err(|e| AppError::InvalidUrl(format!("{}: {}", location, e)))?;
    url.to_file_path()
        .map_err(|_| AppError::InvalidUrl(format!("{} does not name a local file", location)))
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Locator::Local(path) => write!(f, "{}", path.display()),
            Locator::Remote(url) => write!(f, "{}", url),
        }
    }
}

// =============================================================================
// Digest
// =============================================================================

/// Hex-encoded SHA-512 digest of the whole payload.
pub fn compute_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha512::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

// =============================================================================
// Change Detector
// =============================================================================

/// Outcome of fetching one distribution payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentChange {
    pub changed: bool,
    pub digest: String,
    /// Fetched bytes, kept only when the content changed.
    pub staged: Option<StagedPayload>,
    pub checked_at: DateTime<Utc>,
}

impl ContentChange {
    /// Folds the outcome into `node` and hands back the payload to store.
    ///
    /// On change the digest, `last_content_update` and `indexable = true`
    /// are set. Otherwise only `indexable` is cleared.
    pub fn apply_to(self, node: &mut Node) -> Option<StagedPayload> {
        if self.changed {
            node.content_digest = Some(self.digest);
            node.last_content_update = Some(self.checked_at);
            node.indexable = true;
            self.staged
        } else {
            node.indexable = false;
            None
        }
    }
}

/// Fetches payloads and compares their digest with the stored one.
#[derive(Clone)]
pub struct ChangeDetector<P: PayloadFetcher> {
    fetcher: P,
}

impl<P: PayloadFetcher> ChangeDetector<P> {
    pub fn new(fetcher: P) -> Self {
        Self { fetcher }
    }

    /// Fetches the payload at `locator` and reports whether it differs from
    /// `previous_digest`.
    ///
    /// Fetch failures are returned unchanged; the caller decides how to
    /// isolate them.
    pub async fn fetch(
        &self,
        locator: &Locator,
        previous_digest: Option<&str>,
    ) -> Result<ContentChange, AppError> {
        let bytes = self.fetcher.fetch_payload(locator).await?;
        let digest = compute_digest(&bytes);
        let changed = previous_digest != Some(digest.as_str());

        tracing::debug!(
            locator = %locator,
            bytes = bytes.len(),
            changed,
            "Fetched payload"
        );

        let staged = changed.then(|| StagedPayload {
            bytes,
            digest: digest.clone(),
        });

        Ok(ContentChange {
            changed,
            digest,
            staged,
            checked_at: Utc::now(),
        })
    }
}
