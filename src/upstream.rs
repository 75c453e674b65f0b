//! Upstream content service client
//!
//! Thin HTTP client wrapping the external manuscript-repository API: fetch a
//! manuscript's file list, fetch a single file's bytes. Every call carries
//! its own timeout independent of any caller-supplied cancellation; when both
//! fire, cancellation wins. This component never retries — a failed file
//! fetch is reported to the orchestrator, which records it and moves on.

use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::UpstreamConfig;
use crate::error::{Error, Result, UpstreamError};
use crate::types::{FileRef, ManuscriptId};
use std::time::Duration;

/// Bytes and resolved identity of one retrieved file
#[derive(Clone, Debug)]
pub struct FetchedFile {
    /// The file contents
    pub bytes: Vec<u8>,
    /// Resolved filename: disposition header when present, else `file_<id>`
    pub filename: String,
    /// Content type reported by the upstream
    pub content_type: String,
}

/// HTTP client for the upstream manuscript repository
#[derive(Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: Url,
    metadata_timeout: Duration,
    file_timeout: Duration,
}

impl UpstreamClient {
    /// Create a client from upstream settings
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| Error::Config {
            message: format!("invalid upstream base URL: {e}"),
            key: Some("upstream.base_url".to_string()),
        })?;

        let http = reqwest::Client::builder().build()?;

        Ok(Self {
            http,
            base_url,
            metadata_timeout: config.metadata_timeout,
            file_timeout: config.file_timeout,
        })
    }

    /// Fetch the manuscript's file list.
    ///
    /// Bounded by the metadata timeout. The orchestrator decides whether a
    /// failure here degrades to the fallback file set or fails the job.
    pub async fn fetch_manifest(&self, manuscript_id: &ManuscriptId) -> Result<Vec<FileRef>> {
        let url = self
            .base_url
            .join(&format!("manuscripts/{manuscript_id}/files"))
            .map_err(|e| UpstreamError::InvalidUri {
                uri: format!("manuscripts/{manuscript_id}/files"),
                reason: e.to_string(),
            })?;

        tracing::debug!(manuscript_id = %manuscript_id, url = %url, "fetching file list");

        let response = self
            .http
            .get(url.clone())
            .timeout(self.metadata_timeout)
            .send()
            .await
            .map_err(|e| UpstreamError::MetadataFetchFailed {
                manuscript_id: manuscript_id.clone(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(UpstreamError::UnexpectedStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            }
            .into());
        }

        let files: Vec<FileRef> =
            response
                .json()
                .await
                .map_err(|e| UpstreamError::MetadataFetchFailed {
                    manuscript_id: manuscript_id.clone(),
                    reason: format!("invalid file list body: {e}"),
                })?;

        tracing::debug!(
            manuscript_id = %manuscript_id,
            files = files.len(),
            "file list fetched"
        );

        Ok(files)
    }

    /// Fetch one file's bytes.
    ///
    /// Bounded by the file timeout and composed with the caller's
    /// cancellation token (biased toward cancellation). Returns `Ok(None)`
    /// when the fetch was cancelled, so the orchestrator can distinguish
    /// cancellation from failure.
    pub async fn fetch_file(
        &self,
        file: &FileRef,
        cancel: &CancellationToken,
    ) -> Result<Option<FetchedFile>> {
        let url = self.resolve_uri(&file.uri)?;

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(None),
            result = self.http.get(url.clone()).timeout(self.file_timeout).send() => {
                result.map_err(|e| UpstreamError::FileFetchFailed {
                    file_id: file.id,
                    name: file.name.clone(),
                    reason: e.to_string(),
                })?
            }
        };

        if !response.status().is_success() {
            return Err(UpstreamError::UnexpectedStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            }
            .into());
        }

        let filename = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(disposition_filename)
            .unwrap_or_else(|| format!("file_{}", file.id));

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();

        let bytes = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(None),
            result = response.bytes() => {
                result.map_err(|e| UpstreamError::FileFetchFailed {
                    file_id: file.id,
                    name: file.name.clone(),
                    reason: e.to_string(),
                })?
            }
        };

        Ok(Some(FetchedFile {
            bytes: bytes.to_vec(),
            filename,
            content_type,
        }))
    }

    /// Resolve a declared file URI: absolute URIs are used as-is, relative
    /// ones are joined against the upstream base
    fn resolve_uri(&self, uri: &str) -> Result<Url> {
        match Url::parse(uri) {
            Ok(url) => Ok(url),
            Err(_) => self
                .base_url
                .join(uri)
                .map_err(|e| {
                    UpstreamError::InvalidUri {
                        uri: uri.to_string(),
                        reason: e.to_string(),
                    }
                    .into()
                }),
        }
    }
}

/// Extract a filename from a `Content-Disposition` header value.
///
/// Prefers the RFC 5987 `filename*=` form (percent-decoded), falls back to
/// the plain `filename=` parameter with optional quotes.
fn disposition_filename(value: &str) -> Option<String> {
    for part in value.split(';') {
        let part = part.trim();
        if let Some(encoded) = part.strip_prefix("filename*=") {
            // RFC 5987: charset'language'percent-encoded-value
            let encoded = encoded.trim_matches('"');
            let payload = encoded.rsplit_once('\'').map_or(encoded, |(_, v)| v);
            if let Ok(decoded) = urlencoding::decode(payload)
                && !decoded.is_empty()
            {
                return Some(decoded.into_owned());
            }
        }
    }

    for part in value.split(';') {
        let part = part.trim();
        if let Some(name) = part.strip_prefix("filename=") {
            let name = name.trim_matches('"').trim();
            if !name.is_empty() {
                return Some(name.to_string());
            }
        }
    }

    None
}

/// Degraded fixed file set used when the upstream metadata fetch failed
/// outright. Entries carry mock paths; the orchestrator synthesizes their
/// bytes locally and marks the job `source: mock`.
pub fn fallback_file_set(manuscript_id: &ManuscriptId) -> Vec<FileRef> {
    let base = format!("/mock/{manuscript_id}");
    vec![
        FileRef {
            id: 9001,
            name: "manuscript.pdf".to_string(),
            uri: format!("{base}/manuscript.pdf"),
            file_type: Some("manuscript".to_string()),
        },
        FileRef {
            id: 9002,
            name: "figure_1.png".to_string(),
            uri: format!("{base}/figures/figure_1.png"),
            file_type: Some("figure".to_string()),
        },
        FileRef {
            id: 9003,
            name: "figure_2.png".to_string(),
            uri: format!("{base}/figures/figure_2.png"),
            file_type: Some("figure".to_string()),
        },
        FileRef {
            id: 9004,
            name: "supplementary_data.xlsx".to_string(),
            uri: format!("{base}/suppl_data/supplementary_data.xlsx"),
            file_type: Some("supplementary".to_string()),
        },
        FileRef {
            id: 9005,
            name: "metadata.xml".to_string(),
            uri: format!("{base}/metadata.xml"),
            file_type: Some("metadata".to_string()),
        },
    ]
}
