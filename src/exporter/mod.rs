//! Export orchestration split into focused submodules.
//!
//! The `ManuscriptExporter` struct lives here; the per-job state machine is
//! in [`job`]. One job is driven by a single logical task that retrieves
//! files sequentially — upstream load and progress percentages stay simple
//! and monotonic. The only fan-out is progress broadcast through the hub.

mod job;


use std::sync::Arc;

use crate::cancel::CancellationCoordinator;
use crate::categorize;
use crate::config::Config;
use crate::error::Result;
use crate::progress::ProgressHub;
use crate::types::{DataSource, FileListing, ManuscriptId, Manifest, Scope};
use crate::upstream::{self, UpstreamClient};

/// One export request, resolved into a job by [`ManuscriptExporter::export`]
#[derive(Clone, Debug)]
pub struct ExportRequest {
    /// Manuscript to export
    pub manuscript_id: ManuscriptId,
    /// Requested file scope
    pub scope: Scope,
    /// Identity of the requesting user, recorded in the manifest
    pub requested_by: String,
    /// Override for the archive filename stem (custom packages)
    pub package_name: Option<String>,
    /// Additionally include metadata-category files beyond the scope
    pub include_metadata: bool,
}

impl ExportRequest {
    /// Request with the default (essential) scope for a manuscript
    pub fn new(manuscript_id: ManuscriptId) -> Self {
        Self {
            manuscript_id,
            scope: Scope::default(),
            requested_by: "anonymous".to_string(),
            package_name: None,
            include_metadata: false,
        }
    }
}

/// Result of a completed export job
#[derive(Clone, Debug)]
pub struct ExportOutput {
    /// The built archive bytes
    pub archive: Vec<u8>,
    /// Download filename for the archive
    pub filename: String,
    /// The manifest that was written into the archive
    pub manifest: Manifest,
}

/// Top-level export coordinator (cloneable - all fields are Arc-backed)
///
/// Owns the upstream client, the progress hub, and the cancellation
/// coordinator. Construct once at process start and share.
#[derive(Clone)]
pub struct ManuscriptExporter {
    pub(crate) upstream: UpstreamClient,
    pub(crate) hub: ProgressHub,
    pub(crate) cancellations: CancellationCoordinator,
    pub(crate) config: Arc<Config>,
}

impl ManuscriptExporter {
    /// Create an exporter from a validated configuration
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let upstream = UpstreamClient::new(&config.upstream)?;
        let hub = ProgressHub::new(&config.progress);

        Ok(Self {
            upstream,
            hub,
            cancellations: CancellationCoordinator::new(),
            config: Arc::new(config),
        })
    }

    /// The progress hub observers register with
    pub fn progress_hub(&self) -> &ProgressHub {
        &self.hub
    }

    /// The cancellation coordinator for this exporter
    pub fn cancellations(&self) -> &CancellationCoordinator {
        &self.cancellations
    }

    /// Resolve the file set for a manuscript and scope without fetching any
    /// file bytes (`format=list`).
    ///
    /// Falls back to the degraded fixed file set when the metadata fetch
    /// fails and mock fallback is enabled.
    pub async fn list_files(
        &self,
        manuscript_id: &ManuscriptId,
        scope: &Scope,
    ) -> Result<FileListing> {
        let (files, data_source) = self.resolve_file_list(manuscript_id).await?;
        let files = categorize::resolve_scope(&files, scope);
        let total_files = files.len();

        Ok(FileListing {
            manuscript_id: manuscript_id.clone(),
            files,
            total_files,
            data_source,
        })
    }

    /// Run the full export pipeline for a request.
    ///
    /// Drives the job state machine, broadcasting progress through the hub,
    /// and returns the built archive. Per-file failures are recorded in the
    /// manifest and never abort the job; cancellation aborts between files
    /// (and mid-fetch via the composed token) without producing an archive.
    pub async fn export(&self, request: ExportRequest) -> Result<ExportOutput> {
        job::run_export_job(self, request).await
    }

    /// Trip the cancellation signal for a manuscript's in-flight export.
    ///
    /// Returns true if a job was registered.
    pub async fn cancel(&self, manuscript_id: &ManuscriptId) -> bool {
        let cancelled = self.cancellations.cancel(manuscript_id).await;
        if cancelled {
            tracing::info!(manuscript_id = %manuscript_id, "export cancellation requested");
        }
        cancelled
    }

    /// Fetch the upstream file list, degrading to the fixed mock set when
    /// the upstream is unreachable and fallback is enabled
    pub(crate) async fn resolve_file_list(
        &self,
        manuscript_id: &ManuscriptId,
    ) -> Result<(Vec<crate::types::FileRef>, DataSource)> {
        match self.upstream.fetch_manifest(manuscript_id).await {
            Ok(files) => Ok((files, DataSource::Remote)),
            Err(e) if self.config.export.mock_fallback => {
                tracing::warn!(
                    manuscript_id = %manuscript_id,
                    error = %e,
                    "metadata fetch failed, using degraded fallback file set"
                );
                Ok((upstream::fallback_file_set(manuscript_id), DataSource::Mock))
            }
            Err(e) => Err(e),
        }
    }
}
