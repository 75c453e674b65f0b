//! Per-job export driver — the state machine for a single export.
//!
//! Phases: connecting → fetching metadata → downloading(i/n) → packaging →
//! finalizing → completed, with cancelled/failed exits. Progress percentages
//! are fixed per phase (5, 10, 30) and follow
//! `min(85, 30 + done/total * 55)` while downloading, then 85/95/100.

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use super::{ExportOutput, ExportRequest, ManuscriptExporter};
use crate::archive::{self, ArchiveEntry};
use crate::categorize;
use crate::error::{Error, Result};
use crate::types::{
    DataSource, DownloadedFile, FileRef, JobId, ManuscriptId, Manifest, ProgressEvent, Scope,
};

/// Outcome of processing one file: its manifest record plus the bytes to
/// package when the retrieval succeeded.
struct FileOutcome {
    record: DownloadedFile,
    bytes: Option<Vec<u8>>,
}

/// Percentage while downloading: 30 at the start, capped at 85 when the
/// last file lands
fn downloading_progress(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 85;
    }
    std::cmp::min(85, 30 + (done * 55 / total)) as u8
}

pub(super) async fn run_export_job(
    exporter: &ManuscriptExporter,
    request: ExportRequest,
) -> Result<ExportOutput> {
    let manuscript_id = request.manuscript_id.clone();
    let job = JobId::new(manuscript_id.clone());
    let cancel = exporter.cancellations.token(&manuscript_id).await;

    tracing::info!(
        job_id = %job,
        scope = %request.scope.label(),
        requested_by = %request.requested_by,
        "export job started"
    );

    let result = drive(exporter, &request, &job, &cancel).await;

    // The job's cancellation entry is scoped to the run
    exporter.cancellations.remove(&manuscript_id).await;

    match &result {
        Ok(output) => {
            tracing::info!(
                job_id = %job,
                archive = %output.filename,
                successful = output.manifest.successful_downloads,
                failed = output.manifest.failed_downloads,
                "export job completed"
            );
        }
        Err(Error::Cancelled {
            files_completed, ..
        }) => {
            tracing::info!(
                job_id = %job,
                files_completed = files_completed,
                "export job cancelled"
            );
        }
        Err(e) => {
            tracing::error!(job_id = %job, error = %e, "export job failed");
        }
    }

    result
}

async fn drive(
    exporter: &ManuscriptExporter,
    request: &ExportRequest,
    job: &JobId,
    cancel: &CancellationToken,
) -> Result<ExportOutput> {
    let manuscript_id = &request.manuscript_id;

    // Phase 1: connecting. Honor a cancellation that arrived before the
    // job even started.
    if cancel.is_cancelled() {
        return cancelled(exporter, manuscript_id, 0, 0).await;
    }
    publish_progress(exporter, manuscript_id, 5, "Connecting to content service", None, None, None).await;

    // Phase 2: fetch metadata, degrading to the mock set when upstream is
    // unreachable. A metadata failure only fails the job when fallback is
    // disabled.
    publish_progress(exporter, manuscript_id, 10, "Fetching manuscript metadata", None, None, None).await;
    let (files, data_source) = match exporter.resolve_file_list(manuscript_id).await {
        Ok(pair) => pair,
        Err(e) => return failed(exporter, manuscript_id, 10, e).await,
    };

    // Phase 3: resolve the requested scope
    let mut resolved = categorize::resolve_scope(&files, &request.scope);
    if request.include_metadata {
        let metadata = categorize::resolve_scope(&files, &Scope::Metadata);
        for file in metadata {
            if !resolved.iter().any(|f| f.id == file.id) {
                resolved.push(file);
            }
        }
    }

    if resolved.is_empty() {
        let err = Error::EmptyScope {
            manuscript_id: manuscript_id.clone(),
            scope: request.scope.label(),
        };
        return failed(exporter, manuscript_id, 10, err).await;
    }

    let total = resolved.len();
    publish_progress(
        exporter,
        manuscript_id,
        30,
        &format!("Starting download of {total} file(s)"),
        Some(total),
        Some(0),
        None,
    )
    .await;

    // Phase 4: sequential retrieval, folding per-file results. A failed
    // file becomes an error record; only cancellation stops the loop.
    let mut outcomes: Vec<FileOutcome> = Vec::with_capacity(total);
    for file in &resolved {
        if cancel.is_cancelled() {
            let done = outcomes.len();
            return cancelled(exporter, manuscript_id, downloading_progress(done, total), done)
                .await;
        }

        let done = outcomes.len();
        publish_progress(
            exporter,
            manuscript_id,
            downloading_progress(done, total),
            &format!("Downloading {} ({}/{})", file.name, done + 1, total),
            Some(total),
            Some(done),
            Some(file.name.clone()),
        )
        .await;

        match fetch_one(exporter, file, data_source, cancel).await {
            Some(outcome) => outcomes.push(outcome),
            // Mid-fetch cancellation: the file in flight does not count
            None => {
                return cancelled(
                    exporter,
                    manuscript_id,
                    downloading_progress(done, total),
                    done,
                )
                .await;
            }
        }
    }

    // Phase 5: package. Cancellation is still honored here — no archive is
    // produced for a cancelled job.
    if cancel.is_cancelled() {
        return cancelled(exporter, manuscript_id, 85, outcomes.len()).await;
    }
    publish_progress(
        exporter,
        manuscript_id,
        85,
        "Packaging archive",
        Some(total),
        Some(outcomes.len()),
        None,
    )
    .await;

    let successful = outcomes.iter().filter(|o| o.record.is_success()).count();
    let manifest = Manifest {
        job_id: job.to_string(),
        manuscript_id: manuscript_id.clone(),
        generated_at: Utc::now(),
        requested_by: request.requested_by.clone(),
        scope: request.scope.label(),
        data_source,
        files: outcomes.iter().map(|o| o.record.clone()).collect(),
        total_files: total,
        successful_downloads: successful,
        failed_downloads: total - successful,
    };

    let entries: Vec<ArchiveEntry> = outcomes
        .iter()
        .filter_map(|o| {
            o.bytes.as_ref().map(|bytes| ArchiveEntry {
                name: o.record.name().to_string(),
                bytes: bytes.clone(),
            })
        })
        .collect();

    let archive = match archive::build(&manifest, &entries) {
        Ok(bytes) => bytes,
        Err(e) => return failed(exporter, manuscript_id, 85, e).await,
    };

    // Phase 6: finalize and report completion
    publish_progress(
        exporter,
        manuscript_id,
        95,
        "Finalizing export",
        Some(total),
        Some(outcomes.len()),
        None,
    )
    .await;

    let filename = match &request.package_name {
        Some(name) => format!("{}.zip", archive::sanitize(name.trim_end_matches(".zip"))),
        None => archive::archive_filename(job),
    };

    exporter
        .hub
        .broadcast(
            manuscript_id,
            ProgressEvent::Complete {
                manuscript_id: manuscript_id.clone(),
                progress: 100,
                status: format!("Export complete: {successful}/{total} file(s)"),
                total_files: total,
                downloaded_files: successful,
                archive_name: filename.clone(),
                timestamp: Utc::now(),
            },
        )
        .await;

    Ok(ExportOutput {
        archive,
        filename,
        manifest,
    })
}

/// Retrieve one file. Mock jobs synthesize placeholder bytes locally;
/// remote jobs fetch through the upstream client. Returns `None` when the
/// fetch was cancelled mid-flight.
async fn fetch_one(
    exporter: &ManuscriptExporter,
    file: &FileRef,
    data_source: DataSource,
    cancel: &CancellationToken,
) -> Option<FileOutcome> {
    if data_source == DataSource::Mock {
        let bytes = format!(
            "Placeholder content for {} (upstream unavailable)\n",
            file.name
        )
        .into_bytes();
        return Some(FileOutcome {
            record: DownloadedFile::Mock {
                name: file.name.clone(),
                size: bytes.len() as u64,
                content_type: "text/plain".to_string(),
            },
            bytes: Some(bytes),
        });
    }

    match exporter.upstream.fetch_file(file, cancel).await {
        Ok(Some(fetched)) => Some(FileOutcome {
            record: DownloadedFile::Remote {
                name: fetched.filename.clone(),
                size: fetched.bytes.len() as u64,
                content_type: fetched.content_type.clone(),
            },
            bytes: Some(fetched.bytes),
        }),
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(
                file_id = file.id,
                name = %file.name,
                error = %e,
                "file fetch failed, recording error entry"
            );
            Some(FileOutcome {
                record: DownloadedFile::Error {
                    name: file.name.clone(),
                    message: e.to_string(),
                },
                bytes: None,
            })
        }
    }
}

async fn publish_progress(
    exporter: &ManuscriptExporter,
    manuscript_id: &ManuscriptId,
    progress: u8,
    status: &str,
    total_files: Option<usize>,
    downloaded_files: Option<usize>,
    current_file: Option<String>,
) {
    exporter
        .hub
        .broadcast(
            manuscript_id,
            ProgressEvent::Progress {
                manuscript_id: manuscript_id.clone(),
                progress,
                status: status.to_string(),
                total_files,
                downloaded_files,
                current_file,
                timestamp: Utc::now(),
            },
        )
        .await;
}

/// Emit the terminal cancelled event and return the cancellation error.
/// No archive is produced for a cancelled job.
async fn cancelled(
    exporter: &ManuscriptExporter,
    manuscript_id: &ManuscriptId,
    progress: u8,
    files_completed: usize,
) -> Result<ExportOutput> {
    exporter
        .hub
        .broadcast(
            manuscript_id,
            ProgressEvent::Cancelled {
                manuscript_id: manuscript_id.clone(),
                progress,
                downloaded_files: files_completed,
                timestamp: Utc::now(),
            },
        )
        .await;

    Err(Error::Cancelled {
        manuscript_id: manuscript_id.clone(),
        files_completed,
    })
}

/// Emit the terminal error event and return the failure
async fn failed(
    exporter: &ManuscriptExporter,
    manuscript_id: &ManuscriptId,
    progress: u8,
    error: impl Into<Error>,
) -> Result<ExportOutput> {
    let error = error.into();
    exporter
        .hub
        .broadcast(
            manuscript_id,
            ProgressEvent::Error {
                manuscript_id: manuscript_id.clone(),
                progress,
                message: error.to_string(),
                timestamp: Utc::now(),
            },
        )
        .await;

    Err(error)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod unit_tests {
    use super::downloading_progress;

    #[test]
    fn downloading_progress_is_monotone_and_capped() {
        let total = 7;
        let mut last = 0;
        for done in 0..=total {
            let pct = downloading_progress(done, total);
            assert!(pct >= last, "progress must not decrease");
            assert!(pct <= 85);
            last = pct;
        }
        assert_eq!(downloading_progress(0, total), 30);
        assert_eq!(downloading_progress(total, total), 85);
    }

    #[test]
    fn downloading_progress_handles_empty_jobs() {
        assert_eq!(downloading_progress(0, 0), 85);
    }
}
