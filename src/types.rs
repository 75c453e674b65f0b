//! Core types for manuscript-export

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Identifier of a manuscript in the upstream repository
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct ManuscriptId(pub String);

impl ManuscriptId {
    /// Create a new ManuscriptId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ManuscriptId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ManuscriptId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for ManuscriptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a single export job: the manuscript plus the moment the
/// request arrived. Two exports of the same manuscript get distinct job ids.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobId {
    /// The manuscript being exported
    pub manuscript_id: ManuscriptId,
    /// When the export request was created
    pub created_at: DateTime<Utc>,
}

impl JobId {
    /// Create a job id for a manuscript, stamped with the current time
    pub fn new(manuscript_id: ManuscriptId) -> Self {
        Self {
            manuscript_id,
            created_at: Utc::now(),
        }
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.manuscript_id, self.created_at.timestamp())
    }
}

/// Semantic category of an upstream file
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// The manuscript text itself (doc, docx, tex, non-figure pdf)
    Manuscript,
    /// Figures and other graphics
    Figure,
    /// Supplementary data files (spreadsheets, datasets, bundled archives)
    Supplementary,
    /// Structured metadata (xml, json)
    Metadata,
    /// Thumbnails and previews
    Thumbnail,
}

impl Category {
    /// Stable lowercase name, used in scope labels and log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Manuscript => "manuscript",
            Category::Figure => "figure",
            Category::Supplementary => "supplementary",
            Category::Metadata => "metadata",
            Category::Thumbnail => "thumbnail",
        }
    }
}

/// The subset of a manuscript's files an export job targets
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum Scope {
    /// Every file the upstream lists
    All,
    /// Manuscript + figures + supplementary data, minus thumbnail-like files (default)
    #[default]
    Essential,
    /// Only the manuscript text files
    Manuscript,
    /// Only figures
    Figures,
    /// Only supplementary data
    Supplementary,
    /// Only metadata files
    Metadata,
    /// Files whose id (decimal) or name appears in the caller-supplied set
    Custom(Vec<String>),
}

impl Scope {
    /// Human-readable label recorded in the manifest and response headers
    pub fn label(&self) -> String {
        match self {
            Scope::All => "all".to_string(),
            Scope::Essential => "essential".to_string(),
            Scope::Manuscript => "manuscript".to_string(),
            Scope::Figures => "figures".to_string(),
            Scope::Supplementary => "supplementary".to_string(),
            Scope::Metadata => "metadata".to_string(),
            Scope::Custom(selected) => format!("custom({} selected)", selected.len()),
        }
    }
}

/// Provenance of the file listing a job worked from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    /// Listing came from the upstream content service
    Remote,
    /// Upstream was unreachable; the degraded fixed file set was used
    Mock,
}

impl DataSource {
    /// Stable lowercase name for the `X-Data-Source` header
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Remote => "remote",
            DataSource::Mock => "mock",
        }
    }
}

/// One file as declared by the upstream content service.
///
/// Immutable once produced; the categorizer and the orchestrator only read it.
/// The `uri` doubles as the declared path for category matching.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FileRef {
    /// Upstream numeric file id
    pub id: i64,
    /// Declared filename
    pub name: String,
    /// Declared URI (absolute, or a path resolved against the upstream base)
    pub uri: String,
    /// Declared type hint from the upstream, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
}

/// Outcome of retrieving one [`FileRef`] — exactly one entry per processed
/// file, appended in processing order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "source", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum DownloadedFile {
    /// Successfully fetched from the upstream content service
    Remote {
        /// Resolved filename (disposition header or `file_<id>` fallback)
        name: String,
        /// Size of the retrieved bytes
        size: u64,
        /// Content type reported by the upstream
        content_type: String,
    },
    /// Synthesized placeholder produced while upstream metadata was unavailable
    Mock {
        /// Filename from the degraded fixed file set
        name: String,
        /// Size of the placeholder bytes
        size: u64,
        /// Placeholder content type
        content_type: String,
    },
    /// Retrieval failed; the job continued past it
    Error {
        /// Declared filename of the file that failed
        name: String,
        /// Why the retrieval failed
        message: String,
    },
}

impl DownloadedFile {
    /// Filename of this entry regardless of outcome
    pub fn name(&self) -> &str {
        match self {
            DownloadedFile::Remote { name, .. }
            | DownloadedFile::Mock { name, .. }
            | DownloadedFile::Error { name, .. } => name,
        }
    }

    /// Whether this entry represents a successful retrieval
    pub fn is_success(&self) -> bool {
        !matches!(self, DownloadedFile::Error { .. })
    }
}

/// Progress event pushed to registered observers of a job.
///
/// Delivery is best-effort: no buffering, no replay, at-most-once per sink.
/// `progress` values for one job are non-decreasing until a terminal
/// `error`/`cancelled` event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum ProgressEvent {
    /// A push channel was opened for this manuscript
    Connection {
        /// Manuscript the channel observes
        manuscript_id: ManuscriptId,
        /// Registration id of the new channel
        connection_id: String,
        /// When the channel was opened
        timestamp: DateTime<Utc>,
    },

    /// The job advanced a step
    Progress {
        /// Manuscript being exported
        manuscript_id: ManuscriptId,
        /// Percentage complete (0-100, non-decreasing)
        progress: u8,
        /// Human-readable description of the current step
        status: String,
        /// Number of files the job resolved
        #[serde(skip_serializing_if = "Option::is_none")]
        total_files: Option<usize>,
        /// Number of files processed so far
        #[serde(skip_serializing_if = "Option::is_none")]
        downloaded_files: Option<usize>,
        /// Name of the file currently being fetched
        #[serde(skip_serializing_if = "Option::is_none")]
        current_file: Option<String>,
        /// When the step was reported
        timestamp: DateTime<Utc>,
    },

    /// The job finished and an archive is available
    Complete {
        /// Manuscript that was exported
        manuscript_id: ManuscriptId,
        /// Always 100
        progress: u8,
        /// Human-readable completion message
        status: String,
        /// Number of files the job resolved
        total_files: usize,
        /// Number of files successfully retrieved
        downloaded_files: usize,
        /// Filename of the produced archive
        archive_name: String,
        /// When the job completed
        timestamp: DateTime<Utc>,
    },

    /// The job failed and no archive was produced
    Error {
        /// Manuscript whose export failed
        manuscript_id: ManuscriptId,
        /// Percentage at the moment of failure
        progress: u8,
        /// What went wrong
        message: String,
        /// When the failure was observed
        timestamp: DateTime<Utc>,
    },

    /// The job was cancelled; counts reflect work done before the cancel point
    Cancelled {
        /// Manuscript whose export was cancelled
        manuscript_id: ManuscriptId,
        /// Percentage at the moment of cancellation
        progress: u8,
        /// Files fully processed before the cancellation point
        downloaded_files: usize,
        /// When the cancellation was observed
        timestamp: DateTime<Utc>,
    },

    /// Fixed-interval liveness payload so idle observers can detect a dead peer
    Heartbeat {
        /// When the heartbeat fired
        timestamp: DateTime<Utc>,
    },
}

impl ProgressEvent {
    /// Whether this event ends the job's event stream (teardown follows
    /// after a grace delay)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressEvent::Complete { .. }
                | ProgressEvent::Error { .. }
                | ProgressEvent::Cancelled { .. }
        )
    }
}

/// Final summary written into the archive as `manifest.json`.
///
/// Created once at the end of a (possibly partially) successful run,
/// never mutated afterward.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct Manifest {
    /// Job id (`<manuscript>_<unix-ts>`)
    pub job_id: String,
    /// Manuscript the archive belongs to
    pub manuscript_id: ManuscriptId,
    /// Wall-clock time the manifest was written
    pub generated_at: DateTime<Utc>,
    /// Identity of the user who requested the export
    pub requested_by: String,
    /// Scope label the job was resolved with
    pub scope: String,
    /// Where the file listing came from
    pub data_source: DataSource,
    /// Per-file outcome, in processing order
    pub files: Vec<DownloadedFile>,
    /// Number of files the job resolved
    pub total_files: usize,
    /// Count of successful retrievals
    pub successful_downloads: usize,
    /// Count of failed retrievals
    pub failed_downloads: usize,
}

/// File listing returned by `format=list` requests — resolved without
/// fetching any file bytes.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct FileListing {
    /// Manuscript the listing belongs to
    pub manuscript_id: ManuscriptId,
    /// Files matching the requested scope, input order preserved
    pub files: Vec<FileRef>,
    /// Number of files in the listing
    pub total_files: usize,
    /// Where the listing came from
    pub data_source: DataSource,
}
