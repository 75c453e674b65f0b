//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`export`] — Manuscript file export: progress stream, archive/list
//!   download, custom packages, cancellation
//! - [`system`] — Health and OpenAPI

use serde::{Deserialize, Serialize};

mod export;
mod system;

// Re-export all handlers so `routes::function_name` continues to work
pub use export::*;
pub use system::*;

// ============================================================================
// Query/Request Types (shared across handlers)
// ============================================================================

/// Query parameters for GET /manuscripts/:id/download
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct DownloadQuery {
    /// Response format: "zip" (default) builds the archive, "list" returns
    /// the resolved file set as JSON without fetching any bytes
    pub format: Option<String>,

    /// Scope selector: all | essential | manuscript | figures |
    /// supplementary | metadata (default: essential)
    #[serde(rename = "type")]
    pub file_type: Option<String>,
}

/// One entry of a custom selection: an upstream file id or a filename
#[derive(Debug, Clone, Deserialize, Serialize, utoipa::ToSchema)]
#[serde(untagged)]
pub enum FileSelector {
    /// Select by upstream numeric id
    Id(i64),
    /// Select by declared filename (case-insensitive)
    Name(String),
}

impl FileSelector {
    /// The selector as the string form the scope resolver matches on
    pub fn as_selector(&self) -> String {
        match self {
            FileSelector::Id(id) => id.to_string(),
            FileSelector::Name(name) => name.clone(),
        }
    }
}

/// Request body for POST /manuscripts/:id/download
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomDownloadRequest {
    /// Files to include, by upstream id or filename
    pub selected_files: Vec<FileSelector>,

    /// Optional archive filename stem (".zip" is appended)
    #[serde(default)]
    pub package_name: Option<String>,

    /// Also include metadata-category files beyond the selection
    #[serde(default)]
    pub include_metadata: bool,
}
