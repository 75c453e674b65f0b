//! Archive packaging
//!
//! Builds the downloadable zip for an export job: one entry per successfully
//! retrieved file plus a `manifest.json` summary, serialized fully in memory
//! and returned as a single byte vector. In-memory construction is a
//! deliberate trade-off: a mid-job file failure stays representable as a
//! manifest error entry, which streaming construction (bytes already flushed
//! to the client) could not offer.
//!
//! Packaging is the one step that never fails silently: any zip or manifest
//! serialization error fails the whole job.

use std::collections::HashSet;
use std::io::{Cursor, Write};

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{ArchiveError, Result};
use crate::types::{JobId, Manifest};

/// Name of the manifest entry inside every archive
pub const MANIFEST_ENTRY: &str = "manifest.json";

/// One named blob destined for the archive
#[derive(Clone, Debug)]
pub struct ArchiveEntry {
    /// Entry name inside the archive (resolved filename)
    pub name: String,
    /// File contents
    pub bytes: Vec<u8>,
}

/// Build the archive for a job: every entry under its resolved name, then
/// the manifest, deflate-compressed.
pub fn build(manifest: &Manifest, entries: &[ArchiveEntry]) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut used_names = HashSet::new();
    used_names.insert(MANIFEST_ENTRY.to_string());

    for entry in entries {
        let name = unique_name(&entry.name, &mut used_names);

        writer
            .start_file(&name, options)
            .map_err(|e| ArchiveError::EntryFailed {
                name: name.clone(),
                reason: e.to_string(),
            })?;
        writer
            .write_all(&entry.bytes)
            .map_err(|e| ArchiveError::EntryFailed {
                name: name.clone(),
                reason: e.to_string(),
            })?;
    }

    let manifest_json =
        serde_json::to_vec_pretty(manifest).map_err(|e| ArchiveError::ManifestFailed {
            job_id: manifest.job_id.clone(),
            reason: e.to_string(),
        })?;

    writer
        .start_file(MANIFEST_ENTRY, options)
        .map_err(|e| ArchiveError::ManifestFailed {
            job_id: manifest.job_id.clone(),
            reason: e.to_string(),
        })?;
    writer
        .write_all(&manifest_json)
        .map_err(|e| ArchiveError::ManifestFailed {
            job_id: manifest.job_id.clone(),
            reason: e.to_string(),
        })?;

    let cursor = writer
        .finish()
        .map_err(|e| ArchiveError::FinalizeFailed {
            reason: e.to_string(),
        })?;

    tracing::debug!(
        job_id = %manifest.job_id,
        entries = entries.len(),
        bytes = cursor.get_ref().len(),
        "archive built"
    );

    Ok(cursor.into_inner())
}

/// Derived download filename for a job: `<manuscript>_<unix-ts>.zip` with
/// unsafe characters replaced
pub fn archive_filename(job_id: &JobId) -> String {
    let stem = sanitize(job_id.manuscript_id.as_str());
    format!("{}_{}.zip", stem, job_id.created_at.timestamp())
}

/// Replace characters that are unsafe in filenames or disposition headers
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Resolve name collisions by inserting ` (n)` before the extension
fn unique_name(name: &str, used: &mut HashSet<String>) -> String {
    if used.insert(name.to_string()) {
        return name.to_string();
    }

    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) => (stem, Some(ext)),
        None => (name, None),
    };

    for n in 1.. {
        let candidate = match ext {
            Some(ext) => format!("{stem} ({n}).{ext}"),
            None => format!("{stem} ({n})"),
        };
        if used.insert(candidate.clone()) {
            return candidate;
        }
    }
    unreachable!("collision counter exhausted")
}
