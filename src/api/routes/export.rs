//! Export handlers: progress stream, archive/list download, custom
//! packages, cancellation.

use crate::api::routes::{CustomDownloadRequest, DownloadQuery};
use crate::api::{AppState, auth};
use crate::error::{Error, Result};
use crate::exporter::{ExportOutput, ExportRequest};
use crate::types::{ManuscriptId, ProgressEvent, Scope};
use axum::{
    Json,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{
        IntoResponse, Response,
        sse::{Event as SseEvent, KeepAlive, Sse},
    },
};
use serde_json::json;
use std::convert::Infallible;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

/// GET /manuscripts/:id/download/progress - Progress event stream
///
/// Registers a push channel with the progress hub and relays its events as
/// server-sent events. The channel carries its own heartbeat; after a
/// terminal event the hub tears the channel down following a short grace
/// delay and the stream ends. If the client disconnects first, the guard
/// held by the stream unregisters the channel immediately.
#[utoipa::path(
    get,
    path = "/manuscripts/{id}/download/progress",
    tag = "export",
    params(
        ("id" = String, Path, description = "Manuscript identifier")
    ),
    responses(
        (status = 200, description = "Progress event stream (text/event-stream)", content_type = "text/event-stream")
    )
)]
pub async fn download_progress(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Sse<impl tokio_stream::Stream<Item = std::result::Result<SseEvent, Infallible>>> {
    let manuscript_id = ManuscriptId::new(id);
    let (registration_id, receiver) = state
        .exporter
        .progress_hub()
        .register(&manuscript_id)
        .await;

    tracing::debug!(
        manuscript_id = %manuscript_id,
        registration_id = %registration_id,
        "progress stream opened"
    );

    // The guard lives inside the stream's closure; dropping the response
    // body (peer disconnect) drops it and frees the registration.
    let guard = state.exporter.progress_hub().drop_guard(&registration_id);
    let sse_stream = ReceiverStream::new(receiver).filter_map(move |event| {
        let _ = &guard;
        match serde_json::to_string(&event) {
            Ok(json_data) => {
                let event_type = match &event {
                    ProgressEvent::Connection { .. } => "connection",
                    ProgressEvent::Progress { .. } => "progress",
                    ProgressEvent::Complete { .. } => "complete",
                    ProgressEvent::Error { .. } => "error",
                    ProgressEvent::Cancelled { .. } => "cancelled",
                    ProgressEvent::Heartbeat { .. } => "heartbeat",
                };

                Some(Ok(SseEvent::default().event(event_type).data(json_data)))
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize progress event");
                None
            }
        }
    });

    Sse::new(sse_stream).keep_alive(KeepAlive::default())
}

/// GET /manuscripts/:id/download - Export a manuscript's files
///
/// `format=list` resolves the file set and returns it as JSON without
/// fetching any file bytes; `format=zip` (the default) runs the full
/// pipeline and returns the archive.
#[utoipa::path(
    get,
    path = "/manuscripts/{id}/download",
    tag = "export",
    params(
        ("id" = String, Path, description = "Manuscript identifier"),
        ("format" = Option<String>, Query, description = "zip (default) or list"),
        ("type" = Option<String>, Query, description = "File scope: all, essential, manuscript, figures, supplementary, metadata")
    ),
    responses(
        (status = 200, description = "Archive bytes (format=zip) or resolved file listing (format=list)"),
        (status = 400, description = "Unknown format or file type", body = crate::error::ApiError),
        (status = 404, description = "No files match the requested scope", body = crate::error::ApiError),
        (status = 499, description = "Export cancelled by the caller", body = crate::error::ApiError),
        (status = 500, description = "Packaging failure", body = crate::error::ApiError)
    )
)]
pub async fn download_manuscript(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<DownloadQuery>,
    headers: HeaderMap,
) -> Result<Response> {
    let manuscript_id = ManuscriptId::new(id);
    let scope = parse_scope(query.file_type.as_deref())?;

    match query.format.as_deref().unwrap_or("zip") {
        "list" => {
            let listing = state.exporter.list_files(&manuscript_id, &scope).await?;
            Ok((StatusCode::OK, Json(listing)).into_response())
        }
        "zip" => {
            let mut request = ExportRequest::new(manuscript_id);
            request.scope = scope;
            request.requested_by = auth::user_identity(&headers);

            let output = state.exporter.export(request).await?;
            archive_response(output)
        }
        other => Err(Error::Config {
            message: format!("unknown download format: {other}"),
            key: Some("format".to_string()),
        }),
    }
}

/// POST /manuscripts/:id/download - Build a custom archive
///
/// Restricts the export to the selected files (by upstream id or filename);
/// responds like the zip `GET` path.
#[utoipa::path(
    post,
    path = "/manuscripts/{id}/download",
    tag = "export",
    params(
        ("id" = String, Path, description = "Manuscript identifier")
    ),
    request_body = CustomDownloadRequest,
    responses(
        (status = 200, description = "Archive bytes", content_type = "application/zip"),
        (status = 400, description = "Empty selection", body = crate::error::ApiError),
        (status = 404, description = "No files match the selection", body = crate::error::ApiError),
        (status = 499, description = "Export cancelled by the caller", body = crate::error::ApiError),
        (status = 500, description = "Packaging failure", body = crate::error::ApiError)
    )
)]
pub async fn custom_download(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<CustomDownloadRequest>,
) -> Result<Response> {
    if body.selected_files.is_empty() {
        return Err(Error::Config {
            message: "selectedFiles must not be empty".to_string(),
            key: Some("selectedFiles".to_string()),
        });
    }

    let selectors = body
        .selected_files
        .iter()
        .map(|s| s.as_selector())
        .collect();

    let mut request = ExportRequest::new(ManuscriptId::new(id));
    request.scope = Scope::Custom(selectors);
    request.requested_by = auth::user_identity(&headers);
    request.package_name = body.package_name;
    request.include_metadata = body.include_metadata;

    let output = state.exporter.export(request).await?;
    archive_response(output)
}

/// DELETE /manuscripts/:id/download - Cancel an in-flight export
///
/// Trips the cancellation signal the orchestrator checks between files and
/// the content client honors mid-request. The cancelled request itself
/// answers with 499.
#[utoipa::path(
    delete,
    path = "/manuscripts/{id}/download",
    tag = "export",
    params(
        ("id" = String, Path, description = "Manuscript identifier")
    ),
    responses(
        (status = 202, description = "Cancellation requested"),
        (status = 404, description = "No export in flight for this manuscript", body = crate::error::ApiError)
    )
)]
pub async fn cancel_download(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let manuscript_id = ManuscriptId::new(id);

    if state.exporter.cancel(&manuscript_id).await {
        Ok((
            StatusCode::ACCEPTED,
            Json(json!({"status": "cancellation requested"})),
        ))
    } else {
        Err(Error::NotFound(format!(
            "no export in flight for manuscript {manuscript_id}"
        )))
    }
}

/// 200 response wrapping the built archive: binary body plus disposition
/// and provenance headers
fn archive_response(output: ExportOutput) -> Result<Response> {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/zip")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", output.filename),
        )
        .header("x-data-source", output.manifest.data_source.as_str())
        .header("x-file-count", output.manifest.total_files.to_string())
        .body(Body::from(output.archive))
        .map_err(|e| Error::ApiServerError(e.to_string()))
}

fn parse_scope(file_type: Option<&str>) -> Result<Scope> {
    match file_type.unwrap_or("essential") {
        "all" => Ok(Scope::All),
        "essential" => Ok(Scope::Essential),
        "manuscript" => Ok(Scope::Manuscript),
        "figures" => Ok(Scope::Figures),
        "supplementary" => Ok(Scope::Supplementary),
        "metadata" => Ok(Scope::Metadata),
        other => Err(Error::Config {
            message: format!("unknown file type: {other}"),
            key: Some("type".to_string()),
        }),
    }
}
