//! OpenAPI documentation and schema generation
//!
//! Compile-time OpenAPI spec for the export REST API, generated with
//! utoipa. The spec is served at `/openapi.json` and through Swagger UI at
//! `/swagger-ui` when enabled.

use utoipa::OpenApi;

/// OpenAPI documentation for the manuscript-export REST API
#[derive(OpenApi)]
#[openapi(
    info(
        title = "manuscript-export REST API",
        version = "0.2.0",
        description = "REST API for bulk manuscript file export: archive downloads, file listings, live progress streams, and cancellation",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    paths(
        // Export
        crate::api::routes::download_progress,
        crate::api::routes::download_manuscript,
        crate::api::routes::custom_download,
        crate::api::routes::cancel_download,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
    ),
    components(schemas(
        // Core types from types.rs
        crate::types::ManuscriptId,
        crate::types::FileRef,
        crate::types::DownloadedFile,
        crate::types::ProgressEvent,
        crate::types::Manifest,
        crate::types::FileListing,
        crate::types::DataSource,

        // Request types
        crate::api::routes::DownloadQuery,
        crate::api::routes::CustomDownloadRequest,
        crate::api::routes::FileSelector,

        // Config types from config.rs
        crate::config::Config,
        crate::config::UpstreamConfig,
        crate::config::ExportConfig,
        crate::config::ProgressConfig,
        crate::config::ServerConfig,
        crate::config::ApiConfig,

        // Error types
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "export", description = "Manuscript file export and progress"),
        (name = "system", description = "Health and API metadata")
    )
)]
pub struct ApiDoc;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use utoipa::OpenApi;

    #[test]
    fn spec_generates_and_lists_export_paths() {
        let spec = ApiDoc::openapi();
        let json = spec.to_json().unwrap();

        assert!(json.contains("/manuscripts/{id}/download"));
        assert!(json.contains("/manuscripts/{id}/download/progress"));
        assert!(json.contains("/health"));
    }

    #[test]
    fn spec_includes_manifest_schema() {
        let spec = ApiDoc::openapi();
        let json = spec.to_json().unwrap();

        assert!(json.contains("Manifest"));
        assert!(json.contains("ProgressEvent"));
    }
}
