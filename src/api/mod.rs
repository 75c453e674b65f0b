//! REST API server module
//!
//! Exposes the export pipeline over HTTP: archive downloads, file listings,
//! a server-sent-events progress stream, and cancellation, with an OpenAPI
//! spec generated at compile time.

use crate::{Config, ManuscriptExporter, Result};
use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{delete, get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod auth;
pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Create the API router with all route definitions
///
/// # Routes
///
/// ## Export
/// - `GET /manuscripts/:id/download/progress` - Progress event stream (SSE)
/// - `GET /manuscripts/:id/download` - Export archive (`format=zip`, default)
///   or resolved file listing (`format=list`), scoped by `type=`
/// - `POST /manuscripts/:id/download` - Custom archive from selected files
/// - `DELETE /manuscripts/:id/download` - Cancel an in-flight export
///
/// ## System
/// - `GET /health` - Health check
/// - `GET /openapi.json` - OpenAPI specification
/// - `GET /swagger-ui` - Interactive Swagger UI documentation (if enabled)
pub fn create_router(exporter: Arc<ManuscriptExporter>, config: Arc<Config>) -> Router {
    let state = AppState::new(exporter, config.clone());

    let router = Router::new()
        // Export
        .route(
            "/manuscripts/:id/download/progress",
            get(routes::download_progress),
        )
        .route("/manuscripts/:id/download", get(routes::download_manuscript))
        .route("/manuscripts/:id/download", post(routes::custom_download))
        .route("/manuscripts/:id/download", delete(routes::cancel_download))
        // System
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(routes::openapi_spec));

    // Merge Swagger UI routes if enabled in config (before applying state)
    let router = if config.server.api.swagger_ui {
        router.merge(SwaggerUi::new("/swagger-ui").url("/openapi.json", ApiDoc::openapi()))
    } else {
        router
    };

    let router = router.with_state(state);

    // Middleware layer ordering: in Axum's onion model the LAST layer applied
    // is the OUTERMOST (runs first on requests). Auth is applied first
    // (innermost), CORS last.
    let router = if config.server.api.api_key.is_some() {
        router.layer(middleware::from_fn_with_state(
            config.server.api.api_key.clone(),
            auth::require_api_key,
        ))
    } else {
        router
    };

    if config.server.api.cors_enabled {
        let cors = build_cors_layer(&config.server.api.cors_origins);
        router.layer(cors)
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins ("*" allows any origin)
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server on the configured bind address.
///
/// Creates a TCP listener, binds it to the configured address, and serves
/// the API router until the server is shut down.
pub async fn start_api_server(exporter: Arc<ManuscriptExporter>, config: Arc<Config>) -> Result<()> {
    let bind_address = config.server.api.bind_address;

    tracing::info!(
        address = %bind_address,
        "Starting API server"
    );

    let app = create_router(exporter, config);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(
        address = %bind_address,
        "API server listening"
    );

    axum::serve(listener, app)
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
