use super::*;
use crate::Config;
use axum::body::Body;
use axum::extract::Request;
use axum::http::StatusCode;
use std::time::Duration;
use tower::ServiceExt;
use wiremock::MockServer;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

mod export;
mod system;

/// Router plus exporter backed by a mocked upstream
async fn test_app(server: &MockServer) -> (Router, Arc<ManuscriptExporter>) {
    let mut config = Config::default();
    config.upstream.base_url = format!("{}/", server.uri());
    config.progress.teardown_grace = Duration::from_millis(20);
    let config = Arc::new(config);

    let exporter = Arc::new(ManuscriptExporter::new((*config).clone()).unwrap());
    (create_router(exporter.clone(), config), exporter)
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

#[tokio::test]
async fn test_api_server_spawns() {
    let server = MockServer::start().await;

    let mut config = Config::default();
    config.upstream.base_url = format!("{}/", server.uri());
    // Port 0 = OS assigns a free port
    config.server.api.bind_address = "127.0.0.1:0".parse().unwrap();
    let config = Arc::new(config);

    let exporter = Arc::new(ManuscriptExporter::new((*config).clone()).unwrap());

    let api_handle = tokio::spawn({
        let config = config.clone();
        async move { start_api_server(exporter, config).await }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    api_handle.abort();
}

#[tokio::test]
async fn test_cors_enabled() {
    let server = MockServer::start().await;
    let (app, _exporter) = test_app(&server).await;

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .contains_key("access-control-allow-origin")
    );
}

#[tokio::test]
async fn test_api_key_guards_all_routes() {
    let server = MockServer::start().await;

    let mut config = Config::default();
    config.upstream.base_url = format!("{}/", server.uri());
    config.server.api.api_key = Some("secret".to_string());
    let config = Arc::new(config);

    let exporter = Arc::new(ManuscriptExporter::new((*config).clone()).unwrap());
    let app = create_router(exporter, config);

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/health")
        .header("X-Api-Key", "secret")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
