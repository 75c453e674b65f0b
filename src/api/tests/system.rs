use super::*;

#[tokio::test]
async fn health_reports_ok_and_version() {
    let server = MockServer::start().await;
    let (app, _exporter) = test_app(&server).await;

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn openapi_spec_is_served() {
    let server = MockServer::start().await;
    let (app, _exporter) = test_app(&server).await;

    let request = Request::builder()
        .uri("/openapi.json")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert!(body["paths"]["/manuscripts/{id}/download"].is_object());
    assert!(
        body["paths"]["/manuscripts/{id}/download/progress"]["get"].is_object()
    );
}

#[tokio::test]
async fn progress_stream_responds_with_event_stream() {
    let server = MockServer::start().await;
    let (app, _exporter) = test_app(&server).await;

    let request = Request::builder()
        .uri("/manuscripts/MS-1/download/progress")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream")
    );
}

#[tokio::test]
async fn disconnected_progress_stream_frees_its_channel() {
    let server = MockServer::start().await;
    let (app, exporter) = test_app(&server).await;
    let ms = crate::types::ManuscriptId::new("MS-1");

    let request = Request::builder()
        .uri("/manuscripts/MS-1/download/progress")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(exporter.progress_hub().connection_count(&ms).await, 1);

    // Dropping the response body is the peer hanging up
    drop(response);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(exporter.progress_hub().connection_count(&ms).await, 0);
}
