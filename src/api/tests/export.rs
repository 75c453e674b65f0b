use super::*;
use crate::types::{FileRef, ManuscriptId};

fn file_ref(id: i64, name: &str, uri: &str) -> FileRef {
    FileRef {
        id,
        name: name.to_string(),
        uri: uri.to_string(),
        file_type: None,
    }
}

async fn mount_manuscript(server: &MockServer, manuscript: &str, files: &[FileRef]) {
    Mock::given(method("GET"))
        .and(path(format!("/manuscripts/{manuscript}/files")))
        .respond_with(ResponseTemplate::new(200).set_body_json(files))
        .mount(server)
        .await;
}

async fn mount_file(server: &MockServer, uri: &str, name: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(uri))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header(
                    "content-disposition",
                    format!("attachment; filename=\"{name}\"").as_str(),
                )
                .set_body_bytes(body.to_vec()),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn list_format_returns_resolved_files_without_bytes() {
    let server = MockServer::start().await;
    mount_manuscript(
        &server,
        "MS-1",
        &[
            file_ref(1, "manuscript.docx", "/files/1"),
            file_ref(2, "figure_1.png", "/files/2"),
        ],
    )
    .await;

    let (app, _exporter) = test_app(&server).await;

    let request = Request::builder()
        .uri("/manuscripts/MS-1/download?format=list&type=all")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["manuscript_id"], "MS-1");
    assert_eq!(body["total_files"], 2);
    assert_eq!(body["data_source"], "remote");

    // Only the metadata endpoint was hit
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn zip_format_returns_archive_with_headers() {
    let server = MockServer::start().await;
    mount_manuscript(&server, "MS-2", &[file_ref(1, "manuscript.docx", "/files/1")]).await;
    mount_file(&server, "/files/1", "manuscript.docx", b"docx bytes").await;

    let (app, _exporter) = test_app(&server).await;

    let request = Request::builder()
        .uri("/manuscripts/MS-2/download?type=all")
        .header("X-User-Id", "curator-5")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers().clone();
    assert_eq!(headers["content-type"], "application/zip");
    assert!(
        headers["content-disposition"]
            .to_str()
            .unwrap()
            .starts_with("attachment; filename=\"MS-2_")
    );
    assert_eq!(headers["x-data-source"], "remote");
    assert_eq!(headers["x-file-count"], "1");

    let bytes = body_bytes(response).await;
    let mut zip = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
    assert!(zip.by_name("manuscript.docx").is_ok());
    assert!(zip.by_name("manifest.json").is_ok());
}

#[tokio::test]
async fn unknown_format_is_rejected() {
    let server = MockServer::start().await;
    let (app, _exporter) = test_app(&server).await;

    let request = Request::builder()
        .uri("/manuscripts/MS-3/download?format=tar")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_file_type_is_rejected() {
    let server = MockServer::start().await;
    let (app, _exporter) = test_app(&server).await;

    let request = Request::builder()
        .uri("/manuscripts/MS-3/download?type=videos")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn empty_scope_answers_404() {
    let server = MockServer::start().await;
    mount_manuscript(&server, "MS-4", &[]).await;

    let (app, _exporter) = test_app(&server).await;

    let request = Request::builder()
        .uri("/manuscripts/MS-4/download")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["error"]["code"], "empty_scope");
}

#[tokio::test]
async fn pre_cancelled_export_answers_499() {
    let server = MockServer::start().await;
    mount_manuscript(&server, "MS-5", &[file_ref(1, "manuscript.docx", "/files/1")]).await;

    let (app, exporter) = test_app(&server).await;

    let ms = ManuscriptId::new("MS-5");
    exporter.cancellations().token(&ms).await;
    assert!(exporter.cancel(&ms).await);

    let request = Request::builder()
        .uri("/manuscripts/MS-5/download")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status().as_u16(), 499);
}

#[tokio::test]
async fn custom_download_builds_the_selected_package() {
    let server = MockServer::start().await;
    mount_manuscript(
        &server,
        "MS-6",
        &[
            file_ref(1, "manuscript.docx", "/files/1"),
            file_ref(2, "figure_1.png", "/files/2"),
            file_ref(3, "data.csv", "/files/3"),
        ],
    )
    .await;
    mount_file(&server, "/files/1", "manuscript.docx", b"docx").await;
    mount_file(&server, "/files/3", "data.csv", b"a,b\n").await;

    let (app, _exporter) = test_app(&server).await;

    let body = serde_json::json!({
        "selectedFiles": [1, "data.csv"],
        "packageName": "review-package"
    });
    let request = Request::builder()
        .method("POST")
        .uri("/manuscripts/MS-6/download")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-disposition"],
        "attachment; filename=\"review-package.zip\""
    );
    assert_eq!(response.headers()["x-file-count"], "2");

    let bytes = body_bytes(response).await;
    let mut zip = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
    assert!(zip.by_name("manuscript.docx").is_ok());
    assert!(zip.by_name("data.csv").is_ok());
    assert!(zip.by_name("figure_1.png").is_err());
}

#[tokio::test]
async fn custom_download_rejects_an_empty_selection() {
    let server = MockServer::start().await;
    let (app, _exporter) = test_app(&server).await;

    let request = Request::builder()
        .method("POST")
        .uri("/manuscripts/MS-7/download")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"selectedFiles": []}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cancel_without_an_export_in_flight_answers_404() {
    let server = MockServer::start().await;
    let (app, _exporter) = test_app(&server).await;

    let request = Request::builder()
        .method("DELETE")
        .uri("/manuscripts/MS-8/download")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cancel_with_an_export_in_flight_is_accepted() {
    let server = MockServer::start().await;
    let (app, exporter) = test_app(&server).await;

    // Registering the token is what an in-flight job does first
    let ms = ManuscriptId::new("MS-9");
    exporter.cancellations().token(&ms).await;

    let request = Request::builder()
        .method("DELETE")
        .uri("/manuscripts/MS-9/download")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert!(exporter.cancellations().is_cancelled(&ms).await);
}

#[tokio::test]
async fn mock_fallback_is_flagged_in_response_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/manuscripts/MS-10/files"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let (app, _exporter) = test_app(&server).await;

    let request = Request::builder()
        .uri("/manuscripts/MS-10/download?type=all")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-data-source"], "mock");
}
