mod helpers;

use axum::http::StatusCode;
use depot_api::handlers::files::{FileExistResponse, UploadFileResponse};
use depot_api::ErrorResponse;
use depot_core::UploadPolicy;
use helpers::{png_bytes, setup_test_app, setup_test_app_with, MAX_FILE_SIZE};

#[tokio::test]
async fn test_upload_and_download() {
    let app = setup_test_app().await;
    let content = png_bytes(300);

    let response = app
        .client()
        .post("/file/avatars")
        .add_query_param("filename", "me.png")
        .bytes(content.clone().into())
        .await;
    response.assert_status_ok();
    let body: UploadFileResponse = response.json();
    assert_eq!(body.filename, "me.png");

    let response = app.client().get("/file/avatars/me.png").await;
    response.assert_status_ok();
    assert_eq!(response.header("content-type"), "image/png");
    assert_eq!(response.header("content-length"), "300");
    assert_eq!(response.header("accept-ranges"), "bytes");
    assert_eq!(response.as_bytes().as_ref(), content.as_slice());
}

#[tokio::test]
async fn test_upload_generates_filename() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post("/file/avatars")
        .bytes(png_bytes(64).into())
        .await;
    response.assert_status_ok();
    let body: UploadFileResponse = response.json();
    assert!(!body.filename.is_empty());

    let exists: FileExistResponse = app
        .client()
        .get(&format!("/file/avatars/{}/exist", body.filename))
        .await
        .json();
    assert!(exists.file_exist);
}

#[tokio::test]
async fn test_empty_upload_rejected() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post("/file/avatars")
        .add_query_param("filename", "empty.png")
        .bytes(Vec::new().into())
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: ErrorResponse = response.json();
    assert_eq!(body.code, "FILE_HAS_ZERO_SIZE");
    assert_eq!(body.numeric_code, Some(602));
}

#[tokio::test]
async fn test_upload_at_size_limit_rejected() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post("/file/avatars")
        .add_query_param("filename", "big.png")
        .bytes(png_bytes(MAX_FILE_SIZE as usize).into())
        .await;
    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    let body: ErrorResponse = response.json();
    assert_eq!(body.code, "FILE_TOO_BIG");

    let exists: FileExistResponse = app.client().get("/file/avatars/big.png/exist").await.json();
    assert!(!exists.file_exist);
}

#[tokio::test]
async fn test_disallowed_content_type_rejected() {
    let app = setup_test_app_with(UploadPolicy {
        allowed_content_types: vec!["image/png".to_string()],
        ..UploadPolicy::default()
    })
    .await;

    let response = app
        .client()
        .post("/file/notes")
        .add_query_param("filename", "note.txt")
        .bytes(b"just some text".to_vec().into())
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: ErrorResponse = response.json();
    assert_eq!(body.code, "UNSUPPORTED_FILE_TYPE");
}

#[tokio::test]
async fn test_range_download() {
    let app = setup_test_app().await;
    let content = png_bytes(100);
    app.client()
        .post("/file/avatars")
        .add_query_param("filename", "r.png")
        .bytes(content.clone().into())
        .await
        .assert_status_ok();

    let response = app
        .client()
        .get("/file/avatars/r.png")
        .add_header("Range", "bytes=10-19")
        .await;
    response.assert_status(StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.header("content-range"), "bytes 10-19/100");
    assert_eq!(response.header("content-length"), "10");
    assert_eq!(response.as_bytes().as_ref(), &content[10..20]);

    let response = app
        .client()
        .get("/file/avatars/r.png")
        .add_header("Range", "bytes=90-")
        .await;
    response.assert_status(StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.header("content-range"), "bytes 90-99/100");
    assert_eq!(response.as_bytes().as_ref(), &content[90..]);
}

#[tokio::test]
async fn test_range_clamped_to_max_span() {
    let app = setup_test_app_with(UploadPolicy {
        max_range_bytes: 16,
        ..UploadPolicy::default()
    })
    .await;
    app.client()
        .post("/file/avatars")
        .add_query_param("filename", "c.png")
        .bytes(png_bytes(200).into())
        .await
        .assert_status_ok();

    let response = app
        .client()
        .get("/file/avatars/c.png")
        .add_header("Range", "bytes=0-")
        .await;
    response.assert_status(StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.header("content-range"), "bytes 0-15/200");
    assert_eq!(response.as_bytes().len(), 16);
}

#[tokio::test]
async fn test_invalid_ranges_rejected() {
    let app = setup_test_app().await;
    app.client()
        .post("/file/avatars")
        .add_query_param("filename", "s.png")
        .bytes(png_bytes(50).into())
        .await
        .assert_status_ok();

    for range in ["bytes=500-", "bytes=-10", "bytes=0-1,4-5", "items=0-1", "bytes=9-3"] {
        let response = app
            .client()
            .get("/file/avatars/s.png")
            .add_header("Range", range)
            .await;
        response.assert_status(StatusCode::RANGE_NOT_SATISFIABLE);
        let body: ErrorResponse = response.json();
        assert_eq!(body.code, "INVALID_RANGE", "range {}", range);
    }
}

#[tokio::test]
async fn test_pretty_name_sets_content_disposition() {
    let app = setup_test_app().await;
    app.client()
        .post("/file/docs")
        .add_query_param("filename", "scan.png")
        .add_query_param("pretty_name", "My Scan.png")
        .bytes(png_bytes(40).into())
        .await
        .assert_status_ok();

    let response = app.client().get("/file/docs/scan.png").await;
    response.assert_status_ok();
    assert_eq!(
        response.header("content-disposition"),
        "inline; filename*=UTF-8''My%20Scan.png"
    );
}

#[tokio::test]
async fn test_missing_file_returns_not_found() {
    let app = setup_test_app().await;

    let response = app.client().get("/file/avatars/ghost.png").await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: ErrorResponse = response.json();
    assert_eq!(body.code, "FILE_NOT_FOUND");
    assert_eq!(body.numeric_code, Some(600));

    let exists: FileExistResponse = app.client().get("/file/avatars/ghost.png/exist").await.json();
    assert!(!exists.file_exist);
}

#[tokio::test]
async fn test_delete_then_delete_again() {
    let app = setup_test_app().await;
    app.client()
        .post("/file/avatars")
        .add_query_param("filename", "d.png")
        .bytes(png_bytes(32).into())
        .await
        .assert_status_ok();

    app.client()
        .delete("/file/avatars/d.png")
        .await
        .assert_status_ok();
    app.client()
        .delete("/file/avatars/d.png")
        .await
        .assert_status(StatusCode::NOT_FOUND);
    app.client()
        .get("/file/avatars/d.png")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_key_rejected() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post("/file/avatars")
        .add_query_param("filename", ".hidden")
        .bytes(png_bytes(32).into())
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: ErrorResponse = response.json();
    assert_eq!(body.code, "INVALID_INPUT");
}

#[tokio::test]
async fn test_health_reports_unreachable_database() {
    let app = setup_test_app().await;

    let response = app.client().get("/health").await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["storage_backend"], "local");
}
