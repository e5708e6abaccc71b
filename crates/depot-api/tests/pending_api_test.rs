mod helpers;

use axum::http::StatusCode;
use depot_api::handlers::files::UploadFileResponse;
use helpers::{png_bytes, setup_test_app};

#[tokio::test]
async fn test_pending_upload_commit() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post("/file/avatars")
        .add_query_param("filename", "p.png")
        .add_query_param("pending", "true")
        .bytes(png_bytes(64).into())
        .await;
    response.assert_status_ok();
    assert!(app.ledger.contains("p.png", "avatars"));

    app.client()
        .post("/file/avatars/p.png/commit")
        .await
        .assert_status_ok();
    assert!(!app.ledger.contains("p.png", "avatars"));
    app.client()
        .get("/file/avatars/p.png")
        .await
        .assert_status_ok();

    // Committing again is a no-op
    app.client()
        .post("/file/avatars/p.png/commit")
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_pending_upload_rollback() {
    let app = setup_test_app().await;

    let body: UploadFileResponse = app
        .client()
        .post("/file/avatars")
        .add_query_param("pending", "true")
        .bytes(png_bytes(64).into())
        .await
        .json();
    assert!(app.ledger.contains(&body.filename, "avatars"));

    app.client()
        .post(&format!("/file/avatars/{}/rollback", body.filename))
        .await
        .assert_status_ok();
    assert!(app.ledger.is_empty());
    app.client()
        .get(&format!("/file/avatars/{}", body.filename))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rollback_keeps_row_when_ledger_fails() {
    let app = setup_test_app().await;
    app.client()
        .post("/file/avatars")
        .add_query_param("filename", "keep.png")
        .add_query_param("pending", "true")
        .bytes(png_bytes(64).into())
        .await
        .assert_status_ok();

    app.ledger.set_unavailable(true);
    app.client()
        .post("/file/avatars/keep.png/rollback")
        .await
        .assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    app.ledger.set_unavailable(false);

    assert!(app.ledger.contains("keep.png", "avatars"));
    app.client()
        .get("/file/avatars/keep.png")
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_non_pending_upload_skips_ledger() {
    let app = setup_test_app().await;
    app.client()
        .post("/file/avatars")
        .add_query_param("filename", "plain.png")
        .bytes(png_bytes(64).into())
        .await
        .assert_status_ok();
    assert!(app.ledger.is_empty());
}
