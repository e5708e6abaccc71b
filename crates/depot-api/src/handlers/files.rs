use crate::error::HttpAppError;
use crate::handlers::range::{invalid_range, parse_range_header};
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, Response, StatusCode},
    response::IntoResponse,
    Json,
};
use depot_core::{AppError, UNKNOWN_SIZE};
use depot_services::UploadRequest;
use depot_storage::FetchedFile;
use futures::{StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::io::StreamReader;

#[derive(Debug, Default, Deserialize)]
pub struct UploadParams {
    pub filename: Option<String>,
    pub pretty_name: Option<String>,
    #[serde(default)]
    pub pending: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadFileResponse {
    pub filename: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FileExistResponse {
    pub file_exist: bool,
}

fn declared_size(headers: &HeaderMap) -> i64 {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<i64>().ok())
        .unwrap_or(UNKNOWN_SIZE)
}

#[tracing::instrument(
    skip(state, headers, body),
    fields(operation = "upload_file")
)]
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    Path(category): Path<String>,
    Query(params): Query<UploadParams>,
    headers: HeaderMap,
    body: Body,
) -> Result<impl IntoResponse, HttpAppError> {
    let stream = body.into_data_stream().map_err(std::io::Error::other);
    let reader = StreamReader::new(stream);

    let request = UploadRequest {
        category,
        filename: params.filename,
        pretty_name: params.pretty_name.unwrap_or_default(),
        pending: params.pending,
        declared_size: declared_size(&headers),
    };

    let filename = state.files.upload(request, Box::pin(reader)).await?;

    Ok(Json(UploadFileResponse { filename }))
}

#[tracing::instrument(skip(state, headers), fields(operation = "download_file"))]
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    Path((category, filename)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response<Body>, HttpAppError> {
    let range = match headers.get(header::RANGE) {
        Some(value) => {
            let value = value
                .to_str()
                .map_err(|_| invalid_range("header is not valid ASCII"))?;
            Some(parse_range_header(value)?)
        }
        None => None,
    };

    let file = state.files.get(&category, &filename, range).await?;
    let content_length = file.content_length();
    let FetchedFile {
        metadata,
        range,
        content,
    } = file;

    let body_stream = content.map(|result| {
        result.map_err(|e| std::io::Error::other(format!("Storage stream error: {}", e)))
    });

    let mut builder = Response::builder()
        .header(header::CONTENT_TYPE, metadata.content_type.as_str())
        .header(header::CONTENT_LENGTH, content_length)
        .header(header::ACCEPT_RANGES, "bytes");

    if !metadata.pretty_name.is_empty() {
        builder = builder.header(
            header::CONTENT_DISPOSITION,
            format!(
                "inline; filename*=UTF-8''{}",
                urlencoding::encode(&metadata.pretty_name)
            ),
        );
    }

    builder = match range {
        Some((start, end)) => builder.status(StatusCode::PARTIAL_CONTENT).header(
            header::CONTENT_RANGE,
            format!("bytes {}-{}/{}", start, end, metadata.size),
        ),
        None => builder.status(StatusCode::OK),
    };

    let response = builder
        .body(Body::from_stream(body_stream))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))?;

    Ok(response)
}

pub async fn file_exists(
    State(state): State<Arc<AppState>>,
    Path((category, filename)): Path<(String, String)>,
) -> Result<impl IntoResponse, HttpAppError> {
    let file_exist = state.files.exists(&category, &filename).await?;
    Ok(Json(FileExistResponse { file_exist }))
}

#[tracing::instrument(skip(state), fields(operation = "delete_file"))]
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Path((category, filename)): Path<(String, String)>,
) -> Result<impl IntoResponse, HttpAppError> {
    state.files.delete(&category, &filename).await?;
    Ok(StatusCode::OK)
}

#[tracing::instrument(skip(state), fields(operation = "commit_file"))]
pub async fn commit_file(
    State(state): State<Arc<AppState>>,
    Path((category, filename)): Path<(String, String)>,
) -> Result<impl IntoResponse, HttpAppError> {
    state.files.commit(&category, &filename).await?;
    Ok(StatusCode::OK)
}

#[tracing::instrument(skip(state), fields(operation = "rollback_file"))]
pub async fn rollback_file(
    State(state): State<Arc<AppState>>,
    Path((category, filename)): Path<(String, String)>,
) -> Result<impl IntoResponse, HttpAppError> {
    state.files.rollback(&category, &filename).await?;
    Ok(StatusCode::OK)
}
