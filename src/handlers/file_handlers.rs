//! HTTP handlers for file operations.
//! Uploads and downloads are streamed so bodies are never buffered whole;
//! lifecycle rules live in `FileService`.

use crate::{
    errors::AppError,
    models::file_record::{DeletedFile, FileRecord, FileView},
    services::file_service::{Disposition, Upload},
    state::AppState,
};
use axum::{
    Json,
    body::Body,
    extract::{
        Multipart, Path, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::{HeaderMap, HeaderValue, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use futures::{StreamExt, TryStreamExt};
use serde_json::json;
use std::io;
use tokio_util::io::ReaderStream;

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// POST `/files`: multipart upload, field `file`.
pub async fn upload_file(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let mut multipart =
        multipart.map_err(|err| AppError::bad_request(format!("No file uploaded: {}", err)))?;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }

        let original_name = field
            .file_name()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .ok_or_else(|| AppError::bad_request("No file uploaded"))?;
        let mime_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| DEFAULT_MIME_TYPE.into());

        let stream = field.map(|chunk| chunk.map_err(multipart_io_error));
        let record = state
            .files
            .create(
                Upload {
                    original_name,
                    mime_type,
                },
                stream,
            )
            .await?;

        let body = Json(json!({
            "success": true,
            "message": "File uploaded successfully",
            "data": FileView::from(&record),
        }));
        return Ok((StatusCode::CREATED, body).into_response());
    }

    Err(AppError::bad_request("No file uploaded"))
}

/// GET `/files`: every record, newest first.
pub async fn list_files(State(state): State<AppState>) -> Result<Response, AppError> {
    let records = state.files.list().await?;
    let views: Vec<FileView> = records.iter().map(FileView::from).collect();

    Ok(Json(json!({
        "success": true,
        "message": "Files retrieved successfully",
        "count": views.len(),
        "data": views,
    }))
    .into_response())
}

/// GET `/files/{id}`: metadata only.
pub async fn get_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let record = state.files.get(parse_id(&id)?).await?;

    Ok(Json(json!({
        "success": true,
        "message": "File metadata retrieved successfully",
        "data": FileView::from(&record),
    }))
    .into_response())
}

/// GET `/files/{id}/view`: stream with `Content-Disposition: inline`.
pub async fn view_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    stream_file(&state, parse_id(&id)?, Disposition::Inline).await
}

/// GET `/files/{id}/download`: stream with `Content-Disposition: attachment`.
pub async fn download_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    stream_file(&state, parse_id(&id)?, Disposition::Attachment).await
}

/// DELETE `/files/{id}`
pub async fn delete_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let record = state.files.delete(parse_id(&id)?).await?;

    Ok(Json(json!({
        "success": true,
        "message": "File deleted successfully",
        "data": DeletedFile::from(record),
    }))
    .into_response())
}

/// Fallback for unknown routes.
pub async fn route_not_found(uri: Uri) -> AppError {
    AppError::not_found(format!("Route {} not found", uri.path()))
}

/// Open the blob and hand it to the body as a stream.
///
/// Errors before this returns still become an error envelope. Once the body
/// is streaming the headers are committed, so a read error is logged and the
/// body ends early.
async fn stream_file(
    state: &AppState,
    id: i64,
    disposition: Disposition,
) -> Result<Response, AppError> {
    let (record, file) = state.files.open_content(id).await?;

    let stream = ReaderStream::new(file)
        .inspect_err(move |err| tracing::error!("file stream error for file {}: {}", id, err));

    let mut response = Response::new(Body::from_stream(stream));
    *response.status_mut() = StatusCode::OK;
    set_file_headers(response.headers_mut(), &record, disposition);
    Ok(response)
}

fn set_file_headers(headers: &mut HeaderMap, record: &FileRecord, disposition: Disposition) {
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&record.mime_type)
            .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_MIME_TYPE)),
    );

    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from(record.size_bytes.max(0) as u64),
    );

    let value = content_disposition(disposition, &record.original_name);
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&value)
            .unwrap_or_else(|_| HeaderValue::from_static(disposition.as_str())),
    );
}

/// Build a `Content-Disposition` value. Non-ASCII names get an RFC 5987
/// `filename*` alongside a sanitized ASCII `filename`.
fn content_disposition(disposition: Disposition, original_name: &str) -> String {
    let fallback: String = original_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c == ' ' || c.is_ascii_graphic() => c,
            _ => '_',
        })
        .collect();

    if original_name.is_ascii() {
        format!("{}; filename=\"{}\"", disposition.as_str(), fallback)
    } else {
        format!(
            "{}; filename=\"{}\"; filename*=UTF-8''{}",
            disposition.as_str(),
            fallback,
            urlencoding::encode(original_name)
        )
    }
}

/// Identifiers are positive integers; anything else cannot name a file.
fn parse_id(raw: &str) -> Result<i64, AppError> {
    raw.parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::not_found("Resource not found"))
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::new(StatusCode::PAYLOAD_TOO_LARGE, "File too large")
    } else {
        AppError::bad_request(format!("Invalid multipart body: {}", err.body_text()))
    }
}

/// Body-limit failures keep their identity so the writer reports them as a
/// size policy violation.
fn multipart_io_error(err: MultipartError) -> io::Error {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        io::Error::new(io::ErrorKind::FileTooLarge, err.body_text())
    } else {
        io::Error::other(err.body_text())
    }
}
