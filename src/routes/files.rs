use axum::body::Body;
use axum::extract::{Json, Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::FileRecord;
use crate::services::files::{self as file_service, FileSort, UploadInput};
use crate::services::VaultError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct FileListQuery {
    pub search: Option<String>,
    pub sort: Option<String>,
}

#[derive(Deserialize)]
pub struct RenameFileRequest {
    #[serde(rename = "newName", default)]
    pub new_name: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

fn attachment_content_disposition(filename: &str) -> String {
    let sanitized: String = filename
        .chars()
        .map(|ch| match ch {
            '"' | '\\' => '_',
            ch if ch.is_control() => '_',
            _ => ch,
        })
        .collect();

    let encoded =
        percent_encoding::utf8_percent_encode(&sanitized, percent_encoding::NON_ALPHANUMERIC);
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        sanitized, encoded
    )
}

pub async fn list_files(
    State(state): State<AppState>,
    Query(params): Query<FileListQuery>,
) -> AppResult<Json<Vec<FileRecord>>> {
    let sort = FileSort::parse(params.sort.as_deref());
    let files = file_service::list_files(&state, params.search.as_deref(), sort)?;
    Ok(Json(files))
}

pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<FileRecord>)> {
    let mut input: Option<UploadInput> = None;

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        error!(error = %err, "invalid multipart data");
        AppError::new(err.status(), format!("invalid multipart data: {}", err.body_text()))
    })? {
        if field.name() != Some("file") {
            continue;
        }
        let Some(original_name) = field.file_name().map(|name| name.to_string()) else {
            continue;
        };
        let mime_type = field.content_type().map(|mime| mime.to_string());
        let bytes = field.bytes().await.map_err(|err| {
            error!(error = %err, "failed to read file bytes");
            AppError::new(err.status(), format!("failed to read file: {}", err.body_text()))
        })?;
        input = Some(UploadInput {
            bytes,
            original_name,
            mime_type,
        });
    }

    let input = input.ok_or_else(|| VaultError::MissingInput("No file uploaded".into()))?;
    let record = file_service::upload_file(&state, input).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn get_file(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
) -> AppResult<Json<FileRecord>> {
    Ok(Json(file_service::get_file(&state, file_id)?))
}

pub async fn rename_file(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
    Json(payload): Json<RenameFileRequest>,
) -> AppResult<Json<FileRecord>> {
    let new_name = payload.new_name.unwrap_or_default();
    let record = file_service::rename_file(&state, file_id, &new_name).await?;
    Ok(Json(record))
}

pub async fn delete_file(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    file_service::delete_file(&state, file_id).await?;
    Ok(Json(MessageResponse {
        message: "File deleted successfully".to_string(),
    }))
}

pub async fn download_file(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let (record, reader) = file_service::download_file(&state, file_id).await?;
    info!(
        file_id = %record.id,
        download_count = record.download_count,
        "streaming file download"
    );

    let headers = [
        (header::CONTENT_TYPE, record.mime_type.clone()),
        (header::CONTENT_LENGTH, record.file_size.to_string()),
        (
            header::CONTENT_DISPOSITION,
            attachment_content_disposition(&record.original_name),
        ),
    ];
    let body = Body::from_stream(ReaderStream::new(reader));

    Ok((headers, body))
}
