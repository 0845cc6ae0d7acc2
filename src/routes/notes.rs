use axum::body::Bytes;
use axum::extract::{Json, Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use super::files::MessageResponse;
use crate::error::{AppError, AppResult};
use crate::models::Note;
use crate::services::notes::{self as note_service, NoteChanges, NoteSort};
use crate::state::AppState;
use crate::utils::json::classify_optional_string;

#[derive(Deserialize)]
pub struct NoteListQuery {
    pub search: Option<String>,
    pub sort: Option<String>,
}

pub async fn list_notes(
    State(state): State<AppState>,
    Query(params): Query<NoteListQuery>,
) -> AppResult<Json<Vec<Note>>> {
    let sort = NoteSort::parse(params.sort.as_deref());
    let notes = note_service::list_notes(&state, params.search.as_deref(), sort)?;
    Ok(Json(notes))
}

/// An empty body creates a note with default title and content.
pub async fn create_note(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<(StatusCode, Json<Note>)> {
    let body: Value = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Object(Default::default())
    } else {
        serde_json::from_slice(&body)
            .map_err(|err| AppError::bad_request(format!("invalid JSON body: {err}")))?
    };
    let title = classify_optional_string(&body, "title").map_err(AppError::bad_request)?;
    let content = classify_optional_string(&body, "content").map_err(AppError::bad_request)?;

    let note = note_service::create_note(
        &state,
        title.into_option().as_deref(),
        content.into_option().as_deref(),
    )?;
    Ok((StatusCode::CREATED, Json(note)))
}

pub async fn get_note(
    State(state): State<AppState>,
    Path(note_id): Path<Uuid>,
) -> AppResult<Json<Note>> {
    Ok(Json(note_service::get_note(&state, note_id)?))
}

pub async fn update_note(
    State(state): State<AppState>,
    Path(note_id): Path<Uuid>,
    Json(body): Json<Value>,
) -> AppResult<Json<Note>> {
    let title = classify_optional_string(&body, "title").map_err(AppError::bad_request)?;
    let content = classify_optional_string(&body, "content").map_err(AppError::bad_request)?;

    let changes = NoteChanges {
        title: title.into_option(),
        content: content.into_option(),
    };
    Ok(Json(note_service::update_note(&state, note_id, changes)?))
}

pub async fn delete_note(
    State(state): State<AppState>,
    Path(note_id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    note_service::soft_delete_note(&state, note_id)?;
    Ok(Json(MessageResponse {
        message: "Note deleted successfully".to_string(),
    }))
}

pub async fn restore_note(
    State(state): State<AppState>,
    Path(note_id): Path<Uuid>,
) -> AppResult<Json<Note>> {
    Ok(Json(note_service::restore_note(&state, note_id)?))
}
