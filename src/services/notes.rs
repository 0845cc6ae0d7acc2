use chrono::{DateTime, Duration, Utc};
use diesel::pg::Pg;
use diesel::prelude::*;
use tracing::info;
use uuid::Uuid;

use super::{VaultError, VaultResult};
use crate::models::{NewNote, Note};
use crate::schema::notes;
use crate::state::AppState;
use crate::utils::filename::escape_like;

pub const DEFAULT_NOTE_TITLE: &str = "Untitled Note";
pub const NOTE_NOT_FOUND: &str = "Note not found";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoteSort {
    #[default]
    LastEdited,
    CreatedAt,
    UpdatedAt,
    Title,
    ViewCount,
}

impl NoteSort {
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") | Some("lastEdited") => NoteSort::LastEdited,
            Some("createdAt") => NoteSort::CreatedAt,
            Some("updatedAt") => NoteSort::UpdatedAt,
            Some("title") => NoteSort::Title,
            Some("viewCount") => NoteSort::ViewCount,
            Some(other) => {
                tracing::debug!(sort = other, "unknown note sort key, using lastEdited");
                NoteSort::LastEdited
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NoteSort::LastEdited => "lastEdited",
            NoteSort::CreatedAt => "createdAt",
            NoteSort::UpdatedAt => "updatedAt",
            NoteSort::Title => "title",
            NoteSort::ViewCount => "viewCount",
        }
    }
}

/// Fields of a partial update. `None` leaves the stored value alone.
#[derive(Debug, Default, Clone)]
pub struct NoteChanges {
    pub title: Option<String>,
    pub content: Option<String>,
}

#[derive(AsChangeset)]
#[diesel(table_name = notes)]
struct NoteChangeset {
    title: Option<String>,
    content: Option<String>,
    last_edited: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn normalize_title(title: Option<&str>) -> String {
    match title.map(str::trim) {
        Some(title) if !title.is_empty() => title.to_string(),
        _ => DEFAULT_NOTE_TITLE.to_string(),
    }
}

/// `now`, bumped past `previous` so successive edits never share a timestamp.
fn next_edit_time(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    let floor = previous + Duration::microseconds(1);
    if now > floor {
        now
    } else {
        floor
    }
}

pub fn list_notes(state: &AppState, search: Option<&str>, sort: NoteSort) -> VaultResult<Vec<Note>> {
    let mut conn = state.db()?;
    let mut query = notes::table
        .filter(notes::is_active.eq(true))
        .into_boxed::<Pg>();

    if let Some(term) = search.map(str::trim).filter(|term| !term.is_empty()) {
        let pattern = format!("%{}%", escape_like(term));
        query = query.filter(
            notes::title
                .ilike(pattern.clone())
                .or(notes::content.ilike(pattern)),
        );
    }

    query = match sort {
        NoteSort::LastEdited => query.order(notes::last_edited.desc()),
        NoteSort::CreatedAt => query.order(notes::created_at.desc()),
        NoteSort::UpdatedAt => query.order(notes::updated_at.desc()),
        NoteSort::Title => query.order(notes::title.desc()),
        NoteSort::ViewCount => query.order(notes::view_count.desc()),
    };

    Ok(query.load::<Note>(&mut conn)?)
}

pub fn create_note(
    state: &AppState,
    title: Option<&str>,
    content: Option<&str>,
) -> VaultResult<Note> {
    let mut conn = state.db()?;
    let new_note = NewNote {
        id: Uuid::new_v4(),
        title: normalize_title(title),
        content: content.unwrap_or_default().to_string(),
    };

    let note = diesel::insert_into(notes::table)
        .values(&new_note)
        .get_result::<Note>(&mut conn)?;

    info!(note_id = %note.id, title = %note.title, "note created");
    Ok(note)
}

/// Fetches an active note and counts the view.
pub fn get_note(state: &AppState, note_id: Uuid) -> VaultResult<Note> {
    let mut conn = state.db()?;
    diesel::update(
        notes::table
            .filter(notes::id.eq(note_id))
            .filter(notes::is_active.eq(true)),
    )
    .set(notes::view_count.eq(notes::view_count + 1i64))
    .get_result::<Note>(&mut conn)
    .optional()?
    .ok_or_else(|| VaultError::NotFound(NOTE_NOT_FOUND.into()))
}

pub fn update_note(state: &AppState, note_id: Uuid, changes: NoteChanges) -> VaultResult<Note> {
    let mut conn = state.db()?;
    let existing = notes::table
        .filter(notes::id.eq(note_id))
        .filter(notes::is_active.eq(true))
        .first::<Note>(&mut conn)
        .optional()?
        .ok_or_else(|| VaultError::NotFound(NOTE_NOT_FOUND.into()))?;

    let now = Utc::now();
    let changeset = NoteChangeset {
        title: changes.title.as_deref().map(|title| normalize_title(Some(title))),
        content: changes.content,
        last_edited: next_edit_time(existing.last_edited, now),
        updated_at: now,
    };

    let note = diesel::update(
        notes::table
            .filter(notes::id.eq(note_id))
            .filter(notes::is_active.eq(true)),
    )
    .set(&changeset)
    .get_result::<Note>(&mut conn)
    .optional()?
    .ok_or_else(|| VaultError::NotFound(NOTE_NOT_FOUND.into()))?;

    info!(note_id = %note.id, "note updated");
    Ok(note)
}

/// Marks the note inactive. Already-inactive notes are accepted.
pub fn soft_delete_note(state: &AppState, note_id: Uuid) -> VaultResult<()> {
    let mut conn = state.db()?;
    let updated = diesel::update(notes::table.find(note_id))
        .set((
            notes::is_active.eq(false),
            notes::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)?;

    if updated == 0 {
        return Err(VaultError::NotFound(NOTE_NOT_FOUND.into()));
    }

    info!(note_id = %note_id, "note moved to trash");
    Ok(())
}

pub fn restore_note(state: &AppState, note_id: Uuid) -> VaultResult<Note> {
    let mut conn = state.db()?;
    let note = diesel::update(notes::table.find(note_id))
        .set((
            notes::is_active.eq(true),
            notes::updated_at.eq(Utc::now()),
        ))
        .get_result::<Note>(&mut conn)
        .optional()?
        .ok_or_else(|| VaultError::NotFound(NOTE_NOT_FOUND.into()))?;

    info!(note_id = %note.id, "note restored");
    Ok(note)
}
