use bytes::Bytes;
use chrono::Utc;
use diesel::dsl::exists;
use diesel::pg::Pg;
use diesel::prelude::*;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{VaultError, VaultResult};
use crate::models::{FileRecord, NewFileRecord};
use crate::schema::files;
use crate::state::AppState;
use crate::storage::BlobReader;
use crate::utils::filename::{
    base_name, escape_like, extension_of, storage_name, validate_flat_filename,
};

pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "image/png",
    "image/jpeg",
    "image/jpg",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/msword",
];

pub const FILE_NOT_FOUND: &str = "File not found";
pub const BLOB_NOT_FOUND: &str = "File not found on disk";
const MAX_NAME_LEN: usize = 255;

pub fn is_allowed_mime_type(mime_type: &str) -> bool {
    ALLOWED_MIME_TYPES
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(mime_type.trim()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileSort {
    #[default]
    UploadDate,
    OriginalName,
    FileSize,
    DownloadCount,
    ViewCount,
    LastModified,
    Filename,
}

impl FileSort {
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") | Some("uploadDate") => FileSort::UploadDate,
            Some("originalName") => FileSort::OriginalName,
            Some("fileSize") => FileSort::FileSize,
            Some("downloadCount") => FileSort::DownloadCount,
            Some("viewCount") => FileSort::ViewCount,
            Some("lastModified") => FileSort::LastModified,
            Some("filename") => FileSort::Filename,
            Some(other) => {
                debug!(sort = other, "unknown file sort key, using uploadDate");
                FileSort::UploadDate
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FileSort::UploadDate => "uploadDate",
            FileSort::OriginalName => "originalName",
            FileSort::FileSize => "fileSize",
            FileSort::DownloadCount => "downloadCount",
            FileSort::ViewCount => "viewCount",
            FileSort::LastModified => "lastModified",
            FileSort::Filename => "filename",
        }
    }
}

pub struct UploadInput {
    pub bytes: Bytes,
    pub original_name: String,
    pub mime_type: Option<String>,
}

/// Lists every file record, newest first on the chosen key.
pub fn list_files(
    state: &AppState,
    search: Option<&str>,
    sort: FileSort,
) -> VaultResult<Vec<FileRecord>> {
    let mut conn = state.db()?;
    let mut query = files::table.into_boxed::<Pg>();

    if let Some(term) = search.map(str::trim).filter(|term| !term.is_empty()) {
        let pattern = format!("%{}%", escape_like(term));
        query = query.filter(
            files::original_name
                .ilike(pattern.clone())
                .or(files::filename.ilike(pattern)),
        );
    }

    query = match sort {
        FileSort::UploadDate => query.order(files::upload_date.desc()),
        FileSort::OriginalName => query.order(files::original_name.desc()),
        FileSort::FileSize => query.order(files::file_size.desc()),
        FileSort::DownloadCount => query.order(files::download_count.desc()),
        FileSort::ViewCount => query.order(files::view_count.desc()),
        FileSort::LastModified => query.order(files::last_modified.desc()),
        FileSort::Filename => query.order(files::filename.desc()),
    };

    Ok(query.load::<FileRecord>(&mut conn)?)
}

/// Stores the bytes, then the record. The blob is removed again if the insert fails.
pub async fn upload_file(state: &AppState, input: UploadInput) -> VaultResult<FileRecord> {
    let UploadInput {
        bytes,
        original_name,
        mime_type,
    } = input;

    let mime_type = mime_type
        .map(|value| value.trim().to_ascii_lowercase())
        .filter(|value| is_allowed_mime_type(value))
        .ok_or_else(|| {
            VaultError::Validation(
                "Invalid file type. Only PDF, PNG, JPG, DOC and DOCX files are allowed.".into(),
            )
        })?;

    let limit = state.config.max_upload_bytes;
    if bytes.len() > limit {
        return Err(VaultError::Validation(format!(
            "File too large. Maximum size is {} bytes.",
            limit
        )));
    }

    let original_name = validate_flat_filename(base_name(&original_name))
        .map_err(|err| VaultError::Validation(err.message().into()))?
        .to_string();
    if original_name.len() > MAX_NAME_LEN {
        return Err(VaultError::Validation("File name is too long".into()));
    }

    let filename = storage_name(&original_name);
    let file_size = bytes.len() as i64;

    state
        .storage
        .put_object(&filename, bytes)
        .await
        .map_err(|err| {
            error!(error = %err, filename = %filename, "failed to store uploaded file");
            VaultError::Internal(format!("failed to store file: {err}"))
        })?;

    let new_file = NewFileRecord {
        id: Uuid::new_v4(),
        file_path: state.storage.locate(&filename),
        filename: filename.clone(),
        original_name,
        file_size,
        mime_type,
    };

    let inserted = state.db().and_then(|mut conn| {
        diesel::insert_into(files::table)
            .values(&new_file)
            .get_result::<FileRecord>(&mut conn)
            .map_err(VaultError::from)
    });

    match inserted {
        Ok(record) => {
            info!(
                file_id = %record.id,
                filename = %record.filename,
                size = record.file_size,
                "file uploaded"
            );
            Ok(record)
        }
        Err(err) => {
            warn!(error = %err, filename = %filename, "file record insert failed, removing blob");
            if let Err(cleanup) = state.storage.delete_object(&filename).await {
                error!(error = %cleanup, filename = %filename, "failed to remove orphaned blob");
            }
            Err(err)
        }
    }
}

/// Fetches a file record and counts the view.
pub fn get_file(state: &AppState, file_id: Uuid) -> VaultResult<FileRecord> {
    let mut conn = state.db()?;
    diesel::update(files::table.find(file_id))
        .set(files::view_count.eq(files::view_count + 1i64))
        .get_result::<FileRecord>(&mut conn)
        .optional()?
        .ok_or_else(|| VaultError::NotFound(FILE_NOT_FOUND.into()))
}

/// Renames the blob to a fresh storage name and updates the record to match.
pub async fn rename_file(state: &AppState, file_id: Uuid, new_name: &str) -> VaultResult<FileRecord> {
    if new_name.trim().is_empty() {
        return Err(VaultError::MissingInput("New name is required".into()));
    }
    let new_name = validate_flat_filename(new_name)
        .map_err(|err| VaultError::Validation(err.message().into()))?;

    let file = {
        let mut conn = state.db()?;
        let file = files::table
            .find(file_id)
            .first::<FileRecord>(&mut conn)
            .optional()?
            .ok_or_else(|| VaultError::NotFound(FILE_NOT_FOUND.into()))?;

        let pattern = format!("{}.%", escape_like(new_name));
        let duplicate: bool = diesel::select(exists(
            files::table.filter(files::id.ne(file_id)).filter(
                files::filename
                    .like(pattern.clone())
                    .or(files::original_name.like(pattern)),
            ),
        ))
        .get_result(&mut conn)?;

        if duplicate {
            return Err(VaultError::Conflict(
                "A file with this name already exists".into(),
            ));
        }
        file
    };

    let new_original_name = format!("{new_name}{}", extension_of(&file.original_name));
    if new_original_name.len() > MAX_NAME_LEN {
        return Err(VaultError::Validation("File name is too long".into()));
    }
    let new_filename = storage_name(&new_original_name);

    let moved = state
        .storage
        .rename_object(&file.filename, &new_filename)
        .await?;
    if !moved {
        warn!(file_id = %file_id, filename = %file.filename, "rename target missing on disk");
        return Err(VaultError::NotFound(BLOB_NOT_FOUND.into()));
    }

    let updated = state.db().and_then(|mut conn| {
        diesel::update(files::table.find(file_id))
            .set((
                files::filename.eq(&new_filename),
                files::original_name.eq(&new_original_name),
                files::file_path.eq(state.storage.locate(&new_filename)),
                files::last_modified.eq(Utc::now()),
            ))
            .get_result::<FileRecord>(&mut conn)
            .map_err(VaultError::from)
    });

    match updated {
        Ok(record) => {
            info!(
                file_id = %record.id,
                from = %file.original_name,
                to = %record.original_name,
                "file renamed"
            );
            Ok(record)
        }
        Err(err) => {
            warn!(error = %err, file_id = %file_id, "file record update failed, restoring blob name");
            if let Err(cleanup) = state
                .storage
                .rename_object(&new_filename, &file.filename)
                .await
            {
                error!(error = %cleanup, filename = %new_filename, "failed to restore blob name");
            }
            Err(err)
        }
    }
}

/// Removes the blob (already-missing is fine), then the record.
pub async fn delete_file(state: &AppState, file_id: Uuid) -> VaultResult<FileRecord> {
    let file = {
        let mut conn = state.db()?;
        files::table
            .find(file_id)
            .first::<FileRecord>(&mut conn)
            .optional()?
            .ok_or_else(|| VaultError::NotFound(FILE_NOT_FOUND.into()))?
    };

    let removed = state.storage.delete_object(&file.filename).await?;
    if !removed {
        debug!(file_id = %file_id, filename = %file.filename, "blob already absent");
    }

    let mut conn = state.db()?;
    let deleted = diesel::delete(files::table.find(file_id)).execute(&mut conn)?;
    if deleted == 0 {
        return Err(VaultError::NotFound(FILE_NOT_FOUND.into()));
    }

    info!(file_id = %file_id, filename = %file.filename, "file deleted");
    Ok(file)
}

/// Opens the blob and counts the download. The returned record carries the new count.
pub async fn download_file(
    state: &AppState,
    file_id: Uuid,
) -> VaultResult<(FileRecord, BlobReader)> {
    let file = {
        let mut conn = state.db()?;
        files::table
            .find(file_id)
            .first::<FileRecord>(&mut conn)
            .optional()?
            .ok_or_else(|| VaultError::NotFound(FILE_NOT_FOUND.into()))?
    };

    let reader = match state.storage.open_object(&file.filename).await? {
        Some(reader) => reader,
        None => {
            warn!(file_id = %file_id, filename = %file.filename, "file record has no blob");
            return Err(VaultError::NotFound(BLOB_NOT_FOUND.into()));
        }
    };

    let mut conn = state.db()?;
    let record = diesel::update(files::table.find(file_id))
        .set(files::download_count.eq(files::download_count + 1i64))
        .get_result::<FileRecord>(&mut conn)
        .optional()?
        .ok_or_else(|| VaultError::NotFound(FILE_NOT_FOUND.into()))?;

    Ok((record, reader))
}
