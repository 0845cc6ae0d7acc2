use std::path::{Path, PathBuf};

use tracing::{error, info};
use uuid::Uuid;

use crate::client::api::{ClientResult, VaultClient};
use crate::client::view::ListView;
use crate::config::DEFAULT_MAX_UPLOAD_BYTES;
use crate::models::{FileRecord, Note};
use crate::services::files::{is_allowed_mime_type, FileSort};
use crate::services::notes::NoteSort;
use crate::utils::filename::base_name;

/// Files screen state: the cached list plus the calls that change it.
///
/// Every mutation is followed by a full refetch so the cache mirrors the server.
pub struct FileBrowser {
    client: VaultClient,
    view: ListView<FileRecord, FileSort>,
}

impl FileBrowser {
    pub fn new(client: VaultClient) -> Self {
        Self {
            client,
            view: ListView::new(FileSort::default()),
        }
    }

    pub fn client(&self) -> &VaultClient {
        &self.client
    }

    pub fn view(&self) -> &ListView<FileRecord, FileSort> {
        &self.view
    }

    pub fn visible(&self) -> Vec<&FileRecord> {
        self.view.visible()
    }

    pub fn set_search(&mut self, term: impl Into<String>) {
        self.view.set_search(term);
    }

    pub async fn refresh(&mut self) -> ClientResult<()> {
        match self.client.list_files("", self.view.sort()).await {
            Ok(files) => {
                self.view.replace(files);
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "failed to fetch files");
                Err(err)
            }
        }
    }

    /// Returns whether the list was refetched for the new key.
    pub async fn set_sort(&mut self, sort: FileSort) -> ClientResult<bool> {
        if !self.view.set_sort(sort) {
            return Ok(false);
        }
        self.refresh().await?;
        Ok(true)
    }

    /// Uploads each path in turn, skipping files the server would refuse.
    /// Returns the records that were created.
    pub async fn upload_paths(&mut self, paths: &[impl AsRef<Path>]) -> ClientResult<Vec<FileRecord>> {
        let mut uploaded = Vec::new();
        for path in paths {
            let path = path.as_ref();
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            if !is_allowed_mime_type(mime.essence_str()) {
                info!(path = %path.display(), mime = %mime, "skipping unsupported file type");
                continue;
            }

            let bytes = match tokio::fs::read(path).await {
                Ok(bytes) => bytes,
                Err(err) => {
                    error!(path = %path.display(), error = %err, "failed to read file");
                    continue;
                }
            };
            if bytes.len() > DEFAULT_MAX_UPLOAD_BYTES {
                info!(path = %path.display(), size = bytes.len(), "skipping oversized file");
                continue;
            }

            let name = base_name(&path.to_string_lossy()).to_string();
            let record = self
                .client
                .upload_file(&name, mime.essence_str(), bytes)
                .await?;
            uploaded.push(record);
        }
        self.refresh().await?;
        Ok(uploaded)
    }

    pub async fn rename(&mut self, file_id: Uuid, new_name: &str) -> ClientResult<FileRecord> {
        let record = self.client.rename_file(file_id, new_name.trim()).await?;
        self.refresh().await?;
        Ok(record)
    }

    pub async fn delete(&mut self, file_id: Uuid) -> ClientResult<String> {
        let message = self.client.delete_file(file_id).await?;
        self.refresh().await?;
        Ok(message)
    }

    /// Saves a download to disk. `target` defaults to the original name in the current directory.
    pub async fn download_to(
        &mut self,
        file_id: Uuid,
        target: Option<&Path>,
    ) -> ClientResult<(PathBuf, u64)> {
        if self.view.items().is_empty() {
            self.refresh().await?;
        }
        let path = match target {
            Some(path) => path.to_path_buf(),
            None => {
                let name = self
                    .view
                    .items()
                    .iter()
                    .find(|file| file.id == file_id)
                    .map(|file| file.original_name.clone())
                    .unwrap_or_else(|| file_id.to_string());
                PathBuf::from(name)
            }
        };
        let written = self.client.download_file_to(file_id, &path).await?;
        self.refresh().await?;
        Ok((path, written))
    }
}

/// Notes screen state.
pub struct NoteBrowser {
    client: VaultClient,
    view: ListView<Note, NoteSort>,
}

impl NoteBrowser {
    pub fn new(client: VaultClient) -> Self {
        Self {
            client,
            view: ListView::new(NoteSort::default()),
        }
    }

    pub fn client(&self) -> &VaultClient {
        &self.client
    }

    pub fn view(&self) -> &ListView<Note, NoteSort> {
        &self.view
    }

    pub fn visible(&self) -> Vec<&Note> {
        self.view.visible()
    }

    pub fn set_search(&mut self, term: impl Into<String>) {
        self.view.set_search(term);
    }

    pub async fn refresh(&mut self) -> ClientResult<()> {
        match self.client.list_notes("", self.view.sort()).await {
            Ok(notes) => {
                self.view.replace(notes);
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "failed to fetch notes");
                Err(err)
            }
        }
    }

    /// Returns whether the list was refetched for the new key.
    pub async fn set_sort(&mut self, sort: NoteSort) -> ClientResult<bool> {
        if !self.view.set_sort(sort) {
            return Ok(false);
        }
        self.refresh().await?;
        Ok(true)
    }

    pub async fn create(&mut self, title: Option<&str>, content: Option<&str>) -> ClientResult<Note> {
        let note = self.client.create_note(title, content).await?;
        self.refresh().await?;
        Ok(note)
    }

    pub async fn delete(&mut self, note_id: Uuid) -> ClientResult<String> {
        let message = self.client.delete_note(note_id).await?;
        self.refresh().await?;
        Ok(message)
    }

    pub async fn restore(&mut self, note_id: Uuid) -> ClientResult<Note> {
        let note = self.client.restore_note(note_id).await?;
        self.refresh().await?;
        Ok(note)
    }

    /// Creates `"<title> (Copy)"` with the same content.
    pub async fn duplicate(&mut self, note_id: Uuid) -> ClientResult<Note> {
        let cached = self.view.items().iter().find(|note| note.id == note_id).cloned();
        let source = match cached {
            Some(note) => note,
            None => self.client.get_note(note_id).await?,
        };
        let title = format!("{} (Copy)", source.title);
        self.create(Some(&title), Some(&source.content)).await
    }
}

/// File name used when exporting a note as standalone HTML.
pub fn export_file_name(note: &Note) -> String {
    let title: String = note
        .title
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | '\0' => '_',
            ch if ch.is_control() => '_',
            _ => ch,
        })
        .collect();
    format!("{}.html", title.trim())
}
