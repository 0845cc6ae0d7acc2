use std::env;
use std::path::Path;

use futures_util::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::Response;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use url::Url;
use uuid::Uuid;

use crate::models::{FileRecord, Note};
use crate::services::files::FileSort;
use crate::services::notes::NoteSort;

pub const DEFAULT_API_URL: &str = "http://localhost:4000/api";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid API url {0}")]
    InvalidUrl(String),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{message} (HTTP {status})")]
    Api { status: u16, message: String },
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Body of `PUT /notes/:id`. Fields left as `None` are not sent and stay unchanged.
#[derive(Debug, Default, Clone, Serialize)]
pub struct NoteUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Serialize)]
struct CreateNoteBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a str>,
}

#[derive(Serialize)]
struct RenameBody<'a> {
    #[serde(rename = "newName")]
    new_name: &'a str,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Deserialize)]
struct MessageBody {
    message: String,
}

#[derive(Clone)]
pub struct VaultClient {
    http: reqwest::Client,
    base_url: String,
}

impl VaultClient {
    pub fn new(base_url: &str) -> ClientResult<Self> {
        Url::parse(base_url).map_err(|_| ClientError::InvalidUrl(base_url.to_string()))?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Uses `VAULT_API_URL`, falling back to the local development server.
    pub fn from_env() -> ClientResult<Self> {
        let base_url = env::var("VAULT_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        Self::new(&base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn health(&self) -> ClientResult<Value> {
        let response = self.http.get(self.endpoint("health")).send().await?;
        decode(response).await
    }

    pub async fn list_files(&self, search: &str, sort: FileSort) -> ClientResult<Vec<FileRecord>> {
        let response = self
            .http
            .get(self.endpoint("files"))
            .query(&[("search", search), ("sort", sort.as_str())])
            .send()
            .await?;
        decode(response).await
    }

    pub async fn upload_file(
        &self,
        file_name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> ClientResult<FileRecord> {
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime_type)?;
        let form = Form::new().part("file", part);
        let response = self
            .http
            .post(self.endpoint("files/upload"))
            .multipart(form)
            .send()
            .await?;
        decode(response).await
    }

    pub async fn get_file(&self, file_id: Uuid) -> ClientResult<FileRecord> {
        let response = self
            .http
            .get(self.endpoint(&format!("files/{file_id}")))
            .send()
            .await?;
        decode(response).await
    }

    pub async fn rename_file(&self, file_id: Uuid, new_name: &str) -> ClientResult<FileRecord> {
        let response = self
            .http
            .put(self.endpoint(&format!("files/rename/{file_id}")))
            .json(&RenameBody { new_name })
            .send()
            .await?;
        decode(response).await
    }

    pub async fn delete_file(&self, file_id: Uuid) -> ClientResult<String> {
        let response = self
            .http
            .delete(self.endpoint(&format!("files/{file_id}")))
            .send()
            .await?;
        let body: MessageBody = decode(response).await?;
        Ok(body.message)
    }

    /// Streams a download into `path` without buffering the whole file. Returns bytes written.
    pub async fn download_file_to(&self, file_id: Uuid, path: &Path) -> ClientResult<u64> {
        let response = self
            .http
            .get(self.endpoint(&format!("files/download/{file_id}")))
            .send()
            .await?;
        let response = check(response).await?;

        let mut out = tokio::fs::File::create(path).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            out.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        out.flush().await?;
        Ok(written)
    }

    pub async fn list_notes(&self, search: &str, sort: NoteSort) -> ClientResult<Vec<Note>> {
        let response = self
            .http
            .get(self.endpoint("notes"))
            .query(&[("search", search), ("sort", sort.as_str())])
            .send()
            .await?;
        decode(response).await
    }

    pub async fn create_note(
        &self,
        title: Option<&str>,
        content: Option<&str>,
    ) -> ClientResult<Note> {
        let response = self
            .http
            .post(self.endpoint("notes"))
            .json(&CreateNoteBody { title, content })
            .send()
            .await?;
        decode(response).await
    }

    pub async fn get_note(&self, note_id: Uuid) -> ClientResult<Note> {
        let response = self
            .http
            .get(self.endpoint(&format!("notes/{note_id}")))
            .send()
            .await?;
        decode(response).await
    }

    pub async fn update_note(&self, note_id: Uuid, update: &NoteUpdate) -> ClientResult<Note> {
        let response = self
            .http
            .put(self.endpoint(&format!("notes/{note_id}")))
            .json(update)
            .send()
            .await?;
        decode(response).await
    }

    pub async fn delete_note(&self, note_id: Uuid) -> ClientResult<String> {
        let response = self
            .http
            .delete(self.endpoint(&format!("notes/{note_id}")))
            .send()
            .await?;
        let body: MessageBody = decode(response).await?;
        Ok(body.message)
    }

    pub async fn restore_note(&self, note_id: Uuid) -> ClientResult<Note> {
        let response = self
            .http
            .put(self.endpoint(&format!("notes/{note_id}/restore")))
            .send()
            .await?;
        decode(response).await
    }
}

async fn check(response: Response) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let fallback = status
        .canonical_reason()
        .unwrap_or("request failed")
        .to_string();
    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => fallback,
    };
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
    let response = check(response).await?;
    Ok(response.json::<T>().await?)
}
