//! Client side of the vault: a typed HTTP client, cached list views and the
//! note editor's debounced autosave.

pub mod api;
pub mod autosave;
pub mod browser;
pub mod html;
pub mod view;

pub use api::{ClientError, ClientResult, NoteUpdate, VaultClient};
pub use autosave::{Autosaver, Draft, NoteSaver, SaveEvent};
pub use browser::{FileBrowser, NoteBrowser};
pub use view::{ListView, Searchable};
