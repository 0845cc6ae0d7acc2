use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::client::api::{ClientResult, NoteUpdate, VaultClient};
use crate::models::Note;

pub const DEFAULT_AUTOSAVE_DELAY: Duration = Duration::from_secs(2);

/// Title and content as currently shown in the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub title: String,
    pub content: String,
}

#[derive(Debug)]
pub enum SaveEvent {
    Saved(Note),
    Failed(String),
}

#[async_trait]
pub trait NoteSaver: Send + Sync + 'static {
    async fn save(&self, note_id: Uuid, draft: &Draft) -> ClientResult<Note>;
}

#[async_trait]
impl NoteSaver for VaultClient {
    async fn save(&self, note_id: Uuid, draft: &Draft) -> ClientResult<Note> {
        let update = NoteUpdate {
            title: Some(draft.title.clone()),
            content: Some(draft.content.clone()),
        };
        self.update_note(note_id, &update).await
    }
}

struct SaveChannel<S> {
    saver: S,
    // Timer and explicit saves share this so one editor never overlaps requests.
    in_flight: Mutex<()>,
    events: mpsc::UnboundedSender<SaveEvent>,
}

impl<S: NoteSaver> SaveChannel<S> {
    async fn save(&self, note_id: Uuid, draft: &Draft) -> ClientResult<Note> {
        let _guard = self.in_flight.lock().await;
        let result = self.saver.save(note_id, draft).await;
        let event = match &result {
            Ok(note) => SaveEvent::Saved(note.clone()),
            Err(err) => {
                warn!(note_id = %note_id, error = %err, "note save failed");
                SaveEvent::Failed(err.to_string())
            }
        };
        let _ = self.events.send(event);
        result
    }
}

struct PendingSave {
    cancel: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Debounced saving for one editing session.
///
/// Every [`edit`](Autosaver::edit) cancels the pending timer and arms a new
/// one. [`flush`](Autosaver::flush) cancels the timer, waits for a save the
/// timer already started, then saves right away. A timer that has already
/// fired is never cancelled; its request runs to completion. Dropping the
/// session cancels a timer that has not fired.
pub struct Autosaver<S: NoteSaver> {
    note_id: Uuid,
    delay: Duration,
    channel: Arc<SaveChannel<S>>,
    pending: Option<PendingSave>,
}

impl<S: NoteSaver> Autosaver<S> {
    pub fn new(
        note_id: Uuid,
        saver: S,
        delay: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<SaveEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let channel = Arc::new(SaveChannel {
            saver,
            in_flight: Mutex::new(()),
            events,
        });
        let autosaver = Self {
            note_id,
            delay,
            channel,
            pending: None,
        };
        (autosaver, receiver)
    }

    /// True while a timer is armed or the save it started is still running.
    pub fn has_pending(&self) -> bool {
        self.pending
            .as_ref()
            .map(|pending| !pending.task.is_finished())
            .unwrap_or(false)
    }

    pub fn edit(&mut self, draft: Draft) {
        self.cancel();

        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        let channel = Arc::clone(&self.channel);
        let note_id = self.note_id;
        let delay = self.delay;

        let task = tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel_rx => {
                    debug!(note_id = %note_id, "autosave rearmed");
                    return;
                }
            }
            let _ = channel.save(note_id, &draft).await;
        });

        self.pending = Some(PendingSave {
            cancel: cancel_tx,
            task,
        });
    }

    pub async fn flush(&mut self, draft: &Draft) -> ClientResult<Note> {
        if let Some(PendingSave { cancel, task }) = self.pending.take() {
            drop(cancel);
            if let Err(err) = task.await {
                warn!(note_id = %self.note_id, error = %err, "autosave task did not complete");
            }
        }
        self.channel.save(self.note_id, draft).await
    }

    pub fn cancel(&mut self) {
        // Dropping the sender wakes the timer task with a cancellation.
        self.pending.take();
    }
}
