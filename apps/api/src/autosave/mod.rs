//! Autosave coordinator for editing clients.
//!
//! Editors push full-record snapshots on every change. The coordinator waits
//! for a quiet interval after the latest snapshot and then issues exactly one
//! write carrying it:
//!
//! - a session opened with `Autosaver::open_latest` continues the owner's most
//!   recently updated resume;
//! - otherwise the first write creates the resume; its id is used for every
//!   later write;
//! - once an id is known, writes run detached: a write in flight is never
//!   cancelled, and a later write may finish before it;
//! - failures surface through `SaveStatus::Failed` and are not retried until
//!   the next edit starts a new cycle.

pub mod client;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::resume::payload::{ResumeDocument, ResumePayload, SaveReceipt};

pub use client::HttpResumeWriter;

/// Quiet interval used when the caller has no preference.
pub const DEFAULT_QUIET_INTERVAL: Duration = Duration::from_millis(800);

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request rejected (status {status}): {message}")]
    Rejected { status: u16, message: String },
}

/// Where the coordinator reads the starting resume and sends its writes.
#[async_trait]
pub trait ResumeWriter: Send + Sync {
    /// The owner's most recently updated resume, if any.
    async fn load_latest(&self) -> Result<Option<ResumeDocument>, WriteError>;

    async fn create(&self, payload: &ResumePayload) -> Result<SaveReceipt, WriteError>;

    async fn replace(&self, id: Uuid, payload: &ResumePayload) -> Result<SaveReceipt, WriteError>;
}

/// Save state shown next to the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveStatus {
    Idle,
    Saving,
    Saved { at: DateTime<Utc> },
    Failed { message: String },
}

/// Handle to a running autosave worker.
pub struct Autosaver {
    edits: mpsc::UnboundedSender<ResumePayload>,
    status: watch::Receiver<SaveStatus>,
    resume_id: watch::Receiver<Option<Uuid>>,
    worker: JoinHandle<()>,
}

impl Autosaver {
    /// Starts the worker. Pass `existing_id` when the editor opened a stored
    /// resume, so the first write replaces it instead of creating a new one.
    pub fn spawn(
        writer: Arc<dyn ResumeWriter>,
        existing_id: Option<Uuid>,
        quiet_interval: Duration,
    ) -> Self {
        let (edits, rx) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(SaveStatus::Idle);
        let (id_tx, resume_id) = watch::channel(existing_id);

        let worker = tokio::spawn(run(
            writer,
            rx,
            Arc::new(status_tx),
            id_tx,
            quiet_interval,
        ));

        Self {
            edits,
            status,
            resume_id,
            worker,
        }
    }

    /// Loads the owner's most recently updated resume and starts a worker
    /// that keeps saving into it. With no stored resume, the first write
    /// creates one. The loaded document seeds the editor.
    pub async fn open_latest(
        writer: Arc<dyn ResumeWriter>,
        quiet_interval: Duration,
    ) -> Result<(Self, Option<ResumeDocument>), WriteError> {
        let latest = writer.load_latest().await?;
        let saver = Self::spawn(writer, latest.as_ref().map(|doc| doc.id), quiet_interval);
        Ok((saver, latest))
    }

    /// Records a new snapshot and restarts the quiet interval.
    /// Returns `false` if the worker has already stopped.
    pub fn edit(&self, snapshot: ResumePayload) -> bool {
        self.edits.send(snapshot).is_ok()
    }

    pub fn status(&self) -> watch::Receiver<SaveStatus> {
        self.status.clone()
    }

    /// Id of the resume being saved, once the first create has succeeded.
    pub fn resume_id(&self) -> Option<Uuid> {
        *self.resume_id.borrow()
    }

    /// Writes any pending snapshot immediately and waits for every write
    /// still in flight.
    pub async fn shutdown(self) {
        let Autosaver { edits, worker, .. } = self;
        drop(edits);
        if let Err(e) = worker.await {
            warn!("autosave worker ended abnormally: {e}");
        }
    }
}

async fn run(
    writer: Arc<dyn ResumeWriter>,
    mut rx: mpsc::UnboundedReceiver<ResumePayload>,
    status: Arc<watch::Sender<SaveStatus>>,
    resume_id: watch::Sender<Option<Uuid>>,
    quiet_interval: Duration,
) {
    let mut in_flight: Vec<JoinHandle<()>> = Vec::new();

    while let Some(first) = rx.recv().await {
        let (snapshot, closed) = settle(&mut rx, first, quiet_interval).await;
        let current_id = *resume_id.borrow();

        match current_id {
            // Creating inline keeps later edits queued until the id exists,
            // so one editing session never creates two resumes.
            None => {
                if let Some(receipt) = write(writer.as_ref(), None, &snapshot, &status).await {
                    resume_id.send_replace(Some(receipt.id));
                }
            }
            Some(id) => {
                let writer = Arc::clone(&writer);
                let status = Arc::clone(&status);
                in_flight.push(tokio::spawn(async move {
                    write(writer.as_ref(), Some(id), &snapshot, &status).await;
                }));
            }
        }

        in_flight.retain(|handle| !handle.is_finished());
        if closed {
            break;
        }
    }

    for handle in in_flight {
        if let Err(e) = handle.await {
            warn!("autosave write task failed: {e}");
        }
    }
}

/// Absorbs snapshots until `quiet_interval` passes without a newer one.
/// The flag is `true` when the channel closed, which flushes immediately.
async fn settle(
    rx: &mut mpsc::UnboundedReceiver<ResumePayload>,
    mut latest: ResumePayload,
    quiet_interval: Duration,
) -> (ResumePayload, bool) {
    let timer = tokio::time::sleep(quiet_interval);
    tokio::pin!(timer);

    loop {
        tokio::select! {
            next = rx.recv() => match next {
                Some(snapshot) => {
                    latest = snapshot;
                    timer.as_mut().reset(Instant::now() + quiet_interval);
                }
                None => return (latest, true),
            },
            () = &mut timer => return (latest, false),
        }
    }
}

async fn write(
    writer: &dyn ResumeWriter,
    id: Option<Uuid>,
    snapshot: &ResumePayload,
    status: &watch::Sender<SaveStatus>,
) -> Option<SaveReceipt> {
    status.send_replace(SaveStatus::Saving);
    let result = match id {
        Some(id) => writer.replace(id, snapshot).await,
        None => writer.create(snapshot).await,
    };

    match result {
        Ok(receipt) => {
            debug!("autosaved resume {}", receipt.id);
            status.send_replace(SaveStatus::Saved {
                at: receipt.updated_at,
            });
            Some(receipt)
        }
        Err(e) => {
            warn!("autosave failed: {e}");
            status.send_replace(SaveStatus::Failed {
                message: e.to_string(),
            });
            None
        }
    }
}
