//! Outbox queues: JSONL files a delivery collaborator consumes.
//!
//! The core's contract ends at the queue; whatever drains the outbox owns
//! formatting-for-the-wire and delivery, and its success or failure is
//! never reported back.

use async_trait::async_trait;
use herald_domain::{AnnounceAction, AnnouncementQueue, QueueError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum OutboxError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Append-only JSONL writer for one channel's outbox file
#[derive(Debug, Clone)]
pub struct OutboxWriter {
    path: PathBuf,
    file: Arc<Mutex<tokio::fs::File>>,
}

impl OutboxWriter {
    pub async fn new(path: PathBuf) -> Result<Self, OutboxError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        Ok(Self {
            path,
            file: Arc::new(Mutex::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&self, action: &AnnounceAction) -> Result<(), OutboxError> {
        let line = serde_json::to_string(action)?;
        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;
        Ok(())
    }
}

/// One channel's outbound queue, backed by a JSONL outbox file
#[derive(Debug, Clone)]
pub struct OutboxQueue {
    writer: OutboxWriter,
}

impl OutboxQueue {
    pub fn new(writer: OutboxWriter) -> Self {
        Self { writer }
    }
}

#[async_trait]
impl AnnouncementQueue for OutboxQueue {
    async fn enqueue(&self, action: &AnnounceAction) -> Result<(), QueueError> {
        self.writer
            .append(action)
            .await
            .map_err(|error| QueueError::Write(format!("Outbox write failed: {}", error)))
    }
}

/// In-memory queue for tests and dry experiments
#[derive(Debug, Default)]
pub struct InMemoryQueue {
    actions: std::sync::Mutex<Vec<AnnounceAction>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actions(&self) -> Vec<AnnounceAction> {
        self.actions.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnnouncementQueue for InMemoryQueue {
    async fn enqueue(&self, action: &AnnounceAction) -> Result<(), QueueError> {
        let mut actions = self
            .actions
            .lock()
            .map_err(|e| QueueError::Write(e.to_string()))?;
        actions.push(action.clone());
        Ok(())
    }
}
