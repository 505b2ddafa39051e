//! Delivery of serialized documents.
//!
//! Submission is fire-and-forget: a [`Submitter`] reports its own failures
//! through logging and never hands an error back to the accumulator.

use std::path::Path;

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, warn};

use crate::error::Result;

/// Accepts one serialized export document per call.
#[async_trait]
pub trait Submitter: Send + Sync {
    async fn submit(&self, payload: Vec<u8>);
}

/// Writes one document per line (NDJSON) to a file or stdout.
pub struct NdjsonSubmitter {
    writer: Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
    destination: String,
}

impl NdjsonSubmitter {
    /// Write documents to stdout.
    pub fn stdout() -> Self {
        Self {
            writer: Mutex::new(Box::new(tokio::io::stdout())),
            destination: "stdout".to_string(),
        }
    }

    /// Append documents to a file, creating it if needed.
    pub async fn append<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        Ok(Self {
            writer: Mutex::new(Box::new(file)),
            destination: path.display().to_string(),
        })
    }

    async fn write_line(&self, payload: &[u8]) -> std::io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(payload).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await
    }
}

#[async_trait]
impl Submitter for NdjsonSubmitter {
    async fn submit(&self, payload: Vec<u8>) {
        match self.write_line(&payload).await {
            Ok(()) => debug!("Wrote {} byte document to {}", payload.len(), self.destination),
            Err(e) => error!("Failed to write document to {}: {}", self.destination, e),
        }
    }
}

/// Hands documents to an in-process consumer over a bounded channel.
pub struct ChannelSubmitter {
    tx: mpsc::Sender<Vec<u8>>,
}

impl ChannelSubmitter {
    /// Create a submitter and the receiving end of its channel.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Vec<u8>>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Submitter for ChannelSubmitter {
    async fn submit(&self, payload: Vec<u8>) {
        if self.tx.send(payload).await.is_err() {
            warn!("Document dropped: export channel receiver is closed");
        }
    }
}
