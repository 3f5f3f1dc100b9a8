//! Best-effort outcome notifications.
//!
//! Implements: REQ-NFY-001
//!
//! After an outcome is durably recorded the gate tells interested parties
//! about it. Notification failure never changes the outcome; the pipeline
//! records it in an auxiliary field and moves on.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use thiserror::Error;

use crate::storage::{JsonlStore, StorageError};

/// Notification log file name inside the data directory.
pub const NOTIFICATIONS_FILE: &str = "notifications.jsonl";

/// Errors delivering a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The sink could not accept the notification.
    #[error("notification delivery failed: {reason}")]
    Delivery {
        /// The underlying failure.
        reason: String,
    },

    /// The file sink's log failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Delivery target for outcome notifications.
///
/// Implements: REQ-NFY-001/§4
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Delivers one payload on the named channel.
    async fn send(&self, channel: &str, payload: &Value) -> Result<(), NotifyError>;
}

/// Sink appending notifications to `notifications.jsonl`.
///
/// Implements: REQ-NFY-001/F-001
#[derive(Debug)]
pub struct FileSink {
    store: Arc<JsonlStore>,
}

impl FileSink {
    /// Sink writing into the given store's data directory.
    #[must_use]
    pub fn new(store: Arc<JsonlStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl NotificationSink for FileSink {
    async fn send(&self, channel: &str, payload: &Value) -> Result<(), NotifyError> {
        let record = json!({
            "channel": channel,
            "payload": payload,
            "sent_at": Utc::now(),
        });
        self.store.append_line(NOTIFICATIONS_FILE, &record)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_sink_appends_jsonl() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(JsonlStore::open(dir.path()).expect("store"));
        let sink = FileSink::new(store.clone());

        sink.send("audit", &json!({"request_id": "r-1", "status": "APPROVED"}))
            .await
            .expect("send");

        let lines = store.read_all_lines(NOTIFICATIONS_FILE).expect("lines");
        assert_eq!(lines.len(), 1);
        let parsed: Value = serde_json::from_str(&lines[0]).expect("parse");
        assert_eq!(parsed["channel"], json!("audit"));
        assert_eq!(parsed["payload"]["request_id"], json!("r-1"));
    }
}
