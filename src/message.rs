use crate::model::Transaction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Liveness probe literal the observer may send at any time.
pub const PING_LITERAL: &str = "ping";

/// Messages the server pushes to observer stream connections.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamMessage {
    /// Sent once, right after the WebSocket upgrade.
    ConnectionEstablished {
        message: String,
        subject_id: Option<String>,
    },
    /// A transaction changed state (including the pending "processing
    /// started" signal).
    TransactionUpdate {
        data: Transaction,
        timestamp: DateTime<Utc>,
    },
    /// Acknowledgment of a client liveness probe.
    Pong { timestamp: DateTime<Utc> },
}

impl StreamMessage {
    pub fn established(subject_id: Option<String>) -> Self {
        StreamMessage::ConnectionEstablished {
            message: "Connected to the transaction stream".to_string(),
            subject_id,
        }
    }

    /// Wraps a transaction snapshot into an update event, stamping the
    /// snapshot's last-mutation time as the event timestamp.
    pub fn update(snapshot: &Transaction) -> Self {
        StreamMessage::TransactionUpdate {
            timestamp: snapshot.event_timestamp(),
            data: snapshot.clone(),
        }
    }

    pub fn pong() -> Self {
        StreamMessage::Pong { timestamp: Utc::now() }
    }
}
