//! Events emitted for notification dispatch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::episode::EpisodeRef;
use crate::quality::{Quality, Status};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SearchEvent {
    EpisodeSnatched {
        episode: EpisodeRef,
        release: String,
        provider: String,
        quality: Quality,
        status: Status,
    },
    SnatchFailed {
        release: String,
        provider: String,
        reason: String,
    },
}

/// Envelope wrapping an event with its emission time.
#[derive(Debug, Clone)]
pub struct EventEnvelope {
    pub timestamp: DateTime<Utc>,
    pub event: SearchEvent,
}

/// Cheaply cloneable sender for search events.
///
/// Emission never fails the caller; a closed or full channel is logged.
#[derive(Clone)]
pub struct EventHandle {
    tx: mpsc::Sender<EventEnvelope>,
}

impl EventHandle {
    pub fn new(tx: mpsc::Sender<EventEnvelope>) -> Self {
        Self { tx }
    }

    /// Bounded channel with a handle on one end.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<EventEnvelope>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self::new(tx), rx)
    }

    pub async fn emit(&self, event: SearchEvent) {
        let envelope = EventEnvelope {
            timestamp: Utc::now(),
            event,
        };
        if let Err(e) = self.tx.send(envelope).await {
            tracing::error!("Failed to emit search event: {}", e);
        }
    }

    /// Returns false if the event could not be queued right now.
    pub fn try_emit(&self, event: SearchEvent) -> bool {
        let envelope = EventEnvelope {
            timestamp: Utc::now(),
            event,
        };
        match self.tx.try_send(envelope) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to emit search event: {}", e);
                false
            }
        }
    }
}
