//! WebSocket Session with Backpressure Accounting

use crate::realtime::metrics::RealtimeMetrics;
use atrio_server_domain::shared_kernel::ConnectionId;
use atrio_shared::realtime::messages::ServerMessage;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::warn;

pub const SESSION_CHANNEL_CAPACITY: usize = 1000;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Backpressure: channel full")]
    Backpressure,

    #[error("Session closed")]
    Closed,

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// One live, authenticated connection's outbound half.
///
/// The registry owns the only long-lived reference; the websocket handler
/// drains the paired receiver into the transport.
#[derive(Debug)]
pub struct Session {
    id: ConnectionId,
    tx: mpsc::Sender<String>,
    metrics: Arc<RealtimeMetrics>,
    messages_sent: AtomicU64,
    messages_dropped: AtomicU64,
    opened_at: Instant,
}

impl Session {
    pub fn new(id: ConnectionId, tx: mpsc::Sender<String>, metrics: Arc<RealtimeMetrics>) -> Self {
        Self {
            id,
            tx,
            metrics,
            messages_sent: AtomicU64::new(0),
            messages_dropped: AtomicU64::new(0),
            opened_at: Instant::now(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Enqueue a raw frame without blocking. A full channel counts as
    /// backpressure and drops this one message for this one recipient.
    pub fn send_raw(&self, message: String) -> Result<(), SessionError> {
        match self.tx.try_send(message) {
            Ok(()) => {
                self.messages_sent.fetch_add(1, Ordering::Relaxed);
                self.metrics.record_message_sent();
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.messages_dropped.fetch_add(1, Ordering::Relaxed);
                self.metrics.record_message_dropped(1);
                warn!(connection_id = %self.id, "Backpressure on session, message dropped");
                Err(SessionError::Backpressure)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.metrics.record_session_error();
                Err(SessionError::Closed)
            }
        }
    }

    pub fn send(&self, message: &ServerMessage) -> Result<(), SessionError> {
        let raw = serde_json::to_string(message)
            .map_err(|e| SessionError::Serialization(e.to_string()))?;
        self.send_raw(raw)
    }

    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }

    pub fn messages_dropped(&self) -> u64 {
        self.messages_dropped.load(Ordering::Relaxed)
    }

    pub fn uptime_seconds(&self) -> f64 {
        self.opened_at.elapsed().as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_counts_messages() {
        let (tx, mut rx) = mpsc::channel(4);
        let session = Session::new(
            ConnectionId::new(),
            tx,
            Arc::new(RealtimeMetrics::new()),
        );

        session.send_raw("hello".to_string()).unwrap();
        assert_eq!(session.messages_sent(), 1);
        assert_eq!(rx.recv().await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn full_channel_is_backpressure() {
        let (tx, _rx) = mpsc::channel(1);
        let session = Session::new(
            ConnectionId::new(),
            tx,
            Arc::new(RealtimeMetrics::new()),
        );

        session.send_raw("one".to_string()).unwrap();
        let err = session.send_raw("two".to_string()).unwrap_err();
        assert!(matches!(err, SessionError::Backpressure));
        assert_eq!(session.messages_dropped(), 1);
    }

    #[tokio::test]
    async fn dropped_receiver_is_closed() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let session = Session::new(
            ConnectionId::new(),
            tx,
            Arc::new(RealtimeMetrics::new()),
        );

        let err = session.send_raw("gone".to_string()).unwrap_err();
        assert!(matches!(err, SessionError::Closed));
    }
}
