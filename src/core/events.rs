//! Progress event channel for running executions
//!
//! The supervisor mirrors output, truncated to the display ceiling, onto a
//! broadcast channel so callers can observe partial progress before the
//! command completes. Subscribing is optional; events sent with no
//! subscribers are dropped.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Default buffer size for the event broadcast channel
pub const EVENT_CHANNEL_SIZE: usize = 256;

/// An incremental progress update from a running execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecEvent {
    /// Identifies the invocation this chunk belongs to
    pub execution_id: Uuid,
    /// The new output chunk (display-capped; later chunks past the cap are
    /// not mirrored)
    pub output: String,
    /// The caller-supplied description of the command, if any
    pub description: Option<String>,
}

/// Sender half of the event broadcast channel (held by the sandbox)
pub type EventSender = broadcast::Sender<ExecEvent>;

/// Receiver half of the event broadcast channel (held by subscribers)
pub type EventReceiver = broadcast::Receiver<ExecEvent>;

/// Create a new event broadcast channel
///
/// Returns the sender. Receivers are created by calling `sender.subscribe()`.
/// Multiple subscribers can receive the same events.
pub fn create_event_channel() -> EventSender {
    let (tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
    tx
}
