//! Usage events and the ingestion queue

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// One usage report from a request path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageEvent {
    /// Report id (or key) the usage is billed to
    pub report_id: String,
    /// Resource consumed
    pub resource: String,
    /// Units consumed
    pub count: i64,
}

impl UsageEvent {
    /// Create an event
    pub fn new(report_id: impl Into<String>, resource: impl Into<String>, count: i64) -> Self {
        Self {
            report_id: report_id.into(),
            resource: resource.into(),
            count,
        }
    }

    /// Whether the event can be attributed and counted
    pub fn is_valid(&self) -> bool {
        !self.report_id.trim().is_empty() && !self.resource.trim().is_empty() && self.count > 0
    }
}

/// Producer side of the ingestion queue
///
/// Unbounded: sending never waits on the consolidation worker.
#[derive(Debug, Clone)]
pub struct UsageQueue {
    sender: mpsc::UnboundedSender<UsageEvent>,
}

impl UsageQueue {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<UsageEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Queue an event
    ///
    /// Returns `false` if the worker has shut down.
    pub fn send(&self, event: UsageEvent) -> bool {
        self.sender.send(event).is_ok()
    }

    /// Whether the worker is still receiving
    pub fn is_active(&self) -> bool {
        !self.sender.is_closed()
    }
}
