//! Subscriber identity and outbound queue.

use std::fmt;

use tokio::sync::mpsc;
use uuid::Uuid;

/// Unique identifier of a live subscriber connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// The receiving end of a registered subscriber.
///
/// The hub holds the sending half. When the hub drops it (unregister, slow
/// consumer, shutdown) the queue closes and [`recv`](Self::recv) returns `None`.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriberId,
    pub project_id: String,
    queue: mpsc::Receiver<String>,
}

impl Subscription {
    pub(crate) fn new(id: SubscriberId, project_id: String, queue: mpsc::Receiver<String>) -> Self {
        Self {
            id,
            project_id,
            queue,
        }
    }

    /// Next queued message, or `None` once the hub closed the queue.
    pub async fn recv(&mut self) -> Option<String> {
        self.queue.recv().await
    }

    /// Next outbound frame: waits for one message, then folds in every message
    /// that was already queued behind it, newline-joined.
    pub async fn next_frame(&mut self) -> Option<String> {
        let first = self.queue.recv().await?;
        Some(coalesce(first, &mut self.queue))
    }

    /// Non-blocking poll of the queue.
    pub fn try_recv(&mut self) -> Result<String, mpsc::error::TryRecvError> {
        self.queue.try_recv()
    }
}

/// Append the messages queued at this moment to `first`.
///
/// Only what is already queued is taken, so a producer that outpaces the
/// writer cannot keep one frame growing forever.
pub fn coalesce(first: String, queue: &mut mpsc::Receiver<String>) -> String {
    let pending = queue.len();
    let mut frame = first;
    for _ in 0..pending {
        match queue.try_recv() {
            Ok(next) => {
                frame.push('\n');
                frame.push_str(&next);
            }
            Err(_) => break,
        }
    }
    frame
}
