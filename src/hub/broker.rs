//! The hub coordination task and its handle.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::config::HubConfig;
use crate::hub::subscriber::{SubscriberId, Subscription};
use crate::observability::metrics;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HubError {
    #[error("hub is not running")]
    Closed,
}

/// A message for every subscriber of one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastEvent {
    pub project_id: String,
    pub message: String,
}

/// Subscriber counts per project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HubStats {
    pub projects: BTreeMap<String, usize>,
}

impl HubStats {
    pub fn total(&self) -> usize {
        self.projects.values().sum()
    }
}

enum Command {
    Register {
        id: SubscriberId,
        project_id: String,
        queue: mpsc::Sender<String>,
    },
    Unregister {
        project_id: String,
        id: SubscriberId,
    },
    Broadcast(BroadcastEvent),
    Stats(oneshot::Sender<HubStats>),
}

/// Owns the subscriber sets. Drive it with [`Hub::run`].
pub struct Hub {
    commands: mpsc::Receiver<Command>,
    subscribers: HashMap<String, HashMap<SubscriberId, mpsc::Sender<String>>>,
}

/// Cloneable access to a running [`Hub`].
#[derive(Clone)]
pub struct HubHandle {
    commands: mpsc::Sender<Command>,
    queue_capacity: usize,
}

impl Hub {
    pub fn new(config: &HubConfig) -> (Hub, HubHandle) {
        let (tx, rx) = mpsc::channel(config.command_queue_capacity);
        let hub = Hub {
            commands: rx,
            subscribers: HashMap::new(),
        };
        let handle = HubHandle {
            commands: tx,
            queue_capacity: config.subscriber_queue_capacity,
        };
        (hub, handle)
    }

    /// Process commands until shutdown or until every handle is gone.
    ///
    /// On exit all subscriber queues are closed.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!("Broadcast hub started");
        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
            }
        }

        self.commands.close();
        let remaining = self.subscriber_count();
        self.subscribers.clear();
        metrics::record_hub_subscribers(0);
        tracing::info!(subscribers = remaining, "Broadcast hub stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Register {
                id,
                project_id,
                queue,
            } => {
                tracing::debug!(subscriber = %id, project_id = %project_id, "Subscriber registered");
                self.subscribers
                    .entry(project_id)
                    .or_default()
                    .insert(id, queue);
            }
            Command::Unregister { project_id, id } => {
                if let Some(set) = self.subscribers.get_mut(&project_id) {
                    if set.remove(&id).is_some() {
                        tracing::debug!(subscriber = %id, project_id = %project_id, "Subscriber unregistered");
                    }
                    if set.is_empty() {
                        self.subscribers.remove(&project_id);
                    }
                }
            }
            Command::Broadcast(event) => self.deliver(event),
            Command::Stats(reply) => {
                let _ = reply.send(self.stats());
            }
        }
        metrics::record_hub_subscribers(self.subscriber_count());
    }

    fn deliver(&mut self, event: BroadcastEvent) {
        let Some(set) = self.subscribers.get_mut(&event.project_id) else {
            return;
        };

        set.retain(|id, queue| match queue.try_send(event.message.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(
                    subscriber = %id,
                    project_id = %event.project_id,
                    "Subscriber queue full, dropping subscriber"
                );
                metrics::record_dropped_subscriber();
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });

        if set.is_empty() {
            self.subscribers.remove(&event.project_id);
        }
    }

    fn stats(&self) -> HubStats {
        HubStats {
            projects: self
                .subscribers
                .iter()
                .map(|(project, set)| (project.clone(), set.len()))
                .collect(),
        }
    }

    fn subscriber_count(&self) -> usize {
        self.subscribers.values().map(HashMap::len).sum()
    }
}

impl HubHandle {
    /// Register a new subscriber for `project_id`.
    pub async fn subscribe(&self, project_id: &str) -> Result<Subscription, HubError> {
        let id = SubscriberId::new();
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        self.commands
            .send(Command::Register {
                id,
                project_id: project_id.to_string(),
                queue: tx,
            })
            .await
            .map_err(|_| HubError::Closed)?;
        Ok(Subscription::new(id, project_id.to_string(), rx))
    }

    /// Remove a subscriber. Unknown ids are ignored.
    pub async fn unregister(&self, project_id: &str, id: SubscriberId) {
        let _ = self
            .commands
            .send(Command::Unregister {
                project_id: project_id.to_string(),
                id,
            })
            .await;
    }

    /// Queue `message` for the subscribers of `project_id` without waiting.
    ///
    /// If the hub's command queue is full the event is dropped.
    pub fn broadcast(&self, project_id: &str, message: &str) {
        let event = BroadcastEvent {
            project_id: project_id.to_string(),
            message: message.to_string(),
        };
        match self.commands.try_send(Command::Broadcast(event)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(project_id = %project_id, "Hub queue full, dropping event");
                metrics::record_dropped_event();
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }

    pub async fn stats(&self) -> Result<HubStats, HubError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Stats(tx))
            .await
            .map_err(|_| HubError::Closed)?;
        rx.await.map_err(|_| HubError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::error::TryRecvError;

    fn start(capacity: usize) -> (HubHandle, broadcast::Sender<()>) {
        let config = HubConfig {
            subscriber_queue_capacity: capacity,
            ..HubConfig::default()
        };
        let (hub, handle) = Hub::new(&config);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        tokio::spawn(hub.run(shutdown_rx));
        (handle, shutdown_tx)
    }

    #[tokio::test]
    async fn delivers_to_project_subscribers() {
        let (hub, _shutdown) = start(8);
        let mut a = hub.subscribe("p-1").await.unwrap();
        let mut b = hub.subscribe("p-1").await.unwrap();

        hub.broadcast("p-1", "hello");

        assert_eq!(a.recv().await.as_deref(), Some("hello"));
        assert_eq!(b.recv().await.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn other_projects_receive_nothing() {
        let (hub, _shutdown) = start(8);
        let mut sub = hub.subscribe("p-1").await.unwrap();

        hub.broadcast("p-2", "not for you");
        // Commands are processed in order; the stats reply means the broadcast is done.
        let stats = hub.stats().await.unwrap();

        assert_eq!(stats.projects.get("p-1"), Some(&1));
        assert!(!stats.projects.contains_key("p-2"));
        assert_eq!(sub.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test]
    async fn unregister_closes_queue_and_removes_project() {
        let (hub, _shutdown) = start(8);
        let mut sub = hub.subscribe("p-1").await.unwrap();

        hub.unregister("p-1", sub.id).await;
        hub.broadcast("p-1", "after");

        assert_eq!(sub.recv().await, None);
        assert_eq!(hub.stats().await.unwrap(), HubStats::default());
    }

    #[tokio::test]
    async fn unregister_keeps_other_subscribers() {
        let (hub, _shutdown) = start(8);
        let first = hub.subscribe("p-1").await.unwrap();
        let mut second = hub.subscribe("p-1").await.unwrap();

        hub.unregister("p-1", first.id).await;
        hub.broadcast("p-1", "still here");

        assert_eq!(second.recv().await.as_deref(), Some("still here"));
        assert_eq!(hub.stats().await.unwrap().total(), 1);
    }

    #[tokio::test]
    async fn slow_subscriber_is_dropped_without_affecting_others() {
        let (hub, _shutdown) = start(2);
        let mut slow = hub.subscribe("p-1").await.unwrap();
        let mut fast = hub.subscribe("p-1").await.unwrap();

        hub.broadcast("p-1", "m1");
        hub.broadcast("p-1", "m2");
        assert_eq!(fast.recv().await.as_deref(), Some("m1"));
        assert_eq!(fast.recv().await.as_deref(), Some("m2"));

        // slow still holds m1 and m2, so m3 overflows its queue.
        hub.broadcast("p-1", "m3");
        assert_eq!(fast.recv().await.as_deref(), Some("m3"));

        assert_eq!(slow.recv().await.as_deref(), Some("m1"));
        assert_eq!(slow.recv().await.as_deref(), Some("m2"));
        assert_eq!(slow.recv().await, None);

        assert_eq!(hub.stats().await.unwrap().projects.get("p-1"), Some(&1));
    }

    #[tokio::test]
    async fn shutdown_closes_every_queue() {
        let (hub, shutdown) = start(8);
        let mut sub = hub.subscribe("p-1").await.unwrap();

        shutdown.send(()).unwrap();

        assert_eq!(sub.recv().await, None);
        assert_eq!(hub.subscribe("p-1").await.err(), Some(HubError::Closed));
    }
}
