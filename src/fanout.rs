// ============================================================================
// Connection Fan-out Manager
// ============================================================================
//
// In-memory registry of live observer connections, globally and grouped by
// subject. Delivery is a non-blocking push onto each observer's unbounded
// channel; the WebSocket task on the other end drains it in FIFO order, so
// per-connection ordering follows submission order.
//
// Dead connections are detected lazily: a send fails once the receiving task
// has dropped its channel, and the connection is pruned from both maps as a
// side effect of that delivery attempt. There is no heartbeat.
//
// ============================================================================

use crate::message::StreamMessage;
use crate::metrics;
use crate::model::Transaction;
use std::collections::{HashMap, HashSet};
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

pub type ObserverSender = mpsc::UnboundedSender<StreamMessage>;

struct Observer {
    sender: ObserverSender,
    subject_id: Option<String>,
}

#[derive(Default)]
struct Registry {
    connections: HashMap<Uuid, Observer>,
    subjects: HashMap<String, HashSet<Uuid>>,
}

impl Registry {
    /// Idempotent removal from the global set and the subject group,
    /// dropping the group entry once it empties.
    fn remove(&mut self, connection_id: Uuid) {
        let Some(observer) = self.connections.remove(&connection_id) else {
            return;
        };
        if let Some(subject_id) = observer.subject_id {
            if let Some(group) = self.subjects.get_mut(&subject_id) {
                group.remove(&connection_id);
                if group.is_empty() {
                    self.subjects.remove(&subject_id);
                }
            }
        }
        metrics::ACTIVE_CONNECTIONS.dec();
    }
}

pub struct FanoutManager {
    registry: RwLock<Registry>,
}

impl Default for FanoutManager {
    fn default() -> Self {
        Self::new()
    }
}

impl FanoutManager {
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
        }
    }

    /// Adds an observer to the global set and, when scoped, to its subject
    /// group. Returns the connection id used for unregistration.
    pub async fn register(&self, sender: ObserverSender, subject_id: Option<String>) -> Uuid {
        let connection_id = Uuid::new_v4();
        let mut registry = self.registry.write().await;

        if let Some(subject_id) = &subject_id {
            registry
                .subjects
                .entry(subject_id.clone())
                .or_default()
                .insert(connection_id);
        }
        registry
            .connections
            .insert(connection_id, Observer { sender, subject_id });

        metrics::ACTIVE_CONNECTIONS.inc();
        metrics::CONNECTIONS_TOTAL.inc();
        tracing::debug!(connection_id = %connection_id, "Observer registered");
        connection_id
    }

    /// Idempotent: unregistering an unknown or already-removed connection is
    /// a no-op.
    pub async fn unregister(&self, connection_id: Uuid) {
        self.registry.write().await.remove(connection_id);
        tracing::debug!(connection_id = %connection_id, "Observer unregistered");
    }

    pub async fn connection_count(&self) -> usize {
        self.registry.read().await.connections.len()
    }

    /// Attempts delivery to every registered connection, pruning the ones
    /// whose channel is gone. Delivery errors never escape this call.
    pub async fn deliver_to_all(&self, message: &StreamMessage) {
        let dead = {
            let registry = self.registry.read().await;
            let mut dead = Vec::new();
            for (id, observer) in &registry.connections {
                if observer.sender.send(message.clone()).is_err() {
                    dead.push(*id);
                } else {
                    metrics::EVENTS_DELIVERED_TOTAL.inc();
                }
            }
            dead
        };
        self.prune(dead).await;
    }

    /// Same semantics as `deliver_to_all`, scoped to one subject's group.
    pub async fn deliver_to_subject(&self, subject_id: &str, message: &StreamMessage) {
        let dead = {
            let registry = self.registry.read().await;
            let Some(group) = registry.subjects.get(subject_id) else {
                return;
            };
            let mut dead = Vec::new();
            for id in group {
                let Some(observer) = registry.connections.get(id) else {
                    continue;
                };
                if observer.sender.send(message.clone()).is_err() {
                    dead.push(*id);
                } else {
                    metrics::EVENTS_DELIVERED_TOTAL.inc();
                }
            }
            dead
        };
        self.prune(dead).await;
    }

    /// Fans a transaction snapshot out as a `transaction_update` event:
    /// broadcast first, then the subject-scoped delivery, matching the order
    /// the bridge schedules them in.
    pub async fn notify_transaction_change(&self, snapshot: &Transaction) {
        let message = StreamMessage::update(snapshot);
        self.deliver_to_all(&message).await;
        self.deliver_to_subject(&snapshot.subject_id, &message).await;
    }

    async fn prune(&self, dead: Vec<Uuid>) {
        if dead.is_empty() {
            return;
        }
        let mut registry = self.registry.write().await;
        for id in dead {
            tracing::debug!(connection_id = %id, "Pruning dead observer connection");
            registry.remove(id);
        }
    }

    #[cfg(test)]
    async fn subject_group_exists(&self, subject_id: &str) -> bool {
        self.registry.read().await.subjects.contains_key(subject_id)
    }
}
