use common_types::{ConnectionId, UserId};
use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::api::types::ChangeEvent;

/// A connected subscriber's state on this engine instance.
pub struct Subscriber {
    pub connection_id: ConnectionId,
    /// The authenticated user behind the connection; used to route events
    /// that affect a single user's resolved view.
    pub user_id: UserId,
    /// Channel feeding the connection's transport stream. Unbounded: a send
    /// only fails once the receiving half is gone, which is exactly the
    /// "connection is dead" signal.
    pub sender: mpsc::UnboundedSender<ChangeEvent>,
}

/// Registry of live subscriber connections.
///
/// Delivery is best-effort and fire-and-forget: a dead subscriber is pruned
/// on the first failed send and never blocks or fails delivery to the rest.
/// Events reach a single subscriber in publish order; nothing is ordered
/// across subscribers, nothing is acknowledged, and nothing is replayed for
/// late joiners — reconnecting clients pull current state via the resolver.
pub struct ChangeBroadcaster {
    connections: DashMap<ConnectionId, Subscriber>,
}

impl Default for ChangeBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeBroadcaster {
    pub fn new() -> Self {
        ChangeBroadcaster {
            connections: DashMap::new(),
        }
    }

    /// Adds a subscriber. Re-registering a connection id replaces the
    /// previous handle.
    pub fn register(&self, subscriber: Subscriber) {
        self.connections
            .insert(subscriber.connection_id, subscriber);
    }

    /// Removes a subscriber. Unknown ids are a no-op, not an error.
    pub fn unregister(&self, connection_id: ConnectionId) -> Option<Subscriber> {
        self.connections.remove(&connection_id).map(|(_, v)| v)
    }

    /// Delivers the event to every registered subscriber. Returns how many
    /// sends succeeded.
    pub fn publish(&self, event: &ChangeEvent) -> usize {
        self.deliver(event, |_| true)
    }

    /// Delivers the event only to connections registered for `user_id`.
    pub fn publish_to_user(&self, user_id: UserId, event: &ChangeEvent) -> usize {
        self.deliver(event, |subscriber| subscriber.user_id == user_id)
    }

    fn deliver<F>(&self, event: &ChangeEvent, interested: F) -> usize
    where
        F: Fn(&Subscriber) -> bool,
    {
        let mut delivered = 0;
        let mut dead: Vec<ConnectionId> = Vec::new();

        for entry in self.connections.iter() {
            if !interested(entry.value()) {
                continue;
            }
            if entry.value().sender.send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                dead.push(entry.value().connection_id);
            }
        }

        // Removal happens after iteration: removing while holding shard
        // guards can deadlock.
        for connection_id in dead {
            tracing::debug!(%connection_id, "pruning dead subscriber");
            self.connections.remove(&connection_id);
        }

        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
