//! Room abstraction for Confab.
//!
//! A room is the broadcast scope of one friend pair: its id is a pure
//! function of the unordered identity pair, and it holds the set of
//! currently-subscribed live connections.

use crate::bus::ConnectionId;
use crate::event::ChatEvent;
use crate::identity::UserId;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Default broadcast capacity per room.
const DEFAULT_ROOM_CAPACITY: usize = 1024;

/// A room identifier.
pub type RoomId = String;

/// Order an identity pair with the lower id first.
#[must_use]
pub fn ordered_pair(a: UserId, b: UserId) -> (UserId, UserId) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Derive the canonical room id for an unordered identity pair.
///
/// The lower id always comes first, so `room_id(a, b) == room_id(b, a)`.
#[must_use]
pub fn room_id(a: UserId, b: UserId) -> RoomId {
    let (low, high) = ordered_pair(a, b);
    format!("chat_{low}_{high}")
}

/// A live room: one broadcast channel plus the membership set.
#[derive(Debug)]
pub struct Room {
    /// Canonical room id.
    id: RoomId,
    /// Broadcast sender for this room.
    sender: broadcast::Sender<Arc<ChatEvent>>,
    /// Set of subscribed connection ids.
    subscribers: HashSet<ConnectionId>,
}

impl Room {
    /// Create a new room.
    #[must_use]
    pub fn new(id: impl Into<RoomId>) -> Self {
        Self::with_capacity(id, DEFAULT_ROOM_CAPACITY)
    }

    /// Create a new room with a specific broadcast capacity.
    #[must_use]
    pub fn with_capacity(id: impl Into<RoomId>, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            id: id.into(),
            sender,
            subscribers: HashSet::new(),
        }
    }

    /// Get the room id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the number of subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Check if a connection is subscribed.
    #[must_use]
    pub fn is_subscribed(&self, connection_id: &ConnectionId) -> bool {
        self.subscribers.contains(connection_id)
    }

    /// Subscribe a connection to this room.
    ///
    /// Idempotent: re-subscribing returns a fresh receiver that supersedes
    /// the previous one, and the membership count is unchanged.
    pub fn subscribe(&mut self, connection_id: ConnectionId) -> broadcast::Receiver<Arc<ChatEvent>> {
        if self.subscribers.insert(connection_id.clone()) {
            debug!(room = %self.id, connection = %connection_id, "Connection subscribed");
        }
        self.sender.subscribe()
    }

    /// Unsubscribe a connection from this room.
    ///
    /// Returns `true` if the connection was subscribed.
    pub fn unsubscribe(&mut self, connection_id: &ConnectionId) -> bool {
        let removed = self.subscribers.remove(connection_id);
        if removed {
            debug!(room = %self.id, connection = %connection_id, "Connection unsubscribed");
        }
        removed
    }

    /// Publish an event to every current subscriber of this room.
    ///
    /// Returns the number of receivers that received the event. Publishing
    /// to a room with no subscribers is a silent no-op.
    pub fn publish(&self, event: ChatEvent) -> usize {
        trace!(room = %self.id, "Publishing event");
        self.sender.send(Arc::new(event)).unwrap_or_default()
    }

    /// Check if the room has no subscribers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}
