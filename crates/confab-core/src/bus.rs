//! Broadcast bus for Confab.
//!
//! The bus is the single point of truth for which connections are live in
//! which room right now. All membership mutation goes through
//! [`Bus::join`] / [`Bus::leave`]; fan-out goes through [`Bus::publish`].
//! The raw room mapping is never exposed.

use crate::event::ChatEvent;
use crate::room::{Room, RoomId};
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

/// Atomic counter for unique connection ids within the same nanosecond.
static CONNECTION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique identifier for a live connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub String);

impl ConnectionId {
    /// Create a connection id from an existing string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh connection id.
    #[must_use]
    pub fn generate() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos() as u64;
        let counter = CONNECTION_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(format!("conn_{:x}_{counter}", timestamp))
    }

    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bus errors.
#[derive(Debug, Error)]
pub enum BusError {
    /// Maximum number of live rooms reached.
    #[error("Room limit reached: {0}")]
    RoomLimitReached(usize),
}

/// Bus configuration.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Maximum number of live rooms.
    pub max_rooms: usize,
    /// Broadcast capacity per room.
    pub room_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            max_rooms: 10_000,
            room_capacity: 1024,
        }
    }
}

/// The join/leave/publish interface of a broadcast backplane.
///
/// Callers depend only on this trait, so the in-process [`LocalBus`] can be
/// swapped for a distributed backend without touching the session logic.
pub trait Bus: Send + Sync {
    /// Register a connection as a subscriber of a room.
    ///
    /// Idempotent: joining a room twice has the effect of one membership.
    ///
    /// # Errors
    ///
    /// Returns an error if creating the room would exceed the room limit.
    fn join(
        &self,
        room: &str,
        connection_id: &ConnectionId,
    ) -> Result<broadcast::Receiver<Arc<ChatEvent>>, BusError>;

    /// Remove a connection's membership. No-op if absent.
    fn leave(&self, room: &str, connection_id: &ConnectionId);

    /// Deliver an event to every connection currently subscribed to the
    /// room. Returns the number of receivers; zero subscribers is a normal,
    /// silent no-op.
    fn publish(&self, room: &str, event: ChatEvent) -> usize;
}

/// In-process bus: a concurrent map from room id to live room.
///
/// Publish order within one room is the order all subscribers observe, and
/// a connection joining mid-publish only observes later events.
pub struct LocalBus {
    /// Live rooms indexed by id.
    rooms: DashMap<RoomId, Room>,
    /// Configuration.
    config: BusConfig,
}

impl LocalBus {
    /// Create a new bus with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(BusConfig::default())
    }

    /// Create a new bus with custom configuration.
    #[must_use]
    pub fn with_config(config: BusConfig) -> Self {
        info!("Creating bus with config: {:?}", config);
        Self {
            rooms: DashMap::new(),
            config,
        }
    }

    /// Check if a room is currently live.
    #[must_use]
    pub fn room_exists(&self, room: &str) -> bool {
        self.rooms.contains_key(room)
    }

    /// Get the subscriber count for a room.
    #[must_use]
    pub fn subscriber_count(&self, room: &str) -> usize {
        self.rooms.get(room).map(|r| r.subscriber_count()).unwrap_or(0)
    }

    /// Get bus statistics.
    #[must_use]
    pub fn stats(&self) -> BusStats {
        BusStats {
            room_count: self.rooms.len(),
            subscription_count: self.rooms.iter().map(|r| r.subscriber_count()).sum(),
        }
    }
}

impl Bus for LocalBus {
    fn join(
        &self,
        room: &str,
        connection_id: &ConnectionId,
    ) -> Result<broadcast::Receiver<Arc<ChatEvent>>, BusError> {
        if !self.rooms.contains_key(room) && self.rooms.len() >= self.config.max_rooms {
            return Err(BusError::RoomLimitReached(self.config.max_rooms));
        }

        let mut entry = self.rooms.entry(room.to_string()).or_insert_with(|| {
            debug!(room = %room, "Creating live room");
            Room::with_capacity(room, self.config.room_capacity)
        });

        let receiver = entry.subscribe(connection_id.clone());

        debug!(
            room = %room,
            connection = %connection_id,
            subscribers = entry.subscriber_count(),
            "Joined"
        );

        Ok(receiver)
    }

    fn leave(&self, room: &str, connection_id: &ConnectionId) {
        if let Some(mut entry) = self.rooms.get_mut(room) {
            entry.unsubscribe(connection_id);

            debug!(
                room = %room,
                connection = %connection_id,
                subscribers = entry.subscriber_count(),
                "Left"
            );

            if entry.is_empty() {
                drop(entry); // Release the lock
                self.rooms.remove(room);
                debug!(room = %room, "Dropped empty room");
            }
        }
    }

    fn publish(&self, room: &str, event: ChatEvent) -> usize {
        if let Some(entry) = self.rooms.get(room) {
            let count = entry.publish(event);
            trace!(room = %room, recipients = count, "Published event");
            count
        } else {
            warn!(room = %room, "Publish to room with no live subscribers");
            0
        }
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Bus statistics.
#[derive(Debug, Clone)]
pub struct BusStats {
    /// Number of live rooms.
    pub room_count: usize,
    /// Total number of subscriptions across all rooms.
    pub subscription_count: usize,
}
