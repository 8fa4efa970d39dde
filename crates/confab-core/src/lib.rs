//! # confab-core
//!
//! Room registry and broadcast fan-out for the Confab chat server.
//!
//! This crate provides the fundamental building blocks:
//!
//! - **Room** - the broadcast scope of one friend pair, with a canonical id
//! - **Bus** - process-wide join/leave/publish across all live rooms
//! - **ChatEvent** - the payload fanned out to every subscriber of a room
//! - **UserIdentity** - resolved identity of an authenticated user
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Session   │────▶│     Bus     │────▶│    Room     │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                                                │
//!                                                ▼
//!                                     every live subscriber
//! ```

pub mod bus;
pub mod event;
pub mod identity;
pub mod room;

pub use bus::{Bus, BusConfig, BusError, BusStats, ConnectionId, LocalBus};
pub use event::{now_rfc3339, ChatEvent};
pub use identity::{UserId, UserIdentity};
pub use room::{ordered_pair, room_id, Room, RoomId};
