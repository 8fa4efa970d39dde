//! # confab-protocol
//!
//! Wire protocol definitions for the Confab one-to-one chat server.
//!
//! The protocol is JSON text frames over a WebSocket. Clients send a single
//! frame shape; the server answers with tagged frames.
//!
//! ## Frame Types
//!
//! - `ClientFrame` - inbound `{"message": "<text>"}`
//! - `ServerFrame::ConnectionEstablished` - sent once after a successful join
//! - `ServerFrame::Error` - sent before an authorization-failure close
//! - `ServerFrame::Message` - one per broadcast chat event
//!
//! ## Example
//!
//! ```rust
//! use confab_protocol::{codec, ServerFrame};
//!
//! let frame = ServerFrame::connection_established();
//! let encoded = codec::encode(&frame).unwrap();
//! let inbound = codec::decode(br#"{"message": "hi"}"#).unwrap();
//! assert_eq!(inbound.message, "hi");
//! ```

pub mod codec;
pub mod frames;

pub use codec::{decode, encode, ProtocolError};
pub use frames::{ClientFrame, ServerFrame};
