//! The per-connection session.
//!
//! Each WebSocket is driven by one task through a one-way lifecycle:
//! authenticate the presented token, authorize the requested peer, join the
//! pair's room on the bus, then relay frames in both directions until the
//! transport closes. Leaving the bus is unconditional on the way out, so a
//! membership never outlives its connection.
//!
//! Terminal behavior is asymmetric on purpose: an invalid token closes the
//! socket without any frame, a missing friendship sends exactly one error
//! frame before closing, and once joined nothing short of transport closure
//! ends the session - per-message faults are logged and swallowed.

use crate::handlers::AppState;
use crate::metrics;
use axum::extract::ws::{Message, WebSocket};
use confab_core::{room_id, Bus, ChatEvent, ConnectionId, UserId, UserIdentity};
use confab_protocol::{codec, ServerFrame};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Drive one WebSocket connection from accept to close.
pub(crate) async fn run(
    mut socket: WebSocket,
    state: Arc<AppState>,
    peer_id: UserId,
    token: Option<String>,
) {
    let _metrics_guard = metrics::ConnectionMetricsGuard::new();
    let connection_id = ConnectionId::generate();

    debug!(connection = %connection_id, peer = peer_id, "WebSocket connected");

    // Authenticating. Any token failure closes the socket with no frame;
    // the client cannot distinguish why.
    let user = match token {
        Some(token) => match state.verifier.verify(&token, &state.store).await {
            Ok(user) => user,
            Err(_) => {
                debug!(connection = %connection_id, "Authentication failed, closing");
                return;
            }
        },
        None => {
            debug!(connection = %connection_id, "No token presented, closing");
            return;
        }
    };

    // Authorizing. Refusal gets exactly one error frame, then the close.
    // Checked once here; an unfriending later does not end a live session.
    let Some(peer) = authorize(&state, &user, peer_id).await else {
        if let Ok(text) = codec::encode(&ServerFrame::not_friends()) {
            let _ = socket.send(Message::Text(text)).await;
        }
        let _ = socket.send(Message::Close(None)).await;
        return;
    };

    // Joining. The durable room row is resolved only after authorization
    // passed, so refused attempts never create rooms.
    let room = room_id(user.id, peer.id);
    if let Err(e) = state.store.get_or_create_room(user.id, peer.id).await {
        warn!(connection = %connection_id, room = %room, error = %e, "Room resolution failed, closing");
        metrics::record_error("room_resolution");
        return;
    }

    let events = match state.bus.join(&room, &connection_id) {
        Ok(receiver) => receiver,
        Err(e) => {
            warn!(connection = %connection_id, room = %room, error = %e, "Bus join failed, closing");
            metrics::record_error("bus_join");
            return;
        }
    };
    metrics::record_join();
    metrics::set_active_rooms(state.bus.stats().room_count);

    if let Ok(text) = codec::encode(&ServerFrame::connection_established()) {
        if socket.send(Message::Text(text)).await.is_err() {
            state.bus.leave(&room, &connection_id);
            return;
        }
    }

    debug!(connection = %connection_id, user = %user, room = %room, "Joined");

    relay(socket, &state, &user, &peer, &room, &connection_id, events).await;

    // Closed. Membership must never outlive the connection.
    state.bus.leave(&room, &connection_id);
    metrics::set_active_rooms(state.bus.stats().room_count);
    debug!(connection = %connection_id, room = %room, "WebSocket disconnected");
}

/// Resolve the peer and check the friendship, both orientations.
///
/// Returns `None` on refusal. A store failure here also refuses: the guard
/// cannot confirm the relationship, so the connection is not admitted.
pub(crate) async fn authorize(
    state: &AppState,
    user: &UserIdentity,
    peer_id: UserId,
) -> Option<UserIdentity> {
    let peer = match state.store.active_user(peer_id).await {
        Ok(Some(peer)) => peer,
        Ok(None) => {
            debug!(user = user.id, peer = peer_id, "Peer is not an active account");
            return None;
        }
        Err(e) => {
            warn!(user = user.id, peer = peer_id, error = %e, "Peer lookup failed");
            return None;
        }
    };

    match state.store.is_connected(user.id, peer.id).await {
        Ok(true) => Some(peer),
        Ok(false) => {
            debug!(user = user.id, peer = peer.id, "Users are not friends");
            None
        }
        Err(e) => {
            warn!(user = user.id, peer = peer.id, error = %e, "Friendship check failed");
            None
        }
    }
}

/// The `Joined` phase: pump bus events out and inbound frames in until the
/// transport closes.
async fn relay(
    socket: WebSocket,
    state: &AppState,
    user: &UserIdentity,
    peer: &UserIdentity,
    room: &str,
    connection_id: &ConnectionId,
    mut events: broadcast::Receiver<Arc<ChatEvent>>,
) {
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            biased;

            // Deliver room events to this client, in publish order.
            event = events.recv() => match event {
                Ok(event) => {
                    if forward_event(&mut sender, &event).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(connection = %connection_id, skipped, "Subscriber lagged, events dropped");
                    metrics::record_error("lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },

            // Receive from the WebSocket.
            msg = receiver.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    handle_inbound(state, user, peer, room, text.as_bytes()).await;
                }
                Some(Ok(Message::Binary(data))) => {
                    handle_inbound(state, user, peer, room, &data).await;
                }
                Some(Ok(Message::Ping(data))) => {
                    if sender.send(Message::Pong(data)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Pong(_))) => {
                    // Ignore pongs
                }
                Some(Ok(Message::Close(_))) => {
                    debug!(connection = %connection_id, "Received close frame");
                    break;
                }
                Some(Err(e)) => {
                    warn!(connection = %connection_id, error = %e, "WebSocket error");
                    metrics::record_error("websocket");
                    break;
                }
                None => {
                    debug!(connection = %connection_id, "WebSocket stream ended");
                    break;
                }
            },
        }
    }
}

async fn forward_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &ChatEvent,
) -> Result<(), axum::Error> {
    match codec::encode(&event.to_frame()) {
        Ok(text) => {
            metrics::record_message(text.len(), "outbound");
            sender.send(Message::Text(text)).await
        }
        Err(e) => {
            warn!(room = %event.room, error = %e, "Event encoding failed");
            Ok(())
        }
    }
}

/// One inbound frame: decode, persist, broadcast - in that order.
///
/// Malformed frames and empty bodies are dropped without a trace on the
/// wire. A persistence failure skips the broadcast so peers never see text
/// that was not durably written; the connection stays up either way.
pub(crate) async fn handle_inbound(
    state: &AppState,
    user: &UserIdentity,
    peer: &UserIdentity,
    room: &str,
    data: &[u8],
) {
    let frame = match codec::decode(data) {
        Ok(frame) => frame,
        Err(e) => {
            debug!(room = %room, error = %e, "Dropping malformed frame");
            return;
        }
    };
    metrics::record_message(data.len(), "inbound");

    let stored = match state
        .store
        .append_message(room, user, peer, &frame.message)
        .await
    {
        Ok(stored) => stored,
        Err(e) if e.is_empty_message() => return,
        Err(e) => {
            warn!(room = %room, sender = user.id, error = %e, "Message persistence failed, skipping broadcast");
            metrics::record_error("persistence");
            return;
        }
    };
    metrics::record_persisted();

    let bytes = stored.body.len();
    let event = ChatEvent::new(room, user.id, user.username.clone(), stored.body)
        .with_timestamp(stored.created_at);
    let recipients = state.bus.publish(room, event);

    metrics::record_message(bytes, "broadcast");
    debug!(room = %room, sender = user.id, recipients, "Published");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use confab_store::Store;

    async fn app_state() -> AppState {
        let store = Store::in_memory().await.unwrap();
        AppState::new(Config::default(), store)
    }

    async fn seed_user(state: &AppState, id: i64, username: &str) {
        sqlx::query("INSERT INTO users (id, username, is_active) VALUES (?, ?, 1)")
            .bind(id)
            .bind(username)
            .execute(state.store.pool())
            .await
            .unwrap();
    }

    async fn seed_friendship(state: &AppState, sender: i64, recipient: i64, status: &str) {
        sqlx::query(
            "INSERT INTO friend_requests (sender_id, recipient_id, status, created_at)
             VALUES (?, ?, ?, '2026-01-01T00:00:00Z')",
        )
        .bind(sender)
        .bind(recipient)
        .bind(status)
        .execute(state.store.pool())
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_authorize_accepts_friends_in_either_orientation() {
        let state = app_state().await;
        seed_user(&state, 1, "alice").await;
        seed_user(&state, 2, "bob").await;
        seed_friendship(&state, 2, 1, "accepted").await;

        let alice = UserIdentity::new(1, "alice");
        let peer = authorize(&state, &alice, 2).await.unwrap();
        assert_eq!(peer, UserIdentity::new(2, "bob"));
    }

    #[tokio::test]
    async fn test_authorize_refuses_non_friends_and_creates_no_room() {
        let state = app_state().await;
        seed_user(&state, 1, "alice").await;
        seed_user(&state, 2, "bob").await;
        seed_friendship(&state, 1, 2, "pending").await;

        let alice = UserIdentity::new(1, "alice");
        assert!(authorize(&state, &alice, 2).await.is_none());
        assert_eq!(state.store.room_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_authorize_refuses_unknown_peer() {
        let state = app_state().await;
        seed_user(&state, 1, "alice").await;

        let alice = UserIdentity::new(1, "alice");
        assert!(authorize(&state, &alice, 42).await.is_none());
    }

    #[tokio::test]
    async fn test_inbound_message_is_persisted_then_broadcast() {
        let state = app_state().await;
        seed_user(&state, 1, "alice").await;
        seed_user(&state, 2, "bob").await;

        let alice = UserIdentity::new(1, "alice");
        let bob = UserIdentity::new(2, "bob");
        let room = state.store.get_or_create_room(1, 2).await.unwrap().key;

        let conn = ConnectionId::generate();
        let mut rx = state.bus.join(&room, &conn).unwrap();

        handle_inbound(&state, &alice, &bob, &room, br#"{"message": "hello"}"#).await;

        let event = rx.try_recv().unwrap();
        assert_eq!(event.body, "hello");
        assert_eq!(event.sender_id, 1);

        let history = state.store.history(&room).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].created_at, event.timestamp);
    }

    #[tokio::test]
    async fn test_both_participants_receive_one_frame_including_sender() {
        let state = app_state().await;
        seed_user(&state, 1, "alice").await;
        seed_user(&state, 2, "bob").await;

        let alice = UserIdentity::new(1, "alice");
        let bob = UserIdentity::new(2, "bob");
        let room = state.store.get_or_create_room(1, 2).await.unwrap().key;

        let alice_conn = ConnectionId::generate();
        let bob_conn = ConnectionId::generate();
        let mut alice_rx = state.bus.join(&room, &alice_conn).unwrap();
        let mut bob_rx = state.bus.join(&room, &bob_conn).unwrap();

        handle_inbound(&state, &alice, &bob, &room, br#"{"message": "hello"}"#).await;

        // Each participant sees the event exactly once; the sender gets
        // their own echo.
        for rx in [&mut alice_rx, &mut bob_rx] {
            let event = rx.try_recv().unwrap();
            assert_eq!(event.body, "hello");
            assert_eq!(event.sender_id, 1);
            assert!(rx.try_recv().is_err());
        }

        let history = state.store.history(&room).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].sender.id, 1);
        assert_eq!(history[0].recipient.id, 2);
    }

    #[tokio::test]
    async fn test_inbound_empty_message_is_silently_dropped() {
        let state = app_state().await;
        seed_user(&state, 1, "alice").await;
        seed_user(&state, 2, "bob").await;

        let alice = UserIdentity::new(1, "alice");
        let bob = UserIdentity::new(2, "bob");
        let room = state.store.get_or_create_room(1, 2).await.unwrap().key;

        let conn = ConnectionId::generate();
        let mut rx = state.bus.join(&room, &conn).unwrap();

        handle_inbound(&state, &alice, &bob, &room, br#"{"message": "   "}"#).await;
        handle_inbound(&state, &alice, &bob, &room, br#"{"message": ""}"#).await;

        assert!(rx.try_recv().is_err());
        assert!(state.store.history(&room).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_inbound_malformed_frame_is_silently_dropped() {
        let state = app_state().await;
        seed_user(&state, 1, "alice").await;
        seed_user(&state, 2, "bob").await;

        let alice = UserIdentity::new(1, "alice");
        let bob = UserIdentity::new(2, "bob");
        let room = state.store.get_or_create_room(1, 2).await.unwrap().key;

        let conn = ConnectionId::generate();
        let mut rx = state.bus.join(&room, &conn).unwrap();

        handle_inbound(&state, &alice, &bob, &room, b"this is not json").await;

        assert!(rx.try_recv().is_err());
        assert!(state.store.history(&room).await.unwrap().is_empty());
    }
}
