//! Presence registry
//!
//! Tracks which users currently hold an open socket and routes events to
//! them. State lives only in memory and is rebuilt as clients reconnect.
//! Each user has at most one active connection: registering a new one
//! displaces the old, whose event channel is closed.

use std::collections::{HashMap, HashSet};
use std::fmt;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::chat::events::ServerEvent;

pub type EventSender = mpsc::UnboundedSender<ServerEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ServerEvent>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

struct Connection {
    user_id: String,
    tx: EventSender,
    rooms: HashSet<String>,
}

#[derive(Default)]
struct Inner {
    /// user id -> active connection
    users: HashMap<String, ConnectionId>,
    /// connection -> owner, sender and joined rooms
    connections: HashMap<ConnectionId, Connection>,
}

#[derive(Default)]
pub struct PresenceRegistry {
    inner: RwLock<Inner>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a channel for a new connection and register it under `user_id`
    pub fn connect(&self, user_id: &str) -> (ConnectionId, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = ConnectionId::new();
        self.register(user_id, id, tx);
        (id, rx)
    }

    /// Make `connection_id` the user's only active connection and announce it
    pub fn register(&self, user_id: &str, connection_id: ConnectionId, tx: EventSender) {
        let mut inner = self.inner.write();

        if let Some(previous) = inner.users.insert(user_id.to_string(), connection_id) {
            if previous != connection_id {
                // Dropping the sender closes the old socket's event stream.
                inner.connections.remove(&previous);
                debug!("[Presence] {} replaced connection {}", user_id, previous);
            }
        }

        inner.connections.insert(
            connection_id,
            Connection {
                user_id: user_id.to_string(),
                tx,
                rooms: HashSet::new(),
            },
        );

        let event = ServerEvent::UserOnline {
            user_id: user_id.to_string(),
        };
        broadcast_locked(&inner, &event, Some(connection_id));

        info!("[Presence] {} online via {}", user_id, connection_id);
    }

    /// Remove a connection. Returns the user that went offline, or `None` if
    /// the connection was unknown or had already been displaced.
    pub fn unregister(&self, connection_id: ConnectionId) -> Option<String> {
        let mut inner = self.inner.write();

        let connection = inner.connections.remove(&connection_id)?;
        let user_id = connection.user_id;

        if inner.users.get(&user_id) != Some(&connection_id) {
            return None;
        }
        inner.users.remove(&user_id);

        let event = ServerEvent::UserOffline {
            user_id: user_id.clone(),
        };
        broadcast_locked(&inner, &event, None);

        info!("[Presence] {} offline", user_id);
        Some(user_id)
    }

    /// Deliver to the user's active connection. `false` means not connected;
    /// the event is dropped.
    pub fn route_to(&self, user_id: &str, event: ServerEvent) -> bool {
        let inner = self.inner.read();
        let delivered = inner
            .users
            .get(user_id)
            .and_then(|id| inner.connections.get(id))
            .is_some_and(|conn| conn.tx.send(event).is_ok());

        if !delivered {
            debug!("[Presence] {} not connected, event dropped", user_id);
        }
        delivered
    }

    /// Deliver to one specific connection
    pub fn send_to_connection(&self, connection_id: ConnectionId, event: ServerEvent) -> bool {
        self.inner
            .read()
            .connections
            .get(&connection_id)
            .is_some_and(|conn| conn.tx.send(event).is_ok())
    }

    /// Send to every connection except `except`
    pub fn broadcast(&self, event: &ServerEvent, except: Option<ConnectionId>) -> usize {
        broadcast_locked(&self.inner.read(), event, except)
    }

    pub fn join_room(&self, connection_id: ConnectionId, room: &str) -> bool {
        match self.inner.write().connections.get_mut(&connection_id) {
            Some(conn) => {
                conn.rooms.insert(room.to_string());
                true
            }
            None => false,
        }
    }

    pub fn leave_room(&self, connection_id: ConnectionId, room: &str) -> bool {
        self.inner
            .write()
            .connections
            .get_mut(&connection_id)
            .is_some_and(|conn| conn.rooms.remove(room))
    }

    /// Send to every connection that joined `room`; returns the delivery count
    pub fn broadcast_room(&self, room: &str, event: &ServerEvent, except: Option<ConnectionId>) -> usize {
        let inner = self.inner.read();
        inner
            .connections
            .iter()
            .filter(|(id, conn)| Some(**id) != except && conn.rooms.contains(room))
            .filter(|(_, conn)| conn.tx.send(event.clone()).is_ok())
            .count()
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.inner.read().users.contains_key(user_id)
    }

    pub fn connection_for(&self, user_id: &str) -> Option<ConnectionId> {
        self.inner.read().users.get(user_id).copied()
    }

    pub fn online_users(&self) -> Vec<String> {
        let mut users: Vec<String> = self.inner.read().users.keys().cloned().collect();
        users.sort();
        users
    }

    pub fn online_count(&self) -> usize {
        self.inner.read().users.len()
    }
}

fn broadcast_locked(inner: &Inner, event: &ServerEvent, except: Option<ConnectionId>) -> usize {
    inner
        .connections
        .iter()
        .filter(|(id, _)| Some(**id) != except)
        .filter(|(_, conn)| conn.tx.send(event.clone()).is_ok())
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mut EventReceiver) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn error_event(message: &str) -> ServerEvent {
        ServerEvent::Error {
            message: message.to_string(),
        }
    }

    #[test]
    fn test_route_to_connected_user() {
        let registry = PresenceRegistry::new();
        let (_, mut rx) = registry.connect("alice");

        assert!(registry.route_to("alice", error_event("ping")));
        assert_eq!(drain(&mut rx), vec![error_event("ping")]);
    }

    #[test]
    fn test_route_to_offline_user_is_dropped() {
        let registry = PresenceRegistry::new();
        assert!(!registry.route_to("nobody", error_event("ping")));
    }

    #[test]
    fn test_second_connection_replaces_first() {
        let registry = PresenceRegistry::new();
        let (first, mut first_rx) = registry.connect("alice");
        let (second, mut second_rx) = registry.connect("alice");

        assert_ne!(first, second);
        assert_eq!(registry.connection_for("alice"), Some(second));
        assert_eq!(registry.online_count(), 1);

        assert!(registry.route_to("alice", error_event("hello")));
        assert_eq!(drain(&mut second_rx), vec![error_event("hello")]);

        // The displaced channel is closed and received nothing routed.
        assert!(drain(&mut first_rx).is_empty());
        assert!(matches!(
            first_rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn test_displaced_connection_closing_keeps_newer_entry() {
        let registry = PresenceRegistry::new();
        let (first, _first_rx) = registry.connect("alice");
        let (second, _second_rx) = registry.connect("alice");

        assert_eq!(registry.unregister(first), None);
        assert!(registry.is_online("alice"));

        assert_eq!(registry.unregister(second), Some("alice".to_string()));
        assert!(!registry.is_online("alice"));
        assert_eq!(registry.unregister(second), None);
    }

    #[test]
    fn test_online_offline_broadcasts_reach_others_only() {
        let registry = PresenceRegistry::new();
        let (_, mut bob_rx) = registry.connect("bob");
        let (alice_conn, mut alice_rx) = registry.connect("alice");

        assert_eq!(
            drain(&mut bob_rx),
            vec![ServerEvent::UserOnline {
                user_id: "alice".into()
            }]
        );
        assert!(drain(&mut alice_rx).is_empty());

        registry.unregister(alice_conn);
        assert_eq!(
            drain(&mut bob_rx),
            vec![ServerEvent::UserOffline {
                user_id: "alice".into()
            }]
        );
    }

    #[test]
    fn test_room_broadcast() {
        let registry = PresenceRegistry::new();
        let (alice, mut alice_rx) = registry.connect("alice");
        let (bob, mut bob_rx) = registry.connect("bob");
        let (_carol, mut carol_rx) = registry.connect("carol");
        drain(&mut alice_rx);
        drain(&mut bob_rx);
        drain(&mut carol_rx);

        assert!(registry.join_room(alice, "physics"));
        assert!(registry.join_room(bob, "physics"));

        let delivered = registry.broadcast_room("physics", &error_event("quiz"), Some(alice));
        assert_eq!(delivered, 1);
        assert_eq!(drain(&mut bob_rx), vec![error_event("quiz")]);
        assert!(drain(&mut alice_rx).is_empty());
        assert!(drain(&mut carol_rx).is_empty());

        assert!(registry.leave_room(bob, "physics"));
        assert!(!registry.leave_room(bob, "physics"));
        assert_eq!(registry.broadcast_room("physics", &error_event("x"), None), 1);
    }

    #[test]
    fn test_online_users_sorted() {
        let registry = PresenceRegistry::new();
        let (_, _rx1) = registry.connect("zed");
        let (_, _rx2) = registry.connect("amy");
        assert_eq!(registry.online_users(), vec!["amy", "zed"]);
    }
}
