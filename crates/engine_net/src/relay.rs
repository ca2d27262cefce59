//! In-process room relay.
//!
//! [`RelayHub`] is an explicit session registry: rooms map to their current
//! participants, each reachable through an unbounded channel. Its only job is
//! to forward each message to every *other* participant of the sender's room.
//! It performs no validation and gives no ordering guarantee across senders.
//!
//! The hub is cheap to clone; clones share the same registry. Its lifetime is
//! whatever scope holds the last clone, so tests and offline sessions each
//! get their own isolated relay.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::error::NetError;
use crate::messages::NetworkMessage;
use crate::transport::Transport;

#[derive(Debug)]
struct Participant {
    client_id: String,
    session: u64,
    inbox: mpsc::UnboundedSender<NetworkMessage>,
}

#[derive(Debug, Clone, Default)]
pub struct RelayHub {
    rooms: Arc<DashMap<String, Vec<Participant>>>,
    next_session: Arc<AtomicU64>,
}

impl RelayHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Join `room` as `client_id`. A client that joins the same room twice
    /// replaces its earlier session.
    pub fn join(&self, room: &str, client_id: impl Into<String>) -> MemoryTransport {
        let client_id = client_id.into();
        let session = self.next_session.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut participants = self.rooms.entry(room.to_string()).or_default();
            participants.retain(|p| p.client_id != client_id);
            participants.push(Participant {
                client_id: client_id.clone(),
                session,
                inbox: tx,
            });
            debug!(room, client_id, participants = participants.len(), "client joined room");
        }
        MemoryTransport {
            hub: self.clone(),
            room: room.to_string(),
            client_id,
            session,
            inbox: rx,
            connected: true,
        }
    }

    /// Remove one session from `room`, dropping the room once empty. A
    /// session that was already replaced by a rejoin is a no-op.
    fn leave(&self, room: &str, session: u64) {
        if let Some(mut participants) = self.rooms.get_mut(room) {
            participants.retain(|p| p.session != session);
            debug!(room, session, participants = participants.len(), "session left room");
        }
        self.rooms.remove_if(room, |_, participants| participants.is_empty());
    }

    /// Forward `message` to every participant of `room` except `sender`.
    /// Returns the number of recipients.
    pub fn broadcast(&self, room: &str, sender: &str, message: &NetworkMessage) -> usize {
        let Some(mut participants) = self.rooms.get_mut(room) else {
            return 0;
        };
        let mut delivered = 0;
        participants.retain(|p| {
            if p.client_id == sender {
                return true;
            }
            let alive = p.inbox.send(message.clone()).is_ok();
            delivered += usize::from(alive);
            alive
        });
        trace!(room, sender, kind = message.kind(), delivered, "relayed message");
        delivered
    }

    /// Client ids currently in `room`, in join order.
    #[must_use]
    pub fn participants(&self, room: &str) -> Vec<String> {
        self.rooms
            .get(room)
            .map(|participants| participants.iter().map(|p| p.client_id.clone()).collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

/// A [`Transport`] bound to one room of a [`RelayHub`].
#[derive(Debug)]
pub struct MemoryTransport {
    hub: RelayHub,
    room: String,
    client_id: String,
    session: u64,
    inbox: mpsc::UnboundedReceiver<NetworkMessage>,
    connected: bool,
}

impl MemoryTransport {
    #[must_use]
    pub fn room(&self) -> &str {
        &self.room
    }
}

impl Transport for MemoryTransport {
    fn local_id(&self) -> &str {
        &self.client_id
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn send(&mut self, message: &NetworkMessage) -> Result<(), NetError> {
        if !self.connected {
            return Err(NetError::Disconnected);
        }
        self.hub.broadcast(&self.room, &self.client_id, message);
        Ok(())
    }

    fn receive(&mut self) -> Vec<NetworkMessage> {
        let mut received = Vec::new();
        while let Ok(message) = self.inbox.try_recv() {
            received.push(message);
        }
        received
    }

    fn disconnect(&mut self) {
        if self.connected {
            self.connected = false;
            self.hub.leave(&self.room, self.session);
            self.inbox.close();
        }
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{MessagePayload, PlayerData};

    fn join_message(sender: &str) -> NetworkMessage {
        NetworkMessage::new(
            sender,
            sender,
            0.0,
            MessagePayload::PlayerJoin(PlayerData {
                player_id: sender.to_string(),
                name: String::new(),
            }),
        )
    }

    #[test]
    fn test_broadcast_excludes_sender() {
        let hub = RelayHub::new();
        let mut a = hub.join("room", "a");
        let mut b = hub.join("room", "b");
        let mut c = hub.join("room", "c");

        a.send(&join_message("a")).unwrap();

        assert!(a.receive().is_empty());
        assert_eq!(b.receive(), vec![join_message("a")]);
        assert_eq!(c.receive().len(), 1);
    }

    #[test]
    fn test_rooms_are_isolated() {
        let hub = RelayHub::new();
        let mut a = hub.join("one", "a");
        let mut b = hub.join("two", "b");

        a.send(&join_message("a")).unwrap();
        assert!(b.receive().is_empty());
        assert_eq!(hub.room_count(), 2);
    }

    #[test]
    fn test_disconnect_leaves_room() {
        let hub = RelayHub::new();
        let mut a = hub.join("room", "a");
        let b = hub.join("room", "b");
        assert_eq!(hub.participants("room"), vec!["a", "b"]);

        drop(b);
        assert_eq!(hub.participants("room"), vec!["a"]);

        a.disconnect();
        assert!(!a.is_connected());
        assert!(matches!(a.send(&join_message("a")), Err(NetError::Disconnected)));
        assert_eq!(hub.room_count(), 0);
    }

    #[test]
    fn test_rejoin_replaces_session() {
        let hub = RelayHub::new();
        let first = hub.join("room", "a");
        let mut second = hub.join("room", "a");
        let mut b = hub.join("room", "b");

        b.send(&join_message("b")).unwrap();
        assert_eq!(second.receive().len(), 1);
        assert_eq!(hub.participants("room"), vec!["a", "b"]);

        // Dropping the stale session leaves the live one in place.
        drop(first);
        b.send(&join_message("b")).unwrap();
        assert_eq!(second.receive().len(), 1);
        assert_eq!(hub.participants("room"), vec!["a", "b"]);
    }
}
