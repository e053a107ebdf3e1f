use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::messages::{ServerMessage, SignalKind};
use super::registry::RoomRegistry;
use super::types::{ConnectionId, IdAllocator, OutboundMessage, RoomName, SignalingError};
use crate::config::ChatPolicy;

/// Outbound queue of one connection, drained by its writer task.
pub type Outbox = mpsc::UnboundedSender<OutboundMessage>;

/// Connection registry plus room membership, and all message routing.
///
/// Every method runs to completion without awaiting, so a hub driven from a
/// single task sees each join, leave and disconnect fully applied before the
/// next message is routed. Delivery is best effort: a send into a closed
/// outbox is ignored, since that connection's disconnect is already on its
/// way.
#[derive(Debug)]
pub struct Hub {
    connections: HashMap<ConnectionId, Outbox>,
    rooms: RoomRegistry,
    ids: IdAllocator,
    chat_policy: ChatPolicy,
}

impl Hub {
    pub fn new(chat_policy: ChatPolicy) -> Self {
        Self::with_parts(RoomRegistry::new(), IdAllocator::new(), chat_policy)
    }

    pub fn with_parts(rooms: RoomRegistry, ids: IdAllocator, chat_policy: ChatPolicy) -> Self {
        Self {
            connections: HashMap::new(),
            rooms,
            ids,
            chat_policy,
        }
    }

    /// Register a new connection and greet it with its id.
    pub fn connect(&mut self, outbox: Outbox) -> ConnectionId {
        let id = self.ids.allocate();
        if let Some(msg) = encode(&ServerMessage::Welcome { id }) {
            let _ = outbox.send(msg);
        }
        self.connections.insert(id, outbox);
        info!("Connection {} registered", id);
        id
    }

    /// Add `conn` to the named room and tell the other members.
    ///
    /// Joining a room twice is a silent no-op.
    pub fn join(&mut self, conn: ConnectionId, room: &str) -> Result<(), SignalingError> {
        if !self.connections.contains_key(&conn) {
            debug!("Join from unknown connection {} ignored", conn);
            return Ok(());
        }
        let room = RoomName::parse(room)?;

        if !self.rooms.insert(&room, conn) {
            debug!("Connection {} already in room {}", conn, room);
            return Ok(());
        }

        self.notify_room(&room, conn, &ServerMessage::UserJoined { id: conn });
        info!("Connection {} joined room {}", conn, room);
        Ok(())
    }

    /// Remove `conn` from the named room and tell whoever is left.
    pub fn leave(&mut self, conn: ConnectionId, room: &str) -> Result<(), SignalingError> {
        let room = RoomName::parse(room)?;
        if self.remove_member(&room, conn) {
            info!("Connection {} left room {}", conn, room);
        }
        Ok(())
    }

    /// Deliver a handshake message to `to` only. Returns whether a live
    /// connection was there to receive it.
    pub fn relay(
        &self,
        kind: SignalKind,
        from: ConnectionId,
        to: ConnectionId,
        payload: Value,
    ) -> bool {
        if from == to {
            debug!("Dropping {} addressed by {} to itself", kind.as_str(), from);
            return false;
        }
        let Some(outbox) = self.connections.get(&to) else {
            debug!("Dropping {} from {}: {} is gone", kind.as_str(), from, to);
            return false;
        };
        let Some(msg) = encode(&ServerMessage::signal(kind, payload, from)) else {
            return false;
        };
        let _ = outbox.send(msg);
        debug!("Relayed {} from {} to {}", kind.as_str(), from, to);
        true
    }

    /// Send a chat line to every current member of the room, sender
    /// included. Returns the number of recipients.
    pub fn broadcast_chat(
        &self,
        from: ConnectionId,
        room: &str,
        username: String,
        message: String,
    ) -> usize {
        let Ok(room) = RoomName::parse(room) else {
            warn!("Chat from {} names an invalid room {:?}", from, room);
            return 0;
        };
        if !self.rooms.room_exists(&room) {
            debug!("Chat from {} to missing room {} dropped", from, room);
            return 0;
        }
        if self.chat_policy == ChatPolicy::MembersOnly && !self.rooms.contains(&room, from) {
            warn!("Chat from {} to room {} dropped: not a member", from, room);
            return 0;
        }

        let Some(msg) = encode(&ServerMessage::ChatMessage { username, message }) else {
            return 0;
        };
        let mut delivered = 0;
        for member in self.rooms.members(&room) {
            if let Some(outbox) = self.connections.get(&member) {
                let _ = outbox.send(msg.clone());
                delivered += 1;
            }
        }
        debug!("Chat from {} delivered to {} in room {}", from, delivered, room);
        delivered
    }

    /// Drop `conn` from every room and from the registry.
    ///
    /// Returns false if it was already gone, so repeated closes are harmless.
    pub fn disconnect(&mut self, conn: ConnectionId) -> bool {
        if self.connections.remove(&conn).is_none() {
            return false;
        }
        for room in self.rooms.rooms_of(conn) {
            self.remove_member(&room, conn);
        }
        info!("Connection {} disconnected", conn);
        true
    }

    pub fn is_connected(&self, conn: ConnectionId) -> bool {
        self.connections.contains_key(&conn)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.room_count()
    }

    /// Members of a room, sorted; `None` when the room does not exist.
    pub fn room_members(&self, room: &str) -> Option<Vec<ConnectionId>> {
        let room = RoomName::parse(room).ok()?;
        if !self.rooms.room_exists(&room) {
            return None;
        }
        let mut members: Vec<_> = self.rooms.members(&room).collect();
        members.sort();
        Some(members)
    }

    pub fn rooms_of(&self, conn: ConnectionId) -> Vec<RoomName> {
        self.rooms.rooms_of(conn)
    }

    fn remove_member(&mut self, room: &RoomName, conn: ConnectionId) -> bool {
        if !self.rooms.remove(room, conn) {
            return false;
        }
        if self.rooms.room_exists(room) {
            self.notify_room(room, conn, &ServerMessage::UserDisconnected { id: conn });
        } else {
            info!("Room {} removed (empty)", room);
        }
        true
    }

    /// Send `msg` to every member of `room` except `skip`.
    fn notify_room(&self, room: &RoomName, skip: ConnectionId, msg: &ServerMessage) {
        let Some(msg) = encode(msg) else {
            return;
        };
        for member in self.rooms.members(room).filter(|member| *member != skip) {
            if let Some(outbox) = self.connections.get(&member) {
                let _ = outbox.send(msg.clone());
            }
        }
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new(ChatPolicy::default())
    }
}

fn encode(msg: &ServerMessage) -> Option<OutboundMessage> {
    match serde_json::to_string(msg) {
        Ok(json) => Some(OutboundMessage::from(json)),
        Err(e) => {
            error!("Failed to encode {:?}: {}", msg, e);
            None
        }
    }
}
