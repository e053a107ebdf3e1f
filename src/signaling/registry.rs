use std::collections::{HashMap, HashSet};

use super::types::{ConnectionId, RoomName};

/// Room membership in both directions.
///
/// A room is present only while it has at least one member, and a
/// connection appears in `rooms_by_conn` only while it is in some room.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    members_by_room: HashMap<RoomName, HashSet<ConnectionId>>,
    rooms_by_conn: HashMap<ConnectionId, HashSet<RoomName>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `conn` to `room`. Returns false if it was already a member.
    pub fn insert(&mut self, room: &RoomName, conn: ConnectionId) -> bool {
        let added = self
            .members_by_room
            .entry(room.clone())
            .or_default()
            .insert(conn);
        if added {
            self.rooms_by_conn
                .entry(conn)
                .or_default()
                .insert(room.clone());
        }
        added
    }

    /// Remove `conn` from `room`, dropping the room once it is empty.
    /// Returns false if it was not a member.
    pub fn remove(&mut self, room: &RoomName, conn: ConnectionId) -> bool {
        let Some(members) = self.members_by_room.get_mut(room) else {
            return false;
        };
        if !members.remove(&conn) {
            return false;
        }
        if members.is_empty() {
            self.members_by_room.remove(room);
        }

        if let Some(rooms) = self.rooms_by_conn.get_mut(&conn) {
            rooms.remove(room);
            if rooms.is_empty() {
                self.rooms_by_conn.remove(&conn);
            }
        }
        true
    }

    /// Rooms `conn` currently belongs to, sorted by name.
    pub fn rooms_of(&self, conn: ConnectionId) -> Vec<RoomName> {
        let mut rooms: Vec<RoomName> = self
            .rooms_by_conn
            .get(&conn)
            .map(|rooms| rooms.iter().cloned().collect())
            .unwrap_or_default();
        rooms.sort();
        rooms
    }

    pub fn members(&self, room: &RoomName) -> impl Iterator<Item = ConnectionId> + '_ {
        self.members_by_room
            .get(room)
            .into_iter()
            .flat_map(|members| members.iter().copied())
    }

    pub fn contains(&self, room: &RoomName, conn: ConnectionId) -> bool {
        self.members_by_room
            .get(room)
            .is_some_and(|members| members.contains(&conn))
    }

    pub fn room_exists(&self, room: &RoomName) -> bool {
        self.members_by_room.contains_key(room)
    }

    pub fn room_count(&self) -> usize {
        self.members_by_room.len()
    }
}
