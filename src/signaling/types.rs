use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use tokio_tungstenite::tungstenite::{self, Utf8Bytes};

/// Signaling server errors
#[derive(Debug, Error)]
pub enum SignalingError {
    #[error("invalid room name: {0:?}")]
    InvalidRoomName(String),

    #[error("invalid connection id: {0:?}")]
    InvalidConnectionId(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

const CONNECTION_ID_PREFIX: &str = "conn-";
const MAX_ROOM_NAME_LEN: usize = 128;

/// Server-assigned identity of one live connection.
///
/// Rendered as `conn-` followed by 16 lowercase hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:016x}", CONNECTION_ID_PREFIX, self.0)
    }
}

impl FromStr for ConnectionId {
    type Err = SignalingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s
            .strip_prefix(CONNECTION_ID_PREFIX)
            .filter(|hex| {
                hex.len() == 16 && hex.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
            })
            .ok_or_else(|| SignalingError::InvalidConnectionId(s.to_string()))?;
        u64::from_str_radix(hex, 16)
            .map(Self)
            .map_err(|_| SignalingError::InvalidConnectionId(s.to_string()))
    }
}

impl Serialize for ConnectionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ConnectionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Hands out connection identities for one hub.
///
/// The sequence starts at a random point and only moves forward, so an id
/// is never handed out twice by the same allocator.
#[derive(Debug)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    pub fn new() -> Self {
        // upper half random, lower half counts up
        let base: u32 = rand::rng().random();
        Self::starting_at(u64::from(base) << 32)
    }

    pub fn starting_at(next: u64) -> Self {
        Self { next }
    }

    pub fn allocate(&mut self) -> ConnectionId {
        let id = ConnectionId(self.next);
        self.next = self.next.wrapping_add(1);
        id
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Client-supplied room name, trimmed and non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomName(Arc<str>);

impl RoomName {
    pub fn parse(raw: &str) -> Result<Self, SignalingError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.len() > MAX_ROOM_NAME_LEN {
            return Err(SignalingError::InvalidRoomName(raw.to_string()));
        }
        Ok(Self(Arc::from(trimmed)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Wrapper for outbound WebSocket messages using tungstenite's Utf8Bytes.
#[derive(Debug, Clone)]
pub struct OutboundMessage(Utf8Bytes);

impl OutboundMessage {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Get the inner Utf8Bytes for tungstenite Message::Text
    pub fn into_inner(self) -> Utf8Bytes {
        self.0
    }
}

impl From<String> for OutboundMessage {
    fn from(s: String) -> Self {
        Self(Utf8Bytes::from(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_display_is_fixed_width() {
        let id = ConnectionId::from_raw(0xab);
        assert_eq!(id.to_string(), "conn-00000000000000ab");
    }

    #[test]
    fn connection_id_parses_its_own_display() {
        let id = ConnectionId::from_raw(0x1234_5678_9abc_def0);
        let parsed: ConnectionId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn connection_id_rejects_garbage() {
        assert!("peer_1234".parse::<ConnectionId>().is_err());
        assert!("conn-xyz".parse::<ConnectionId>().is_err());
        assert!("conn-0000000000000000ff".parse::<ConnectionId>().is_err());
        assert!("".parse::<ConnectionId>().is_err());
        assert!("conn-+000000000000001".parse::<ConnectionId>().is_err());
        assert!("conn-00000000000000AB".parse::<ConnectionId>().is_err());
    }

    #[test]
    fn connection_id_serializes_as_string() {
        let id = ConnectionId::from_raw(1);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"conn-0000000000000001\"");
        let back: ConnectionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn allocator_never_repeats() {
        let mut ids = IdAllocator::new();
        let a = ids.allocate();
        let b = ids.allocate();
        let c = ids.allocate();
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_eq!(b.raw(), a.raw().wrapping_add(1));
    }

    #[test]
    fn allocator_wraps_instead_of_panicking() {
        let mut ids = IdAllocator::starting_at(u64::MAX);
        assert_eq!(ids.allocate().raw(), u64::MAX);
        assert_eq!(ids.allocate().raw(), 0);
    }

    #[test]
    fn room_name_is_trimmed() {
        let name = RoomName::parse("  lobby \n").unwrap();
        assert_eq!(name.as_str(), "lobby");
        assert_eq!(name, RoomName::parse("lobby").unwrap());
    }

    #[test]
    fn room_name_rejects_blank() {
        assert!(RoomName::parse("").is_err());
        assert!(RoomName::parse("   \t").is_err());
    }

    #[test]
    fn room_name_rejects_oversized() {
        let long = "r".repeat(MAX_ROOM_NAME_LEN + 1);
        assert!(RoomName::parse(&long).is_err());
        assert!(RoomName::parse(&long[1..]).is_ok());
    }

    #[test]
    fn outbound_message_keeps_text() {
        let msg = OutboundMessage::from("{\"type\":\"welcome\"}".to_string());
        assert_eq!(msg.as_str(), "{\"type\":\"welcome\"}");
    }
}
