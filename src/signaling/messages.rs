use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::ConnectionId;

/// Messages sent from client to server
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Join a room by name, creating it if needed
    #[serde(rename = "join-room")]
    JoinRoom {
        #[serde(rename = "roomId")]
        room_id: String,
    },

    /// Leave a room previously joined
    #[serde(rename = "leave-room")]
    LeaveRoom {
        #[serde(rename = "roomId")]
        room_id: String,
    },

    #[serde(rename = "offer")]
    Offer {
        offer: Value,
        to: ConnectionId,
        #[serde(rename = "roomId", default)]
        room_id: Option<String>,
    },

    #[serde(rename = "answer")]
    Answer {
        answer: Value,
        to: ConnectionId,
        #[serde(rename = "roomId", default)]
        room_id: Option<String>,
    },

    #[serde(rename = "ice-candidate")]
    IceCandidate {
        candidate: Value,
        to: ConnectionId,
        #[serde(rename = "roomId", default)]
        room_id: Option<String>,
    },

    /// Chat line for everyone in the room
    #[serde(rename = "chat-message")]
    ChatMessage {
        username: String,
        message: String,
        #[serde(rename = "roomId")]
        room_id: String,
    },
}

/// Handshake message kinds relayed point to point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

impl SignalKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SignalKind::Offer => "offer",
            SignalKind::Answer => "answer",
            SignalKind::IceCandidate => "ice-candidate",
        }
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// First frame on every connection: the id the hub assigned to it
    #[serde(rename = "welcome")]
    Welcome { id: ConnectionId },

    /// Another connection joined a room this one is in
    #[serde(rename = "user-joined")]
    UserJoined { id: ConnectionId },

    #[serde(rename = "offer")]
    Offer { offer: Value, from: ConnectionId },

    #[serde(rename = "answer")]
    Answer { answer: Value, from: ConnectionId },

    #[serde(rename = "ice-candidate")]
    IceCandidate {
        candidate: Value,
        from: ConnectionId,
    },

    #[serde(rename = "chat-message")]
    ChatMessage { username: String, message: String },

    /// Another connection left a shared room or dropped entirely
    #[serde(rename = "user-disconnected")]
    UserDisconnected { id: ConnectionId },
}

impl ServerMessage {
    /// Wrap a relayed handshake payload, tagged with its sender.
    pub fn signal(kind: SignalKind, payload: Value, from: ConnectionId) -> Self {
        match kind {
            SignalKind::Offer => ServerMessage::Offer {
                offer: payload,
                from,
            },
            SignalKind::Answer => ServerMessage::Answer {
                answer: payload,
                from,
            },
            SignalKind::IceCandidate => ServerMessage::IceCandidate {
                candidate: payload,
                from,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PEER: &str = "conn-00000000000000aa";

    #[test]
    fn parse_join_room() {
        let json = r#"{"type": "join-room", "roomId": "r1"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        if let ClientMessage::JoinRoom { room_id } = msg {
            assert_eq!(room_id, "r1");
        } else {
            panic!("Expected JoinRoom");
        }
    }

    #[test]
    fn parse_leave_room() {
        let json = r#"{"type": "leave-room", "roomId": "r1"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, ClientMessage::LeaveRoom { room_id } if room_id == "r1"));
    }

    #[test]
    fn parse_offer_keeps_payload_opaque() {
        let json = format!(
            r#"{{"type": "offer", "offer": {{"type": "offer", "sdp": "v=0"}}, "to": "{PEER}", "roomId": "r1"}}"#
        );
        let msg: ClientMessage = serde_json::from_str(&json).unwrap();
        match msg {
            ClientMessage::Offer { offer, to, room_id } => {
                assert_eq!(offer, json!({"type": "offer", "sdp": "v=0"}));
                assert_eq!(to.to_string(), PEER);
                assert_eq!(room_id.as_deref(), Some("r1"));
            }
            other => panic!("Expected Offer, got {:?}", other),
        }
    }

    #[test]
    fn parse_ice_candidate_without_room() {
        let json = format!(
            r#"{{"type": "ice-candidate", "candidate": {{"candidate": "a=1"}}, "to": "{PEER}"}}"#
        );
        let msg: ClientMessage = serde_json::from_str(&json).unwrap();
        assert!(matches!(msg, ClientMessage::IceCandidate { room_id: None, .. }));
    }

    #[test]
    fn parse_chat_message() {
        let json = r#"{"type": "chat-message", "username": "ana", "message": "hi", "roomId": "r2"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::ChatMessage {
                username,
                message,
                room_id,
            } => {
                assert_eq!(username, "ana");
                assert_eq!(message, "hi");
                assert_eq!(room_id, "r2");
            }
            other => panic!("Expected ChatMessage, got {:?}", other),
        }
    }

    #[test]
    fn reject_answer_without_target() {
        let json = r#"{"type": "answer", "answer": {}, "roomId": "r1"}"#;
        assert!(serde_json::from_str::<ClientMessage>(json).is_err());
    }

    #[test]
    fn reject_offer_with_bad_target() {
        let json = r#"{"type": "offer", "offer": {}, "to": "somebody"}"#;
        assert!(serde_json::from_str::<ClientMessage>(json).is_err());
    }

    #[test]
    fn reject_unknown_type() {
        let json = r#"{"type": "create-room"}"#;
        assert!(serde_json::from_str::<ClientMessage>(json).is_err());
    }

    #[test]
    fn serialize_welcome() {
        let msg = ServerMessage::Welcome {
            id: ConnectionId::from_raw(0xaa),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value, json!({"type": "welcome", "id": PEER}));
    }

    #[test]
    fn serialize_user_disconnected() {
        let msg = ServerMessage::UserDisconnected {
            id: ConnectionId::from_raw(0xaa),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value, json!({"type": "user-disconnected", "id": PEER}));
    }

    #[test]
    fn signal_uses_kind_specific_key() {
        let from = ConnectionId::from_raw(0xaa);
        let candidate = json!({"candidate": "candidate:1 1 udp 1 10.0.0.1 5000 typ host"});
        let msg = ServerMessage::signal(SignalKind::IceCandidate, candidate.clone(), from);
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({"type": "ice-candidate", "candidate": candidate, "from": PEER})
        );

        let msg = ServerMessage::signal(SignalKind::Answer, json!({"sdp": "x"}), from);
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], SignalKind::Answer.as_str());
        assert_eq!(value["answer"], json!({"sdp": "x"}));
    }

    #[test]
    fn serialize_chat_message_has_no_room() {
        let msg = ServerMessage::ChatMessage {
            username: "ana".to_string(),
            message: "hello".to_string(),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({"type": "chat-message", "username": "ana", "message": "hello"})
        );
    }
}
