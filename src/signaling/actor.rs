use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::hub::{Hub, Outbox};
use super::messages::SignalKind;
use super::types::{ConnectionId, SignalingError};

/// Commands sent to the hub actor
pub(crate) enum HubCommand {
    Connect {
        outbox: Outbox,
        reply: oneshot::Sender<ConnectionId>,
    },
    Join {
        conn: ConnectionId,
        room: String,
    },
    Leave {
        conn: ConnectionId,
        room: String,
    },
    Relay {
        kind: SignalKind,
        from: ConnectionId,
        to: ConnectionId,
        payload: Value,
    },
    Chat {
        from: ConnectionId,
        room: String,
        username: String,
        message: String,
    },
    Disconnect {
        conn: ConnectionId,
    },
    RoomMembers {
        room: String,
        reply: oneshot::Sender<Option<Vec<ConnectionId>>>,
    },
}

/// Owns the hub and applies commands one at a time, in arrival order.
pub(crate) async fn hub_actor(mut hub: Hub, mut rx: mpsc::Receiver<HubCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            HubCommand::Connect { outbox, reply } => {
                let id = hub.connect(outbox);
                if reply.send(id).is_err() {
                    // caller went away before learning its id
                    hub.disconnect(id);
                }
            }

            HubCommand::Join { conn, room } => {
                if let Err(e) = hub.join(conn, &room) {
                    warn!("Join from {} dropped: {}", conn, e);
                }
            }

            HubCommand::Leave { conn, room } => {
                if let Err(e) = hub.leave(conn, &room) {
                    warn!("Leave from {} dropped: {}", conn, e);
                }
            }

            HubCommand::Relay {
                kind,
                from,
                to,
                payload,
            } => {
                hub.relay(kind, from, to, payload);
            }

            HubCommand::Chat {
                from,
                room,
                username,
                message,
            } => {
                hub.broadcast_chat(from, &room, username, message);
            }

            HubCommand::Disconnect { conn } => {
                hub.disconnect(conn);
            }

            HubCommand::RoomMembers { room, reply } => {
                let _ = reply.send(hub.room_members(&room));
            }
        }
    }
    debug!("Hub actor stopped");
}

/// Handle to communicate with the hub actor
#[derive(Clone)]
pub struct HubHandle {
    pub(crate) tx: mpsc::Sender<HubCommand>,
}

impl HubHandle {
    /// Spawn a hub on the current runtime and return a handle to it.
    pub fn spawn(hub: Hub) -> Self {
        let (tx, rx) = mpsc::channel::<HubCommand>(1024);
        tokio::spawn(hub_actor(hub, rx));
        Self { tx }
    }

    /// Register a connection whose outbound frames go to `outbox`
    pub async fn connect(&self, outbox: Outbox) -> Result<ConnectionId, SignalingError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(HubCommand::Connect {
            outbox,
            reply: reply_tx,
        })
        .await?;
        reply_rx
            .await
            .map_err(|_| SignalingError::Internal("actor channel closed".to_string()))
    }

    pub async fn join_room(&self, conn: ConnectionId, room: String) -> Result<(), SignalingError> {
        self.send(HubCommand::Join { conn, room }).await
    }

    pub async fn leave_room(&self, conn: ConnectionId, room: String) -> Result<(), SignalingError> {
        self.send(HubCommand::Leave { conn, room }).await
    }

    pub async fn relay(
        &self,
        kind: SignalKind,
        from: ConnectionId,
        to: ConnectionId,
        payload: Value,
    ) -> Result<(), SignalingError> {
        self.send(HubCommand::Relay {
            kind,
            from,
            to,
            payload,
        })
        .await
    }

    pub async fn chat(
        &self,
        from: ConnectionId,
        room: String,
        username: String,
        message: String,
    ) -> Result<(), SignalingError> {
        self.send(HubCommand::Chat {
            from,
            room,
            username,
            message,
        })
        .await
    }

    pub async fn disconnect(&self, conn: ConnectionId) -> Result<(), SignalingError> {
        self.send(HubCommand::Disconnect { conn }).await
    }

    /// Current members of a room, or `None` if it does not exist
    pub async fn room_members(
        &self,
        room: impl Into<String>,
    ) -> Result<Option<Vec<ConnectionId>>, SignalingError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(HubCommand::RoomMembers {
            room: room.into(),
            reply: reply_tx,
        })
        .await?;
        reply_rx
            .await
            .map_err(|_| SignalingError::Internal("actor channel closed".to_string()))
    }

    async fn send(&self, cmd: HubCommand) -> Result<(), SignalingError> {
        self.tx
            .send(cmd)
            .await
            .map_err(|_| SignalingError::Internal("actor channel closed".to_string()))
    }
}
