//! WebSocket signaling hub: rooms, presence and handshake relay

mod actor;
mod hub;
mod messages;
mod registry;
mod server;
mod types;

pub use actor::HubHandle;
pub use hub::{Hub, Outbox};
pub use messages::{ClientMessage, ServerMessage, SignalKind};
pub use registry::RoomRegistry;
pub use server::SignalingServer;
pub use types::{ConnectionId, IdAllocator, OutboundMessage, RoomName, SignalingError};
