//! Signaling relay for browser peer-to-peer calls.
//!
//! Clients hold one WebSocket each, join named rooms, learn about each
//! other through presence events, and trade session descriptions and
//! network candidates through the hub. Media never passes through here.

pub mod config;
pub mod signaling;
