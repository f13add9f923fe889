// ==============
// relay-lib/src/metrics.rs

//! Central place for metric keys
pub const WS_CONNECTIONS: &str = "ws.connections";
pub const WS_ACTIVE: &str = "ws.active";
pub const ROOMS_CREATED: &str = "rooms.created";
pub const MESSAGES_ACCEPTED: &str = "messages.accepted";
pub const MESSAGES_REJECTED: &str = "messages.rejected";
