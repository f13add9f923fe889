// ============================
// relay-lib/src/lib.rs
// ============================
//! Core functionality for the chat relay WebSocket server: the
//! connection registry, room store, session manager, message relay
//! and presence broadcaster, plus the transport router wiring them up.

pub mod config;
pub mod emotes;
pub mod error;
pub mod metrics;
pub mod presence;
pub mod registry;
pub mod relay;
pub mod room;
pub mod session;
pub mod ws;

pub use relay_common as protocol;

use crate::config::Settings;
use crate::emotes::EmoteTable;
use crate::registry::ConnectionRegistry;
use crate::room::RoomMap;

/// Application state shared across all connections.
///
/// The registry and room map are the only shared mutable state; both
/// localize their own synchronization. The emote table is read-only
/// after startup.
pub struct AppState {
    /// Live connections and their sessions
    pub registry: ConnectionRegistry,
    /// Per-room actors
    pub rooms: RoomMap,
    /// Emote name -> file reference, loaded once
    pub emotes: EmoteTable,
    /// Settings loaded at startup
    pub settings: Settings,
}

impl AppState {
    pub fn new(settings: Settings, emotes: EmoteTable) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            rooms: RoomMap::new(),
            emotes,
            settings,
        }
    }
}
