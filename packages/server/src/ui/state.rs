//! Server state shared across handlers.

use std::sync::Arc;

use crate::{
    broadcast::BroadcastRouter,
    domain::{IdentityProvider, MessageStore, RoomDirectory},
    registry::PresenceRegistry,
};

/// Shared application state
pub struct AppState {
    /// Live-connection tracking for every room
    pub registry: Arc<PresenceRegistry>,
    /// Room-wide fan-out on top of the registry
    pub router: BroadcastRouter,
    /// Credential token resolution
    pub identity: Arc<dyn IdentityProvider>,
    /// Room lookup and management
    pub directory: Arc<dyn RoomDirectory>,
    /// Message history persistence
    pub store: Arc<dyn MessageStore>,
}
