//! Domain types and collaborator contracts.
//!
//! The connection core (registry, broadcast, session) depends only on the
//! narrow interfaces defined here. Concrete implementations live in
//! [`crate::infrastructure`] (in-memory) and [`crate::ui`] (axum
//! transport).

mod connection;
mod identity;
mod model;
mod store;
mod transport;

pub use connection::{
    CloseReason, ConnId, ConnectionHandle, DeliveryError, Outbound, OutboundReceiver,
    OutboundSender,
};
pub use identity::{AuthError, IdentityProvider};
pub use model::{Identity, MessageId, RoomId, RoomRecord, StoredMessage, Username};
pub use store::{MessageStore, RoomDirectory, StoreError};
pub use transport::{MessageStream, TransportError};

#[cfg(test)]
pub use identity::MockIdentityProvider;
#[cfg(test)]
pub use store::{MockMessageStore, MockRoomDirectory};
