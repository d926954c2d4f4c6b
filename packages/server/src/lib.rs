//! agora chat server library.
//!
//! Room-based chat over WebSocket: clients join a room, get the recent
//! history replayed, and exchange messages and presence updates with the
//! other members in real time.

// connection core
pub mod broadcast;
pub mod registry;
pub mod session;

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;

// wire protocol
pub mod wire;
