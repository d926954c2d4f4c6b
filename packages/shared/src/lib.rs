//! Shared utilities for the agora chat workspace: logging setup for the
//! binaries and the clock abstraction behind message timestamps.

pub mod logger;
pub mod time;
