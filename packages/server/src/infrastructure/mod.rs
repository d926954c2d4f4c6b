//! In-memory implementations of the collaborator contracts.

mod identity;
mod store;

pub use identity::InMemoryIdentityProvider;
pub use store::InMemoryChatStore;
