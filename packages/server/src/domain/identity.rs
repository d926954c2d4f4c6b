//! Identity collaborator contract.

use async_trait::async_trait;
use thiserror::Error;

use super::Identity;

/// Failure resolving a connection's credentials.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// The client supplied no token at all.
    #[error("authentication token missing")]
    MissingToken,
    /// The token is unknown or no longer valid.
    #[error("authentication token rejected")]
    InvalidToken,
    /// The token resolved to a deactivated account.
    #[error("user '{0}' is inactive")]
    InactiveUser(String),
}

/// Resolves credential tokens to authenticated identities.
///
/// Called once per connection while its session is authenticating. How
/// tokens are issued is outside the scope of this service; the in-memory
/// token table in [`crate::infrastructure`] is the default implementation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve a bearer token to the identity it was issued for.
    async fn resolve_identity(&self, token: &str) -> Result<Identity, AuthError>;
}
