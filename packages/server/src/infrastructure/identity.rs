//! In-memory identity provider backed by a bearer-token table.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::{AuthError, Identity, IdentityProvider, Username};

/// Token-table identity provider.
///
/// Tokens are minted at registration time and handed out of band (the
/// server binary logs them at startup). Credential issuance protocols are
/// out of scope; anything that can map a token to an identity can replace
/// this.
#[derive(Debug, Default)]
pub struct InMemoryIdentityProvider {
    tokens: Mutex<HashMap<String, Identity>>,
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user and mint a fresh bearer token for it.
    pub async fn register(&self, username: &str, is_active: bool) -> String {
        let token = Uuid::new_v4().to_string();
        self.insert(&token, username, is_active).await;
        token
    }

    /// Register a user under a caller-chosen token. Useful for seeding
    /// and tests; `register` is the normal path.
    pub async fn register_with_token(&self, token: &str, username: &str, is_active: bool) {
        self.insert(token, username, is_active).await;
    }

    async fn insert(&self, token: &str, username: &str, is_active: bool) {
        let identity = Identity {
            username: Username::new(username),
            is_active,
        };
        self.tokens.lock().await.insert(token.to_owned(), identity);
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn resolve_identity(&self, token: &str) -> Result<Identity, AuthError> {
        self.tokens
            .lock()
            .await
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidToken)
    }
}
