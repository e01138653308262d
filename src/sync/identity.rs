use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::middleware::auth::decode_token;

/// Resolves who is calling right now.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_identity(&self) -> Option<Uuid>;
}

/// Identity backed by a bearer token.
///
/// The token is decoded on every call, so an expired or cleared token stops
/// resolving immediately.
pub struct BearerIdentity {
    secret: String,
    token: RwLock<Option<String>>,
}

impl BearerIdentity {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            token: RwLock::new(None),
        }
    }

    pub fn with_token(secret: impl Into<String>, token: impl Into<String>) -> Self {
        let identity = Self::new(secret);
        identity.set_token(token);
        identity
    }

    /// Accepts the raw token or the `Bearer <token>` form returned by login.
    pub fn set_token(&self, token: impl Into<String>) {
        let token = token.into();
        let token = token.strip_prefix("Bearer ").unwrap_or(&token).trim().to_string();
        *self.token.write() = Some(token);
    }

    pub fn clear(&self) {
        *self.token.write() = None;
    }
}

#[async_trait]
impl IdentityProvider for BearerIdentity {
    async fn current_identity(&self) -> Option<Uuid> {
        let token = self.token.read().clone()?;
        match decode_token(&token, &self.secret) {
            Ok(user) => Some(user.user_id),
            Err(err) => {
                tracing::debug!(error = %err, "bearer token did not resolve");
                None
            }
        }
    }
}
