//! Identity resolution.
//!
//! The faucet rate-limits by a stable account id from an external provider,
//! never by the bearer token itself: tokens can be reissued, ids cannot.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::IdentityError;

/// A resolved caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Provider-scoped stable id. The key for leases and cooldowns.
    pub id: String,
    pub email: Option<String>,
}

/// Resolves a bearer credential to an [`Identity`].
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, credential: &str) -> Result<Identity, IdentityError>;
}
