//! Per-identity request gating.
//!
//! An identity moves `Idle -> InFlight -> Idle`. [`FaucetGuard::admit`]
//! performs the transition atomically and hands back an [`InFlightLease`];
//! the identity returns to idle when the lease is dropped, whichever way the
//! request ends. Cooldown is not a stored state: it is read from the record
//! store on each request.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashSet;
use tracing::{debug, info};

use crate::error::FaucetError;
use crate::store::FaucetStore;

/// Owner of the in-flight set.
#[derive(Clone, Default)]
pub struct FaucetGuard {
    in_flight: Arc<DashSet<String>>,
}

/// Proof that an identity holds the in-flight slot. Releases it on drop.
#[must_use = "dropping the lease releases the identity immediately"]
pub struct InFlightLease {
    identity: String,
    in_flight: Arc<DashSet<String>>,
}

impl InFlightLease {
    pub fn identity(&self) -> &str {
        &self.identity
    }
}

impl Drop for InFlightLease {
    fn drop(&mut self) {
        self.in_flight.remove(&self.identity);
        debug!(identity = %self.identity, "in-flight lease released");
    }
}

impl std::fmt::Debug for InFlightLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InFlightLease").field("identity", &self.identity).finish()
    }
}

impl FaucetGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the in-flight slot for `identity`, failing fast if it is taken.
    pub fn admit(&self, identity: &str) -> Result<InFlightLease, FaucetError> {
        if !self.in_flight.insert(identity.to_string()) {
            info!(identity, "rejected: request already in flight");
            return Err(FaucetError::AlreadyInFlight);
        }
        Ok(InFlightLease {
            identity: identity.to_string(),
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    /// Give the slot back. Equivalent to dropping the lease.
    pub fn release(&self, lease: InFlightLease) {
        drop(lease);
    }

    pub fn is_in_flight(&self, identity: &str) -> bool {
        self.in_flight.contains(identity)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Reject `identity` if the store shows a payout within `window`.
    pub async fn check_cooldown(
        &self,
        store: &dyn FaucetStore,
        identity: &str,
        window: Duration,
    ) -> Result<(), FaucetError> {
        if store.has_received_within(identity, window).await? {
            info!(identity, window_secs = window.as_secs(), "rejected: cooldown");
            return Err(FaucetError::CooldownBlocked {
                window_secs: window.as_secs(),
            });
        }
        Ok(())
    }
}
