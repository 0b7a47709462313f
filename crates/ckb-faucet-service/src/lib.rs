//! # ckb-faucet-service: the faucet request pipeline.
//!
//! Decides whether a request may be paid, pays it through the wallet and
//! records the payout. Framework-free: the HTTP layer lives in the binary.
//!
//! # Modules
//!
//! - [`error`]: `FaucetError`, `StoreError`, `IdentityError`
//! - [`guard`]: In-flight leases and the cooldown check
//! - [`identity`]: Identity resolution capability
//! - [`store`]: Append-only payout records (memory and JSON lines)
//! - [`response`]: Wire responses
//! - [`service`]: The sequential request pipeline

pub mod error;
pub mod guard;
pub mod identity;
pub mod response;
pub mod service;
pub mod store;

pub use error::{FaucetError, IdentityError, StoreError};
pub use guard::{FaucetGuard, InFlightLease};
pub use identity::{Identity, IdentityResolver};
pub use response::FaucetResponse;
pub use service::{FaucetService, FaucetSettings};
pub use store::{FaucetRecord, FaucetStore, JsonlStore, MemoryStore};
