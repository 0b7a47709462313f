//! # ckb-faucet-wallet: custodial wallet for the faucet.
//!
//! Builds lock scripts from key material, greedily selects live cells,
//! assembles and signs transactions, and serializes submission. Accepted
//! payouts stay tracked until the chain shows them committed, so two payouts
//! never spend the same cells.
//!
//! # Modules
//!
//! - [`error`]: `WalletError` enum
//! - [`script`]: Lock scripts from pubkey hashes and addresses
//! - [`cell_selection`]: In-order greedy cell selection
//! - [`builder`]: Transaction builder with sighash-all signing and size-based fees
//! - [`pending`]: Accepted payouts the cell listing does not reflect yet
//! - [`wallet`]: Wallet façade with single-flight submission

pub mod builder;
pub mod cell_selection;
pub mod error;
pub mod pending;
pub mod script;
pub mod wallet;

pub use builder::TransactionBuilder;
pub use cell_selection::{CellSelection, CellSelector, gather_inputs};
pub use error::WalletError;
pub use pending::PendingSpends;
pub use script::{lock_script_for, target_lock_for};
pub use wallet::Wallet;
