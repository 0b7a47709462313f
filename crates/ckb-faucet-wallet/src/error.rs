//! Wallet error types.

use ckb_faucet_core::error::{AddressError, ChainError, CryptoError};
use thiserror::Error;

/// Errors that can occur in wallet operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// The live cells under the wallet lock do not cover the request.
    #[error("insufficient funds: have {have}, need {need}")]
    InsufficientFunds {
        /// Capacity found, in shannons.
        have: u64,
        /// Capacity required, in shannons.
        need: u64,
    },

    /// Payout below the smallest capacity an output may hold.
    #[error("capacity too low: {capacity} < minimum {min}")]
    TooLowCapacity { capacity: u64, min: u64 },

    /// Selection target of zero.
    #[error("zero target capacity")]
    ZeroTarget,

    /// Destination address did not decode.
    #[error("invalid address: {0}")]
    InvalidAddress(#[from] AddressError),

    /// The node refused the transaction or could not be reached while submitting.
    #[error("send transaction failed: {0}")]
    SendTransactionFailed(String),

    /// Capacity arithmetic overflowed u64.
    #[error("capacity overflow")]
    Overflow,

    /// Cryptographic error from ckb-faucet-core.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Chain query failure (before submission).
    #[error("chain query: {0}")]
    Chain(#[from] ChainError),
}
