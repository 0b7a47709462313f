//! Faucet error types.

use ckb_faucet_core::error::CryptoError;
use ckb_faucet_core::types::Hash256;
use ckb_faucet_wallet::WalletError;
use thiserror::Error;

/// Persistence failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store I/O: {0}")] Io(String),
    #[error("corrupt record: {0}")] Corrupt(String),
    #[error("cooldown window out of range")] WindowOutOfRange,
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

/// Identity resolution failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("missing credential")] Missing,
    #[error("credential rejected: {0}")] Rejected(String),
    #[error("identity provider unreachable: {0}")] Transport(String),
}

/// Everything a faucet request can fail with.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FaucetError {
    #[error("invalid private key")]
    InvalidPrivateKey,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// A payout for this identity is already running.
    #[error("a request for this identity is already in flight")]
    AlreadyInFlight,

    /// This identity was paid within the cooldown window.
    #[error("already received within the last {window_secs}s")]
    CooldownBlocked { window_secs: u64 },

    #[error("faucet is out of funds: have {have}, need {need}")]
    InsufficientFunds { have: u64, need: u64 },

    #[error("payout below minimum cell capacity: {capacity} < {min}")]
    TooLowCapacity { capacity: u64, min: u64 },

    #[error("send transaction failed: {0}")]
    SendTransactionFailed(String),

    /// Funds left the wallet but the audit record could not be written.
    #[error("payout {tx_hash} sent but not recorded")]
    PayoutNotRecorded { tx_hash: Hash256 },

    /// Chain query failure before anything was submitted.
    #[error("chain unavailable: {0}")]
    Chain(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Local failure while building or signing, before anything was sent.
    #[error("internal error: {0}")]
    Internal(String),
}

impl FaucetError {
    /// HTTP status the error maps to.
    pub fn http_status(&self) -> u16 {
        match self {
            FaucetError::InvalidPrivateKey
            | FaucetError::InvalidPublicKey
            | FaucetError::InvalidAddress(_) => 400,
            FaucetError::Unauthenticated(_) => 401,
            FaucetError::AlreadyInFlight => 409,
            FaucetError::CooldownBlocked { .. } => 429,
            FaucetError::InsufficientFunds { .. } => 503,
            FaucetError::SendTransactionFailed(_) | FaucetError::Chain(_) => 502,
            FaucetError::TooLowCapacity { .. }
            | FaucetError::PayoutNotRecorded { .. }
            | FaucetError::Store(_)
            | FaucetError::Internal(_) => 500,
        }
    }

    /// Refusals that rate limiting produces in normal operation.
    pub fn is_throttled(&self) -> bool {
        matches!(self, FaucetError::AlreadyInFlight | FaucetError::CooldownBlocked { .. })
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            FaucetError::InvalidPrivateKey => "invalid_private_key",
            FaucetError::InvalidPublicKey => "invalid_public_key",
            FaucetError::InvalidAddress(_) => "invalid_address",
            FaucetError::Unauthenticated(_) => "unauthenticated",
            FaucetError::AlreadyInFlight => "already_in_flight",
            FaucetError::CooldownBlocked { .. } => "cooldown_blocked",
            FaucetError::InsufficientFunds { .. } => "insufficient_funds",
            FaucetError::TooLowCapacity { .. } => "too_low_capacity",
            FaucetError::SendTransactionFailed(_) => "send_transaction_failed",
            FaucetError::PayoutNotRecorded { .. } => "payout_not_recorded",
            FaucetError::Chain(_) => "chain_unavailable",
            FaucetError::Store(_) => "store_failed",
            FaucetError::Internal(_) => "internal",
        }
    }
}

impl From<WalletError> for FaucetError {
    fn from(e: WalletError) -> Self {
        match e {
            WalletError::InsufficientFunds { have, need } => FaucetError::InsufficientFunds { have, need },
            WalletError::TooLowCapacity { capacity, min } => FaucetError::TooLowCapacity { capacity, min },
            WalletError::InvalidAddress(e) => FaucetError::InvalidAddress(e.to_string()),
            WalletError::SendTransactionFailed(msg) => FaucetError::SendTransactionFailed(msg),
            WalletError::Chain(e) => FaucetError::Chain(e.to_string()),
            WalletError::Crypto(e) => e.into(),
            e @ (WalletError::ZeroTarget | WalletError::Overflow) => FaucetError::Internal(e.to_string()),
        }
    }
}

impl From<CryptoError> for FaucetError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::InvalidPrivateKey => FaucetError::InvalidPrivateKey,
            CryptoError::InvalidPublicKey => FaucetError::InvalidPublicKey,
            e @ (CryptoError::Signing(_) | CryptoError::WitnessIndexOutOfBounds { .. }) => {
                FaucetError::Internal(e.to_string())
            }
        }
    }
}

impl From<IdentityError> for FaucetError {
    fn from(e: IdentityError) -> Self {
        FaucetError::Unauthenticated(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ckb_faucet_core::error::{AddressError, ChainError};

    #[test]
    fn display_cooldown() {
        let e = FaucetError::CooldownBlocked { window_secs: 86_400 };
        assert_eq!(e.to_string(), "already received within the last 86400s");
        assert_eq!(e.http_status(), 429);
        assert_eq!(e.code(), "cooldown_blocked");
    }

    #[test]
    fn wallet_errors_map_to_kinds() {
        assert_eq!(
            FaucetError::from(WalletError::InsufficientFunds { have: 1, need: 2 }),
            FaucetError::InsufficientFunds { have: 1, need: 2 }
        );
        assert_eq!(
            FaucetError::from(WalletError::InvalidAddress(AddressError::InvalidChecksum)),
            FaucetError::InvalidAddress("invalid checksum".into())
        );
        assert_eq!(
            FaucetError::from(WalletError::Chain(ChainError::Timeout)),
            FaucetError::Chain("timed out".into())
        );
    }

    #[test]
    fn local_build_failures_are_internal() {
        for e in [
            FaucetError::from(WalletError::Overflow),
            FaucetError::from(WalletError::ZeroTarget),
            FaucetError::from(WalletError::Crypto(CryptoError::Signing("bad nonce".into()))),
            FaucetError::from(CryptoError::WitnessIndexOutOfBounds { index: 0, len: 0 }),
        ] {
            assert!(matches!(e, FaucetError::Internal(_)), "{e:?}");
            assert_eq!(e.code(), "internal");
            assert_eq!(e.http_status(), 500);
        }
        assert_eq!(
            FaucetError::from(WalletError::Crypto(CryptoError::InvalidPrivateKey)),
            FaucetError::InvalidPrivateKey
        );
        assert_eq!(
            FaucetError::from(WalletError::SendTransactionFailed("pool full".into())).code(),
            "send_transaction_failed"
        );
    }

    #[test]
    fn only_rate_limits_are_throttled() {
        assert!(FaucetError::AlreadyInFlight.is_throttled());
        assert!(FaucetError::CooldownBlocked { window_secs: 60 }.is_throttled());
        assert!(!FaucetError::InsufficientFunds { have: 0, need: 1 }.is_throttled());
        assert!(!FaucetError::SendTransactionFailed("x".into()).is_throttled());
        assert!(!FaucetError::Unauthenticated("x".into()).is_throttled());
    }

    #[test]
    fn client_errors_are_4xx() {
        for e in [
            FaucetError::InvalidAddress("x".into()),
            FaucetError::Unauthenticated("x".into()),
            FaucetError::AlreadyInFlight,
            FaucetError::CooldownBlocked { window_secs: 1 },
        ] {
            assert!((400..500).contains(&e.http_status()), "{e:?}");
        }
    }

    #[test]
    fn unrecorded_payout_is_server_error() {
        let e = FaucetError::PayoutNotRecorded { tx_hash: Hash256([1; 32]) };
        assert_eq!(e.http_status(), 500);
        assert!(e.to_string().contains("0x0101"));
    }

    #[test]
    fn identity_errors_are_unauthenticated() {
        let e: FaucetError = IdentityError::Missing.into();
        assert_eq!(e, FaucetError::Unauthenticated("missing credential".into()));
    }
}
