//! Error types shared by the faucet crates.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid private key")] InvalidPrivateKey,
    #[error("invalid public key")] InvalidPublicKey,
    #[error("signing failed: {0}")] Signing(String),
    #[error("witness index out of bounds: {index} >= {len}")] WitnessIndexOutOfBounds { index: usize, len: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid HRP")] InvalidHrp,
    #[error("invalid length")] InvalidLength,
    #[error("invalid checksum")] InvalidChecksum,
    #[error("invalid character: {0}")] InvalidCharacter(char),
    #[error("invalid padding bits")] InvalidPadding,
    #[error("unsupported payload format: {0:#04x}")] UnsupportedFormat(u8),
    #[error("unsupported code hash index: {0:#04x}")] UnsupportedCodeHashIndex(u8),
    #[error("unknown network: {0}")] UnknownNetwork(String),
    #[error("wrong network: expected {expected}, got {got}")] WrongNetwork { expected: String, got: String },
    #[error("missing separator")] MissingSeparator,
    #[error("mixed case")] MixedCase,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MoleculeError {
    #[error("hex: {0}")] Hex(String),
    #[error("expected {expected} bytes, got {got}")] Length { expected: usize, got: usize },
    #[error("unknown hash type: {0}")] UnknownHashType(String),
    #[error("unknown dep type: {0}")] UnknownDepType(String),
}

/// Failures reported by a chain collaborator (node RPC or a test double).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("rpc transport: {0}")] Transport(String),
    #[error("node rejected transaction: {0}")] Rejected(String),
    #[error("timed out")] Timeout,
    #[error("malformed response: {0}")] Malformed(String),
}

impl From<MoleculeError> for ChainError {
    fn from(e: MoleculeError) -> Self {
        ChainError::Malformed(e.to_string())
    }
}
