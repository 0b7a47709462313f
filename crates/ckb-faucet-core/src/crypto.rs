//! secp256k1 key material for the faucet wallet.
//!
//! Provides key validation from user-supplied hex, public key derivation,
//! CSPRNG key generation and recoverable ECDSA signing. Uses k256 for the
//! curve arithmetic and [`blake160`](crate::molecule::blake160) for the
//! public key hash carried in lock script args.
//!
//! # Signature format
//!
//! The secp256k1/blake160 lock expects 65 bytes: the compact `r || s`
//! signature (low-S, RFC 6979 nonces) followed by the one-byte recovery id.

use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::Zeroize;

use crate::constants::{BLAKE160_LEN, PRIVATE_KEY_LEN, PUBLIC_KEY_LEN, SIGNATURE_LEN};
use crate::error::CryptoError;
use crate::molecule::blake160;

/// A validated 32-byte secp256k1 secret.
///
/// Only constructible through [`validate_private_key`], [`generate_private_key`]
/// or [`PrivateKey::from_bytes`], all of which check the scalar range, so
/// public key derivation never fails. The inner key zeroizes on drop.
#[derive(Clone)]
pub struct PrivateKey {
    key: SigningKey,
}

impl PrivateKey {
    /// Accept raw bytes if they form a valid non-zero scalar below the curve order.
    pub fn from_bytes(bytes: [u8; PRIVATE_KEY_LEN]) -> Result<Self, CryptoError> {
        let key = SigningKey::from_slice(&bytes).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self { key })
    }

    /// Canonical form: 64 lowercase hex characters, no prefix.
    pub fn to_hex(&self) -> String {
        let mut bytes: [u8; PRIVATE_KEY_LEN] = self.key.to_bytes().into();
        let out = hex::encode(bytes);
        bytes.zeroize();
        out
    }

    /// Sign a 32-byte message hash, returning `r || s || recovery_id`.
    pub fn sign_recoverable(&self, message: &[u8; 32]) -> Result<[u8; SIGNATURE_LEN], CryptoError> {
        let (signature, recovery_id): (Signature, RecoveryId) = self
            .key
            .sign_prehash_recoverable(message)
            .map_err(|e| CryptoError::Signing(e.to_string()))?;
        let mut out = [0u8; SIGNATURE_LEN];
        out[..64].copy_from_slice(&signature.to_bytes());
        out[64] = recovery_id.to_byte();
        Ok(out)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

impl PartialEq for PrivateKey {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for PrivateKey {}

/// Compressed SEC1 public key (33 bytes).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey {
    bytes: [u8; PUBLIC_KEY_LEN],
}

impl PublicKey {
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_LEN]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.bytes
    }

    /// `0x`-prefixed hex, 68 characters.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.bytes))
    }

    /// blake160 of the compressed key; the lock script argument.
    pub fn pubkey_hash(&self) -> PublicKeyHash {
        hash_of(self)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.bytes))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        validate_public_key(&s).map_err(serde::de::Error::custom)
    }
}

/// 20-byte blake160 hash of a compressed public key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKeyHash(pub [u8; BLAKE160_LEN]);

impl PublicKeyHash {
    pub fn as_bytes(&self) -> &[u8; BLAKE160_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for PublicKeyHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

fn strip_0x(s: &str) -> &str {
    s.strip_prefix("0x").unwrap_or(s)
}

/// Validate a user-supplied private key: 64 hex chars, optionally `0x`-prefixed.
pub fn validate_private_key(s: &str) -> Result<PrivateKey, CryptoError> {
    let body = strip_0x(s);
    if body.len() != PRIVATE_KEY_LEN * 2 {
        return Err(CryptoError::InvalidPrivateKey);
    }
    let mut bytes = [0u8; PRIVATE_KEY_LEN];
    hex::decode_to_slice(body, &mut bytes).map_err(|_| CryptoError::InvalidPrivateKey)?;
    let key = PrivateKey::from_bytes(bytes);
    bytes.zeroize();
    key
}

/// Validate a user-supplied compressed public key: 66 hex chars, optionally `0x`-prefixed.
pub fn validate_public_key(s: &str) -> Result<PublicKey, CryptoError> {
    let body = strip_0x(s);
    if body.len() != PUBLIC_KEY_LEN * 2 {
        return Err(CryptoError::InvalidPublicKey);
    }
    let mut bytes = [0u8; PUBLIC_KEY_LEN];
    hex::decode_to_slice(body, &mut bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
    Ok(PublicKey::from_bytes(bytes))
}

/// Derive the compressed public key. Pure and deterministic.
pub fn derive_public_key(private_key: &PrivateKey) -> PublicKey {
    let encoded = private_key.key.verifying_key().to_encoded_point(true);
    let mut bytes = [0u8; PUBLIC_KEY_LEN];
    bytes.copy_from_slice(encoded.as_bytes());
    PublicKey::from_bytes(bytes)
}

/// Draw a fresh private key from the operating system CSPRNG.
pub fn generate_private_key() -> PrivateKey {
    PrivateKey {
        key: SigningKey::random(&mut rand::rngs::OsRng),
    }
}

/// blake160 of the compressed public key.
pub fn hash_of(public_key: &PublicKey) -> PublicKeyHash {
    PublicKeyHash(blake160(public_key.as_bytes()))
}

/// Recover the signer of `message` from a 65-byte recoverable signature.
pub fn recover_public_key(
    message: &[u8; 32],
    signature: &[u8; SIGNATURE_LEN],
) -> Result<PublicKey, CryptoError> {
    let sig = Signature::from_slice(&signature[..64]).map_err(|_| CryptoError::InvalidPublicKey)?;
    let recid = RecoveryId::from_byte(signature[64]).ok_or(CryptoError::InvalidPublicKey)?;
    let vk = VerifyingKey::recover_from_prehash(message, &sig, recid)
        .map_err(|_| CryptoError::InvalidPublicKey)?;
    let encoded = vk.to_encoded_point(true);
    let bytes: [u8; PUBLIC_KEY_LEN] = encoded
        .as_bytes()
        .try_into()
        .map_err(|_| CryptoError::InvalidPublicKey)?;
    Ok(PublicKey::from_bytes(bytes))
}
