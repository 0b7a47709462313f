//! Short-format CKB addresses.
//!
//! Addresses use Bech32 encoding ([BIP-173], checksum constant 1) with
//! human-readable prefixes:
//! - Mainnet: `ckb1...`
//! - Testnet: `ckt1...`
//!
//! The payload is `[format, code_hash_index, blake160(pubkey)]`, where format
//! `0x01` marks a short address and code hash index `0x00` selects the
//! secp256k1/blake160 system lock.
//!
//! [BIP-173]: https://github.com/bitcoin/bips/blob/master/bip-0173.mediawiki

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::constants::{BLAKE160_LEN, CODE_HASH_INDEX_SECP256K1_BLAKE160, SHORT_ADDRESS_FORMAT};
use crate::crypto::{PublicKey, PublicKeyHash, hash_of};
use crate::error::AddressError;

/// Bech32 checksum constant (BIP-173).
const BECH32_CONST: u32 = 1;

/// Bech32 character set for encoding 5-bit values.
const CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";

/// Decoded payload length: format byte, code hash index, 20-byte hash.
const SHORT_PAYLOAD_LEN: usize = 2 + BLAKE160_LEN;

/// Network identifier determining the address prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Mainnet (HRP: "ckb").
    Mainnet,
    /// Testnet (HRP: "ckt").
    Testnet,
}

impl Network {
    /// Human-readable prefix for this network.
    pub fn hrp(&self) -> &'static str {
        match self {
            Network::Mainnet => "ckb",
            Network::Testnet => "ckt",
        }
    }

    /// Look up network from a human-readable prefix.
    pub fn from_hrp(hrp: &str) -> Result<Self, AddressError> {
        match hrp {
            "ckb" => Ok(Network::Mainnet),
            "ckt" => Ok(Network::Testnet),
            _ => Err(AddressError::UnknownNetwork(hrp.to_string())),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet => write!(f, "testnet"),
        }
    }
}

impl FromStr for Network {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" | "ckb" => Ok(Network::Mainnet),
            "testnet" | "ckt" => Ok(Network::Testnet),
            other => Err(AddressError::UnknownNetwork(other.to_string())),
        }
    }
}

/// A short-format address locking cells to a secp256k1 public key hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Address {
    network: Network,
    pubkey_hash: PublicKeyHash,
}

impl Address {
    /// Create an address from a pubkey hash and network.
    pub fn from_pubkey_hash(pubkey_hash: PublicKeyHash, network: Network) -> Self {
        Self {
            network,
            pubkey_hash,
        }
    }

    /// Create an address from a public key and network.
    pub fn from_public_key(public_key: &PublicKey, network: Network) -> Self {
        Self::from_pubkey_hash(hash_of(public_key), network)
    }

    /// The blake160 pubkey hash encoded in this address.
    pub fn pubkey_hash(&self) -> PublicKeyHash {
        self.pubkey_hash
    }

    /// The network this address belongs to.
    pub fn network(&self) -> Network {
        self.network
    }

    /// Encode this address as a Bech32 string.
    pub fn encode(&self) -> String {
        let hrp = self.network.hrp();
        let mut raw = Vec::with_capacity(SHORT_PAYLOAD_LEN);
        raw.push(SHORT_ADDRESS_FORMAT);
        raw.push(CODE_HASH_INDEX_SECP256K1_BLAKE160);
        raw.extend_from_slice(self.pubkey_hash.as_bytes());
        let payload = convert_bits(&raw, 8, 5, true).unwrap_or_default();

        let checksum = bech32_create_checksum(hrp, &payload);

        let mut result = String::with_capacity(hrp.len() + 1 + payload.len() + 6);
        result.push_str(hrp);
        result.push('1');
        for &d in payload.iter().chain(checksum.iter()) {
            result.push(CHARSET[d as usize] as char);
        }
        result
    }

    /// Decode a Bech32 short address string.
    pub fn decode(s: &str) -> Result<Self, AddressError> {
        // Bech32 forbids mixing cases
        let has_lower = s.chars().any(|c| c.is_ascii_lowercase());
        let has_upper = s.chars().any(|c| c.is_ascii_uppercase());
        if has_lower && has_upper {
            return Err(AddressError::MixedCase);
        }

        let s_lower = s.to_ascii_lowercase();

        let sep_pos = s_lower.rfind('1').ok_or(AddressError::MissingSeparator)?;

        if sep_pos == 0 {
            return Err(AddressError::InvalidHrp);
        }
        // At least the 6 checksum chars after the separator
        if sep_pos + 7 > s_lower.len() {
            return Err(AddressError::InvalidLength);
        }

        let hrp = &s_lower[..sep_pos];
        let data_part = &s_lower[sep_pos + 1..];

        let mut data = Vec::with_capacity(data_part.len());
        for c in data_part.chars() {
            let pos = CHARSET
                .iter()
                .position(|&ch| ch as char == c)
                .ok_or(AddressError::InvalidCharacter(c))?;
            data.push(pos as u8);
        }

        if !bech32_verify_checksum(hrp, &data) {
            return Err(AddressError::InvalidChecksum);
        }

        let network = Network::from_hrp(hrp)?;

        let payload = &data[..data.len() - 6];
        let raw = convert_bits(payload, 5, 8, false).ok_or(AddressError::InvalidPadding)?;

        match raw.first() {
            None => return Err(AddressError::InvalidLength),
            Some(&SHORT_ADDRESS_FORMAT) => {}
            Some(&other) => return Err(AddressError::UnsupportedFormat(other)),
        }
        if raw.len() != SHORT_PAYLOAD_LEN {
            return Err(AddressError::InvalidLength);
        }
        if raw[1] != CODE_HASH_INDEX_SECP256K1_BLAKE160 {
            return Err(AddressError::UnsupportedCodeHashIndex(raw[1]));
        }

        let mut hash = [0u8; BLAKE160_LEN];
        hash.copy_from_slice(&raw[2..]);

        Ok(Self {
            network,
            pubkey_hash: PublicKeyHash(hash),
        })
    }

    /// Decode and require a specific network.
    pub fn decode_for(s: &str, expected: Network) -> Result<Self, AddressError> {
        let address = Self::decode(s)?;
        if address.network != expected {
            return Err(AddressError::WrongNetwork {
                expected: expected.hrp().to_string(),
                got: address.network.hrp().to_string(),
            });
        }
        Ok(address)
    }
}

/// Deterministic encoding of a pubkey hash for `network`.
pub fn address_for(pubkey_hash: PublicKeyHash, network: Network) -> String {
    Address::from_pubkey_hash(pubkey_hash, network).encode()
}

/// The pubkey hash behind `address`, or `None` if it does not decode.
pub fn public_key_hash_for(address: &str) -> Option<PublicKeyHash> {
    Address::decode(address).ok().map(|a| a.pubkey_hash)
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::decode(&s).map_err(serde::de::Error::custom)
    }
}

// --- Bech32 internals ---

fn bech32_polymod(values: &[u8]) -> u32 {
    const GEN: [u32; 5] = [0x3b6a57b2, 0x26508e6d, 0x1ea119fa, 0x3d4233dd, 0x2a1462b3];
    let mut chk: u32 = 1;
    for &v in values {
        let b = chk >> 25;
        chk = ((chk & 0x1ffffff) << 5) ^ (v as u32);
        for (i, &g) in GEN.iter().enumerate() {
            if (b >> i) & 1 != 0 {
                chk ^= g;
            }
        }
    }
    chk
}

fn bech32_hrp_expand(hrp: &str) -> Vec<u8> {
    let mut ret = Vec::with_capacity(hrp.len() * 2 + 1);
    ret.extend(hrp.bytes().map(|c| c >> 5));
    ret.push(0);
    ret.extend(hrp.bytes().map(|c| c & 31));
    ret
}

fn bech32_create_checksum(hrp: &str, data: &[u8]) -> Vec<u8> {
    let mut values = bech32_hrp_expand(hrp);
    values.extend_from_slice(data);
    values.extend_from_slice(&[0; 6]);
    let polymod = bech32_polymod(&values) ^ BECH32_CONST;
    (0..6)
        .map(|i| ((polymod >> (5 * (5 - i))) & 31) as u8)
        .collect()
}

fn bech32_verify_checksum(hrp: &str, data: &[u8]) -> bool {
    let mut values = bech32_hrp_expand(hrp);
    values.extend_from_slice(data);
    bech32_polymod(&values) == BECH32_CONST
}

/// Regroup bits between widths (8-bit bytes <-> 5-bit Bech32 groups).
fn convert_bits(data: &[u8], from_bits: u32, to_bits: u32, pad: bool) -> Option<Vec<u8>> {
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let mut ret = Vec::new();
    let maxv = (1u32 << to_bits) - 1;
    for &value in data {
        let v = value as u32;
        if v >> from_bits != 0 {
            return None;
        }
        acc = (acc << from_bits) | v;
        bits += from_bits;
        while bits >= to_bits {
            bits -= to_bits;
            ret.push(((acc >> bits) & maxv) as u8);
        }
    }
    if pad {
        if bits > 0 {
            ret.push(((acc << (to_bits - bits)) & maxv) as u8);
        }
    } else if bits >= from_bits || ((acc << (to_bits - bits)) & maxv) != 0 {
        return None;
    }
    Some(ret)
}
