//! Core chain types: scripts, cells, transactions.
//!
//! All capacities are in shannons (1 CKB = 10^8 shannons). Hashes are the
//! 32-byte BLAKE2b digests defined in [`molecule`](crate::molecule).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::constants::{SIGNATURE_LEN, TX_SIZE_OVERHEAD, TX_VERSION};
use crate::error::MoleculeError;
use crate::molecule::{self, Molecule};

/// A 32-byte hash value (script hashes, transaction hashes, code hashes).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Parse a `0x`-prefixed (or bare) 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, MoleculeError> {
        let raw = decode_hex(s)?;
        let bytes: [u8; 32] = raw
            .as_slice()
            .try_into()
            .map_err(|_| MoleculeError::Length { expected: 32, got: raw.len() })?;
        Ok(Self(bytes))
    }

    /// `0x`-prefixed lowercase hex, the form the node's JSON-RPC uses.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Hash256 {
    type Err = MoleculeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for Hash256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Decode hex with an optional `0x` prefix.
pub fn decode_hex(s: &str) -> Result<Vec<u8>, MoleculeError> {
    let stripped = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(stripped).map_err(|e| MoleculeError::Hex(e.to_string()))
}

/// How a script's `code_hash` is matched against cell deps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScriptHashType {
    /// `code_hash` is the hash of the code cell's data.
    Data,
    /// `code_hash` is the hash of the code cell's type script.
    Type,
}

impl ScriptHashType {
    pub fn as_byte(&self) -> u8 {
        match self {
            ScriptHashType::Data => 0,
            ScriptHashType::Type => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptHashType::Data => "data",
            ScriptHashType::Type => "type",
        }
    }
}

impl FromStr for ScriptHashType {
    type Err = MoleculeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "data" => Ok(ScriptHashType::Data),
            "type" => Ok(ScriptHashType::Type),
            other => Err(MoleculeError::UnknownHashType(other.to_string())),
        }
    }
}

/// A spending condition (lock) or a type constraint.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Script {
    pub code_hash: Hash256,
    pub hash_type: ScriptHashType,
    pub args: Vec<u8>,
}

impl Script {
    /// Script hash: BLAKE2b over the molecule encoding. Cells are indexed
    /// by the hash of their lock.
    pub fn hash(&self) -> Hash256 {
        Hash256(molecule::blake2b_256(self.to_molecule()))
    }
}

/// Reference to an output of a committed transaction.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OutPoint {
    pub tx_hash: Hash256,
    pub index: u32,
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tx_hash, self.index)
    }
}

/// A transaction input spending a live cell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CellInput {
    pub since: u64,
    pub previous_output: OutPoint,
}

impl CellInput {
    pub fn new(previous_output: OutPoint) -> Self {
        Self { since: 0, previous_output }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DepType {
    Code,
    DepGroup,
}

impl DepType {
    pub fn as_byte(&self) -> u8 {
        match self {
            DepType::Code => 0,
            DepType::DepGroup => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DepType::Code => "code",
            DepType::DepGroup => "dep_group",
        }
    }
}

impl FromStr for DepType {
    type Err = MoleculeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "code" => Ok(DepType::Code),
            "dep_group" => Ok(DepType::DepGroup),
            other => Err(MoleculeError::UnknownDepType(other.to_string())),
        }
    }
}

/// Reference to on-chain code needed to run a script.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CellDep {
    pub out_point: OutPoint,
    pub dep_type: DepType,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CellOutput {
    pub capacity: u64,
    pub lock: Script,
    pub type_: Option<Script>,
}

/// A live cell as reported by the chain: where it is, what it holds, who owns it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cell {
    pub out_point: OutPoint,
    pub capacity: u64,
    pub lock: Script,
}

/// Chain constants read from the genesis block.
///
/// Loaded once at startup and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SystemScriptInfo {
    /// Data hash of the secp256k1/blake160 lock code.
    pub code_hash: Hash256,
    /// Type hash of the secp256k1/blake160 lock code; used with `hash_type: type`.
    pub secp256k1_type_hash: Hash256,
    /// Dep group bundling the lock code and the secp256k1 data cell.
    pub dep_out_point: OutPoint,
}

impl SystemScriptInfo {
    pub fn cell_dep(&self) -> CellDep {
        CellDep {
            out_point: self.dep_out_point.clone(),
            dep_type: DepType::DepGroup,
        }
    }
}

/// Witness layout used by the secp256k1 lock.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WitnessArgs {
    pub lock: Option<Vec<u8>>,
    pub input_type: Option<Vec<u8>>,
    pub output_type: Option<Vec<u8>>,
}

impl WitnessArgs {
    /// Placeholder whose `lock` reserves room for a recoverable signature.
    pub fn signature_placeholder() -> Self {
        Self {
            lock: Some(vec![0u8; SIGNATURE_LEN]),
            ..Self::default()
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_molecule()
    }
}

/// A CKB transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub version: u32,
    pub cell_deps: Vec<CellDep>,
    pub header_deps: Vec<Hash256>,
    pub inputs: Vec<CellInput>,
    pub outputs: Vec<CellOutput>,
    pub outputs_data: Vec<Vec<u8>>,
    pub witnesses: Vec<Vec<u8>>,
}

impl Default for Transaction {
    fn default() -> Self {
        Self {
            version: TX_VERSION,
            cell_deps: Vec::new(),
            header_deps: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            outputs_data: Vec::new(),
            witnesses: Vec::new(),
        }
    }
}

impl Transaction {
    /// Transaction hash: BLAKE2b over the molecule `RawTransaction`.
    ///
    /// Witnesses are not part of the raw transaction, so signing never
    /// changes the hash.
    pub fn hash(&self) -> Hash256 {
        Hash256(molecule::blake2b_256(molecule::raw_transaction(self)))
    }

    /// Bytes the transaction takes up in a block, witnesses included.
    ///
    /// The node charges fees on this size.
    pub fn serialized_size(&self) -> usize {
        self.to_molecule().len() + TX_SIZE_OVERHEAD
    }

    /// Sum of all output capacities. Returns None on overflow.
    pub fn total_output_capacity(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, out| acc.checked_add(out.capacity))
    }
}
