//! Molecule serialization and the `ckb-default-hash` BLAKE2b.
//!
//! The node hashes transactions and scripts over their molecule encoding, so
//! this module must match it byte for byte. Layouts used here:
//!
//! - `struct`: fields concatenated, fixed size
//! - `fixvec`: `u32` item count, then items
//! - `dynvec` / `table`: `u32` total size, one `u32` offset per item, then items
//! - `option`: empty when absent, the inner encoding otherwise
//!
//! All integers are little-endian.

use blake2b_simd::Params;

use crate::constants::{BLAKE160_LEN, BLAKE2B_PERSONALIZATION};
use crate::types::{
    CellDep, CellInput, CellOutput, Hash256, OutPoint, Script, Transaction, WitnessArgs,
};

/// Types with a canonical molecule encoding.
pub trait Molecule {
    fn to_molecule(&self) -> Vec<u8>;
}

/// Incremental `ckb-default-hash` hasher.
pub struct Blake2bHasher {
    state: blake2b_simd::State,
}

impl Blake2bHasher {
    pub fn new() -> Self {
        Self {
            state: Params::new()
                .hash_length(32)
                .personal(BLAKE2B_PERSONALIZATION)
                .to_state(),
        }
    }

    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        self.state.update(data);
        self
    }

    pub fn finalize(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(self.state.finalize().as_bytes());
        out
    }
}

impl Default for Blake2bHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot 32-byte BLAKE2b with the CKB personalization.
pub fn blake2b_256(data: impl AsRef<[u8]>) -> [u8; 32] {
    Blake2bHasher::new().update(data.as_ref()).finalize()
}

/// First 20 bytes of [`blake2b_256`]; the public key hash used in lock args.
pub fn blake160(data: impl AsRef<[u8]>) -> [u8; BLAKE160_LEN] {
    let full = blake2b_256(data);
    let mut out = [0u8; BLAKE160_LEN];
    out.copy_from_slice(&full[..BLAKE160_LEN]);
    out
}

// --- Layout primitives ---

fn u32_le(n: usize) -> [u8; 4] {
    (n as u32).to_le_bytes()
}

/// `fixvec<byte>`, the molecule `Bytes` type.
pub fn bytes(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + data.len());
    out.extend_from_slice(&u32_le(data.len()));
    out.extend_from_slice(data);
    out
}

fn fixvec(items: &[Vec<u8>]) -> Vec<u8> {
    let body: usize = items.iter().map(Vec::len).sum();
    let mut out = Vec::with_capacity(4 + body);
    out.extend_from_slice(&u32_le(items.len()));
    for item in items {
        out.extend_from_slice(item);
    }
    out
}

/// Header-with-offsets layout shared by `table` and `dynvec`.
fn table(fields: &[Vec<u8>]) -> Vec<u8> {
    let header = 4 * (fields.len() + 1);
    let body: usize = fields.iter().map(Vec::len).sum();
    let mut out = Vec::with_capacity(header + body);
    out.extend_from_slice(&u32_le(header + body));
    let mut offset = header;
    for field in fields {
        out.extend_from_slice(&u32_le(offset));
        offset += field.len();
    }
    for field in fields {
        out.extend_from_slice(field);
    }
    out
}

fn option(inner: Option<Vec<u8>>) -> Vec<u8> {
    inner.unwrap_or_default()
}

fn bytes_vec(items: &[Vec<u8>]) -> Vec<u8> {
    let encoded: Vec<Vec<u8>> = items.iter().map(|b| bytes(b)).collect();
    table(&encoded)
}

// --- Chain types ---

impl Molecule for Hash256 {
    fn to_molecule(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl Molecule for Script {
    fn to_molecule(&self) -> Vec<u8> {
        table(&[
            self.code_hash.to_molecule(),
            vec![self.hash_type.as_byte()],
            bytes(&self.args),
        ])
    }
}

impl Molecule for OutPoint {
    fn to_molecule(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(36);
        out.extend_from_slice(self.tx_hash.as_bytes());
        out.extend_from_slice(&self.index.to_le_bytes());
        out
    }
}

impl Molecule for CellInput {
    fn to_molecule(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(44);
        out.extend_from_slice(&self.since.to_le_bytes());
        out.extend_from_slice(&self.previous_output.to_molecule());
        out
    }
}

impl Molecule for CellDep {
    fn to_molecule(&self) -> Vec<u8> {
        let mut out = self.out_point.to_molecule();
        out.push(self.dep_type.as_byte());
        out
    }
}

impl Molecule for CellOutput {
    fn to_molecule(&self) -> Vec<u8> {
        table(&[
            self.capacity.to_le_bytes().to_vec(),
            self.lock.to_molecule(),
            option(self.type_.as_ref().map(Molecule::to_molecule)),
        ])
    }
}

impl Molecule for WitnessArgs {
    fn to_molecule(&self) -> Vec<u8> {
        table(&[
            option(self.lock.as_deref().map(bytes)),
            option(self.input_type.as_deref().map(bytes)),
            option(self.output_type.as_deref().map(bytes)),
        ])
    }
}

/// The `RawTransaction` encoding: everything except witnesses.
pub fn raw_transaction(tx: &Transaction) -> Vec<u8> {
    let cell_deps: Vec<Vec<u8>> = tx.cell_deps.iter().map(Molecule::to_molecule).collect();
    let header_deps: Vec<Vec<u8>> = tx.header_deps.iter().map(Molecule::to_molecule).collect();
    let inputs: Vec<Vec<u8>> = tx.inputs.iter().map(Molecule::to_molecule).collect();
    let outputs: Vec<Vec<u8>> = tx.outputs.iter().map(Molecule::to_molecule).collect();
    table(&[
        tx.version.to_le_bytes().to_vec(),
        fixvec(&cell_deps),
        fixvec(&header_deps),
        fixvec(&inputs),
        table(&outputs),
        bytes_vec(&tx.outputs_data),
    ])
}

impl Molecule for Transaction {
    fn to_molecule(&self) -> Vec<u8> {
        table(&[raw_transaction(self), bytes_vec(&self.witnesses)])
    }
}
