//! Protocol constants. All capacities in shannons (1 CKB = 10^8 shannons).

pub const SHANNONS_PER_CKB: u64 = 100_000_000;

/// Smallest capacity a secp256k1-locked output may carry.
pub const MIN_CELL_CAPACITY: u64 = 60 * SHANNONS_PER_CKB;

/// BLAKE2b personalization used by every CKB hash.
pub const BLAKE2B_PERSONALIZATION: &[u8; 16] = b"ckb-default-hash";

/// Length of a blake160 public key hash.
pub const BLAKE160_LEN: usize = 20;

/// Compressed secp256k1 public key length.
pub const PUBLIC_KEY_LEN: usize = 33;

/// Private key length in bytes.
pub const PRIVATE_KEY_LEN: usize = 32;

/// Recoverable signature: `r || s || recovery_id`.
pub const SIGNATURE_LEN: usize = 65;

/// Transaction version understood by the node.
pub const TX_VERSION: u32 = 0;

/// Short address payload format tag.
pub const SHORT_ADDRESS_FORMAT: u8 = 0x01;

/// Code hash index of the secp256k1/blake160 system lock in short addresses.
pub const CODE_HASH_INDEX_SECP256K1_BLAKE160: u8 = 0x00;

/// Block window used when paging `get_cells_by_lock_hash`.
pub const CELLS_PAGE_BLOCKS: u64 = 100;

/// Bytes a transaction occupies in a block beyond its own molecule encoding.
pub const TX_SIZE_OVERHEAD: usize = 4;

/// Minimum fee rate the node relays at, in shannons per 1000 bytes.
pub const MIN_FEE_RATE: u64 = 1_000;
