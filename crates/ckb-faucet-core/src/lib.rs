//! # ckb-faucet-core
//! Foundation types, molecule hashing, keys and addresses for the CKB faucet.

pub mod address;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod molecule;
pub mod traits;
pub mod types;
