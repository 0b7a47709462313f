//! Lock scripts for the secp256k1/blake160 system lock.

use ckb_faucet_core::address::{Address, Network};
use ckb_faucet_core::crypto::PublicKeyHash;
use ckb_faucet_core::types::{Script, ScriptHashType, SystemScriptInfo};

use crate::error::WalletError;

/// Lock script owned by `pubkey_hash`: the system lock matched by type hash.
pub fn lock_script_for(pubkey_hash: &PublicKeyHash, info: &SystemScriptInfo) -> Script {
    Script {
        code_hash: info.secp256k1_type_hash,
        hash_type: ScriptHashType::Type,
        args: pubkey_hash.as_bytes().to_vec(),
    }
}

/// Lock script for a payout destination.
///
/// Fails with [`WalletError::InvalidAddress`] if `address` does not decode or
/// belongs to a network other than `network`.
pub fn target_lock_for(
    address: &str,
    network: Network,
    info: &SystemScriptInfo,
) -> Result<Script, WalletError> {
    let decoded = Address::decode_for(address.trim(), network)?;
    Ok(lock_script_for(&decoded.pubkey_hash(), info))
}
