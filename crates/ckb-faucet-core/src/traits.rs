//! Trait interfaces between the faucet crates and the outside world.
//!
//! - [`ChainClient`]: cell queries and transaction submission against a CKB
//!   node (the binary implements it over JSON-RPC, tests use an in-memory mock)

use async_trait::async_trait;

use crate::error::ChainError;
use crate::types::{Cell, Hash256, SystemScriptInfo, Transaction};

/// Chain query and submission capability.
///
/// Cell listing and submission are the only suspension points in a payout.
/// Implementations do not retry; a timeout is reported as an error.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// System lock descriptor read from the genesis block.
    async fn system_script_info(&self) -> Result<SystemScriptInfo, ChainError>;

    /// All live cells locked by the script with hash `lock_hash`, in chain order.
    async fn list_unspent_cells(&self, lock_hash: &Hash256) -> Result<Vec<Cell>, ChainError>;

    /// Submit a signed transaction. Returns the hash the node accepted it under.
    async fn submit_transaction(&self, tx: &Transaction) -> Result<Hash256, ChainError>;

    /// Canonical transaction hash.
    ///
    /// Default implementation hashes the molecule encoding locally.
    async fn compute_transaction_hash(&self, tx: &Transaction) -> Result<Hash256, ChainError> {
        Ok(tx.hash())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OutPoint, Script, ScriptHashType};

    struct FixedChain {
        cells: Vec<Cell>,
    }

    #[async_trait]
    impl ChainClient for FixedChain {
        async fn system_script_info(&self) -> Result<SystemScriptInfo, ChainError> {
            Ok(SystemScriptInfo {
                code_hash: Hash256::ZERO,
                secp256k1_type_hash: Hash256([9; 32]),
                dep_out_point: OutPoint { tx_hash: Hash256([1; 32]), index: 0 },
            })
        }

        async fn list_unspent_cells(&self, lock_hash: &Hash256) -> Result<Vec<Cell>, ChainError> {
            Ok(self
                .cells
                .iter()
                .filter(|c| c.lock.hash() == *lock_hash)
                .cloned()
                .collect())
        }

        async fn submit_transaction(&self, tx: &Transaction) -> Result<Hash256, ChainError> {
            if tx.inputs.is_empty() {
                return Err(ChainError::Rejected("no inputs".into()));
            }
            Ok(tx.hash())
        }
    }

    fn lock(byte: u8) -> Script {
        Script { code_hash: Hash256([9; 32]), hash_type: ScriptHashType::Type, args: vec![byte; 20] }
    }

    #[tokio::test]
    async fn default_hash_matches_local() {
        let chain = FixedChain { cells: vec![] };
        let tx = Transaction::default();
        assert_eq!(chain.compute_transaction_hash(&tx).await.unwrap(), tx.hash());
    }

    #[tokio::test]
    async fn listing_filters_by_lock_hash() {
        let mine = lock(1);
        let theirs = lock(2);
        let chain = FixedChain {
            cells: vec![
                Cell { out_point: OutPoint { tx_hash: Hash256([3; 32]), index: 0 }, capacity: 10, lock: mine.clone() },
                Cell { out_point: OutPoint { tx_hash: Hash256([3; 32]), index: 1 }, capacity: 20, lock: theirs },
            ],
        };
        let cells = chain.list_unspent_cells(&mine.hash()).await.unwrap();
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].capacity, 10);
    }

    #[tokio::test]
    async fn trait_object_usable() {
        let chain: Box<dyn ChainClient> = Box::new(FixedChain { cells: vec![] });
        let info = chain.system_script_info().await.unwrap();
        assert_eq!(info.cell_dep().dep_type, crate::types::DepType::DepGroup);
        assert!(chain.submit_transaction(&Transaction::default()).await.is_err());
    }
}
