//! Wallet composition: key, lock, transaction creation and submission.
//!
//! The [`Wallet`] owns the faucet's private key and everything derived from
//! it. Derived fields are computed once in [`Wallet::new`] and never change.
//! Every payout drawing on the wallet's cells goes through
//! [`Wallet::send_capacity`], which holds a FIFO async mutex from cell
//! selection until the node has answered. The same mutex guards the
//! [`PendingSpends`] of accepted transactions that have not been committed
//! yet, so a payout never selects a cell an earlier accepted payout spends,
//! even while the node still lists that cell as live.

use ckb_faucet_core::address::{Address, Network};
use ckb_faucet_core::crypto::{PrivateKey, PublicKey, derive_public_key};
use ckb_faucet_core::traits::ChainClient;
use ckb_faucet_core::types::{Hash256, Script, SystemScriptInfo};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::builder::TransactionBuilder;
use crate::error::WalletError;
use crate::pending::PendingSpends;
use crate::script::lock_script_for;

/// Custodial single-key wallet.
pub struct Wallet {
    private_key: PrivateKey,
    public_key: PublicKey,
    lock: Script,
    lock_hash: Hash256,
    info: SystemScriptInfo,
    network: Network,
    builder: TransactionBuilder,
    /// Held across selection, build and submission.
    pending: Mutex<PendingSpends>,
}

impl Wallet {
    /// Derive the public key, lock and lock hash for `private_key`.
    pub fn new(private_key: PrivateKey, info: SystemScriptInfo, network: Network) -> Self {
        let public_key = derive_public_key(&private_key);
        let lock = lock_script_for(&public_key.pubkey_hash(), &info);
        let lock_hash = lock.hash();
        Self {
            private_key,
            public_key,
            lock,
            lock_hash,
            info,
            network,
            builder: TransactionBuilder::new(),
            pending: Mutex::new(PendingSpends::new()),
        }
    }

    /// Set the flat fee every payout pays at least.
    pub fn with_fee(mut self, fee: u64) -> Self {
        self.builder.set_fee(fee);
        self
    }

    /// Set the fee rate in shannons per 1000 bytes of transaction.
    pub fn with_fee_rate(mut self, shannons_per_kb: u64) -> Self {
        self.builder.set_fee_rate(shannons_per_kb);
        self
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn lock(&self) -> &Script {
        &self.lock
    }

    pub fn lock_hash(&self) -> &Hash256 {
        &self.lock_hash
    }

    pub fn system_script_info(&self) -> &SystemScriptInfo {
        &self.info
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn fee(&self) -> u64 {
        self.builder.fee()
    }

    pub fn fee_rate(&self) -> u64 {
        self.builder.fee_rate()
    }

    /// Number of accepted payouts not yet seen as committed.
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// The wallet's own address on its network.
    pub fn address(&self) -> Address {
        Address::from_public_key(&self.public_key, self.network)
    }

    pub(crate) fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }

    /// Build, sign and submit a payout of `capacity` shannons to `target_lock`.
    ///
    /// Concurrent callers queue in arrival order. Cells spent by accepted
    /// but uncommitted payouts are skipped and their change is spent
    /// instead. Failures while submitting surface as
    /// [`WalletError::SendTransactionFailed`]; nothing is retried.
    pub async fn send_capacity(
        &self,
        chain: &dyn ChainClient,
        target_lock: &Script,
        capacity: u64,
    ) -> Result<Hash256, WalletError> {
        let mut pending = self.pending.lock().await;

        let listed = chain.list_unspent_cells(&self.lock_hash).await?;
        let cells = pending.spendable(listed);
        debug!(pending = pending.len(), spendable = cells.len(), "wallet cells reconciled");

        let tx = self
            .builder
            .build_from(chain, &cells, target_lock, capacity, self)
            .await?;
        let local_hash = tx.hash();
        info!(
            tx_hash = %local_hash,
            capacity,
            inputs = tx.inputs.len(),
            outputs = tx.outputs.len(),
            "submitting transaction"
        );

        let accepted = match chain.submit_transaction(&tx).await {
            Ok(hash) => hash,
            Err(e) => {
                warn!(tx_hash = %local_hash, error = %e, "send transaction failed");
                // A dropped parent makes every chained spend fail; start over
                // from the committed cells.
                if !pending.is_empty() {
                    warn!(pending = pending.len(), "forgetting pending transactions");
                    pending.clear();
                }
                return Err(WalletError::SendTransactionFailed(e.to_string()));
            }
        };

        if accepted != local_hash {
            warn!(local = %local_hash, node = %accepted, "node reported a different transaction hash");
        }
        pending.track(accepted, &tx, &self.lock);
        Ok(accepted)
    }

    /// Sum of the live capacity under the wallet lock, in shannons.
    ///
    /// Advisory only: payouts are gated by cell selection, not by this value.
    pub async fn balance(&self, chain: &dyn ChainClient) -> Result<u64, WalletError> {
        let cells = chain.list_unspent_cells(&self.lock_hash).await?;
        cells
            .iter()
            .try_fold(0u64, |acc, cell| acc.checked_add(cell.capacity))
            .ok_or(WalletError::Overflow)
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address().encode())
            .field("lock_hash", &self.lock_hash)
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ckb_faucet_core::constants::SHANNONS_PER_CKB;
    use ckb_faucet_core::crypto::validate_private_key;
    use ckb_faucet_core::error::ChainError;
    use ckb_faucet_core::types::{Cell, OutPoint, ScriptHashType, Transaction};
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const CKB: u64 = SHANNONS_PER_CKB;

    /// Chain whose listing shrinks as transactions are submitted, or with
    /// `lagging`, keeps listing spent cells as a node does before commit.
    struct SpendingChain {
        cells: std::sync::Mutex<Vec<Cell>>,
        reject: bool,
        lagging: bool,
        pool_spent: std::sync::Mutex<HashSet<OutPoint>>,
        in_submit: AtomicUsize,
        max_in_submit: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ChainClient for SpendingChain {
        async fn system_script_info(&self) -> Result<SystemScriptInfo, ChainError> {
            Ok(info())
        }

        async fn list_unspent_cells(&self, lock_hash: &Hash256) -> Result<Vec<Cell>, ChainError> {
            let cells = self.cells.lock().unwrap().clone();
            Ok(cells
                .into_iter()
                .filter(|c| c.lock.hash() == *lock_hash)
                .collect())
        }

        async fn submit_transaction(&self, tx: &Transaction) -> Result<Hash256, ChainError> {
            let now = self.in_submit.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_submit.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_submit.fetch_sub(1, Ordering::SeqCst);
            if self.reject {
                return Err(ChainError::Rejected("TransactionFailedToVerify".into()));
            }
            let spent: Vec<_> = tx.inputs.iter().map(|i| i.previous_output.clone()).collect();
            if self.lagging {
                let mut pool = self.pool_spent.lock().unwrap();
                if let Some(conflict) = spent.iter().find(|op| pool.contains(*op)) {
                    return Err(ChainError::Rejected(format!("conflicts with pending tx: {conflict}")));
                }
                pool.extend(spent);
                return Ok(tx.hash());
            }
            self.cells.lock().unwrap().retain(|c| !spent.contains(&c.out_point));
            Ok(tx.hash())
        }
    }

    fn info() -> SystemScriptInfo {
        SystemScriptInfo {
            code_hash: Hash256([0x11; 32]),
            secp256k1_type_hash: Hash256([0x9b; 32]),
            dep_out_point: OutPoint { tx_hash: Hash256([0x22; 32]), index: 0 },
        }
    }

    fn wallet() -> Wallet {
        let key = validate_private_key(
            "0xe79f3207ea4980b7fed79956d5934249ceac4751a4fae01a0f7c4a96884bc4e3",
        )
        .unwrap();
        Wallet::new(key, info(), Network::Testnet)
    }

    fn funded_chain(w: &Wallet, capacities: &[u64], reject: bool) -> SpendingChain {
        let cells = capacities
            .iter()
            .enumerate()
            .map(|(i, c)| Cell {
                out_point: OutPoint { tx_hash: Hash256([0x33; 32]), index: i as u32 },
                capacity: *c,
                lock: w.lock().clone(),
            })
            .collect();
        SpendingChain {
            cells: std::sync::Mutex::new(cells),
            reject,
            lagging: false,
            pool_spent: std::sync::Mutex::new(HashSet::new()),
            in_submit: AtomicUsize::new(0),
            max_in_submit: AtomicUsize::new(0),
        }
    }

    fn target() -> Script {
        Script { code_hash: Hash256([0x9b; 32]), hash_type: ScriptHashType::Type, args: vec![0xAB; 20] }
    }

    #[test]
    fn derived_fields() {
        let w = wallet();
        assert_eq!(w.address().encode(), "ckt1qyqrdsefa43s6m882pcj53m4gdnj4k440axqswmu83");
        assert_eq!(w.lock().args, w.public_key().pubkey_hash().as_bytes().to_vec());
        assert_eq!(*w.lock_hash(), w.lock().hash());
        assert_eq!(w.fee(), 0);
        assert_eq!(w.fee_rate(), 0);
        assert_eq!(wallet().with_fee(1_000).fee(), 1_000);
        assert_eq!(wallet().with_fee_rate(1_000).fee_rate(), 1_000);
    }

    #[test]
    fn debug_hides_key() {
        let debug = format!("{:?}", wallet());
        assert!(!debug.contains("e79f3207"));
        assert!(debug.contains("ckt1"));
    }

    #[tokio::test]
    async fn send_returns_accepted_hash() {
        let w = wallet();
        let chain = funded_chain(&w, &[10_000 * CKB], false);
        let hash = w.send_capacity(&chain, &target(), 5_000 * CKB).await.unwrap();
        assert_ne!(hash, Hash256::ZERO);
        assert_eq!(w.balance(&chain).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn rejection_surfaces_as_send_failed() {
        let w = wallet();
        let chain = funded_chain(&w, &[10_000 * CKB], true);
        let err = w.send_capacity(&chain, &target(), 5_000 * CKB).await.unwrap_err();
        assert_eq!(
            err,
            WalletError::SendTransactionFailed("node rejected transaction: TransactionFailedToVerify".into())
        );
    }

    #[tokio::test]
    async fn balance_sums_live_cells() {
        let w = wallet();
        let chain = funded_chain(&w, &[100 * CKB, 250 * CKB], false);
        assert_eq!(w.balance(&chain).await.unwrap(), 350 * CKB);
    }

    #[tokio::test]
    async fn concurrent_sends_are_serialized() {
        let w = Arc::new(wallet());
        let chain = Arc::new(funded_chain(&w, &[100 * CKB, 100 * CKB, 100 * CKB, 100 * CKB], false));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let w = Arc::clone(&w);
            let chain = Arc::clone(&chain);
            handles.push(tokio::spawn(async move {
                w.send_capacity(chain.as_ref(), &target(), 100 * CKB).await
            }));
        }

        let mut hashes = Vec::new();
        for h in handles {
            hashes.push(h.await.unwrap().unwrap());
        }
        hashes.sort();
        hashes.dedup();
        assert_eq!(hashes.len(), 4, "each payout spent distinct cells");
        assert_eq!(chain.max_in_submit.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn back_to_back_sends_skip_uncommitted_inputs() {
        let w = wallet();
        let mut chain = funded_chain(&w, &[10_000 * CKB, 10_000 * CKB], false);
        chain.lagging = true;

        let first = w.send_capacity(&chain, &target(), 5_000 * CKB).await.unwrap();
        let second = w.send_capacity(&chain, &target(), 5_000 * CKB).await.unwrap();
        assert_ne!(first, second);
        assert_eq!(w.pending_count().await, 2);

        // Both listed cells are spent; the third payout chains off the first change.
        let third = w.send_capacity(&chain, &target(), 5_000 * CKB).await;
        assert!(third.is_ok(), "{third:?}");
        let pool = chain.pool_spent.lock().unwrap();
        assert!(pool.contains(&OutPoint { tx_hash: first, index: 1 }));
        assert_eq!(pool.len(), 3);
    }
}
