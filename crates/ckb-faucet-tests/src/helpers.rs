//! Shared test doubles and fixtures for the faucet integration tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use ckb_faucet_core::address::{Network, address_for};
use ckb_faucet_core::constants::SHANNONS_PER_CKB;
use ckb_faucet_core::crypto::{PrivateKey, PublicKeyHash, validate_private_key};
use ckb_faucet_core::error::ChainError;
use ckb_faucet_core::traits::ChainClient;
use ckb_faucet_core::types::{Cell, Hash256, OutPoint, Script, SystemScriptInfo, Transaction};
use ckb_faucet_service::{
    FaucetService, FaucetSettings, FaucetStore, Identity, IdentityError, IdentityResolver,
    MemoryStore,
};
use ckb_faucet_wallet::Wallet;

pub const CKB: u64 = SHANNONS_PER_CKB;

/// Key of the faucet wallet in every fixture. Its testnet address is
/// `ckt1qyqrdsefa43s6m882pcj53m4gdnj4k440axqswmu83`.
pub const FAUCET_KEY: &str = "e79f3207ea4980b7fed79956d5934249ceac4751a4fae01a0f7c4a96884bc4e3";

/// Testnet system script descriptor.
pub fn system_script_info() -> SystemScriptInfo {
    SystemScriptInfo {
        code_hash: hash("0x709f3fda12f561cfacf92273c57a98fede188a3f1a59b1f888d113f9cce08649"),
        secp256k1_type_hash: hash(
            "0x9bd7e06f3ecf4be0f2fcd2188b23f1b9fcc88e5d4b65a8637b17723bbda3cce8",
        ),
        dep_out_point: OutPoint {
            tx_hash: hash("0xf8de3bb47d055cdf460d93a2a6e1b05f7432f9777c8c474abf4eec1d4aee5d37"),
            index: 0,
        },
    }
}

fn hash(s: &str) -> Hash256 {
    Hash256::from_hex(s).unwrap()
}

pub fn faucet_key() -> PrivateKey {
    validate_private_key(FAUCET_KEY).unwrap()
}

/// Testnet address of a throwaway recipient.
pub fn recipient(seed: u8) -> String {
    address_for(PublicKeyHash([seed; 20]), Network::Testnet)
}

// ---------------------------------------------------------------------------
// MockChain
// ---------------------------------------------------------------------------

/// In-memory chain: submissions spend their inputs and create their outputs.
///
/// With [`MockChain::with_tx_pool`] accepted transactions wait in a pool
/// instead: their inputs stay listed and their outputs unlisted until
/// [`MockChain::commit`], and a second spend of a pooled input is refused.
pub struct MockChain {
    info: SystemScriptInfo,
    cells: Mutex<Vec<Cell>>,
    pool: Mutex<Vec<Transaction>>,
    use_pool: bool,
    submitted: Mutex<Vec<Transaction>>,
    submit_delay: Duration,
    reject: AtomicBool,
    funded: AtomicUsize,
    in_submit: AtomicUsize,
    max_in_submit: AtomicUsize,
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            info: system_script_info(),
            cells: Mutex::new(Vec::new()),
            pool: Mutex::new(Vec::new()),
            use_pool: false,
            submitted: Mutex::new(Vec::new()),
            submit_delay: Duration::ZERO,
            reject: AtomicBool::new(false),
            funded: AtomicUsize::new(0),
            in_submit: AtomicUsize::new(0),
            max_in_submit: AtomicUsize::new(0),
        }
    }

    /// Hold every submission for `delay` before applying it.
    pub fn with_submit_delay(mut self, delay: Duration) -> Self {
        self.submit_delay = delay;
        self
    }

    /// Hold accepted transactions in a pool until [`MockChain::commit`].
    pub fn with_tx_pool(mut self) -> Self {
        self.use_pool = true;
        self
    }

    /// Commit every pooled transaction in acceptance order.
    pub fn commit(&self) {
        let mut cells = self.cells.lock();
        for tx in self.pool.lock().drain(..) {
            Self::spend(&mut cells, &tx);
        }
    }

    /// Drop every pooled transaction without committing it.
    pub fn evict_pool(&self) {
        self.pool.lock().clear();
    }

    /// Transactions accepted but not yet committed.
    pub fn pooled(&self) -> Vec<Transaction> {
        self.pool.lock().clone()
    }

    /// Add one live cell per entry of `capacities` under `lock`.
    pub fn fund(&self, lock: &Script, capacities: &[u64]) {
        let mut cells = self.cells.lock();
        for &capacity in capacities {
            let n = self.funded.fetch_add(1, Ordering::SeqCst) as u64;
            let mut tx_hash = [0xf0u8; 32];
            tx_hash[..8].copy_from_slice(&n.to_le_bytes());
            cells.push(Cell {
                out_point: OutPoint { tx_hash: Hash256(tx_hash), index: 0 },
                capacity,
                lock: lock.clone(),
            });
        }
    }

    /// Make the node refuse every later submission.
    pub fn reject_submissions(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    pub fn submitted(&self) -> Vec<Transaction> {
        self.submitted.lock().clone()
    }

    pub fn live_cells(&self) -> Vec<Cell> {
        self.cells.lock().clone()
    }

    /// Highest number of submissions observed in progress at once.
    pub fn max_concurrent_submissions(&self) -> usize {
        self.max_in_submit.load(Ordering::SeqCst)
    }

    fn apply(&self, tx: &Transaction) -> Result<Hash256, ChainError> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(ChainError::Rejected("PoolRejectedTransaction".into()));
        }

        let mut cells = self.cells.lock();
        let mut pool = self.pool.lock();
        for input in &tx.inputs {
            let op = &input.previous_output;
            let live = cells.iter().any(|c| c.out_point == *op)
                || pool
                    .iter()
                    .any(|p| p.hash() == op.tx_hash && (op.index as usize) < p.outputs.len());
            if !live {
                return Err(ChainError::Rejected(format!("input already spent: {op}")));
            }
            if pool.iter().any(|p| p.inputs.iter().any(|i| i.previous_output == *op)) {
                return Err(ChainError::Rejected(format!("conflicts with pending tx: {op}")));
            }
        }

        if self.use_pool {
            pool.push(tx.clone());
        } else {
            Self::spend(&mut cells, tx);
        }
        self.submitted.lock().push(tx.clone());
        Ok(tx.hash())
    }

    fn spend(cells: &mut Vec<Cell>, tx: &Transaction) {
        cells.retain(|c| !tx.inputs.iter().any(|i| i.previous_output == c.out_point));
        let tx_hash = tx.hash();
        for (index, output) in tx.outputs.iter().enumerate() {
            cells.push(Cell {
                out_point: OutPoint { tx_hash, index: index as u32 },
                capacity: output.capacity,
                lock: output.lock.clone(),
            });
        }
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn system_script_info(&self) -> Result<SystemScriptInfo, ChainError> {
        Ok(self.info.clone())
    }

    async fn list_unspent_cells(&self, lock_hash: &Hash256) -> Result<Vec<Cell>, ChainError> {
        Ok(self
            .cells
            .lock()
            .iter()
            .filter(|c| c.lock.hash() == *lock_hash)
            .cloned()
            .collect())
    }

    async fn submit_transaction(&self, tx: &Transaction) -> Result<Hash256, ChainError> {
        let now = self.in_submit.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_submit.fetch_max(now, Ordering::SeqCst);
        if !self.submit_delay.is_zero() {
            tokio::time::sleep(self.submit_delay).await;
        }
        let result = self.apply(tx);
        self.in_submit.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

// ---------------------------------------------------------------------------
// StaticIdentity
// ---------------------------------------------------------------------------

/// Fixed token table. Unknown tokens are rejected.
#[derive(Default)]
pub struct StaticIdentity {
    tokens: HashMap<String, Identity>,
}

impl StaticIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, token: &str, id: &str) -> Self {
        self.tokens.insert(
            token.to_string(),
            Identity { id: id.to_string(), email: None },
        );
        self
    }
}

#[async_trait]
impl IdentityResolver for StaticIdentity {
    async fn resolve(&self, credential: &str) -> Result<Identity, IdentityError> {
        self.tokens
            .get(credential)
            .cloned()
            .ok_or_else(|| IdentityError::Rejected("Bad credentials".into()))
    }
}

// ---------------------------------------------------------------------------
// TestFaucet
// ---------------------------------------------------------------------------

/// A faucet wired to a [`MockChain`] and a [`MemoryStore`].
pub struct TestFaucet {
    pub service: Arc<FaucetService>,
    pub chain: Arc<MockChain>,
    pub store: Arc<MemoryStore>,
}

impl TestFaucet {
    /// Payout 5000 CKB, one-day cooldown. The wallet pays at least 1000
    /// shannons of fee at 1000 shannons per KB.
    pub fn settings() -> FaucetSettings {
        FaucetSettings {
            amount: 5_000 * CKB,
            cooldown: Duration::from_secs(86_400),
        }
    }

    /// Build a faucet whose wallet holds one cell per entry of `capacities`.
    pub fn new(chain: MockChain, identities: StaticIdentity, capacities: &[u64]) -> Self {
        let store = Arc::new(MemoryStore::new());
        let (service, chain) =
            Self::wire(chain, identities, capacities, Arc::clone(&store) as Arc<dyn FaucetStore>);
        Self { service, chain, store }
    }

    /// Like [`TestFaucet::new`] but records go to `store`; `self.store` stays empty.
    pub fn with_store(
        chain: MockChain,
        identities: StaticIdentity,
        capacities: &[u64],
        store: Arc<dyn FaucetStore>,
    ) -> Self {
        let (service, chain) = Self::wire(chain, identities, capacities, store);
        Self { service, chain, store: Arc::new(MemoryStore::new()) }
    }

    fn wire(
        chain: MockChain,
        identities: StaticIdentity,
        capacities: &[u64],
        store: Arc<dyn FaucetStore>,
    ) -> (Arc<FaucetService>, Arc<MockChain>) {
        let wallet = Wallet::new(faucet_key(), system_script_info(), Network::Testnet)
            .with_fee(1_000)
            .with_fee_rate(1_000);
        chain.fund(wallet.lock(), capacities);
        let chain = Arc::new(chain);
        let service = FaucetService::new(
            Arc::new(wallet),
            Arc::clone(&chain) as Arc<dyn ChainClient>,
            Arc::new(identities),
            store,
            Self::settings(),
        );
        (Arc::new(service), chain)
    }
}
