//! The faucet request pipeline.
//!
//! ```text
//! address -> identity -> admit (lease) -> cooldown -> send -> record -> lease dropped
//! ```
//!
//! Each step either passes its output on or returns early with `?`. The
//! lease is taken before the cooldown check so that a second request for the
//! same identity cannot slip in between a cooldown check and the first
//! request's record write.

use std::sync::Arc;
use std::time::Duration;

use ckb_faucet_core::traits::ChainClient;
use ckb_faucet_core::types::Hash256;
use ckb_faucet_wallet::{Wallet, target_lock_for};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::{FaucetError, IdentityError};
use crate::guard::FaucetGuard;
use crate::identity::IdentityResolver;
use crate::store::{FaucetRecord, FaucetStore};

/// Payout policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaucetSettings {
    /// Capacity paid per request, in shannons.
    pub amount: u64,
    /// Minimum time between two payouts to the same identity.
    pub cooldown: Duration,
}

/// Snapshot reported by the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FaucetStatus {
    pub address: String,
    pub network: String,
    pub balance: u64,
    pub payout: u64,
    pub cooldown_secs: u64,
    pub in_flight: usize,
}

/// Ties the wallet, the guard and the collaborators together.
pub struct FaucetService {
    wallet: Arc<Wallet>,
    chain: Arc<dyn ChainClient>,
    identities: Arc<dyn IdentityResolver>,
    store: Arc<dyn FaucetStore>,
    guard: FaucetGuard,
    settings: FaucetSettings,
}

impl FaucetService {
    pub fn new(
        wallet: Arc<Wallet>,
        chain: Arc<dyn ChainClient>,
        identities: Arc<dyn IdentityResolver>,
        store: Arc<dyn FaucetStore>,
        settings: FaucetSettings,
    ) -> Self {
        Self {
            wallet,
            chain,
            identities,
            store,
            guard: FaucetGuard::new(),
            settings,
        }
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    pub fn guard(&self) -> &FaucetGuard {
        &self.guard
    }

    pub fn settings(&self) -> &FaucetSettings {
        &self.settings
    }

    /// Pay the configured amount to `address` on behalf of `credential`'s owner.
    pub async fn request_payout(
        &self,
        address: &str,
        credential: Option<&str>,
    ) -> Result<Hash256, FaucetError> {
        let result = self.run_pipeline(address, credential).await;
        match &result {
            Ok(tx_hash) => info!(%tx_hash, address, "payout complete"),
            Err(e @ FaucetError::PayoutNotRecorded { .. }) => {
                error!(error = %e, address, "payout sent without audit record")
            }
            Err(e) if e.is_throttled() => info!(code = e.code(), address, "payout throttled"),
            Err(e) => warn!(error = %e, code = e.code(), address, "payout rejected"),
        }
        result
    }

    async fn run_pipeline(
        &self,
        address: &str,
        credential: Option<&str>,
    ) -> Result<Hash256, FaucetError> {
        let target_lock = target_lock_for(
            address,
            self.wallet.network(),
            self.wallet.system_script_info(),
        )?;

        let credential = credential
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or(IdentityError::Missing)?;
        let identity = self.identities.resolve(credential).await?;

        let _lease = self.guard.admit(&identity.id)?;
        self.guard
            .check_cooldown(self.store.as_ref(), &identity.id, self.settings.cooldown)
            .await?;

        info!(identity = %identity.id, address, amount = self.settings.amount, "payout admitted");
        let tx_hash = self
            .wallet
            .send_capacity(self.chain.as_ref(), &target_lock, self.settings.amount)
            .await?;

        self.store
            .record(FaucetRecord::now(identity.id.clone(), tx_hash))
            .await
            .map_err(|e| {
                error!(identity = %identity.id, %tx_hash, error = %e, "failed to record payout");
                FaucetError::PayoutNotRecorded { tx_hash }
            })?;

        Ok(tx_hash)
    }

    /// Wallet address, balance and payout policy.
    pub async fn status(&self) -> Result<FaucetStatus, FaucetError> {
        let balance = self.wallet.balance(self.chain.as_ref()).await?;
        Ok(FaucetStatus {
            address: self.wallet.address().encode(),
            network: self.wallet.network().to_string(),
            balance,
            payout: self.settings.amount,
            cooldown_secs: self.settings.cooldown.as_secs(),
            in_flight: self.guard.in_flight_count(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use ckb_faucet_core::address::{Network, address_for};
    use ckb_faucet_core::constants::SHANNONS_PER_CKB;
    use ckb_faucet_core::crypto::{PublicKeyHash, validate_private_key};
    use ckb_faucet_core::error::ChainError;
    use ckb_faucet_core::types::{Cell, OutPoint, SystemScriptInfo, Transaction};

    const CKB: u64 = SHANNONS_PER_CKB;

    struct OneCellChain {
        cell: Cell,
    }

    #[async_trait]
    impl ChainClient for OneCellChain {
        async fn system_script_info(&self) -> Result<SystemScriptInfo, ChainError> {
            Ok(info())
        }
        async fn list_unspent_cells(&self, _: &Hash256) -> Result<Vec<Cell>, ChainError> {
            Ok(vec![self.cell.clone()])
        }
        async fn submit_transaction(&self, tx: &Transaction) -> Result<Hash256, ChainError> {
            Ok(tx.hash())
        }
    }

    struct TokenIsId;

    #[async_trait]
    impl IdentityResolver for TokenIsId {
        async fn resolve(&self, credential: &str) -> Result<Identity, IdentityError> {
            if credential == "bad" {
                return Err(IdentityError::Rejected("401".into()));
            }
            Ok(Identity { id: credential.to_string(), email: None })
        }
    }

    fn info() -> SystemScriptInfo {
        SystemScriptInfo {
            code_hash: Hash256([0x11; 32]),
            secp256k1_type_hash: Hash256([0x9b; 32]),
            dep_out_point: OutPoint { tx_hash: Hash256([0x22; 32]), index: 0 },
        }
    }

    fn service(store: Arc<MemoryStore>) -> FaucetService {
        let key = validate_private_key(&"11".repeat(32)).unwrap();
        let wallet = Arc::new(Wallet::new(key, info(), Network::Testnet));
        let chain = Arc::new(OneCellChain {
            cell: Cell {
                out_point: OutPoint { tx_hash: Hash256([0x44; 32]), index: 0 },
                capacity: 100_000 * CKB,
                lock: wallet.lock().clone(),
            },
        });
        FaucetService::new(
            wallet,
            chain,
            Arc::new(TokenIsId),
            store,
            FaucetSettings { amount: 5_000 * CKB, cooldown: Duration::from_secs(86_400) },
        )
    }

    fn recipient() -> String {
        address_for(PublicKeyHash([0x5a; 20]), Network::Testnet)
    }

    #[tokio::test]
    async fn pays_and_records() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(Arc::clone(&store));
        let tx_hash = svc.request_payout(&recipient(), Some("alice")).await.unwrap();
        let records = store.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].identity, "alice");
        assert_eq!(records[0].tx_hash, tx_hash);
        assert_eq!(svc.guard().in_flight_count(), 0);
    }

    #[tokio::test]
    async fn second_request_in_window_blocked() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(Arc::clone(&store));
        svc.request_payout(&recipient(), Some("alice")).await.unwrap();
        let err = svc.request_payout(&recipient(), Some("alice")).await.unwrap_err();
        assert_eq!(err, FaucetError::CooldownBlocked { window_secs: 86_400 });
        assert_eq!(store.records().len(), 1);
        assert!(!svc.guard().is_in_flight("alice"));
    }

    #[tokio::test]
    async fn missing_credential_unauthenticated() {
        let svc = service(Arc::new(MemoryStore::new()));
        for credential in [None, Some(""), Some("   ")] {
            let err = svc.request_payout(&recipient(), credential).await.unwrap_err();
            assert_eq!(err, FaucetError::Unauthenticated("missing credential".into()));
        }
        let err = svc.request_payout(&recipient(), Some("bad")).await.unwrap_err();
        assert!(matches!(err, FaucetError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn invalid_address_checked_first() {
        let svc = service(Arc::new(MemoryStore::new()));
        let err = svc.request_payout("ckt1garbage", None).await.unwrap_err();
        assert!(matches!(err, FaucetError::InvalidAddress(_)));
        let mainnet = address_for(PublicKeyHash([0x5a; 20]), Network::Mainnet);
        let err = svc.request_payout(&mainnet, Some("alice")).await.unwrap_err();
        assert!(matches!(err, FaucetError::InvalidAddress(_)));
    }

    #[tokio::test]
    async fn status_reports_wallet() {
        let svc = service(Arc::new(MemoryStore::new()));
        let status = svc.status().await.unwrap();
        assert_eq!(status.balance, 100_000 * CKB);
        assert_eq!(status.payout, 5_000 * CKB);
        assert_eq!(status.network, "testnet");
        assert!(status.address.starts_with("ckt1qyq"));
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["cooldownSecs"], 86_400);
    }
}
