//! Transaction builder with sighash-all signing.
//!
//! Building a payout:
//! 1. Select wallet cells covering the payout plus fee
//! 2. Assemble outputs (payout, then change back to the wallet)
//! 3. Add one witness placeholder per lock group and the system cell dep
//! 4. Raise the fee to the size-based minimum and rebuild if it grew
//! 5. Hash the raw transaction and sign it with the wallet key

use std::collections::HashSet;

use ckb_faucet_core::constants::MIN_CELL_CAPACITY;
use ckb_faucet_core::crypto::PrivateKey;
use ckb_faucet_core::error::CryptoError;
use ckb_faucet_core::molecule::Blake2bHasher;
use ckb_faucet_core::traits::ChainClient;
use ckb_faucet_core::types::{
    Cell, CellOutput, Hash256, Script, SystemScriptInfo, Transaction, WitnessArgs,
};
use tracing::debug;

use crate::cell_selection::{CellSelection, CellSelector};
use crate::error::WalletError;
use crate::wallet::Wallet;

/// Default flat fee in shannons. The faucet configures its own.
pub const DEFAULT_FEE: u64 = 0;

/// Default fee rate in shannons per 1000 bytes; zero charges the flat fee only.
pub const DEFAULT_FEE_RATE: u64 = 0;

/// A transaction with placeholder witnesses and its committed hash.
#[derive(Debug, Clone)]
pub struct UnsignedTransaction {
    /// The transaction with zeroed signature room in witness 0.
    pub tx: Transaction,
    /// Hash of the raw transaction; unchanged by signing.
    pub hash: Hash256,
    /// The cell selection this transaction spends.
    pub selection: CellSelection,
}

/// Builder for payout transactions.
///
/// # Example
/// ```ignore
/// let tx = TransactionBuilder::new()
///     .set_fee(1_000)
///     .set_fee_rate(MIN_FEE_RATE)
///     .build(&chain, &target_lock, 5_000 * SHANNONS_PER_CKB, &wallet)
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    fee: u64,
    fee_rate: u64,
}

impl TransactionBuilder {
    /// Create a new transaction builder with the default fee and rate.
    pub fn new() -> Self {
        Self {
            fee: DEFAULT_FEE,
            fee_rate: DEFAULT_FEE_RATE,
        }
    }

    /// Override the flat fee (default: [`DEFAULT_FEE`]). Every transaction
    /// pays at least this much.
    pub fn set_fee(&mut self, fee: u64) -> &mut Self {
        self.fee = fee;
        self
    }

    /// Override the fee rate in shannons per 1000 bytes (default:
    /// [`DEFAULT_FEE_RATE`]).
    pub fn set_fee_rate(&mut self, shannons_per_kb: u64) -> &mut Self {
        self.fee_rate = shannons_per_kb;
        self
    }

    pub fn fee(&self) -> u64 {
        self.fee
    }

    pub fn fee_rate(&self) -> u64 {
        self.fee_rate
    }

    /// Fee owed by `tx`: its block size at the configured rate, rounded up,
    /// and never below the flat fee.
    pub fn fee_for(&self, tx: &Transaction) -> u64 {
        (tx.serialized_size() as u64)
            .saturating_mul(self.fee_rate)
            .div_ceil(1_000)
            .max(self.fee)
    }

    /// Build and sign a transaction paying `capacity` to `target_lock`.
    ///
    /// Spends the wallet's live cells as the chain lists them. See
    /// [`TransactionBuilder::build_from`] for the selection rules.
    pub async fn build(
        &self,
        chain: &dyn ChainClient,
        target_lock: &Script,
        capacity: u64,
        wallet: &Wallet,
    ) -> Result<Transaction, WalletError> {
        let cells = chain.list_unspent_cells(wallet.lock_hash()).await?;
        self.build_from(chain, &cells, target_lock, capacity, wallet).await
    }

    /// Build and sign a payout spending from `cells`, in their order.
    ///
    /// A change output that would fall below the minimum cell capacity is
    /// avoided by selecting again for an extra minimum cell; if the wallet
    /// cannot cover that, the build fails with `InsufficientFunds`. When the
    /// assembled transaction is too large for the fee it pays, it is rebuilt
    /// with the higher fee. The fee only grows between attempts, so this
    /// settles once the selection stops growing or funds run out.
    pub async fn build_from(
        &self,
        chain: &dyn ChainClient,
        cells: &[Cell],
        target_lock: &Script,
        capacity: u64,
        wallet: &Wallet,
    ) -> Result<Transaction, WalletError> {
        if capacity < MIN_CELL_CAPACITY {
            return Err(WalletError::TooLowCapacity {
                capacity,
                min: MIN_CELL_CAPACITY,
            });
        }

        let mut fee = self.fee;
        let mut unsigned = loop {
            let selection = Self::select(cells, capacity, fee)?;
            let unsigned = self.assemble_with_fee(
                selection,
                target_lock,
                capacity,
                fee,
                wallet.lock(),
                wallet.system_script_info(),
            )?;
            let required = self.fee_for(&unsigned.tx);
            if required <= fee {
                break unsigned;
            }
            debug!(fee, required, size = unsigned.tx.serialized_size(), "raising fee to size");
            fee = required;
        };
        unsigned.hash = chain.compute_transaction_hash(&unsigned.tx).await?;

        Self::sign(unsigned, wallet.private_key())
    }

    /// Select cells for `capacity + fee`, reselecting when the change would be dust.
    fn select(cells: &[Cell], capacity: u64, fee: u64) -> Result<CellSelection, WalletError> {
        let needed = capacity.checked_add(fee).ok_or(WalletError::Overflow)?;
        let selection = CellSelector::select(cells, needed)?;

        let change = selection.total_capacity - needed;
        if change > 0 && change < MIN_CELL_CAPACITY {
            let with_change = needed
                .checked_add(MIN_CELL_CAPACITY)
                .ok_or(WalletError::Overflow)?;
            debug!(change, with_change, "change below minimum cell, reselecting");
            return CellSelector::select(cells, with_change);
        }
        debug!(
            available = cells.len(),
            selected = selection.cells.len(),
            total = selection.total_capacity,
            needed,
            "cells selected"
        );
        Ok(selection)
    }

    /// Assemble the unsigned transaction for an already made selection,
    /// paying the flat fee.
    ///
    /// Pure: the same selection, capacity and locks always produce the same
    /// transaction.
    pub fn assemble(
        &self,
        selection: CellSelection,
        target_lock: &Script,
        capacity: u64,
        change_lock: &Script,
        info: &SystemScriptInfo,
    ) -> Result<UnsignedTransaction, WalletError> {
        self.assemble_with_fee(selection, target_lock, capacity, self.fee, change_lock, info)
    }

    fn assemble_with_fee(
        &self,
        selection: CellSelection,
        target_lock: &Script,
        capacity: u64,
        fee: u64,
        change_lock: &Script,
        info: &SystemScriptInfo,
    ) -> Result<UnsignedTransaction, WalletError> {
        let spent = capacity.checked_add(fee).ok_or(WalletError::Overflow)?;
        let change = selection
            .total_capacity
            .checked_sub(spent)
            .ok_or(WalletError::InsufficientFunds {
                have: selection.total_capacity,
                need: spent,
            })?;
        if change > 0 && change < MIN_CELL_CAPACITY {
            return Err(WalletError::InsufficientFunds {
                have: selection.total_capacity,
                need: spent + MIN_CELL_CAPACITY,
            });
        }

        let mut outputs = vec![CellOutput {
            capacity,
            lock: target_lock.clone(),
            type_: None,
        }];
        if change > 0 {
            outputs.push(CellOutput {
                capacity: change,
                lock: change_lock.clone(),
                type_: None,
            });
        }
        let outputs_data = vec![Vec::new(); outputs.len()];

        // One witness per lock group, in the order groups first appear
        let mut seen = HashSet::new();
        let witnesses = selection
            .cells
            .iter()
            .filter(|cell| seen.insert(cell.lock.hash()))
            .map(|_| WitnessArgs::signature_placeholder().to_bytes())
            .collect();

        let tx = Transaction {
            cell_deps: vec![info.cell_dep()],
            inputs: selection.inputs.clone(),
            outputs,
            outputs_data,
            witnesses,
            ..Transaction::default()
        };
        let hash = tx.hash();

        Ok(UnsignedTransaction {
            tx,
            hash,
            selection,
        })
    }

    /// Sign the wallet's lock group and splice the signature into witness 0.
    pub fn sign(unsigned: UnsignedTransaction, key: &PrivateKey) -> Result<Transaction, WalletError> {
        let mut tx = unsigned.tx;
        if tx.witnesses.is_empty() {
            return Err(CryptoError::WitnessIndexOutOfBounds { index: 0, len: 0 }.into());
        }

        let message = sighash_all_message(&unsigned.hash, &tx.witnesses);
        let signature = key.sign_recoverable(&message)?;

        tx.witnesses[0] = WitnessArgs {
            lock: Some(signature.to_vec()),
            ..WitnessArgs::default()
        }
        .to_bytes();

        Ok(tx)
    }
}

impl Default for TransactionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Signing message for a single-group transaction.
///
/// `blake2b(tx_hash || len(w0) || w0 || len(w1) || w1 ...)` with lengths as
/// u64 little-endian and `w0` holding the zeroed placeholder.
pub fn sighash_all_message(tx_hash: &Hash256, witnesses: &[Vec<u8>]) -> [u8; 32] {
    let mut hasher = Blake2bHasher::new();
    hasher.update(tx_hash.as_bytes());
    for witness in witnesses {
        hasher.update(&(witness.len() as u64).to_le_bytes());
        hasher.update(witness);
    }
    hasher.finalize()
}
