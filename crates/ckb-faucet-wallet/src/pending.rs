//! Transactions the node has accepted but the committed cell listing does
//! not reflect yet.
//!
//! The node lists live cells as of the tip block, so a payout sitting in the
//! transaction pool still shows its inputs as unspent and its change as
//! missing. [`PendingSpends`] overlays the accepted-but-uncommitted
//! transactions onto each fresh listing: their inputs are hidden and their
//! wallet-owned outputs become spendable, which lets the next payout chain
//! off the previous one's change.

use std::collections::{HashSet, VecDeque};

use ckb_faucet_core::types::{Cell, Hash256, OutPoint, Script, Transaction};
use tracing::debug;

#[derive(Debug, Clone)]
struct PendingTx {
    hash: Hash256,
    inputs: Vec<OutPoint>,
    /// Outputs locked back to the wallet.
    outputs: Vec<Cell>,
}

/// Accepted wallet transactions in submission order.
#[derive(Debug, Default)]
pub struct PendingSpends {
    txs: VecDeque<PendingTx>,
}

impl PendingSpends {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember a transaction the node accepted under `tx_hash`.
    ///
    /// Outputs locked by `wallet_lock` are offered to later payouts until
    /// the listing shows the transaction as committed.
    pub fn track(&mut self, tx_hash: Hash256, tx: &Transaction, wallet_lock: &Script) {
        let outputs = tx
            .outputs
            .iter()
            .enumerate()
            .filter(|(_, output)| output.lock == *wallet_lock && output.type_.is_none())
            .map(|(index, output)| Cell {
                out_point: OutPoint { tx_hash, index: index as u32 },
                capacity: output.capacity,
                lock: output.lock.clone(),
            })
            .collect();
        self.txs.push_back(PendingTx {
            hash: tx_hash,
            inputs: tx.inputs.iter().map(|i| i.previous_output.clone()).collect(),
            outputs,
        });
    }

    /// Reconcile with a fresh listing of committed cells and return what a
    /// new payout may spend, listed cells first.
    ///
    /// Pending transactions are dropped from the front of the queue once
    /// none of their inputs is listed any more. A later transaction can only
    /// commit after the ones it chains from, so the queue is pruned as a
    /// prefix.
    pub fn spendable(&mut self, listed: Vec<Cell>) -> Vec<Cell> {
        let listed_points: HashSet<OutPoint> =
            listed.iter().map(|c| c.out_point.clone()).collect();

        while let Some(front) = self.txs.front() {
            if front.inputs.iter().any(|op| listed_points.contains(op)) {
                break;
            }
            debug!(tx_hash = %front.hash, "pending transaction committed");
            self.txs.pop_front();
        }

        let spent: HashSet<&OutPoint> = self.txs.iter().flat_map(|t| t.inputs.iter()).collect();
        let mut cells: Vec<Cell> = listed
            .into_iter()
            .filter(|c| !spent.contains(&c.out_point))
            .collect();
        cells.extend(
            self.txs
                .iter()
                .flat_map(|t| t.outputs.iter())
                .filter(|c| !spent.contains(&c.out_point) && !listed_points.contains(&c.out_point))
                .cloned(),
        );
        cells
    }

    /// Forget every pending transaction.
    pub fn clear(&mut self) {
        self.txs.clear();
    }

    /// Number of transactions still awaiting commitment.
    pub fn len(&self) -> usize {
        self.txs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }

    /// Whether a pending transaction spends `out_point`.
    pub fn is_spent(&self, out_point: &OutPoint) -> bool {
        self.txs.iter().any(|t| t.inputs.contains(out_point))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ckb_faucet_core::types::{CellInput, CellOutput, ScriptHashType};

    fn wallet_lock() -> Script {
        Script { code_hash: Hash256([0x9b; 32]), hash_type: ScriptHashType::Type, args: vec![0x01; 20] }
    }

    fn other_lock() -> Script {
        Script { args: vec![0x02; 20], ..wallet_lock() }
    }

    fn cell(tx: u8, index: u32, capacity: u64) -> Cell {
        Cell {
            out_point: OutPoint { tx_hash: Hash256([tx; 32]), index },
            capacity,
            lock: wallet_lock(),
        }
    }

    /// Spends `inputs`, pays 10 elsewhere and returns the rest as change.
    fn payout(inputs: &[&Cell]) -> Transaction {
        let total: u64 = inputs.iter().map(|c| c.capacity).sum();
        Transaction {
            inputs: inputs.iter().map(|c| CellInput::new(c.out_point.clone())).collect(),
            outputs: vec![
                CellOutput { capacity: 10, lock: other_lock(), type_: None },
                CellOutput { capacity: total - 10, lock: wallet_lock(), type_: None },
            ],
            ..Transaction::default()
        }
    }

    fn points(cells: &[Cell]) -> Vec<OutPoint> {
        cells.iter().map(|c| c.out_point.clone()).collect()
    }

    #[test]
    fn empty_passes_listing_through() {
        let mut pending = PendingSpends::new();
        let listed = vec![cell(1, 0, 100), cell(1, 1, 50)];
        assert_eq!(pending.spendable(listed.clone()), listed);
    }

    #[test]
    fn pending_inputs_hidden_and_change_offered() {
        let a = cell(1, 0, 100);
        let b = cell(1, 1, 50);
        let tx = payout(&[&a]);
        let mut pending = PendingSpends::new();
        pending.track(tx.hash(), &tx, &wallet_lock());

        // The listing has not caught up: both cells still show as live.
        let cells = pending.spendable(vec![a.clone(), b.clone()]);
        assert_eq!(
            points(&cells),
            vec![b.out_point.clone(), OutPoint { tx_hash: tx.hash(), index: 1 }]
        );
        assert_eq!(cells[1].capacity, 90);
        assert!(pending.is_spent(&a.out_point));
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn foreign_outputs_never_offered() {
        let a = cell(1, 0, 100);
        let tx = payout(&[&a]);
        let mut pending = PendingSpends::new();
        pending.track(tx.hash(), &tx, &wallet_lock());
        let cells = pending.spendable(vec![a]);
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].lock, wallet_lock());
    }

    #[test]
    fn chained_spends_hide_intermediate_change() {
        let a = cell(1, 0, 100);
        let first = payout(&[&a]);
        let mut pending = PendingSpends::new();
        pending.track(first.hash(), &first, &wallet_lock());

        let change = pending.spendable(vec![a.clone()]).remove(0);
        let second = payout(&[&change]);
        pending.track(second.hash(), &second, &wallet_lock());

        let cells = pending.spendable(vec![a]);
        assert_eq!(points(&cells), vec![OutPoint { tx_hash: second.hash(), index: 1 }]);
        assert_eq!(cells[0].capacity, 80);
        assert_eq!(pending.len(), 2);
    }

    #[test]
    fn committed_transactions_pruned_in_order() {
        let a = cell(1, 0, 100);
        let first = payout(&[&a]);
        let mut pending = PendingSpends::new();
        pending.track(first.hash(), &first, &wallet_lock());
        let change = pending.spendable(vec![a.clone()]).remove(0);
        let second = payout(&[&change]);
        pending.track(second.hash(), &second, &wallet_lock());

        // First committed: its input is gone and its change is listed.
        let cells = pending.spendable(vec![change.clone()]);
        assert_eq!(pending.len(), 1);
        assert_eq!(points(&cells), vec![OutPoint { tx_hash: second.hash(), index: 1 }]);

        // Second committed too.
        let final_change = cells[0].clone();
        let cells = pending.spendable(vec![final_change.clone()]);
        assert!(pending.is_empty());
        assert_eq!(cells, vec![final_change]);
    }

    #[test]
    fn listed_change_not_duplicated() {
        let a = cell(1, 0, 100);
        let b = cell(1, 1, 50);
        let tx = payout(&[&a, &b]);
        let mut pending = PendingSpends::new();
        pending.track(tx.hash(), &tx, &wallet_lock());

        // Node listed the new change before dropping one of the inputs.
        let change = Cell {
            out_point: OutPoint { tx_hash: tx.hash(), index: 1 },
            capacity: 140,
            lock: wallet_lock(),
        };
        let cells = pending.spendable(vec![b, change.clone()]);
        assert_eq!(cells, vec![change]);
    }

    #[test]
    fn clear_forgets_everything() {
        let a = cell(1, 0, 100);
        let tx = payout(&[&a]);
        let mut pending = PendingSpends::new();
        pending.track(tx.hash(), &tx, &wallet_lock());
        pending.clear();
        assert!(pending.is_empty());
        assert_eq!(pending.spendable(vec![a.clone()]), vec![a]);
    }
}
