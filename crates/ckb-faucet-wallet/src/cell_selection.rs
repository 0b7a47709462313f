//! In-order greedy cell selection.
//!
//! Cells are taken in the order the chain lists them and accumulation stops
//! as soon as the target is reached. No attempt is made to minimize the
//! number of inputs; the order is fixed so that building the same payout
//! twice over the same cells yields the same transaction.

use ckb_faucet_core::traits::ChainClient;
use ckb_faucet_core::types::{Cell, CellInput, Hash256};
use tracing::debug;

use crate::error::WalletError;

/// Result of cell selection: which cells to spend and what they hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellSelection {
    /// Inputs spending the selected cells, in selection order.
    pub inputs: Vec<CellInput>,
    /// The selected cells themselves.
    pub cells: Vec<Cell>,
    /// Sum of the selected capacities in shannons.
    pub total_capacity: u64,
}

/// Greedy selector over a listing of live cells.
pub struct CellSelector;

impl CellSelector {
    /// Select cells from `cells`, in order, until `target` is covered.
    ///
    /// Fails with [`WalletError::InsufficientFunds`] naming the total found
    /// when the listing runs out first.
    pub fn select(cells: &[Cell], target: u64) -> Result<CellSelection, WalletError> {
        if target == 0 {
            return Err(WalletError::ZeroTarget);
        }

        let mut selected = Vec::new();
        let mut total: u64 = 0;

        for cell in cells {
            selected.push(cell.clone());
            total = total.checked_add(cell.capacity).ok_or(WalletError::Overflow)?;

            if total >= target {
                return Ok(CellSelection {
                    inputs: selected
                        .iter()
                        .map(|c| CellInput::new(c.out_point.clone()))
                        .collect(),
                    cells: selected,
                    total_capacity: total,
                });
            }
        }

        Err(WalletError::InsufficientFunds {
            have: total,
            need: target,
        })
    }
}

/// Fetch the live cells under `lock_hash` and select enough to cover `target`.
pub async fn gather_inputs(
    chain: &dyn ChainClient,
    lock_hash: &Hash256,
    target: u64,
) -> Result<CellSelection, WalletError> {
    let cells = chain.list_unspent_cells(lock_hash).await?;
    let selection = CellSelector::select(&cells, target)?;
    debug!(
        available = cells.len(),
        selected = selection.cells.len(),
        total = selection.total_capacity,
        target,
        "cells selected"
    );
    Ok(selection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ckb_faucet_core::types::{OutPoint, Script, ScriptHashType};
    use proptest::prelude::*;

    fn make_cell(index: u32, capacity: u64) -> Cell {
        Cell {
            out_point: OutPoint { tx_hash: Hash256([0xAA; 32]), index },
            capacity,
            lock: Script {
                code_hash: Hash256([0x01; 32]),
                hash_type: ScriptHashType::Type,
                args: vec![0x02; 20],
            },
        }
    }

    fn cells(capacities: &[u64]) -> Vec<Cell> {
        capacities
            .iter()
            .enumerate()
            .map(|(i, c)| make_cell(i as u32, *c))
            .collect()
    }

    #[test]
    fn stops_as_soon_as_target_met() {
        let selection = CellSelector::select(&cells(&[100, 50, 30]), 120).unwrap();
        assert_eq!(selection.cells.len(), 2);
        assert_eq!(selection.cells[0].capacity, 100);
        assert_eq!(selection.cells[1].capacity, 50);
        assert_eq!(selection.total_capacity, 150);
        assert_eq!(selection.inputs[1].previous_output.index, 1);
    }

    #[test]
    fn exact_match_single_cell() {
        let selection = CellSelector::select(&cells(&[120, 50]), 120).unwrap();
        assert_eq!(selection.cells.len(), 1);
        assert_eq!(selection.total_capacity, 120);
    }

    #[test]
    fn listing_order_preserved_not_sorted() {
        // A smaller-first listing still spends the small cell first
        let selection = CellSelector::select(&cells(&[10, 500]), 100).unwrap();
        assert_eq!(selection.cells.len(), 2);
        assert_eq!(selection.cells[0].capacity, 10);
    }

    #[test]
    fn insufficient_funds_names_total() {
        let err = CellSelector::select(&cells(&[100, 50, 30]), 1000).unwrap_err();
        assert_eq!(err, WalletError::InsufficientFunds { have: 180, need: 1000 });
    }

    #[test]
    fn empty_listing_is_insufficient() {
        let err = CellSelector::select(&[], 1).unwrap_err();
        assert_eq!(err, WalletError::InsufficientFunds { have: 0, need: 1 });
    }

    #[test]
    fn zero_target_rejected() {
        assert_eq!(CellSelector::select(&cells(&[1]), 0).unwrap_err(), WalletError::ZeroTarget);
    }

    #[test]
    fn overflow_detected() {
        let selection = CellSelector::select(&cells(&[u64::MAX, 1]), u64::MAX).unwrap();
        assert_eq!(selection.total_capacity, u64::MAX);
        assert_eq!(
            CellSelector::select(&cells(&[u64::MAX - 1, 2]), u64::MAX).unwrap_err(),
            WalletError::Overflow
        );
    }

    #[test]
    fn selection_is_deterministic() {
        let listing = cells(&[7, 8, 9, 10]);
        assert_eq!(
            CellSelector::select(&listing, 20).unwrap(),
            CellSelector::select(&listing, 20).unwrap()
        );
    }

    proptest! {
        #[test]
        fn selects_shortest_covering_prefix(
            capacities in prop::collection::vec(1u64..1_000, 0..20),
            target in 1u64..20_000,
        ) {
            let listing = cells(&capacities);
            match CellSelector::select(&listing, target) {
                Ok(selection) => {
                    let n = selection.cells.len();
                    prop_assert_eq!(&selection.cells[..], &listing[..n]);
                    prop_assert_eq!(selection.inputs.len(), n);
                    prop_assert!(selection.total_capacity >= target);
                    prop_assert!(selection.total_capacity - capacities[n - 1] < target);
                }
                Err(err) => {
                    let have: u64 = capacities.iter().sum();
                    prop_assert!(have < target);
                    prop_assert_eq!(err, WalletError::InsufficientFunds { have, need: target });
                }
            }
        }
    }
}
