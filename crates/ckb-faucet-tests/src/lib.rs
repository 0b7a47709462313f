//! Integration tests for the CKB faucet.
//!
//! The suites under `tests/` drive the full request pipeline (address check,
//! identity, lease, cooldown, wallet, record) against an in-memory chain.

pub mod helpers;
