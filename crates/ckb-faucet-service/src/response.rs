//! Wire responses for the faucet endpoint.
//!
//! Every body the faucet returns is encoded here, in one place.

use ckb_faucet_core::types::Hash256;
use serde::Serialize;

use crate::error::FaucetError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FaucetResponse {
    Ok {
        #[serde(rename = "txHash")]
        tx_hash: Hash256,
    },
    Error {
        code: &'static str,
        error: String,
    },
}

impl FaucetResponse {
    pub fn from_result(result: &Result<Hash256, FaucetError>) -> Self {
        match result {
            Ok(tx_hash) => FaucetResponse::Ok { tx_hash: *tx_hash },
            Err(e) => e.into(),
        }
    }
}

impl From<&FaucetError> for FaucetResponse {
    fn from(e: &FaucetError) -> Self {
        FaucetResponse::Error {
            code: e.code(),
            error: e.to_string(),
        }
    }
}
