//! CKB node JSON-RPC client.
//!
//! Speaks the node's JSON forms (`0x`-prefixed hex numbers and bytes) through
//! small serde view types and converts them into the core chain types.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use jsonrpsee::core::ClientError;
use jsonrpsee::core::client::ClientT;
use jsonrpsee::core::params::ArrayParams;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use ckb_faucet_core::constants::CELLS_PAGE_BLOCKS;
use ckb_faucet_core::error::ChainError;
use ckb_faucet_core::molecule::blake2b_256;
use ckb_faucet_core::traits::ChainClient;
use ckb_faucet_core::types::{
    Cell, CellDep, CellInput, CellOutput, Hash256, OutPoint, Script, SystemScriptInfo,
    Transaction, decode_hex,
};

// ---------------------------------------------------------------------------
// Hex number helpers
// ---------------------------------------------------------------------------

fn hex_u64(value: u64) -> String {
    format!("{value:#x}")
}

fn parse_hex_u64(s: &str) -> Result<u64, ChainError> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| ChainError::Malformed(format!("number without 0x prefix: {s}")))?;
    u64::from_str_radix(digits, 16).map_err(|e| ChainError::Malformed(format!("{s}: {e}")))
}

fn parse_hex_u32(s: &str) -> Result<u32, ChainError> {
    let value = parse_hex_u64(s)?;
    u32::try_from(value).map_err(|_| ChainError::Malformed(format!("index out of range: {s}")))
}

fn hex_bytes(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

// ---------------------------------------------------------------------------
// JSON views
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonScript {
    pub code_hash: Hash256,
    pub hash_type: String,
    pub args: String,
}

impl JsonScript {
    fn into_script(self) -> Result<Script, ChainError> {
        Ok(Script {
            code_hash: self.code_hash,
            hash_type: self.hash_type.parse()?,
            args: decode_hex(&self.args)?,
        })
    }
}

impl From<&Script> for JsonScript {
    fn from(script: &Script) -> Self {
        Self {
            code_hash: script.code_hash,
            hash_type: script.hash_type.as_str().to_string(),
            args: hex_bytes(&script.args),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonOutPoint {
    pub tx_hash: Hash256,
    pub index: String,
}

impl JsonOutPoint {
    fn into_out_point(self) -> Result<OutPoint, ChainError> {
        Ok(OutPoint {
            tx_hash: self.tx_hash,
            index: parse_hex_u32(&self.index)?,
        })
    }
}

impl From<&OutPoint> for JsonOutPoint {
    fn from(out_point: &OutPoint) -> Self {
        Self {
            tx_hash: out_point.tx_hash,
            index: hex_u64(u64::from(out_point.index)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonCellOutput {
    pub capacity: String,
    pub lock: JsonScript,
    #[serde(rename = "type")]
    pub type_: Option<JsonScript>,
}

impl From<&CellOutput> for JsonCellOutput {
    fn from(output: &CellOutput) -> Self {
        Self {
            capacity: hex_u64(output.capacity),
            lock: (&output.lock).into(),
            type_: output.type_.as_ref().map(JsonScript::from),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonCellDep {
    pub out_point: JsonOutPoint,
    pub dep_type: String,
}

impl From<&CellDep> for JsonCellDep {
    fn from(dep: &CellDep) -> Self {
        Self {
            out_point: (&dep.out_point).into(),
            dep_type: dep.dep_type.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonCellInput {
    pub since: String,
    pub previous_output: JsonOutPoint,
}

impl From<&CellInput> for JsonCellInput {
    fn from(input: &CellInput) -> Self {
        Self {
            since: hex_u64(input.since),
            previous_output: (&input.previous_output).into(),
        }
    }
}

/// A transaction as sent to `send_transaction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JsonTransaction {
    pub version: String,
    pub cell_deps: Vec<JsonCellDep>,
    pub header_deps: Vec<Hash256>,
    pub inputs: Vec<JsonCellInput>,
    pub outputs: Vec<JsonCellOutput>,
    pub outputs_data: Vec<String>,
    pub witnesses: Vec<String>,
}

impl From<&Transaction> for JsonTransaction {
    fn from(tx: &Transaction) -> Self {
        Self {
            version: hex_u64(u64::from(tx.version)),
            cell_deps: tx.cell_deps.iter().map(JsonCellDep::from).collect(),
            header_deps: tx.header_deps.clone(),
            inputs: tx.inputs.iter().map(JsonCellInput::from).collect(),
            outputs: tx.outputs.iter().map(JsonCellOutput::from).collect(),
            outputs_data: tx.outputs_data.iter().map(|d| hex_bytes(d)).collect(),
            witnesses: tx.witnesses.iter().map(|w| hex_bytes(w)).collect(),
        }
    }
}

/// The parts of a block transaction the genesis lookup reads.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonBlockTransaction {
    pub hash: Hash256,
    pub outputs: Vec<JsonCellOutput>,
    pub outputs_data: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonBlock {
    pub transactions: Vec<JsonBlockTransaction>,
}

/// Entry of `get_cells_by_lock_hash`.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonLiveCell {
    pub capacity: String,
    pub lock: JsonScript,
    pub out_point: JsonOutPoint,
    #[serde(default)]
    pub output_data_len: Option<String>,
    #[serde(default, rename = "type")]
    pub type_: Option<JsonScript>,
}

impl JsonLiveCell {
    /// Plain capacity cells only: cells carrying data or a type script are skipped.
    fn is_plain(&self) -> bool {
        let empty_data = match &self.output_data_len {
            Some(len) => matches!(parse_hex_u64(len), Ok(0)),
            None => true,
        };
        empty_data && self.type_.is_none()
    }

    fn into_cell(self) -> Result<Cell, ChainError> {
        Ok(Cell {
            out_point: self.out_point.into_out_point()?,
            capacity: parse_hex_u64(&self.capacity)?,
            lock: self.lock.into_script()?,
        })
    }
}

// ---------------------------------------------------------------------------
// Genesis parsing
// ---------------------------------------------------------------------------

/// Locate the secp256k1/blake160 lock in the genesis block.
///
/// The lock code is output 1 of the cellbase: its data hash is the code hash
/// and its type script hash is the type hash. The second genesis transaction
/// holds the dep group at output 0.
pub fn system_script_info_from_genesis(block: JsonBlock) -> Result<SystemScriptInfo, ChainError> {
    let mut txs = block.transactions.into_iter();
    let cellbase = txs
        .next()
        .ok_or_else(|| ChainError::Malformed("genesis block has no cellbase".into()))?;
    let dep_group_tx = txs
        .next()
        .ok_or_else(|| ChainError::Malformed("genesis block has no dep group transaction".into()))?;

    let code = cellbase
        .outputs_data
        .get(1)
        .ok_or_else(|| ChainError::Malformed("genesis cellbase lacks lock code data".into()))?;
    let code_hash = Hash256(blake2b_256(decode_hex(code)?));

    let type_script = cellbase
        .outputs
        .get(1)
        .and_then(|output| output.type_.clone())
        .ok_or_else(|| ChainError::Malformed("genesis lock code cell has no type script".into()))?
        .into_script()?;

    Ok(SystemScriptInfo {
        code_hash,
        secp256k1_type_hash: type_script.hash(),
        dep_out_point: OutPoint {
            tx_hash: dep_group_tx.hash,
            index: 0,
        },
    })
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

fn map_client_error(method: &str, e: ClientError) -> ChainError {
    match e {
        ClientError::RequestTimeout => ChainError::Timeout,
        ClientError::Call(obj) if method == "send_transaction" => {
            ChainError::Rejected(obj.message().to_string())
        }
        ClientError::ParseError(e) => ChainError::Malformed(format!("{method}: {e}")),
        other => ChainError::Transport(format!("{method}: {other}")),
    }
}

/// [`ChainClient`] over a node's HTTP JSON-RPC endpoint.
pub struct RpcChainClient {
    client: HttpClient,
    endpoint: String,
}

impl RpcChainClient {
    pub fn new(endpoint: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = HttpClientBuilder::default()
            .request_timeout(timeout)
            .build(endpoint)
            .context("Failed to build RPC client")?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &'static str,
        params: ArrayParams,
    ) -> Result<T, ChainError> {
        self.client
            .request(method, params)
            .await
            .map_err(|e| map_client_error(method, e))
    }

    pub async fn tip_block_number(&self) -> Result<u64, ChainError> {
        let tip: String = self.call("get_tip_block_number", ArrayParams::new()).await?;
        parse_hex_u64(&tip)
    }
}

fn params<const N: usize>(values: [serde_json::Value; N]) -> Result<ArrayParams, ChainError> {
    let mut params = ArrayParams::new();
    for value in values {
        params
            .insert(value)
            .map_err(|e| ChainError::Malformed(e.to_string()))?;
    }
    Ok(params)
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn system_script_info(&self) -> Result<SystemScriptInfo, ChainError> {
        let block: Option<JsonBlock> = self
            .call("get_block_by_number", params([serde_json::json!("0x0")])?)
            .await?;
        let block = block.ok_or_else(|| ChainError::Malformed("node has no genesis block".into()))?;
        system_script_info_from_genesis(block)
    }

    async fn list_unspent_cells(&self, lock_hash: &Hash256) -> Result<Vec<Cell>, ChainError> {
        let tip = self.tip_block_number().await?;
        let mut cells = Vec::new();
        let mut from = 0u64;
        while from <= tip {
            let to = from.saturating_add(CELLS_PAGE_BLOCKS - 1).min(tip);
            let page: Vec<JsonLiveCell> = self
                .call(
                    "get_cells_by_lock_hash",
                    params([
                        serde_json::json!(lock_hash),
                        serde_json::json!(hex_u64(from)),
                        serde_json::json!(hex_u64(to)),
                    ])?,
                )
                .await?;
            for live in page {
                if live.is_plain() {
                    cells.push(live.into_cell()?);
                }
            }
            from = to + 1;
        }
        debug!(%lock_hash, tip, count = cells.len(), "listed live cells");
        Ok(cells)
    }

    async fn submit_transaction(&self, tx: &Transaction) -> Result<Hash256, ChainError> {
        let json = serde_json::to_value(JsonTransaction::from(tx))
            .map_err(|e| ChainError::Malformed(e.to_string()))?;
        self.call("send_transaction", params([json])?).await
    }
}
