//! Execution JSON-RPC Client Adapter
//!
//! Implements `ExecutionChainClient` with `eth_getBlockByHash`,
//! `eth_getBlockByNumber` and `eth_call` pinned to a block hash (EIP-1898).

use crate::domain::{parse_block_hash, ExternalBlock, RestakingSyncError, SyncResult};
use crate::ports::outbound::{EndpointProvider, ExecutionChainClient};
use async_trait::async_trait;
use primitive_types::{H160, H256};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// JSON-RPC request object.
#[derive(Debug, Serialize)]
pub struct JsonRpcRequest {
    /// Protocol version.
    pub jsonrpc: &'static str,
    /// Method name.
    pub method: &'static str,
    /// Positional params.
    pub params: Value,
    /// Request id.
    pub id: u64,
}

impl JsonRpcRequest {
    /// Create a request.
    pub fn new(method: &'static str, params: Value, id: u64) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
            id,
        }
    }
}

/// JSON-RPC response object.
#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse {
    /// Result payload.
    #[serde(default)]
    pub result: Option<Value>,
    /// Error payload.
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Deserialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i64,
    /// Error message.
    pub message: String,
}

/// Block fields as returned by `eth_getBlockBy*`.
#[derive(Debug, Deserialize)]
pub struct RpcBlock {
    /// Block hash.
    pub hash: String,
    /// Block number (hex quantity).
    pub number: String,
    /// Timestamp (hex quantity).
    pub timestamp: String,
}

impl TryFrom<RpcBlock> for ExternalBlock {
    type Error = RestakingSyncError;

    fn try_from(block: RpcBlock) -> SyncResult<Self> {
        Ok(Self {
            hash: parse_block_hash(&block.hash)?,
            number: parse_quantity(&block.number)?,
            timestamp: parse_quantity(&block.timestamp)?,
        })
    }
}

/// Parse a hex quantity such as `0x1b4`.
pub fn parse_quantity(value: &str) -> SyncResult<u64> {
    let digits = value
        .strip_prefix("0x")
        .ok_or_else(|| RestakingSyncError::Decode(format!("quantity {value:?} lacks 0x prefix")))?;
    u64::from_str_radix(digits, 16)
        .map_err(|e| RestakingSyncError::Decode(format!("quantity {value:?}: {e}")))
}

/// Decode `0x`-prefixed hex data.
pub fn parse_data(value: &str) -> SyncResult<Vec<u8>> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(digits).map_err(|e| RestakingSyncError::Decode(format!("data {value:?}: {e}")))
}

/// `eth_call` params evaluated at a block hash.
pub fn call_params(to: H160, data: &[u8], block_hash: H256) -> Value {
    json!([
        { "to": format!("{to:#x}"), "data": format!("0x{}", hex::encode(data)) },
        { "blockHash": format!("{block_hash:#x}") }
    ])
}

/// HTTP JSON-RPC execution client.
pub struct EthRpcClient {
    client: Client,
    endpoints: Arc<dyn EndpointProvider>,
    request_id: AtomicU64,
}

impl EthRpcClient {
    /// Create a client drawing URLs from `endpoints`.
    pub fn new(endpoints: Arc<dyn EndpointProvider>, timeout: Duration) -> SyncResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoints,
            request_id: AtomicU64::new(1),
        })
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn send(&self, url: &str, request: &JsonRpcRequest) -> SyncResult<JsonRpcResponse> {
        let response = self.client.post(url).json(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RestakingSyncError::HttpStatus {
                endpoint: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Issue one call against one endpoint; JSON-RPC errors do not count
    /// against the endpoint's health.
    async fn call<R: DeserializeOwned>(
        &self,
        method: &'static str,
        params: Value,
    ) -> SyncResult<R> {
        let endpoint = self.endpoints.select()?;
        let request = JsonRpcRequest::new(method, params, self.next_id());
        debug!("[qc-18] {} via {}", method, endpoint);

        let response = match self.send(&endpoint, &request).await {
            Ok(response) => response,
            Err(e) => {
                self.endpoints.record_failure(&endpoint);
                return Err(e);
            }
        };
        self.endpoints.record_success(&endpoint);

        if let Some(error) = response.error {
            return Err(RestakingSyncError::JsonRpc {
                code: error.code,
                message: error.message,
            });
        }
        Ok(serde_json::from_value(response.result.unwrap_or(Value::Null))?)
    }
}

#[async_trait]
impl ExecutionChainClient for EthRpcClient {
    async fn block_by_hash(&self, hash: H256) -> SyncResult<ExternalBlock> {
        let hash_hex = format!("{hash:#x}");
        let block: Option<RpcBlock> = self
            .call("eth_getBlockByHash", json!([hash_hex, false]))
            .await?;
        block
            .ok_or(RestakingSyncError::BlockNotFound(hash_hex))?
            .try_into()
    }

    async fn block_by_number(&self, number: u64) -> SyncResult<ExternalBlock> {
        let block: Option<RpcBlock> = self
            .call("eth_getBlockByNumber", json!([format!("{number:#x}"), false]))
            .await?;
        block
            .ok_or_else(|| RestakingSyncError::BlockNotFound(number.to_string()))?
            .try_into()
    }

    async fn call_at_hash(
        &self,
        to: H160,
        data: Vec<u8>,
        block_hash: H256,
    ) -> SyncResult<Vec<u8>> {
        let result: String = self
            .call("eth_call", call_params(to, &data, block_hash))
            .await?;
        parse_data(&result)
    }
}
