//! # Outbound Ports
//!
//! Traits for external dependencies: endpoint selection, the beacon and
//! execution endpoints, the module store and the staking keeper.

use crate::domain::{
    CachedBlockHash, ConsensusAddress, ExternalBlock, RestakingSyncError, SyncResult, Validator,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use primitive_types::{H160, H256, U256};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Endpoint selection capability.
///
/// Implementations decide which URL serves the next request and learn from
/// the reported outcome.
pub trait EndpointProvider: Send + Sync {
    /// Pick the endpoint for the next request.
    fn select(&self) -> SyncResult<String>;

    /// Report a successful request.
    fn record_success(&self, endpoint: &str);

    /// Report a failed request.
    fn record_failure(&self, endpoint: &str);
}

/// Execution payload header fields we read from a light-client header.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPayloadHeader {
    /// Execution block hash.
    pub block_hash: String,
}

/// Light-client header wrapper.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightClientHeader {
    /// Execution payload header.
    pub execution_payload_header: ExecutionPayloadHeader,
}

/// `data` object of a finality update.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalityUpdateData {
    /// Most recent attested (not yet finalized) header.
    pub attested_header: LightClientHeader,
    /// Finalized header.
    pub finalized_header: LightClientHeader,
}

/// Beacon `light_client/finality_update` response.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalityUpdate {
    /// Payload.
    pub data: FinalityUpdateData,
}

impl FinalityUpdate {
    /// Build an update carrying the given execution hashes.
    pub fn new(attested: impl Into<String>, finalized: impl Into<String>) -> Self {
        Self {
            data: FinalityUpdateData {
                attested_header: LightClientHeader {
                    execution_payload_header: ExecutionPayloadHeader {
                        block_hash: attested.into(),
                    },
                },
                finalized_header: LightClientHeader {
                    execution_payload_header: ExecutionPayloadHeader {
                        block_hash: finalized.into(),
                    },
                },
            },
        }
    }
}

/// Source of beacon finality updates.
#[async_trait]
pub trait FinalityUpdateSource: Send + Sync {
    /// Fetch the current finality update.
    async fn finality_update(&self) -> SyncResult<FinalityUpdate>;
}

/// Execution-layer chain client.
#[async_trait]
pub trait ExecutionChainClient: Send + Sync {
    /// Look up a block by hash. Unknown blocks yield `BlockNotFound`.
    async fn block_by_hash(&self, hash: H256) -> SyncResult<ExternalBlock>;

    /// Look up the canonical block at a number. Unknown yields `BlockNotFound`.
    async fn block_by_number(&self, number: u64) -> SyncResult<ExternalBlock>;

    /// Execute a read-only call against `to`, evaluated at `block_hash`.
    async fn call_at_hash(&self, to: H160, data: Vec<u8>, block_hash: H256)
        -> SyncResult<Vec<u8>>;
}

/// Module store: cached cycle outcomes and the accepted-time watermark.
pub trait BlockHashStore: Send + Sync {
    /// Persist the outcome of a cycle (overwrites any entry at that height).
    fn cache_block_hash(&self, entry: CachedBlockHash) -> SyncResult<()>;

    /// Outcome recorded for a height.
    fn cached_block_hash(&self, height: u64) -> SyncResult<Option<CachedBlockHash>>;

    /// Most recent outcome.
    fn latest_cached_block_hash(&self) -> SyncResult<Option<CachedBlockHash>>;

    /// Most recent accepted (non-sentinel) outcome.
    fn latest_accepted_block_hash(&self) -> SyncResult<Option<CachedBlockHash>>;

    /// Timestamp of the last accepted external block (0 if none).
    fn prev_block_time(&self) -> SyncResult<u64>;

    /// Persist the accepted-time watermark.
    fn set_prev_block_time(&self, time: u64) -> SyncResult<()>;

    /// Persist an accepted cycle and advance the watermark to `block_time`.
    ///
    /// Either both writes land or neither does.
    fn record_accepted(&self, entry: CachedBlockHash, block_time: u64) -> SyncResult<()>;

    /// Policy floor for external block timestamps.
    fn min_block_timestamp(&self) -> SyncResult<u64>;
}

/// Staking keeper slice used by the synchronizer.
pub trait StakingKeeper: Send + Sync {
    /// Look up a validator. Unknown addresses yield `ValidatorNotFound`.
    fn validator_by_cons_addr(&self, addr: &ConsensusAddress) -> SyncResult<Validator>;

    /// Overwrite a validator's tokens.
    fn set_validator_tokens(&self, validator: Validator, tokens: U256) -> SyncResult<()>;
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// Endpoint provider that always hands out the same URL.
#[derive(Clone, Debug)]
pub struct StaticEndpointProvider {
    /// The URL.
    pub url: String,
}

impl StaticEndpointProvider {
    /// Create a provider for one URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl EndpointProvider for StaticEndpointProvider {
    fn select(&self) -> SyncResult<String> {
        Ok(self.url.clone())
    }

    fn record_success(&self, _endpoint: &str) {}

    fn record_failure(&self, _endpoint: &str) {}
}

/// Mock beacon source.
#[derive(Debug, Default)]
pub struct MockFinalitySource {
    /// Update to return; `None` simulates an unreachable endpoint.
    pub update: Mutex<Option<FinalityUpdate>>,
}

impl MockFinalitySource {
    /// Source returning the given finalized (and attested) hash.
    pub fn with_hash(hash: impl Into<String>) -> Self {
        let hash = hash.into();
        Self {
            update: Mutex::new(Some(FinalityUpdate::new(hash.clone(), hash))),
        }
    }

    /// Source that always fails.
    pub fn failing() -> Self {
        Self::default()
    }

    /// Replace the returned update.
    pub fn set(&self, update: Option<FinalityUpdate>) {
        *self.update.lock() = update;
    }
}

#[async_trait]
impl FinalityUpdateSource for MockFinalitySource {
    async fn finality_update(&self) -> SyncResult<FinalityUpdate> {
        self.update
            .lock()
            .clone()
            .ok_or_else(|| RestakingSyncError::Transport("Mock failure".to_string()))
    }
}

/// Mock execution chain.
#[derive(Debug, Default)]
pub struct MockExecutionClient {
    /// Blocks reachable by hash.
    pub by_hash: Mutex<HashMap<H256, ExternalBlock>>,
    /// Canonical blocks by number.
    pub by_number: Mutex<HashMap<u64, ExternalBlock>>,
    /// Call results keyed by 4-byte selector.
    pub call_results: Mutex<HashMap<[u8; 4], Vec<u8>>>,
    /// Every call made: (to, data, block hash).
    pub calls: Mutex<Vec<(H160, Vec<u8>, H256)>>,
    /// Fail every request with a transport error.
    pub should_fail: bool,
    /// Error returned by the next by-number lookup only.
    pub by_number_failure: Mutex<Option<RestakingSyncError>>,
}

impl MockExecutionClient {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a canonical block (reachable by hash and number).
    pub fn with_block(self, block: ExternalBlock) -> Self {
        self.insert_block(block);
        self
    }

    /// Add a canonical block.
    pub fn insert_block(&self, block: ExternalBlock) {
        self.by_number.lock().insert(block.number, block.clone());
        self.by_hash.lock().insert(block.hash, block);
    }

    /// Replace the canonical block at `number` without forgetting the old hash.
    pub fn reorg(&self, replacement: ExternalBlock) {
        self.by_number.lock().insert(replacement.number, replacement);
    }

    /// Make the next `block_by_number` fail with `error`.
    pub fn fail_next_by_number(&self, error: RestakingSyncError) {
        *self.by_number_failure.lock() = Some(error);
    }

    /// Program a call result for a selector.
    pub fn with_call_result(self, selector: [u8; 4], result: Vec<u8>) -> Self {
        self.call_results.lock().insert(selector, result);
        self
    }

    fn check_failure(&self) -> SyncResult<()> {
        if self.should_fail {
            return Err(RestakingSyncError::Transport("Mock failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ExecutionChainClient for MockExecutionClient {
    async fn block_by_hash(&self, hash: H256) -> SyncResult<ExternalBlock> {
        self.check_failure()?;
        self.by_hash
            .lock()
            .get(&hash)
            .cloned()
            .ok_or_else(|| RestakingSyncError::BlockNotFound(format!("{hash:#x}")))
    }

    async fn block_by_number(&self, number: u64) -> SyncResult<ExternalBlock> {
        self.check_failure()?;
        if let Some(error) = self.by_number_failure.lock().take() {
            return Err(error);
        }
        self.by_number
            .lock()
            .get(&number)
            .cloned()
            .ok_or_else(|| RestakingSyncError::BlockNotFound(number.to_string()))
    }

    async fn call_at_hash(
        &self,
        to: H160,
        data: Vec<u8>,
        block_hash: H256,
    ) -> SyncResult<Vec<u8>> {
        self.check_failure()?;
        self.calls.lock().push((to, data.clone(), block_hash));
        let selector: [u8; 4] = data
            .get(..4)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| RestakingSyncError::Abi("calldata shorter than selector".into()))?;
        self.call_results
            .lock()
            .get(&selector)
            .cloned()
            .ok_or_else(|| RestakingSyncError::JsonRpc {
                code: -32000,
                message: "execution reverted".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(byte: u8, number: u64, timestamp: u64) -> ExternalBlock {
        ExternalBlock {
            hash: H256::repeat_byte(byte),
            number,
            timestamp,
        }
    }

    #[tokio::test]
    async fn test_mock_execution_client_lookup() {
        let client = MockExecutionClient::new().with_block(block(1, 10, 100));
        let found = client.block_by_hash(H256::repeat_byte(1)).await.unwrap();
        assert_eq!(found.number, 10);
        let found = client.block_by_number(10).await.unwrap();
        assert_eq!(found.timestamp, 100);
    }

    #[tokio::test]
    async fn test_mock_execution_client_not_found() {
        let client = MockExecutionClient::new();
        let err = client.block_by_hash(H256::repeat_byte(9)).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_mock_execution_client_reorg() {
        let client = MockExecutionClient::new().with_block(block(1, 10, 100));
        client.reorg(block(2, 10, 101));
        assert!(client.block_by_hash(H256::repeat_byte(1)).await.is_ok());
        assert_eq!(
            client.block_by_number(10).await.unwrap().hash,
            H256::repeat_byte(2)
        );
    }

    #[tokio::test]
    async fn test_mock_execution_client_failure() {
        let client = MockExecutionClient {
            should_fail: true,
            ..Default::default()
        };
        let err = client.block_by_number(1).await.unwrap_err();
        assert!(!err.is_not_found());
    }

    #[tokio::test]
    async fn test_mock_by_number_failure_is_one_shot() {
        let client = MockExecutionClient::new().with_block(block(1, 10, 100));
        client.fail_next_by_number(RestakingSyncError::Transport("down".into()));

        assert!(client.block_by_hash(H256::repeat_byte(1)).await.is_ok());
        assert!(client.block_by_number(10).await.is_err());
        assert!(client.block_by_number(10).await.is_ok());
    }

    #[tokio::test]
    async fn test_mock_finality_source() {
        let source = MockFinalitySource::with_hash("0xaa");
        let update = source.finality_update().await.unwrap();
        assert_eq!(update.data.finalized_header.execution_payload_header.block_hash, "0xaa");

        source.set(None);
        assert!(source.finality_update().await.is_err());
    }

    #[test]
    fn test_finality_update_deserialize() {
        let json = r#"{
            "version": "deneb",
            "data": {
                "attested_header": {"beacon": {"slot": "1"}, "execution_payload_header": {"block_hash": "0x01", "block_number": "7"}},
                "finalized_header": {"execution_payload_header": {"block_hash": "0x02"}},
                "signature_slot": "2"
            }
        }"#;
        let update: FinalityUpdate = serde_json::from_str(json).unwrap();
        assert_eq!(update.data.attested_header.execution_payload_header.block_hash, "0x01");
        assert_eq!(update.data.finalized_header.execution_payload_header.block_hash, "0x02");
    }
}
