//! # Restaking Sync Service
//!
//! Composes the agreement machine and the synchronizer behind the three
//! per-height hooks a host calls: `prepare_proposal`, `pre_block` and
//! `end_block`.

use crate::adapters::{BeaconApiClient, EthRpcClient, RotatingEndpointPool};
use crate::application::agreement::BlockHashAgreement;
use crate::application::resolver::FinalizedBlockResolver;
use crate::application::synchronizer::ValidatorSetSynchronizer;
use crate::config::{ConfigError, RestakingSyncConfig};
use crate::domain::{
    invariant_sync_height, AgreementOutcome, AgreementState, FatalError, HashSource, SyncReport,
    SyncResult,
};
use crate::ports::inbound::{ProposalHandler, ValidatorPowerSync};
use crate::ports::outbound::{
    BlockHashStore, ExecutionChainClient, FinalityUpdateSource, StakingKeeper,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Restaking sync service.
pub struct RestakingSyncService {
    config: RestakingSyncConfig,
    agreement: BlockHashAgreement,
    synchronizer: ValidatorSetSynchronizer,
    store: Arc<dyn BlockHashStore>,
}

impl RestakingSyncService {
    /// Create a service over the given ports.
    pub fn new(
        config: RestakingSyncConfig,
        beacon: Arc<dyn FinalityUpdateSource>,
        chain: Arc<dyn ExecutionChainClient>,
        store: Arc<dyn BlockHashStore>,
        keeper: Arc<dyn StakingKeeper>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let middleware = config.middleware()?;
        let resolver = FinalizedBlockResolver::new(beacon, config.debug);

        let agreement = BlockHashAgreement::new(
            config.sync_period,
            resolver.clone(),
            chain.clone(),
            store.clone(),
        );
        let synchronizer = ValidatorSetSynchronizer::new(
            middleware,
            config.hash_source,
            resolver,
            chain,
            store.clone(),
            keeper,
        );

        info!(
            sync_period = config.sync_period,
            middleware = %format!("{middleware:#x}"),
            hash_source = ?config.hash_source,
            "[qc-18] Restaking sync service created"
        );

        Ok(Self {
            config,
            agreement,
            synchronizer,
            store,
        })
    }

    /// Create a service talking HTTP to the configured endpoint pools.
    pub fn connect(
        config: RestakingSyncConfig,
        store: Arc<dyn BlockHashStore>,
        keeper: Arc<dyn StakingKeeper>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let beacon_pool = Arc::new(RotatingEndpointPool::beacon(&config));
        let execution_pool = Arc::new(RotatingEndpointPool::execution(&config));

        let beacon = BeaconApiClient::new(beacon_pool, config.request_timeout())
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        let chain = EthRpcClient::new(execution_pool, config.request_timeout())
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Self::new(config, Arc::new(beacon), Arc::new(chain), store, keeper)
    }

    /// Active configuration.
    pub fn config(&self) -> &RestakingSyncConfig {
        &self.config
    }

    /// Agreement machine state.
    pub fn agreement_state(&self) -> AgreementState {
        self.agreement.state()
    }

    /// Synchronizer, for hosts that drive it on their own schedule.
    pub fn synchronizer(&self) -> &ValidatorSetSynchronizer {
        &self.synchronizer
    }

    /// Proposer hook.
    pub async fn prepare_proposal(
        &mut self,
        height: u64,
        txs: Vec<Vec<u8>>,
    ) -> Result<Vec<Vec<u8>>, FatalError> {
        self.agreement.prepare_proposal(height, txs).await
    }

    /// Pre-block hook.
    pub async fn pre_block(
        &mut self,
        height: u64,
        header_time: u64,
        txs: &[Vec<u8>],
    ) -> Result<AgreementOutcome, FatalError> {
        self.agreement.pre_block(height, header_time, txs).await
    }

    /// End-of-block hook: synchronize validator power at sync heights.
    ///
    /// With [`HashSource::LatestAccepted`] the synchronizer only runs when
    /// this height's cycle was accepted, reading at the accepted hash.
    pub async fn end_block(&self, height: u64) -> SyncResult<Option<SyncReport>> {
        if !invariant_sync_height(height, self.config.sync_period) {
            return Ok(None);
        }

        match self.config.hash_source {
            HashSource::LatestAccepted => {
                let accepted = self
                    .store
                    .cached_block_hash(height)?
                    .and_then(|entry| entry.accepted_hash());
                match accepted {
                    Some(hash) => self.synchronizer.synchronize_at(hash).await.map(Some),
                    None => {
                        debug!(height, "[qc-18] No accepted block hash, skipping validator sync");
                        Ok(None)
                    }
                }
            }
            HashSource::Finalized => self
                .synchronizer
                .synchronize_validator_power()
                .await
                .map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryStakingKeeper, InMemoryStore};
    use crate::ports::outbound::{MockExecutionClient, MockFinalitySource};

    fn service(config: RestakingSyncConfig) -> Result<RestakingSyncService, ConfigError> {
        RestakingSyncService::new(
            config,
            Arc::new(MockFinalitySource::failing()),
            Arc::new(MockExecutionClient::new()),
            Arc::new(InMemoryStore::new()),
            Arc::new(InMemoryStakingKeeper::new()),
        )
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = RestakingSyncConfig {
            middleware_address: String::new(),
            ..RestakingSyncConfig::for_testing()
        };
        assert!(matches!(
            service(config),
            Err(ConfigError::InvalidMiddlewareAddress(_))
        ));
    }

    #[test]
    fn test_connect_builds_http_clients() {
        let service = RestakingSyncService::connect(
            RestakingSyncConfig::for_testing(),
            Arc::new(InMemoryStore::new()),
            Arc::new(InMemoryStakingKeeper::new()),
        )
        .unwrap();
        assert_eq!(service.config().sync_period, 100);
        assert_eq!(service.agreement_state(), AgreementState::Idle);
    }

    #[tokio::test]
    async fn test_end_block_off_period() {
        let service = service(RestakingSyncConfig::for_testing()).unwrap();
        assert!(service.end_block(150).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_end_block_without_accepted_cycle() {
        let service = service(RestakingSyncConfig::for_testing()).unwrap();
        assert!(service.end_block(100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_end_block_finalized_source_surfaces_errors() {
        let config = RestakingSyncConfig {
            hash_source: HashSource::Finalized,
            ..RestakingSyncConfig::for_testing()
        };
        let service = service(config).unwrap();
        assert!(service.end_block(100).await.is_err());
    }
}
