//! # Validator Set Synchronizer
//!
//! Reads the middleware's stake table at an agreed block hash and overwrites
//! local validator tokens. Rows for unknown consensus addresses are ignored.
//!
//! Updates applied before an error are not rolled back.

use crate::algorithms::{
    decode_epoch, decode_validator_set, encode_current_epoch_call, encode_validator_set_call,
};
use crate::application::resolver::FinalizedBlockResolver;
use crate::domain::{ExternalValidator, HashSource, RestakingSyncError, SyncReport, SyncResult};
use crate::ports::inbound::ValidatorPowerSync;
use crate::ports::outbound::{BlockHashStore, ExecutionChainClient, StakingKeeper};
use async_trait::async_trait;
use primitive_types::{H160, H256};
use std::sync::Arc;
use tracing::{debug, info};

/// Middleware stake table synchronizer.
pub struct ValidatorSetSynchronizer {
    middleware: H160,
    hash_source: HashSource,
    resolver: FinalizedBlockResolver,
    chain: Arc<dyn ExecutionChainClient>,
    store: Arc<dyn BlockHashStore>,
    keeper: Arc<dyn StakingKeeper>,
}

impl ValidatorSetSynchronizer {
    /// Create a synchronizer for the middleware at `middleware`.
    pub fn new(
        middleware: H160,
        hash_source: HashSource,
        resolver: FinalizedBlockResolver,
        chain: Arc<dyn ExecutionChainClient>,
        store: Arc<dyn BlockHashStore>,
        keeper: Arc<dyn StakingKeeper>,
    ) -> Self {
        Self {
            middleware,
            hash_source,
            resolver,
            chain,
            store,
            keeper,
        }
    }

    /// Block hash the next synchronization reads at.
    pub async fn select_block_hash(&self) -> SyncResult<H256> {
        match self.hash_source {
            HashSource::LatestAccepted => {
                let entry = self
                    .store
                    .latest_accepted_block_hash()?
                    .ok_or(RestakingSyncError::NoAcceptedBlockHash)?;
                entry.accepted_hash().ok_or_else(|| {
                    RestakingSyncError::Decode(format!(
                        "cached block hash {:?} at height {}",
                        entry.block_hash, entry.height
                    ))
                })
            }
            HashSource::Finalized => self.resolver.resolve_finalized_hash().await,
        }
    }

    /// Middleware epoch at `block_hash`.
    pub async fn current_epoch(&self, block_hash: H256) -> SyncResult<u64> {
        let data = self
            .chain
            .call_at_hash(self.middleware, encode_current_epoch_call(), block_hash)
            .await?;
        decode_epoch(&data)
    }

    /// Middleware stake table for `epoch` at `block_hash`.
    pub async fn validator_set(
        &self,
        epoch: u64,
        block_hash: H256,
    ) -> SyncResult<Vec<ExternalValidator>> {
        let data = self
            .chain
            .call_at_hash(self.middleware, encode_validator_set_call(epoch)?, block_hash)
            .await?;
        decode_validator_set(&data)
    }

    /// Synchronize against an explicit block hash.
    pub async fn synchronize_at(&self, block_hash: H256) -> SyncResult<SyncReport> {
        let epoch = self.current_epoch(block_hash).await?;
        let validators = self.validator_set(epoch, block_hash).await?;
        debug!(
            block_hash = %format!("{block_hash:#x}"),
            epoch,
            rows = validators.len(),
            "[qc-18] Fetched middleware validator set"
        );

        let mut report = SyncReport {
            block_hash,
            epoch,
            ..SyncReport::default()
        };
        for row in validators {
            let validator = match self.keeper.validator_by_cons_addr(&row.cons_addr) {
                Ok(validator) => validator,
                Err(RestakingSyncError::ValidatorNotFound(_)) => {
                    report.unknown += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };
            self.keeper.set_validator_tokens(validator, row.stake)?;
            report.updated += 1;
        }

        info!(
            block_hash = %format!("{block_hash:#x}"),
            epoch,
            updated = report.updated,
            unknown = report.unknown,
            "[qc-18] Synchronized validator power"
        );
        Ok(report)
    }
}

#[async_trait]
impl ValidatorPowerSync for ValidatorSetSynchronizer {
    async fn synchronize_validator_power(&self) -> SyncResult<SyncReport> {
        let block_hash = self.select_block_hash().await?;
        self.synchronize_at(block_hash).await
    }
}
