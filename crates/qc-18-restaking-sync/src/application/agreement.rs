//! # Block-Hash Agreement
//!
//! Proposer injects a finalized execution block hash at sync heights; every
//! node re-checks it against the execution chain before caching it.
//!
//! ## Pre-block checks (in order)
//!
//! ```text
//! sentinel? ─► by hash ─► by number ─► time gate ─► Accepted
//!     │          │            │            │
//!     └──────────┴────────────┴────────────┴──► Skipped (sentinel cached)
//! ```
//!
//! Transport failures during the lookups and store failures are fatal for the
//! height: a node that cannot check the candidate must not diverge silently.

use crate::algorithms::{decode_candidate, encode_candidate};
use crate::application::resolver::FinalizedBlockResolver;
use crate::domain::{
    invariant_block_time, invariant_canonical, invariant_sync_height, AgreementOutcome,
    AgreementState, BlockHashCandidate, CachedBlockHash, FatalError, FatalReason,
    RestakingSyncError, SkipReason,
};
use crate::ports::inbound::ProposalHandler;
use crate::ports::outbound::{BlockHashStore, ExecutionChainClient};
use async_trait::async_trait;
use primitive_types::H256;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Agreement state machine.
pub struct BlockHashAgreement {
    sync_period: u64,
    resolver: FinalizedBlockResolver,
    chain: Arc<dyn ExecutionChainClient>,
    store: Arc<dyn BlockHashStore>,
    state: AgreementState,
}

impl BlockHashAgreement {
    /// Create the state machine. The watermark lives in `store`.
    pub fn new(
        sync_period: u64,
        resolver: FinalizedBlockResolver,
        chain: Arc<dyn ExecutionChainClient>,
        store: Arc<dyn BlockHashStore>,
    ) -> Self {
        Self {
            sync_period,
            resolver,
            chain,
            store,
            state: AgreementState::Idle,
        }
    }

    /// Current state.
    pub fn state(&self) -> AgreementState {
        self.state
    }

    /// Whether `height` is a sync height.
    pub fn is_sync_height(&self, height: u64) -> bool {
        invariant_sync_height(height, self.sync_period)
    }

    fn transition(&mut self, next: AgreementState) {
        if !self.state.can_transition_to(next) {
            warn!(from = ?self.state, to = ?next, "[qc-18] Unexpected agreement transition");
        }
        if next.is_terminal() {
            debug!(state = ?next, "[qc-18] Agreement cycle finished");
        }
        self.state = next;
    }

    /// Run the candidate through the checks without writing anything.
    async fn evaluate(
        &self,
        height: u64,
        header_time: u64,
        wire: &str,
    ) -> Result<AgreementOutcome, FatalError> {
        let hash = match BlockHashCandidate::from_wire(wire) {
            Ok(BlockHashCandidate::Hash(hash)) => hash,
            Ok(BlockHashCandidate::Sentinel) => {
                return Ok(AgreementOutcome::Skipped(SkipReason::Sentinel))
            }
            Err(e) => {
                warn!(height, candidate = %wire, "[qc-18] Malformed block hash: {}", e);
                return Ok(AgreementOutcome::Skipped(SkipReason::MalformedHash));
            }
        };

        let block = match self.chain.block_by_hash(hash).await {
            Ok(block) => block,
            Err(e) if e.is_not_found() => {
                warn!(height, block_hash = %format!("{hash:#x}"), "[qc-18] Block not found");
                return Ok(AgreementOutcome::Skipped(SkipReason::BlockNotFound));
            }
            Err(e) => return Err(lookup_failed(height, hash, e)),
        };

        let canonical = match self.chain.block_by_number(block.number).await {
            Ok(canonical) => canonical,
            Err(e) if e.is_not_found() => {
                return Ok(AgreementOutcome::Skipped(SkipReason::Reorganized))
            }
            Err(e) => return Err(lookup_failed(height, hash, e)),
        };
        if let Err(reason) = invariant_canonical(&hash, &canonical) {
            warn!(
                height,
                block_hash = %format!("{hash:#x}"),
                number = block.number,
                "[qc-18] Block is no longer canonical"
            );
            return Ok(AgreementOutcome::Skipped(reason));
        }

        let prev_block_time = self.store.prev_block_time().map_err(|e| store_failed(height, e))?;
        let min_block_timestamp = self
            .store
            .min_block_timestamp()
            .map_err(|e| store_failed(height, e))?;
        if let Err(reason) = invariant_block_time(
            block.timestamp,
            prev_block_time,
            header_time,
            min_block_timestamp,
        ) {
            debug!(
                height,
                block_time = block.timestamp,
                prev_block_time,
                header_time,
                min_block_timestamp,
                "[qc-18] Time gate rejected block"
            );
            return Ok(AgreementOutcome::Skipped(reason));
        }

        Ok(AgreementOutcome::Accepted {
            hash,
            block_time: block.timestamp,
        })
    }

    /// Persist the outcome of a cycle.
    fn record(&self, height: u64, outcome: &AgreementOutcome) -> Result<(), FatalError> {
        match outcome {
            AgreementOutcome::Accepted { hash, block_time } => {
                self.store
                    .record_accepted(CachedBlockHash::accepted(hash, height), *block_time)
                    .map_err(|e| store_failed(height, e))?;
                info!(
                    height,
                    block_hash = %format!("{hash:#x}"),
                    block_time,
                    "[qc-18] Accepted finalized block hash"
                );
            }
            AgreementOutcome::Skipped(reason) => {
                self.store
                    .cache_block_hash(CachedBlockHash::skipped(height))
                    .map_err(|e| store_failed(height, e))?;
                info!(height, reason = %reason, "[qc-18] Skipped block hash cycle");
            }
            AgreementOutcome::Idle => {}
        }
        Ok(())
    }

    async fn validate(
        &mut self,
        height: u64,
        header_time: u64,
        tx: &[u8],
    ) -> Result<AgreementOutcome, FatalError> {
        let wire = decode_candidate(tx)
            .map_err(|e| FatalError::new(height, FatalReason::Decode(e.to_string())))?;
        let outcome = self.evaluate(height, header_time, &wire).await?;
        self.record(height, &outcome)?;
        Ok(outcome)
    }
}

fn lookup_failed(height: u64, hash: H256, source: RestakingSyncError) -> FatalError {
    FatalError::new(height, FatalReason::ExternalLookup { hash, source })
}

fn store_failed(height: u64, source: RestakingSyncError) -> FatalError {
    FatalError::new(height, FatalReason::Store(source))
}

#[async_trait]
impl ProposalHandler for BlockHashAgreement {
    async fn prepare_proposal(
        &mut self,
        height: u64,
        txs: Vec<Vec<u8>>,
    ) -> Result<Vec<Vec<u8>>, FatalError> {
        if !self.is_sync_height(height) {
            return Ok(txs);
        }
        self.transition(AgreementState::ProposerInjecting);

        let candidate = match self.resolver.resolve_finalized_hash().await {
            Ok(hash) => BlockHashCandidate::Hash(hash),
            Err(e) => {
                warn!(height, "[qc-18] No finalized block hash, injecting sentinel: {}", e);
                BlockHashCandidate::Sentinel
            }
        };

        let injected = encode_candidate(&candidate);
        self.transition(AgreementState::Idle);
        let injected =
            injected.map_err(|e| FatalError::new(height, FatalReason::Encode(e.to_string())))?;

        debug!(height, candidate = %candidate, "[qc-18] Injecting block hash candidate");
        let mut proposal = Vec::with_capacity(txs.len() + 1);
        proposal.push(injected);
        proposal.extend(txs);
        Ok(proposal)
    }

    async fn pre_block(
        &mut self,
        height: u64,
        header_time: u64,
        txs: &[Vec<u8>],
    ) -> Result<AgreementOutcome, FatalError> {
        let first = match txs.first() {
            Some(first) if self.is_sync_height(height) => first,
            _ => {
                self.transition(AgreementState::Idle);
                return Ok(AgreementOutcome::Idle);
            }
        };

        self.transition(AgreementState::Validating);
        match self.validate(height, header_time, first).await {
            Ok(outcome) => {
                let next = if outcome.is_accepted() {
                    AgreementState::Accepted
                } else {
                    AgreementState::Skipped
                };
                self.transition(next);
                Ok(outcome)
            }
            Err(e) => {
                self.transition(AgreementState::Idle);
                Err(e)
            }
        }
    }
}
