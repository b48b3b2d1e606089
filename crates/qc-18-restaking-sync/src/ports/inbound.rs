//! # Inbound Ports
//!
//! Hooks the host consensus engine and the end-of-block job call into.

use crate::domain::{AgreementOutcome, FatalError, SyncReport, SyncResult};
use async_trait::async_trait;

/// Proposal hooks - inbound port.
///
/// Both run once per height, strictly in this order.
#[async_trait]
pub trait ProposalHandler: Send + Sync {
    /// Proposer side: return the transaction list to propose.
    ///
    /// At sync heights the candidate block hash (or the sentinel) is
    /// prepended; elsewhere `txs` is returned unchanged.
    async fn prepare_proposal(
        &mut self,
        height: u64,
        txs: Vec<Vec<u8>>,
    ) -> Result<Vec<Vec<u8>>, FatalError>;

    /// Every node: check the injected candidate and record the outcome.
    ///
    /// `header_time` is the proposal header time in unix seconds.
    async fn pre_block(
        &mut self,
        height: u64,
        header_time: u64,
        txs: &[Vec<u8>],
    ) -> Result<AgreementOutcome, FatalError>;
}

/// Validator power synchronization - inbound port.
#[async_trait]
pub trait ValidatorPowerSync: Send + Sync {
    /// Overwrite local validator tokens from the middleware's stake table.
    async fn synchronize_validator_power(&self) -> SyncResult<SyncReport>;
}
