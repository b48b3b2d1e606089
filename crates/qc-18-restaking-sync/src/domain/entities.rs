//! # Domain Entities
//!
//! Core entities for Restaking Sync.

use super::value_objects::{
    format_block_hash, BlockHashCandidate, ConsensusAddress, SkipReason, INVALID_BLOCKHASH,
};
use primitive_types::{H256, U256};
use serde::{Deserialize, Serialize};

/// Outcome of one sync-height cycle, as persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedBlockHash {
    /// Accepted block hash (`0x` hex) or [`INVALID_BLOCKHASH`].
    pub block_hash: String,
    /// Consensus height of the cycle.
    pub height: u64,
}

impl CachedBlockHash {
    /// Entry recording an accepted hash.
    pub fn accepted(hash: &H256, height: u64) -> Self {
        Self {
            block_hash: format_block_hash(hash),
            height,
        }
    }

    /// Entry recording a skipped cycle.
    pub fn skipped(height: u64) -> Self {
        Self {
            block_hash: INVALID_BLOCKHASH.to_string(),
            height,
        }
    }

    /// Check if this entry records a skip.
    pub fn is_sentinel(&self) -> bool {
        self.block_hash == INVALID_BLOCKHASH
    }

    /// Interpret the stored hash.
    pub fn candidate(&self) -> Option<BlockHashCandidate> {
        BlockHashCandidate::from_wire(&self.block_hash).ok()
    }

    /// Accepted hash, if this entry is not a skip.
    pub fn accepted_hash(&self) -> Option<H256> {
        match self.candidate()? {
            BlockHashCandidate::Hash(hash) => Some(hash),
            BlockHashCandidate::Sentinel => None,
        }
    }
}

/// Execution-layer block header fields used by the agreement checks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExternalBlock {
    /// Block hash.
    pub hash: H256,
    /// Block number.
    pub number: u64,
    /// Block timestamp (unix seconds).
    pub timestamp: u64,
}

/// One row of the middleware's validator table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExternalValidator {
    /// Restaked amount.
    pub stake: U256,
    /// Consensus address the stake is bound to.
    pub cons_addr: ConsensusAddress,
}

/// Local validator (owned by the staking module).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    /// Operator address.
    pub operator: String,
    /// Consensus address.
    pub cons_addr: ConsensusAddress,
    /// Bonded tokens, i.e. voting power before reduction.
    pub tokens: U256,
}

impl Validator {
    /// Create a validator.
    pub fn new(operator: impl Into<String>, cons_addr: ConsensusAddress, tokens: U256) -> Self {
        Self {
            operator: operator.into(),
            cons_addr,
            tokens,
        }
    }
}

/// Result of pre-block processing for one height.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AgreementOutcome {
    /// Not a sync height, or nothing injected.
    Idle,
    /// Candidate accepted.
    Accepted {
        /// Accepted hash
        hash: H256,
        /// External block timestamp
        block_time: u64,
    },
    /// Candidate rejected.
    Skipped(SkipReason),
}

impl AgreementOutcome {
    /// Check if accepted.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    /// Check if skipped.
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }
}

/// Summary of one validator power synchronization.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Block hash the snapshot was read at.
    pub block_hash: H256,
    /// Middleware epoch.
    pub epoch: u64,
    /// Validators whose tokens were overwritten.
    pub updated: usize,
    /// Rows with no matching local validator.
    pub unknown: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cached_block_hash_accepted() {
        let hash = H256::repeat_byte(0xab);
        let entry = CachedBlockHash::accepted(&hash, 100);
        assert!(!entry.is_sentinel());
        assert_eq!(entry.accepted_hash(), Some(hash));
        assert_eq!(entry.block_hash, format!("0x{}", "ab".repeat(32)));
    }

    #[test]
    fn test_cached_block_hash_skipped() {
        let entry = CachedBlockHash::skipped(200);
        assert!(entry.is_sentinel());
        assert_eq!(entry.accepted_hash(), None);
        assert_eq!(entry.candidate(), Some(BlockHashCandidate::Sentinel));
    }

    #[test]
    fn test_cached_block_hash_json_shape() {
        let entry = CachedBlockHash::skipped(7);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["block_hash"], INVALID_BLOCKHASH);
        assert_eq!(json["height"], 7);
    }

    #[test]
    fn test_outcome_predicates() {
        let accepted = AgreementOutcome::Accepted {
            hash: H256::zero(),
            block_time: 1,
        };
        assert!(accepted.is_accepted());
        assert!(AgreementOutcome::Skipped(SkipReason::Sentinel).is_skipped());
        assert!(!AgreementOutcome::Idle.is_skipped());
    }
}
