//! # Domain Value Objects
//!
//! Immutable value types for Restaking Sync.

use super::errors::{RestakingSyncError, SyncResult};
use primitive_types::H256;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Well-known value meaning "no usable finalized block this cycle".
///
/// Never parses as a block hash (no `0x` prefix, not hex).
pub const INVALID_BLOCKHASH: &str = "invalid";

/// Parse a `0x`-prefixed (or bare) 32-byte hex string.
pub fn parse_block_hash(value: &str) -> SyncResult<H256> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    let bytes = hex::decode(digits)
        .map_err(|e| RestakingSyncError::Decode(format!("invalid block hash {value:?}: {e}")))?;
    if bytes.len() != 32 {
        return Err(RestakingSyncError::Decode(format!(
            "invalid block hash {value:?}: expected 32 bytes, got {}",
            bytes.len()
        )));
    }
    Ok(H256::from_slice(&bytes))
}

/// Canonical lowercase `0x` rendering of a block hash.
pub fn format_block_hash(hash: &H256) -> String {
    format!("{hash:#x}")
}

/// The value a proposer injects at a sync height.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlockHashCandidate {
    /// Proposer could not resolve a finalized block.
    Sentinel,
    /// Finalized execution block hash.
    Hash(H256),
}

impl BlockHashCandidate {
    /// Wire form: the sentinel string or the canonical hex hash.
    pub fn to_wire(&self) -> String {
        match self {
            Self::Sentinel => INVALID_BLOCKHASH.to_string(),
            Self::Hash(hash) => format_block_hash(hash),
        }
    }

    /// Interpret a wire string.
    pub fn from_wire(value: &str) -> SyncResult<Self> {
        if value == INVALID_BLOCKHASH {
            return Ok(Self::Sentinel);
        }
        parse_block_hash(value).map(Self::Hash)
    }

    /// Check if this is the sentinel.
    pub fn is_sentinel(&self) -> bool {
        matches!(self, Self::Sentinel)
    }
}

impl fmt::Display for BlockHashCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

/// Consensus address of a validator as published by the middleware (`bytes32`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConsensusAddress(pub [u8; 32]);

impl ConsensusAddress {
    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<[u8; 32]> for ConsensusAddress {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for ConsensusAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Block-hash agreement state machine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgreementState {
    /// Nothing to do at this height.
    #[default]
    Idle,
    /// Proposer is resolving and injecting a candidate.
    ProposerInjecting,
    /// Every node is checking the injected candidate.
    Validating,
    /// Candidate passed all checks and was cached.
    Accepted,
    /// Candidate rejected; sentinel cached.
    Skipped,
}

impl AgreementState {
    /// Check if transition is valid.
    pub fn can_transition_to(&self, next: AgreementState) -> bool {
        match (self, next) {
            (Self::Idle | Self::Accepted | Self::Skipped, Self::ProposerInjecting) => true,
            (Self::Idle | Self::Accepted | Self::Skipped, Self::Validating) => true,
            (Self::ProposerInjecting, Self::Idle) => true,
            (Self::Validating, Self::Idle | Self::Accepted | Self::Skipped) => true,
            (Self::Accepted | Self::Skipped, Self::Idle) => true,
            (Self::Idle, Self::Idle) => true,
            _ => false,
        }
    }

    /// Check if this state ends a cycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Accepted | Self::Skipped)
    }
}

/// Why a candidate was skipped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// Proposer injected the sentinel.
    Sentinel,
    /// Injected string is not a well-formed block hash.
    MalformedHash,
    /// Execution endpoint does not know the block.
    BlockNotFound,
    /// Block at the reported number has a different hash.
    Reorganized,
    /// Older than the last accepted block.
    BeforeWatermark,
    /// Not strictly before the proposal's header time.
    NotInPast,
    /// Older than the persisted minimum timestamp.
    BelowMinimum,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Sentinel => "sentinel injected",
            Self::MalformedHash => "malformed block hash",
            Self::BlockNotFound => "block not found",
            Self::Reorganized => "block no longer canonical",
            Self::BeforeWatermark => "block older than last accepted block",
            Self::NotInPast => "block time not before header time",
            Self::BelowMinimum => "block older than minimum timestamp",
        };
        f.write_str(s)
    }
}

/// Where the synchronizer takes its block hash from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashSource {
    /// Latest accepted cache entry written by the agreement machine.
    #[default]
    LatestAccepted,
    /// Resolve the current finalized hash from the beacon pool.
    Finalized,
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "0xab00000000000000000000000000000000000000000000000000000000000001";

    #[test]
    fn test_parse_block_hash() {
        let hash = parse_block_hash(HASH).unwrap();
        assert_eq!(hash.as_bytes()[0], 0xab);
        assert_eq!(hash.as_bytes()[31], 0x01);
        assert_eq!(format_block_hash(&hash), HASH);
    }

    #[test]
    fn test_parse_block_hash_uppercase_prefix() {
        let upper = HASH.to_uppercase();
        assert_eq!(parse_block_hash(&upper).unwrap(), parse_block_hash(HASH).unwrap());
    }

    #[test]
    fn test_parse_block_hash_wrong_length() {
        assert!(parse_block_hash("0xabcd").is_err());
        assert!(parse_block_hash("0xzz").is_err());
    }

    #[test]
    fn test_sentinel_is_not_a_hash() {
        assert!(parse_block_hash(INVALID_BLOCKHASH).is_err());
        assert_eq!(
            BlockHashCandidate::from_wire(INVALID_BLOCKHASH).unwrap(),
            BlockHashCandidate::Sentinel
        );
    }

    #[test]
    fn test_candidate_wire_form() {
        let candidate = BlockHashCandidate::from_wire(HASH).unwrap();
        assert!(!candidate.is_sentinel());
        assert_eq!(candidate.to_wire(), HASH);
        assert_eq!(BlockHashCandidate::Sentinel.to_string(), INVALID_BLOCKHASH);
    }

    #[test]
    fn test_agreement_state_transitions() {
        assert!(AgreementState::Idle.can_transition_to(AgreementState::ProposerInjecting));
        assert!(AgreementState::Idle.can_transition_to(AgreementState::Validating));
        assert!(AgreementState::Validating.can_transition_to(AgreementState::Accepted));
        assert!(AgreementState::Validating.can_transition_to(AgreementState::Skipped));
        assert!(AgreementState::Accepted.can_transition_to(AgreementState::Validating));
        assert!(!AgreementState::Idle.can_transition_to(AgreementState::Accepted));
        assert!(!AgreementState::ProposerInjecting.can_transition_to(AgreementState::Accepted));
    }

    #[test]
    fn test_agreement_state_terminal() {
        assert!(AgreementState::Accepted.is_terminal());
        assert!(AgreementState::Skipped.is_terminal());
        assert!(!AgreementState::Validating.is_terminal());
    }

    #[test]
    fn test_consensus_address_display() {
        let addr = ConsensusAddress([0x0f; 32]);
        assert_eq!(addr.to_string(), "0f".repeat(32));
    }
}
