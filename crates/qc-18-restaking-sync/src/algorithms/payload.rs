//! # Injected Transaction Payload
//!
//! Canonical encoding of the block-hash candidate a proposer prepends to the
//! block: a JSON string holding either the `0x` hash or the sentinel.

use crate::domain::BlockHashCandidate;

/// Encode a candidate as the injected transaction bytes.
pub fn encode_candidate(candidate: &BlockHashCandidate) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(&candidate.to_wire())
}

/// Decode the injected transaction into its wire string.
///
/// Interpretation (sentinel / hash / malformed) is left to the caller.
pub fn decode_candidate(tx: &[u8]) -> Result<String, serde_json::Error> {
    serde_json::from_slice(tx)
}
