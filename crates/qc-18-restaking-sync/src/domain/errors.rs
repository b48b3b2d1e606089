//! # Domain Errors
//!
//! Error types for Restaking Sync.
//!
//! Three severities exist:
//! - skip conditions are not errors at all (see [`SkipReason`](super::SkipReason)),
//! - [`RestakingSyncError`] is returned by ports and the synchronizer,
//! - [`FatalError`] halts processing of a height and is returned to the host.

use primitive_types::H256;
use thiserror::Error;

/// Restaking sync error types.
#[derive(Debug, Error)]
pub enum RestakingSyncError {
    /// Transport-level failure (connect, timeout, body read).
    #[error("Transport error: {0}")]
    Transport(String),

    /// Endpoint answered with a non-success HTTP status.
    #[error("Unexpected status code {status} from {endpoint}")]
    HttpStatus {
        /// Endpoint that was queried
        endpoint: String,
        /// HTTP status code
        status: u16,
    },

    /// JSON-RPC error object returned by the execution endpoint.
    #[error("JSON-RPC error (code {code}): {message}")]
    JsonRpc {
        /// Error code
        code: i64,
        /// Error message
        message: String,
    },

    /// Response body could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// External block is unknown to the queried endpoint.
    #[error("Block not found: {0}")]
    BlockNotFound(String),

    /// No local validator with the given consensus address.
    #[error("No validator found for consensus address 0x{0}")]
    ValidatorNotFound(String),

    /// Contract return data does not match the expected ABI layout.
    #[error("ABI error: {0}")]
    Abi(String),

    /// Endpoint pool has nothing to hand out.
    #[error("No endpoints configured for {0} pool")]
    NoEndpoints(&'static str),

    /// Synchronizer has no accepted block hash to work from.
    #[error("No accepted block hash cached yet")]
    NoAcceptedBlockHash,

    /// Persistence failure.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl RestakingSyncError {
    /// Whether this is one of the distinguished not-found kinds.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::BlockNotFound(_) | Self::ValidatorNotFound(_))
    }
}

impl From<reqwest::Error> for RestakingSyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for RestakingSyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Result type for restaking sync operations.
pub type SyncResult<T> = Result<T, RestakingSyncError>;

/// Condition under which a node must stop processing the current height.
///
/// Continuing would risk this node's local view diverging from its peers, so
/// the host decides the shutdown policy.
#[derive(Debug, Error)]
#[error("Fatal error at height {height}: {reason}")]
pub struct FatalError {
    /// Consensus height being processed.
    pub height: u64,
    /// What went wrong.
    pub reason: FatalReason,
}

impl FatalError {
    /// Create a fatal error for the given height.
    pub fn new(height: u64, reason: FatalReason) -> Self {
        Self { height, reason }
    }
}

/// Why a height was halted.
#[derive(Debug, Error)]
pub enum FatalReason {
    /// Injected transaction could not be encoded.
    #[error("failed to encode injected block hash: {0}")]
    Encode(String),

    /// Injected transaction could not be decoded.
    #[error("failed to decode injected block hash: {0}")]
    Decode(String),

    /// External lookup failed for a reason other than not-found.
    #[error("external lookup for {hash:?} failed: {source}")]
    ExternalLookup {
        /// Candidate hash being validated
        hash: H256,
        /// Underlying error
        #[source]
        source: RestakingSyncError,
    },

    /// Cache or watermark could not be read or written.
    #[error("store failure: {0}")]
    Store(#[source] RestakingSyncError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_kinds() {
        assert!(RestakingSyncError::BlockNotFound("0xab".into()).is_not_found());
        assert!(RestakingSyncError::ValidatorNotFound("ab".into()).is_not_found());
        assert!(!RestakingSyncError::Transport("down".into()).is_not_found());
    }

    #[test]
    fn test_http_status_error() {
        let err = RestakingSyncError::HttpStatus {
            endpoint: "http://beacon".into(),
            status: 503,
        };
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn test_fatal_error_display() {
        let err = FatalError::new(100, FatalReason::Decode("eof".into()));
        let msg = err.to_string();
        assert!(msg.contains("height 100"));
        assert!(msg.contains("eof"));
    }
}
