//! # Finalized Block Resolver
//!
//! Turns a beacon finality update into an execution block hash.

use crate::domain::{parse_block_hash, SyncResult};
use crate::ports::outbound::FinalityUpdateSource;
use primitive_types::H256;
use std::sync::Arc;
use tracing::debug;

/// Resolves the execution hash of the current finalized (or, in debug mode,
/// attested) beacon header.
#[derive(Clone)]
pub struct FinalizedBlockResolver {
    source: Arc<dyn FinalityUpdateSource>,
    debug: bool,
}

impl FinalizedBlockResolver {
    /// Create a resolver. `debug` selects the attested header.
    pub fn new(source: Arc<dyn FinalityUpdateSource>, debug: bool) -> Self {
        Self { source, debug }
    }

    /// Fetch one finality update and extract the execution block hash.
    pub async fn resolve_finalized_hash(&self) -> SyncResult<H256> {
        let update = self.source.finality_update().await?;
        let header = if self.debug {
            &update.data.attested_header
        } else {
            &update.data.finalized_header
        };
        let hash = parse_block_hash(&header.execution_payload_header.block_hash)?;
        debug!(
            block_hash = %format!("{hash:#x}"),
            attested = self.debug,
            "[qc-18] Resolved finalized block hash"
        );
        Ok(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RestakingSyncError;
    use crate::ports::outbound::{FinalityUpdate, MockFinalitySource};

    fn hash_hex(byte: u8) -> String {
        format!("0x{}", hex::encode([byte; 32]))
    }

    #[tokio::test]
    async fn test_resolves_finalized_header() {
        let source = MockFinalitySource::default();
        source.set(Some(FinalityUpdate::new(hash_hex(1), hash_hex(2))));
        let resolver = FinalizedBlockResolver::new(Arc::new(source), false);
        assert_eq!(
            resolver.resolve_finalized_hash().await.unwrap(),
            H256::repeat_byte(2)
        );
    }

    #[tokio::test]
    async fn test_debug_resolves_attested_header() {
        let source = MockFinalitySource::default();
        source.set(Some(FinalityUpdate::new(hash_hex(1), hash_hex(2))));
        let resolver = FinalizedBlockResolver::new(Arc::new(source), true);
        assert_eq!(
            resolver.resolve_finalized_hash().await.unwrap(),
            H256::repeat_byte(1)
        );
    }

    #[test]
    fn test_short_hash_is_error() {
        let resolver =
            FinalizedBlockResolver::new(Arc::new(MockFinalitySource::with_hash("0xabcd")), false);
        tokio_test::assert_err!(tokio_test::block_on(resolver.resolve_finalized_hash()));
    }

    #[tokio::test]
    async fn test_source_failure_propagates() {
        let resolver = FinalizedBlockResolver::new(Arc::new(MockFinalitySource::failing()), false);
        assert!(matches!(
            resolver.resolve_finalized_hash().await,
            Err(RestakingSyncError::Transport(_))
        ));
    }
}
