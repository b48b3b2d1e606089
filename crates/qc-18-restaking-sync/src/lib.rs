//! # QC-18 Restaking Sync
//!
//! Agreement on a finalized external (Ethereum) block hash, and validator
//! power synchronization from a restaking middleware contract.
//!
//! **Subsystem ID:** 18
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! Every `sync_period` heights:
//! - the proposer injects the execution hash of the latest finalized beacon
//!   header (or a sentinel when none is available) as the first transaction,
//! - every node re-checks that hash against the execution chain and caches
//!   the outcome,
//! - at end of block, local validator tokens are overwritten with the stakes
//!   the middleware reports at the accepted hash.
//!
//! ## Acceptance Checks
//!
//! | Check | Rejects |
//! |-------|---------|
//! | Sentinel | Proposer had no finalized hash |
//! | By hash | Block unknown to the execution endpoint |
//! | By number | Block no longer canonical |
//! | Watermark | Older than the last accepted block |
//! | Header time | Not strictly in the past |
//! | Minimum | Older than the configured floor |
//!
//! ## Module Structure
//!
//! ```text
//! qc-18-restaking-sync/
//! ├── domain/          # CachedBlockHash, SkipReason, errors, invariants
//! ├── algorithms/      # Middleware ABI, injected tx encoding
//! ├── ports/           # ProposalHandler, ValidatorPowerSync, outbound traits
//! ├── adapters/        # Beacon/JSON-RPC clients, endpoint pool, in-memory stores
//! └── application/     # Agreement machine, synchronizer, service
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod telemetry;

// Re-exports
pub use adapters::{
    BeaconApiClient, EndpointHealth, EthRpcClient, InMemoryStakingKeeper, InMemoryStore,
    RotatingEndpointPool,
};
pub use application::{
    BlockHashAgreement, FinalizedBlockResolver, RestakingSyncService, ValidatorSetSynchronizer,
};
pub use config::{ConfigError, RestakingSyncConfig};
pub use domain::{
    AgreementOutcome, AgreementState, BlockHashCandidate, CachedBlockHash, ConsensusAddress,
    ExternalBlock, ExternalValidator, FatalError, FatalReason, HashSource, RestakingSyncError,
    SkipReason, SyncReport, SyncResult, Validator, INVALID_BLOCKHASH,
};
pub use ports::{
    BlockHashStore, EndpointProvider, ExecutionChainClient, FinalityUpdate, FinalityUpdateSource,
    MockExecutionClient, MockFinalitySource, ProposalHandler, StakingKeeper,
    StaticEndpointProvider, ValidatorPowerSync,
};
pub use telemetry::{init_logging, LoggingConfig};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
