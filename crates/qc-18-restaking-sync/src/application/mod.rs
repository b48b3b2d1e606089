//! # Application Layer
//!
//! Agreement machine, synchronizer and the service composing them.

pub mod agreement;
pub mod resolver;
pub mod service;
pub mod synchronizer;

pub use agreement::BlockHashAgreement;
pub use resolver::FinalizedBlockResolver;
pub use service::RestakingSyncService;
pub use synchronizer::ValidatorSetSynchronizer;
