//! In-Memory Store Adapters
//!
//! `BlockHashStore` and `StakingKeeper` backed by process memory. Used by
//! tests and single-process hosts; a chain host plugs in its module store.

use crate::domain::{CachedBlockHash, ConsensusAddress, RestakingSyncError, SyncResult, Validator};
use crate::ports::outbound::{BlockHashStore, StakingKeeper};
use parking_lot::RwLock;
use primitive_types::U256;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// In-memory cycle cache and watermark.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    /// Cached outcomes by consensus height.
    entries: RwLock<BTreeMap<u64, CachedBlockHash>>,
    prev_block_time: RwLock<u64>,
    min_block_timestamp: RwLock<u64>,
    /// Fail every write (fault injection).
    fail_writes: AtomicBool,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum external block timestamp policy.
    pub fn with_min_block_timestamp(self, min: u64) -> Self {
        *self.min_block_timestamp.write() = min;
        self
    }

    /// Make subsequent writes fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of cached cycles.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn check_write(&self) -> SyncResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RestakingSyncError::Storage("write rejected".to_string()));
        }
        Ok(())
    }
}

impl BlockHashStore for InMemoryStore {
    fn cache_block_hash(&self, entry: CachedBlockHash) -> SyncResult<()> {
        self.check_write()?;
        debug!(
            "[qc-18] Caching block hash {} at height {}",
            entry.block_hash, entry.height
        );
        self.entries.write().insert(entry.height, entry);
        Ok(())
    }

    fn cached_block_hash(&self, height: u64) -> SyncResult<Option<CachedBlockHash>> {
        Ok(self.entries.read().get(&height).cloned())
    }

    fn latest_cached_block_hash(&self) -> SyncResult<Option<CachedBlockHash>> {
        Ok(self.entries.read().values().next_back().cloned())
    }

    fn latest_accepted_block_hash(&self) -> SyncResult<Option<CachedBlockHash>> {
        Ok(self
            .entries
            .read()
            .values()
            .rev()
            .find(|entry| !entry.is_sentinel())
            .cloned())
    }

    fn prev_block_time(&self) -> SyncResult<u64> {
        Ok(*self.prev_block_time.read())
    }

    fn set_prev_block_time(&self, time: u64) -> SyncResult<()> {
        self.check_write()?;
        *self.prev_block_time.write() = time;
        Ok(())
    }

    fn record_accepted(&self, entry: CachedBlockHash, block_time: u64) -> SyncResult<()> {
        self.check_write()?;
        let mut entries = self.entries.write();
        let mut prev_block_time = self.prev_block_time.write();
        debug!(
            "[qc-18] Recording accepted block hash {} at height {}",
            entry.block_hash, entry.height
        );
        entries.insert(entry.height, entry);
        *prev_block_time = block_time;
        Ok(())
    }

    fn min_block_timestamp(&self) -> SyncResult<u64> {
        Ok(*self.min_block_timestamp.read())
    }
}

/// In-memory staking keeper keyed by consensus address.
#[derive(Debug, Default)]
pub struct InMemoryStakingKeeper {
    validators: RwLock<HashMap<ConsensusAddress, Validator>>,
}

impl InMemoryStakingKeeper {
    /// Create an empty keeper.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a validator.
    pub fn insert(&self, validator: Validator) {
        self.validators.write().insert(validator.cons_addr, validator);
    }

    /// Current validator record.
    pub fn get(&self, addr: &ConsensusAddress) -> Option<Validator> {
        self.validators.read().get(addr).cloned()
    }

    /// Number of validators.
    pub fn len(&self) -> usize {
        self.validators.read().len()
    }

    /// Check if no validators are registered.
    pub fn is_empty(&self) -> bool {
        self.validators.read().is_empty()
    }
}

impl StakingKeeper for InMemoryStakingKeeper {
    fn validator_by_cons_addr(&self, addr: &ConsensusAddress) -> SyncResult<Validator> {
        self.get(addr)
            .ok_or_else(|| RestakingSyncError::ValidatorNotFound(addr.to_string()))
    }

    fn set_validator_tokens(&self, mut validator: Validator, tokens: U256) -> SyncResult<()> {
        let mut validators = self.validators.write();
        if !validators.contains_key(&validator.cons_addr) {
            return Err(RestakingSyncError::ValidatorNotFound(
                validator.cons_addr.to_string(),
            ));
        }
        validator.tokens = tokens;
        validators.insert(validator.cons_addr, validator);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use primitive_types::H256;

    #[test]
    fn test_cache_and_lookup() {
        let store = InMemoryStore::new();
        store
            .cache_block_hash(CachedBlockHash::accepted(&H256::repeat_byte(1), 100))
            .unwrap();
        store.cache_block_hash(CachedBlockHash::skipped(200)).unwrap();

        assert_eq!(store.len(), 2);
        assert!(store.cached_block_hash(150).unwrap().is_none());
        assert!(store.cached_block_hash(200).unwrap().unwrap().is_sentinel());
        assert_eq!(store.latest_cached_block_hash().unwrap().unwrap().height, 200);

        let accepted = store.latest_accepted_block_hash().unwrap().unwrap();
        assert_eq!(accepted.height, 100);
        assert_eq!(accepted.accepted_hash(), Some(H256::repeat_byte(1)));
    }

    #[test]
    fn test_cache_overwrites_height() {
        let store = InMemoryStore::new();
        store.cache_block_hash(CachedBlockHash::skipped(100)).unwrap();
        store
            .cache_block_hash(CachedBlockHash::accepted(&H256::repeat_byte(2), 100))
            .unwrap();
        assert_eq!(store.len(), 1);
        assert!(!store.cached_block_hash(100).unwrap().unwrap().is_sentinel());
    }

    #[test]
    fn test_watermark_defaults_to_zero() {
        let store = InMemoryStore::new().with_min_block_timestamp(7);
        assert_eq!(store.prev_block_time().unwrap(), 0);
        assert_eq!(store.min_block_timestamp().unwrap(), 7);
        store.set_prev_block_time(50).unwrap();
        assert_eq!(store.prev_block_time().unwrap(), 50);
    }

    #[test]
    fn test_fail_writes() {
        let store = InMemoryStore::new();
        store.set_fail_writes(true);
        assert!(matches!(
            store.cache_block_hash(CachedBlockHash::skipped(1)),
            Err(RestakingSyncError::Storage(_))
        ));
        assert!(store.set_prev_block_time(1).is_err());
        assert!(store.is_empty());

        store.set_fail_writes(false);
        assert!(store.set_prev_block_time(1).is_ok());
    }

    #[test]
    fn test_record_accepted_writes_both_or_neither() {
        let store = InMemoryStore::new();
        store.set_fail_writes(true);
        let entry = CachedBlockHash::accepted(&H256::repeat_byte(3), 100);
        assert!(store.record_accepted(entry.clone(), 50).is_err());
        assert!(store.is_empty());
        assert_eq!(store.prev_block_time().unwrap(), 0);

        store.set_fail_writes(false);
        store.record_accepted(entry.clone(), 50).unwrap();
        assert_eq!(store.cached_block_hash(100).unwrap(), Some(entry));
        assert_eq!(store.prev_block_time().unwrap(), 50);
    }

    #[test]
    fn test_keeper_lookup_and_overwrite() {
        let keeper = InMemoryStakingKeeper::new();
        let addr = ConsensusAddress([0xaa; 32]);
        keeper.insert(Validator::new("op-a", addr, U256::from(3)));

        let validator = keeper.validator_by_cons_addr(&addr).unwrap();
        keeper.set_validator_tokens(validator, U256::from(500)).unwrap();
        assert_eq!(keeper.get(&addr).unwrap().tokens, U256::from(500));
        assert_eq!(keeper.get(&addr).unwrap().operator, "op-a");
    }

    #[test]
    fn test_keeper_unknown_validator() {
        let keeper = InMemoryStakingKeeper::new();
        let addr = ConsensusAddress([0xbb; 32]);
        let err = keeper.validator_by_cons_addr(&addr).unwrap_err();
        assert!(err.is_not_found());

        let ghost = Validator::new("ghost", addr, U256::zero());
        assert!(keeper.set_validator_tokens(ghost, U256::one()).is_err());
    }
}
