//! # Domain Invariants
//!
//! Deterministic acceptance rules. Every node evaluates these on the same
//! inputs, so they must not depend on anything but their arguments.

use super::entities::ExternalBlock;
use super::value_objects::SkipReason;
use primitive_types::H256;

/// Invariant: the protocol runs only at multiples of the sync period.
pub fn invariant_sync_height(height: u64, sync_period: u64) -> bool {
    sync_period != 0 && height % sync_period == 0
}

/// Invariant: the block at the reported number still has the reported hash.
pub fn invariant_canonical(candidate: &H256, by_number: &ExternalBlock) -> Result<(), SkipReason> {
    if by_number.hash != *candidate {
        return Err(SkipReason::Reorganized);
    }
    Ok(())
}

/// Invariant: timestamp gate.
///
/// Accept only if `prev_block_time <= block_time < header_time` and
/// `block_time >= min_block_timestamp`.
pub fn invariant_block_time(
    block_time: u64,
    prev_block_time: u64,
    header_time: u64,
    min_block_timestamp: u64,
) -> Result<(), SkipReason> {
    if block_time < prev_block_time {
        return Err(SkipReason::BeforeWatermark);
    }
    if block_time >= header_time {
        return Err(SkipReason::NotInPast);
    }
    if block_time < min_block_timestamp {
        return Err(SkipReason::BelowMinimum);
    }
    Ok(())
}
