//! # Middleware ABI
//!
//! Calldata encoding and return-data decoding for the two middleware entry
//! points the synchronizer uses:
//!
//! ```text
//! getCurrentEpoch()         -> uint48           selector b97dd9e2
//! getValidatorSet(uint48)   -> (uint256 stake, bytes32 consAddr)[]
//! ```

use crate::domain::{ConsensusAddress, ExternalValidator, RestakingSyncError, SyncResult};
use primitive_types::U256;
use sha3::{Digest, Keccak256};

/// ABI word size.
const WORD: usize = 32;

/// Largest value representable as `uint48`.
pub const MAX_UINT48: u64 = (1 << 48) - 1;

/// Selector of the middleware's current-epoch getter.
pub const GET_CURRENT_EPOCH_SELECTOR: [u8; 4] = [0xb9, 0x7d, 0xd9, 0xe2];

/// Canonical signature of the validator-set getter.
pub const GET_VALIDATOR_SET_SIGNATURE: &str = "getValidatorSet(uint48)";

/// First four bytes of the Keccak-256 of a function signature.
pub fn function_selector(signature: &str) -> [u8; 4] {
    let digest = Keccak256::digest(signature.as_bytes());
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&digest[..4]);
    selector
}

/// Calldata for `getCurrentEpoch()`.
pub fn encode_current_epoch_call() -> Vec<u8> {
    GET_CURRENT_EPOCH_SELECTOR.to_vec()
}

/// Calldata for `getValidatorSet(epoch)`.
pub fn encode_validator_set_call(epoch: u64) -> SyncResult<Vec<u8>> {
    if epoch > MAX_UINT48 {
        return Err(RestakingSyncError::Abi(format!(
            "epoch {epoch} does not fit in uint48"
        )));
    }
    let mut data = Vec::with_capacity(4 + WORD);
    data.extend_from_slice(&function_selector(GET_VALIDATOR_SET_SIGNATURE));
    let mut word = [0u8; WORD];
    U256::from(epoch).to_big_endian(&mut word);
    data.extend_from_slice(&word);
    Ok(data)
}

/// Decode a big-endian unsigned integer return value.
pub fn decode_uint(data: &[u8]) -> SyncResult<U256> {
    if data.is_empty() || data.len() > WORD {
        return Err(RestakingSyncError::Abi(format!(
            "expected up to {WORD} bytes of integer, got {}",
            data.len()
        )));
    }
    Ok(U256::from_big_endian(data))
}

/// Decode the current-epoch return value as a `uint48`.
pub fn decode_epoch(data: &[u8]) -> SyncResult<u64> {
    let value = decode_uint(data)?;
    if value > U256::from(MAX_UINT48) {
        return Err(RestakingSyncError::Abi(format!(
            "epoch {value} does not fit in uint48"
        )));
    }
    Ok(value.low_u64())
}

/// Decode `tuple(uint256 stake, bytes32 consAddr)[]` return data.
pub fn decode_validator_set(data: &[u8]) -> SyncResult<Vec<ExternalValidator>> {
    let offset = word_as_usize(data, 0)?;
    let len = word_as_usize(data, offset)?;
    let start = offset
        .checked_add(WORD)
        .ok_or_else(|| RestakingSyncError::Abi("array offset overflow".into()))?;
    let end = len
        .checked_mul(2 * WORD)
        .and_then(|size| size.checked_add(start))
        .ok_or_else(|| RestakingSyncError::Abi("array length overflow".into()))?;
    if data.len() < end {
        return Err(RestakingSyncError::Abi(format!(
            "return data truncated: need {end} bytes for {len} validators, got {}",
            data.len()
        )));
    }

    let mut validators = Vec::with_capacity(len);
    for i in 0..len {
        let row = start + i * 2 * WORD;
        let stake = U256::from_big_endian(&data[row..row + WORD]);
        let mut cons_addr = [0u8; WORD];
        cons_addr.copy_from_slice(&data[row + WORD..row + 2 * WORD]);
        validators.push(ExternalValidator {
            stake,
            cons_addr: ConsensusAddress(cons_addr),
        });
    }
    Ok(validators)
}

/// Encode a validator table the way the middleware returns it.
pub fn encode_validator_set(validators: &[ExternalValidator]) -> Vec<u8> {
    let mut data = Vec::with_capacity(2 * WORD + validators.len() * 2 * WORD);
    data.extend_from_slice(&u256_word(U256::from(WORD)));
    data.extend_from_slice(&u256_word(U256::from(validators.len())));
    for validator in validators {
        data.extend_from_slice(&u256_word(validator.stake));
        data.extend_from_slice(validator.cons_addr.as_bytes());
    }
    data
}

/// Encode a single `uint256` return value.
pub fn u256_word(value: U256) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    value.to_big_endian(&mut word);
    word
}

fn word_as_usize(data: &[u8], at: usize) -> SyncResult<usize> {
    let end = at
        .checked_add(WORD)
        .ok_or_else(|| RestakingSyncError::Abi("word offset overflow".into()))?;
    let word = data.get(at..end).ok_or_else(|| {
        RestakingSyncError::Abi(format!("return data truncated at offset {at}"))
    })?;
    let value = U256::from_big_endian(word);
    if value > U256::from(usize::MAX) {
        return Err(RestakingSyncError::Abi(format!("value {value} out of range")));
    }
    Ok(value.as_usize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_selector() {
        // keccak256("transfer(address,uint256)")
        assert_eq!(
            function_selector("transfer(address,uint256)"),
            [0xa9, 0x05, 0x9c, 0xbb]
        );
    }

    #[test]
    fn test_encode_validator_set_call() {
        let data = encode_validator_set_call(7).unwrap();
        assert_eq!(data.len(), 36);
        assert_eq!(&data[..4], &function_selector(GET_VALIDATOR_SET_SIGNATURE));
        assert_eq!(data[35], 7);
        assert!(data[4..35].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_epoch_out_of_range() {
        assert!(encode_validator_set_call(MAX_UINT48).is_ok());
        assert!(encode_validator_set_call(MAX_UINT48 + 1).is_err());
    }

    #[test]
    fn test_decode_epoch() {
        assert_eq!(decode_epoch(&u256_word(U256::from(42u64))).unwrap(), 42);
        assert!(decode_epoch(&[]).is_err());
        assert!(decode_epoch(&u256_word(U256::from(MAX_UINT48) + 1)).is_err());
    }

    #[test]
    fn test_decode_validator_set_fixed_vector() {
        let mut data = Vec::new();
        data.extend_from_slice(&u256_word(U256::from(32u64)));
        data.extend_from_slice(&u256_word(U256::from(2u64)));
        data.extend_from_slice(&u256_word(U256::from(500u64)));
        data.extend_from_slice(&[0xaa; 32]);
        data.extend_from_slice(&u256_word(U256::from(10u64)));
        data.extend_from_slice(&[0xbb; 32]);

        let validators = decode_validator_set(&data).unwrap();
        assert_eq!(validators.len(), 2);
        assert_eq!(validators[0].stake, U256::from(500u64));
        assert_eq!(validators[0].cons_addr, ConsensusAddress([0xaa; 32]));
        assert_eq!(validators[1].stake, U256::from(10u64));
        assert_eq!(validators[1].cons_addr, ConsensusAddress([0xbb; 32]));
    }

    #[test]
    fn test_decode_empty_validator_set() {
        let data = encode_validator_set(&[]);
        assert!(decode_validator_set(&data).unwrap().is_empty());
    }

    #[test]
    fn test_decode_truncated_validator_set() {
        let mut data = encode_validator_set(&[ExternalValidator {
            stake: U256::one(),
            cons_addr: ConsensusAddress([1; 32]),
        }]);
        data.truncate(data.len() - 1);
        assert!(matches!(
            decode_validator_set(&data),
            Err(RestakingSyncError::Abi(_))
        ));
    }

    #[test]
    fn test_decode_absurd_length() {
        let mut data = Vec::new();
        data.extend_from_slice(&u256_word(U256::from(32u64)));
        data.extend_from_slice(&u256_word(U256::MAX));
        assert!(decode_validator_set(&data).is_err());
    }
}
