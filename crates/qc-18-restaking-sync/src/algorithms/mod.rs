//! # Algorithms Module
//!
//! Wire encodings shared by the agreement machine and the synchronizer.

pub mod abi;
pub mod payload;

pub use abi::{
    decode_epoch, decode_uint, decode_validator_set, encode_current_epoch_call,
    encode_validator_set, encode_validator_set_call, function_selector, u256_word,
    GET_CURRENT_EPOCH_SELECTOR, GET_VALIDATOR_SET_SIGNATURE, MAX_UINT48,
};
pub use payload::{decode_candidate, encode_candidate};
