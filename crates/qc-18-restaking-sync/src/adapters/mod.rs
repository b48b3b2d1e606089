//! # Adapters Layer (Hexagonal Architecture)
//!
//! Implements outbound port traits: HTTP clients for the beacon and
//! execution endpoints, endpoint rotation, and in-memory stores.

mod beacon_client;
mod endpoint_pool;
mod eth_rpc_client;
mod memory_store;

pub use beacon_client::{finality_update_url, BeaconApiClient, FINALITY_UPDATE_PATH};
pub use endpoint_pool::{EndpointHealth, RotatingEndpointPool};
pub use eth_rpc_client::{
    call_params, parse_data, parse_quantity, EthRpcClient, JsonRpcError, JsonRpcRequest,
    JsonRpcResponse, RpcBlock,
};
pub use memory_store::{InMemoryStakingKeeper, InMemoryStore};
