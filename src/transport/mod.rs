// Transport layer
// HTTP clients for the Stargate quote service and chain JSON-RPC nodes
//
// Numan Thabit 2025 Nov

pub mod jsonrpc;
pub mod stargate;

pub use jsonrpc::JsonRpc;
pub use stargate::{RouteEndpoint, RouteFetcher};
