// Library root module for stargate-exec
// This file defines the public API and module structure: fetch Stargate
// routes, then execute a route's steps in order on an EVM or Solana account
//
// Numan Thabit 2025 Nov

pub mod chains;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod router;
pub mod signing;
pub mod transport;
