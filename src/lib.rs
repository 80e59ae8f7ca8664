//! swapdesk: Solana swap and transfer orchestration
//!
//! Aggregates wallet holdings, prices swaps through a routing API, builds
//! unsigned transactions, and walks each attempt through signing and
//! settlement.

pub mod arguments;
pub mod balances;
pub mod config;
pub mod constants;
pub mod errors;
pub mod logger;
pub mod orchestrator;
pub mod quotes;
pub mod routers;
pub mod rpc;
pub mod tokens;
pub mod transactions;
pub mod utils;
pub mod wallet;
