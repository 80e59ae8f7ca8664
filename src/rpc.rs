//! Node RPC access
//!
//! `RpcClient` talks JSON-RPC to one endpoint; the rest of the crate only
//! sees the `NodeRpc` trait so tests can substitute a double.

pub mod client;
pub mod types;

pub use client::{NodeRpc, RpcClient};
pub use types::{RpcError, RpcResult, SignatureInfo, SignatureStatus, TokenAccountInfo};

use crate::errors::FlowError;

impl From<RpcError> for FlowError {
    fn from(error: RpcError) -> Self {
        FlowError::upstream(error.to_string())
    }
}
