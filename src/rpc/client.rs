//! JSON-RPC client for a single node endpoint
//!
//! Every call carries the configured timeout; callers see a typed `RpcError`.

mod methods;

pub use methods::NodeRpc;

use super::types::{RpcError, RpcResult};
use crate::config::RpcConfig;
use crate::logger::{self, LogTag};
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub struct RpcClient {
    url: String,
    http: Client,
    commitment: String,
    request_id: AtomicU64,
}

impl RpcClient {
    pub fn new(url: &str, timeout: Duration, commitment: &str) -> RpcResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcError::ConnectionFailed(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            url: url.to_string(),
            http,
            commitment: commitment.to_string(),
            request_id: AtomicU64::new(1),
        })
    }

    pub fn from_config(config: &RpcConfig) -> RpcResult<Self> {
        Self::new(&config.url, config.timeout(), &config.commitment)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn commitment(&self) -> &str {
        &self.commitment
    }

    /// Issue a raw JSON-RPC call and return its `result` member
    pub async fn execute_raw(&self, method: &str, params: Value) -> RpcResult<Value> {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        logger::verbose(LogTag::Rpc, &format!("→ {} #{} {}", method, id, payload["params"]));

        let response = self
            .http
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RpcError::Timeout {
                        method: method.to_string(),
                    }
                } else {
                    RpcError::ConnectionFailed(format!("{} request failed: {}", method, e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            logger::warning(
                LogTag::Rpc,
                &format!("{} returned HTTP {}", method, status.as_u16()),
            );
            return Err(RpcError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let body: Value = response.json().await.map_err(|e| {
            if e.is_timeout() {
                RpcError::Timeout {
                    method: method.to_string(),
                }
            } else {
                RpcError::InvalidResponse(format!("{} response is not JSON: {}", method, e))
            }
        })?;

        if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
            let code = error.get("code").and_then(|c| c.as_i64()).unwrap_or(0);
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown error")
                .to_string();
            logger::debug(
                LogTag::Rpc,
                &format!("{} failed with code {}: {}", method, code, message),
            );
            return Err(RpcError::Rpc { code, message });
        }

        body.get("result")
            .cloned()
            .ok_or_else(|| RpcError::InvalidResponse(format!("{} response has no result", method)))
    }
}
