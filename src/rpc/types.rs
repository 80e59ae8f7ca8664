use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RpcError {
    #[error("RPC request timeout ({method})")]
    Timeout { method: String },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("HTTP {status} from RPC endpoint")]
    HttpStatus { status: u16 },

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

pub type RpcResult<T> = Result<T, RpcError>;

/// Parsed SPL / Token-2022 token account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenAccountInfo {
    pub account: String,
    pub mint: String,
    pub owner: String,
    pub amount: u64,
    pub decimals: u8,
    pub program_id: String,
    pub is_token_2022: bool,
}

/// Entry of getSignaturesForAddress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureInfo {
    pub signature: String,
    pub slot: u64,
    pub block_time: Option<i64>,
    pub succeeded: bool,
    pub memo: Option<String>,
}

/// Entry of getSignatureStatuses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureStatus {
    pub slot: u64,
    pub confirmation_status: Option<String>,
    /// Serialized transaction error, if execution failed
    pub err: Option<String>,
}

impl SignatureStatus {
    /// Whether the status has reached `commitment`
    pub fn satisfies(&self, commitment: &str) -> bool {
        let reached = self.confirmation_status.as_deref().unwrap_or("");
        match commitment {
            "processed" => matches!(reached, "processed" | "confirmed" | "finalized"),
            "confirmed" => matches!(reached, "confirmed" | "finalized"),
            "finalized" => reached == "finalized",
            _ => false,
        }
    }
}
