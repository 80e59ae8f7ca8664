use crate::errors::{FailureReason, FlowError};
use crate::quotes::Quote;
use crate::tokens::{format_raw_amount_trimmed, Asset};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransactionKind {
    Swap,
    Transfer,
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionKind::Swap => write!(f, "swap"),
            TransactionKind::Transfer => write!(f, "transfer"),
        }
    }
}

/// A resolved direct transfer
#[derive(Debug, Clone, PartialEq)]
pub struct TransferIntent {
    pub asset: Asset,
    pub owner: String,
    pub recipient: String,
    pub amount_raw: u64,
    /// Token account debited; `None` for native transfers
    pub source_account: Option<String>,
    /// Recipient token account credited; `None` for native transfers
    pub destination_account: Option<String>,
    /// The transaction creates the recipient's associated account
    pub creates_destination_account: bool,
}

impl TransferIntent {
    pub fn amount(&self) -> String {
        format_raw_amount_trimmed(self.amount_raw, self.asset.decimals)
    }
}

/// What a pending transaction encodes
#[derive(Debug, Clone)]
pub enum TransactionIntent {
    Swap(Quote),
    Transfer(TransferIntent),
}

impl TransactionIntent {
    pub fn kind(&self) -> TransactionKind {
        match self {
            TransactionIntent::Swap(_) => TransactionKind::Swap,
            TransactionIntent::Transfer(_) => TransactionKind::Transfer,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            TransactionIntent::Swap(quote) => format!(
                "swap {} {} → ~{} {}",
                quote.input_amount(),
                quote.source.symbol,
                quote.output_estimate(),
                quote.destination.symbol
            ),
            TransactionIntent::Transfer(intent) => format!(
                "transfer {} {} → {}",
                intent.amount(),
                intent.asset.symbol,
                intent.recipient
            ),
        }
    }
}

/// Unsigned transaction ready for the wallet
#[derive(Debug, Clone)]
pub struct PendingTransaction {
    /// Client-generated id matching this payload to its eventual result
    pub correlation_id: String,
    /// bincode serialized `VersionedTransaction`, unsigned
    pub payload: Vec<u8>,
    pub intent: TransactionIntent,
    pub last_valid_block_height: Option<u64>,
    pub created_at: DateTime<Utc>,
}

impl PendingTransaction {
    pub fn new(
        payload: Vec<u8>,
        intent: TransactionIntent,
        last_valid_block_height: Option<u64>,
    ) -> Self {
        Self {
            correlation_id: uuid::Uuid::new_v4().to_string(),
            payload,
            intent,
            last_valid_block_height,
            created_at: Utc::now(),
        }
    }

    pub fn kind(&self) -> TransactionKind {
        self.intent.kind()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SettlementStatus {
    Submitted,
    Confirmed,
    Failed,
}

/// Outcome of a pending transaction, emitted to subscribers
#[derive(Debug, Clone, Serialize)]
pub struct TransactionResult {
    pub correlation_id: String,
    pub kind: TransactionKind,
    pub signature: Option<String>,
    pub status: SettlementStatus,
    pub failure: Option<FailureReason>,
    pub message: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl TransactionResult {
    pub fn submitted(pending: &PendingTransaction, signature: &str) -> Self {
        Self {
            correlation_id: pending.correlation_id.clone(),
            kind: pending.kind(),
            signature: Some(signature.to_string()),
            status: SettlementStatus::Submitted,
            failure: None,
            message: None,
            recorded_at: Utc::now(),
        }
    }

    pub fn confirmed(&self) -> Self {
        Self {
            status: SettlementStatus::Confirmed,
            recorded_at: Utc::now(),
            ..self.clone()
        }
    }

    pub fn failed(
        correlation_id: &str,
        kind: TransactionKind,
        signature: Option<String>,
        error: &FlowError,
    ) -> Self {
        Self {
            correlation_id: correlation_id.to_string(),
            kind,
            signature,
            status: SettlementStatus::Failed,
            failure: error.reason(),
            message: Some(error.to_string()),
            recorded_at: Utc::now(),
        }
    }
}
