/// Unsigned transaction construction and the records that follow a transaction
/// from build to settlement.
pub mod builder;
pub mod types;

pub use builder::{validate_transfer_amount, TransactionBuilder, TransferRequest};
pub use types::{
    PendingTransaction, SettlementStatus, TransactionIntent, TransactionKind, TransactionResult,
    TransferIntent,
};
