use crate::errors::FlowError;
use crate::transactions::PendingTransaction;
use async_trait::async_trait;

/// Holder of the user's key
///
/// Implementations never expose key material. A user declining any prompt
/// surfaces as `FlowError::UserRejected`.
#[async_trait]
pub trait WalletSigner: Send + Sync {
    fn name(&self) -> &str;

    /// Request access; returns the wallet's public address
    async fn connect(&self) -> Result<String, FlowError>;

    async fn disconnect(&self);

    /// Sign the pending transaction and hand it to the network
    ///
    /// Returns the transaction signature.
    async fn sign_and_submit(&self, pending: &PendingTransaction) -> Result<String, FlowError>;
}
