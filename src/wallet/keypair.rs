/// Local keypair signer
///
/// Signs with a keypair loaded from config and submits through the node.
/// An optional approval hook stands in for the wallet's confirmation prompt.
use super::signer::WalletSigner;
use crate::errors::FlowError;
use crate::logger::{self, LogTag};
use crate::rpc::NodeRpc;
use crate::transactions::PendingTransaction;
use crate::utils::short_address;
use async_trait::async_trait;
use base64::Engine;
use solana_sdk::{
    signature::Keypair,
    signer::Signer,
    transaction::VersionedTransaction,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Approval prompt; `false` means the user declined
pub type ApprovalFn = Arc<dyn Fn(&PendingTransaction) -> bool + Send + Sync>;

pub struct KeypairSigner {
    keypair: Keypair,
    rpc: Arc<dyn NodeRpc>,
    approval: Option<ApprovalFn>,
    connected: AtomicBool,
}

impl KeypairSigner {
    pub fn new(keypair: Keypair, rpc: Arc<dyn NodeRpc>) -> Self {
        Self {
            keypair,
            rpc,
            approval: None,
            connected: AtomicBool::new(false),
        }
    }

    pub fn with_approval(mut self, approval: ApprovalFn) -> Self {
        self.approval = Some(approval);
        self
    }

    pub fn address(&self) -> String {
        self.keypair.pubkey().to_string()
    }

    fn sign(&self, pending: &PendingTransaction) -> Result<String, FlowError> {
        let mut transaction: VersionedTransaction = bincode::deserialize(&pending.payload)
            .map_err(|e| {
                FlowError::submission_failed(format!("Failed to deserialize transaction: {}", e))
            })?;

        let fee_payer = transaction.message.static_account_keys().first().copied();
        if fee_payer != Some(self.keypair.pubkey()) {
            return Err(FlowError::submission_failed(format!(
                "Transaction fee payer {:?} is not this wallet",
                fee_payer.map(|k| k.to_string())
            )));
        }

        let signature = self.keypair.sign_message(&transaction.message.serialize());
        if transaction.signatures.is_empty() {
            transaction.signatures.push(signature);
        } else {
            transaction.signatures[0] = signature;
        }

        let signed = bincode::serialize(&transaction).map_err(|e| {
            FlowError::submission_failed(format!("Failed to serialize signed transaction: {}", e))
        })?;

        Ok(base64::engine::general_purpose::STANDARD.encode(signed))
    }
}

#[async_trait]
impl WalletSigner for KeypairSigner {
    fn name(&self) -> &str {
        "keypair"
    }

    async fn connect(&self) -> Result<String, FlowError> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(self.address())
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    async fn sign_and_submit(&self, pending: &PendingTransaction) -> Result<String, FlowError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(FlowError::WalletNotConnected);
        }

        if let Some(approve) = &self.approval {
            if !approve(pending) {
                logger::info(
                    LogTag::Wallet,
                    &format!("Signing declined for {}", pending.intent.describe()),
                );
                return Err(FlowError::UserRejected);
            }
        }

        let signed = self.sign(pending)?;

        logger::debug(
            LogTag::Wallet,
            &format!(
                "Submitting {} signed by {}",
                pending.correlation_id,
                short_address(&self.address())
            ),
        );

        self.rpc
            .send_transaction(&signed)
            .await
            .map_err(|e| FlowError::submission_failed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balances::aggregator::tests::FakeRpc;
    use crate::balances::Balance;
    use crate::transactions::{TransactionIntent, TransferIntent};
    use solana_sdk::{message::Message, pubkey::Pubkey, system_instruction, transaction::Transaction};

    fn pending_for(payer: &Pubkey) -> PendingTransaction {
        let message = Message::new(
            &[system_instruction::transfer(payer, &Pubkey::new_unique(), 5)],
            Some(payer),
        );
        let tx = VersionedTransaction::from(Transaction::new_unsigned(message));
        let holding = Balance::native(&payer.to_string(), 10);
        PendingTransaction::new(
            bincode::serialize(&tx).unwrap(),
            TransactionIntent::Transfer(TransferIntent {
                asset: holding.asset.clone(),
                owner: payer.to_string(),
                recipient: Pubkey::new_unique().to_string(),
                amount_raw: 5,
                source_account: None,
                destination_account: None,
                creates_destination_account: false,
            }),
            None,
        )
    }

    #[tokio::test]
    async fn test_signs_and_submits() {
        let rpc = Arc::new(FakeRpc::default());
        let keypair = Keypair::new();
        let pubkey = keypair.pubkey();
        let signer = KeypairSigner::new(keypair, rpc.clone());

        assert_eq!(signer.connect().await.unwrap(), pubkey.to_string());
        let signature = signer.sign_and_submit(&pending_for(&pubkey)).await.unwrap();
        assert_eq!(signature, "FakeSignature1111");

        let sent = rpc.sent.lock()[0].clone();
        let bytes = base64::engine::general_purpose::STANDARD.decode(sent).unwrap();
        let tx: VersionedTransaction = bincode::deserialize(&bytes).unwrap();
        assert!(tx.signatures[0].verify(pubkey.as_ref(), &tx.message.serialize()));
    }

    #[tokio::test]
    async fn test_declined_approval_is_user_rejected() {
        let rpc = Arc::new(FakeRpc::default());
        let keypair = Keypair::new();
        let pubkey = keypair.pubkey();
        let signer = KeypairSigner::new(keypair, rpc.clone()).with_approval(Arc::new(|_| false));
        signer.connect().await.unwrap();

        let err = signer.sign_and_submit(&pending_for(&pubkey)).await.unwrap_err();
        assert_eq!(err, FlowError::UserRejected);
        assert!(rpc.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn test_foreign_payer_is_not_signed() {
        let rpc = Arc::new(FakeRpc::default());
        let signer = KeypairSigner::new(Keypair::new(), rpc.clone());
        signer.connect().await.unwrap();

        let err = signer
            .sign_and_submit(&pending_for(&Pubkey::new_unique()))
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::SubmissionFailed { .. }));
        assert!(rpc.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn test_requires_connection() {
        let signer = KeypairSigner::new(Keypair::new(), Arc::new(FakeRpc::default()));
        let err = signer
            .sign_and_submit(&pending_for(&Pubkey::new_unique()))
            .await
            .unwrap_err();
        assert_eq!(err, FlowError::WalletNotConnected);
    }
}
