/// Direct transfer orchestration
///
/// Validating → Building → Submitting → Settling → Succeeded. There is no
/// quote, so the wallet's own signing prompt is the confirmation step.
use super::events::{FlowEvent, FlowState};
use super::flow::FlowCore;
use super::settlement::SettlementTracker;
use super::swap::spendable;
use crate::errors::FlowError;
use crate::logger::{self, LogTag};
use crate::transactions::{
    validate_transfer_amount, PendingTransaction, TransactionBuilder, TransactionResult,
    TransferRequest,
};
use crate::tokens::Asset;
use crate::wallet::WalletSession;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferForm {
    pub asset: Option<Asset>,
    pub recipient: String,
    /// Human units, as typed
    pub amount: String,
}

pub struct TransferOrchestrator {
    core: FlowCore,
    session: Arc<WalletSession>,
    builder: Arc<TransactionBuilder>,
    settlement: SettlementTracker,
    signer_timeout: Duration,
    form: Mutex<TransferForm>,
}

impl TransferOrchestrator {
    pub fn new(
        session: Arc<WalletSession>,
        builder: Arc<TransactionBuilder>,
        settlement: SettlementTracker,
        signer_timeout: Duration,
    ) -> Self {
        Self {
            core: FlowCore::new("transfer", LogTag::Transfer),
            session,
            builder,
            settlement,
            signer_timeout,
            form: Mutex::new(TransferForm::default()),
        }
    }

    pub fn state(&self) -> FlowState {
        self.core.state()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FlowEvent> {
        self.core.subscribe()
    }

    pub fn form(&self) -> TransferForm {
        self.form.lock().clone()
    }

    fn edit(&self, apply: impl FnOnce(&mut TransferForm)) -> Result<(), FlowError> {
        self.core.supersede()?;
        apply(&mut self.form.lock());
        Ok(())
    }

    pub fn set_asset(&self, asset: Asset) -> Result<(), FlowError> {
        self.edit(|form| form.asset = Some(asset))
    }

    pub fn set_recipient(&self, recipient: &str) -> Result<(), FlowError> {
        self.edit(|form| form.recipient = recipient.trim().to_string())
    }

    pub fn set_amount(&self, amount: &str) -> Result<(), FlowError> {
        self.edit(|form| form.amount = amount.trim().to_string())
    }

    pub fn cancel(&self) -> Result<(), FlowError> {
        self.core.cancel()
    }

    /// Validate, build, sign and settle the transfer in the form
    pub async fn submit(&self) -> Result<TransactionResult, FlowError> {
        let generation = self.core.begin()?;

        let pending = match self.build(generation).await {
            Ok(pending) => pending,
            Err(e) => {
                let e = self.core.resolve_error(generation, e);
                self.core.fail(generation, &e, None);
                return Err(e);
            }
        };

        let outcome = self
            .core
            .sign_and_settle(
                generation,
                self.session.signer().as_ref(),
                self.signer_timeout,
                &self.settlement,
                &pending,
            )
            .await;

        match outcome {
            Ok(confirmed) => {
                if let Err(e) = self.session.refresh().await {
                    logger::warning(
                        LogTag::Transfer,
                        &format!("Balance refresh after transfer failed: {}", e),
                    );
                }
                self.form.lock().amount.clear();
                self.core.succeed(generation, confirmed.clone());
                Ok(confirmed)
            }
            Err((error, signature)) => {
                let result = TransactionResult::failed(
                    &pending.correlation_id,
                    pending.kind(),
                    signature,
                    &error,
                );
                self.core.fail(generation, &error, Some(result));
                Err(error)
            }
        }
    }

    async fn build(&self, generation: u64) -> Result<PendingTransaction, FlowError> {
        let form = self.form();
        let owner = self.session.address().ok_or(FlowError::WalletNotConnected)?;
        let asset = form
            .asset
            .ok_or_else(|| FlowError::incomplete("select the asset to send"))?;
        if form.recipient.is_empty() {
            return Err(FlowError::incomplete("enter a recipient address"));
        }

        let snapshot = self.session.refresh().await?;
        self.core.ensure_current(generation)?;

        spendable(&snapshot, &asset)?;
        let holding = snapshot
            .holding_of(&asset)
            .ok_or_else(|| FlowError::upstream(format!("{} balance unavailable", asset.symbol)))?;
        validate_transfer_amount(&asset, &form.amount, &holding)?;

        self.core.transition(generation, FlowState::Building)?;
        self.builder
            .build_transfer(&TransferRequest {
                owner: &owner,
                asset: &asset,
                recipient: &form.recipient,
                amount: &form.amount,
                holding: &holding,
            })
            .await
    }
}
