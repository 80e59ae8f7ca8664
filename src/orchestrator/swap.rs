/// Swap orchestration
///
/// submit: Validating → Quoting → AwaitingConfirmation
/// confirm: Building → Submitting → Settling → Succeeded
///
/// Any edit to the form drops the held quote and supersedes an unconfirmed
/// attempt. A quote survives signing failures while it is still fresh, so
/// the user can sign again without re-quoting; that retry is a new attempt
/// and goes Validating → Building against fresh balances.
use super::events::{FlowEvent, FlowState};
use super::flow::FlowCore;
use super::settlement::SettlementTracker;
use crate::balances::WalletSnapshot;
use crate::errors::FlowError;
use crate::logger::{self, LogTag};
use crate::quotes::{prepare_quote_input, Quote, QuoteService};
use crate::tokens::{format_raw_amount_trimmed, Asset};
use crate::transactions::{TransactionBuilder, TransactionResult};
use crate::wallet::WalletSession;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// User-entered swap inputs, preserved across failed attempts
#[derive(Debug, Clone, PartialEq)]
pub struct SwapForm {
    pub source: Option<Asset>,
    pub destination: Option<Asset>,
    /// Human units, as typed
    pub amount: String,
    pub slippage_bps: u16,
}

impl SwapForm {
    pub fn new(slippage_bps: u16) -> Self {
        Self {
            source: None,
            destination: None,
            amount: String::new(),
            slippage_bps,
        }
    }
}

pub struct SwapOrchestrator {
    core: FlowCore,
    session: Arc<WalletSession>,
    quotes: Arc<QuoteService>,
    builder: Arc<TransactionBuilder>,
    settlement: SettlementTracker,
    signer_timeout: Duration,
    form: Mutex<SwapForm>,
    // Locked before the core's state whenever both are needed
    quote: Mutex<Option<Quote>>,
}

/// `InsufficientBalance` unless `requested_raw` of `asset` can be spent
fn ensure_affordable(
    snapshot: &WalletSnapshot,
    asset: &Asset,
    requested_raw: u64,
) -> Result<(), FlowError> {
    let available = spendable(snapshot, asset)?;
    if requested_raw > available {
        return Err(FlowError::InsufficientBalance {
            requested: format!(
                "{} {}",
                format_raw_amount_trimmed(requested_raw, asset.decimals),
                asset.symbol
            ),
            available: format!(
                "{} {}",
                format_raw_amount_trimmed(available, asset.decimals),
                asset.symbol
            ),
        });
    }
    Ok(())
}

/// Spendable raw amount of `asset`, or the error of the source that failed
pub(crate) fn spendable(snapshot: &WalletSnapshot, asset: &Asset) -> Result<u64, FlowError> {
    snapshot.available(asset).ok_or_else(|| {
        let failed = if asset.native {
            snapshot.native.as_ref().err()
        } else {
            snapshot.tokens.as_ref().err()
        };
        failed.map(|e| e.error.clone()).unwrap_or_else(|| {
            FlowError::upstream(format!("{} balance unavailable", asset.symbol))
        })
    })
}

impl SwapOrchestrator {
    pub fn new(
        session: Arc<WalletSession>,
        quotes: Arc<QuoteService>,
        builder: Arc<TransactionBuilder>,
        settlement: SettlementTracker,
        signer_timeout: Duration,
        default_slippage_bps: u16,
    ) -> Self {
        Self {
            core: FlowCore::new("swap", LogTag::Swap),
            session,
            quotes,
            builder,
            settlement,
            signer_timeout,
            form: Mutex::new(SwapForm::new(default_slippage_bps)),
            quote: Mutex::new(None),
        }
    }

    pub fn state(&self) -> FlowState {
        self.core.state()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FlowEvent> {
        self.core.subscribe()
    }

    pub fn form(&self) -> SwapForm {
        self.form.lock().clone()
    }

    /// Quote awaiting confirmation, if any
    pub fn quote(&self) -> Option<Quote> {
        self.quote.lock().clone()
    }

    fn edit(&self, apply: impl FnOnce(&mut SwapForm)) -> Result<(), FlowError> {
        {
            let mut quote = self.quote.lock();
            self.core.supersede()?;
            quote.take();
        }
        apply(&mut self.form.lock());
        Ok(())
    }

    pub fn set_source(&self, asset: Asset) -> Result<(), FlowError> {
        self.edit(|form| form.source = Some(asset))
    }

    pub fn set_destination(&self, asset: Asset) -> Result<(), FlowError> {
        self.edit(|form| form.destination = Some(asset))
    }

    pub fn set_amount(&self, amount: &str) -> Result<(), FlowError> {
        self.edit(|form| form.amount = amount.trim().to_string())
    }

    pub fn set_slippage(&self, slippage_bps: u16) -> Result<(), FlowError> {
        self.edit(|form| form.slippage_bps = slippage_bps)
    }

    /// Swap source and destination; the amount stays as typed
    pub fn flip(&self) -> Result<(), FlowError> {
        self.edit(|form| std::mem::swap(&mut form.source, &mut form.destination))
    }

    /// Validate the form against fresh balances and fetch a quote
    pub async fn submit(&self) -> Result<Quote, FlowError> {
        let generation = {
            let mut quote = self.quote.lock();
            let generation = self.core.begin()?;
            quote.take();
            generation
        };

        match self.prepare(generation).await {
            Ok(quote) => Ok(quote),
            Err(e) => {
                let e = self.core.resolve_error(generation, e);
                self.abandon(generation, &e, None);
                Err(e)
            }
        }
    }

    async fn prepare(&self, generation: u64) -> Result<Quote, FlowError> {
        let form = self.form();
        let address = self.session.address().ok_or(FlowError::WalletNotConnected)?;
        let source = form
            .source
            .ok_or_else(|| FlowError::incomplete("select the asset to sell"))?;
        let destination = form
            .destination
            .ok_or_else(|| FlowError::incomplete("select the asset to buy"))?;

        let input_raw =
            prepare_quote_input(&source, &destination, &form.amount, form.slippage_bps)?;

        // Displayed balances may be stale
        let snapshot = self.session.refresh().await?;
        self.core.ensure_current(generation)?;

        ensure_affordable(&snapshot, &source, input_raw)?;

        self.core.transition(generation, FlowState::Quoting)?;
        let quote = self
            .quotes
            .quote(&source, &destination, &form.amount, form.slippage_bps)
            .await?;

        {
            let mut held = self.quote.lock();
            self.core
                .transition(generation, FlowState::AwaitingConfirmation)?;
            *held = Some(quote.clone());
        }

        logger::debug(
            LogTag::Swap,
            &format!(
                "Quote {} for {} ready, min received {} {}",
                quote.id,
                address,
                quote.minimum_received(),
                destination.symbol
            ),
        );
        self.core.emit(FlowEvent::QuoteReady(quote.clone()));
        Ok(quote)
    }

    /// Execute the held quote after explicit user confirmation
    pub async fn confirm(&self) -> Result<TransactionResult, FlowError> {
        let address = self.session.address().ok_or(FlowError::WalletNotConnected)?;

        let (quote, generation, retry) = {
            let mut held = self.quote.lock();
            let state = self.core.state();
            if state.is_committed() {
                return Err(FlowError::AttemptInProgress {
                    state: state.to_string(),
                });
            }
            let Some(quote) = held.clone() else {
                return Err(FlowError::NothingToConfirm {
                    state: state.to_string(),
                });
            };

            if !quote.is_fresh() {
                held.take();
                drop(held);
                let error = FlowError::quote_expired(format!(
                    "quote {} is {}s old",
                    quote.id,
                    quote.age().as_secs()
                ));
                self.core.fail(self.core.generation(), &error, None);
                return Err(error);
            }

            // A retained quote from a failed signature starts a new attempt
            if state == FlowState::AwaitingConfirmation {
                (quote, self.core.commit()?, false)
            } else {
                (quote, self.core.begin()?, true)
            }
        };

        if retry {
            if let Err(e) = self.revalidate(generation, &quote).await {
                let e = self.core.resolve_error(generation, e);
                self.abandon(generation, &e, None);
                return Err(e);
            }
        }

        let pending = match self.builder.build_swap(&quote, &address).await {
            Ok(pending) => pending,
            Err(e) => {
                self.abandon(generation, &e, None);
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
                self.complete(generation, confirmed.clone()).await;
                Ok(confirmed)
            }
            Err((error, signature)) => {
                if signature.is_some() {
                    // Broadcast already; the quote is spent
                    self.quote.lock().take();
                }
                let result = TransactionResult::failed(
                    &pending.correlation_id,
                    pending.kind(),
                    signature,
                    &error,
                );
                self.abandon(generation, &error, Some(result));
                Err(error)
            }
        }
    }

    /// Re-check a retained quote against current balances before rebuilding
    async fn revalidate(&self, generation: u64, quote: &Quote) -> Result<(), FlowError> {
        let snapshot = self.session.refresh().await?;
        self.core.ensure_current(generation)?;
        ensure_affordable(&snapshot, &quote.source, quote.input_raw)?;
        if !quote.is_fresh() {
            return Err(FlowError::quote_expired(format!(
                "quote {} expired during validation",
                quote.id
            )));
        }
        self.core.transition(generation, FlowState::Building)
    }

    /// Stop the current attempt, see `FlowCore::cancel`
    pub fn cancel(&self) -> Result<(), FlowError> {
        let mut quote = self.quote.lock();
        self.core.cancel()?;
        quote.take();
        Ok(())
    }

    fn abandon(&self, generation: u64, error: &FlowError, result: Option<TransactionResult>) {
        let mut quote = self.quote.lock();
        if self.core.fail(generation, error, result) && !error.keeps_quote() {
            quote.take();
        }
    }

    async fn complete(&self, generation: u64, confirmed: TransactionResult) {
        self.quote.lock().take();

        if let Err(e) = self.session.refresh().await {
            logger::warning(
                LogTag::Swap,
                &format!("Balance refresh after swap failed: {}", e),
            );
        }

        self.form.lock().amount.clear();
        self.core.succeed(generation, confirmed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balances::aggregator::tests::FakeRpc;
    use crate::constants::{BONK_MINT, USDC_MINT};
    use crate::errors::FailureReason;
    use crate::quotes::service::tests::FixedQuoteApi;
    use crate::rpc::SignatureStatus;
    use crate::transactions::builder::tests::FakeAssembly;
    use crate::transactions::{SettlementStatus, TransactionIntent};
    use crate::wallet::session::tests::{session_with, FakeSigner};

    struct Harness {
        rpc: Arc<FakeRpc>,
        signer: Arc<FakeSigner>,
        api: Arc<FixedQuoteApi>,
        assembly: Arc<FakeAssembly>,
        swap: Arc<SwapOrchestrator>,
    }

    fn confirmed() -> Option<SignatureStatus> {
        Some(SignatureStatus {
            slot: 7,
            confirmation_status: Some("confirmed".to_string()),
            err: None,
        })
    }

    fn usdc() -> Asset {
        Asset::new(USDC_MINT, "USDC", "USD Coin", 6)
    }

    async fn harness(api: FixedQuoteApi, validity: Duration) -> Harness {
        let rpc = Arc::new(FakeRpc::default());
        *rpc.lamports.lock() = Ok(20_000_000_000);
        let signer = Arc::new(FakeSigner::new());
        let api = Arc::new(api);
        let assembly = Arc::new(FakeAssembly::default());

        let session = Arc::new(session_with(rpc.clone(), signer.clone()));
        session.connect().await.unwrap();

        let swap = SwapOrchestrator::new(
            session,
            Arc::new(QuoteService::new(api.clone(), Duration::from_secs(1), validity)),
            Arc::new(TransactionBuilder::new(
                rpc.clone(),
                assembly.clone(),
                Duration::from_secs(1),
                Duration::from_secs(1),
            )),
            SettlementTracker::new(
                rpc.clone(),
                Duration::from_millis(5),
                Duration::from_secs(1),
                "confirmed",
            ),
            Duration::from_secs(5),
            50,
        );
        swap.set_source(Asset::sol()).unwrap();
        swap.set_destination(usdc()).unwrap();
        swap.set_amount("10").unwrap();

        Harness {
            rpc,
            signer,
            api,
            assembly,
            swap: Arc::new(swap),
        }
    }

    fn results(rx: &mut broadcast::Receiver<FlowEvent>) -> Vec<TransactionResult> {
        let mut results = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let FlowEvent::Result(result) = event {
                results.push(result);
            }
        }
        results
    }

    #[tokio::test]
    async fn test_quote_confirm_settle() {
        let h = harness(FixedQuoteApi::returning(250_000_000), Duration::from_secs(30)).await;
        *h.rpc.statuses.lock() = vec![None, confirmed()];
        let mut rx = h.swap.subscribe();

        let quote = h.swap.submit().await.unwrap();
        assert_eq!(quote.output_estimate(), "250.000000");
        assert_eq!(h.swap.state(), FlowState::AwaitingConfirmation);
        assert_eq!(*h.assembly.calls.lock(), 0);

        let result = h.swap.confirm().await.unwrap();
        assert_eq!(result.status, SettlementStatus::Confirmed);
        assert_eq!(result.signature.as_deref(), Some("Signature1111"));
        assert_eq!(h.swap.state(), FlowState::Succeeded);
        assert!(h.swap.form().amount.is_empty());
        assert!(h.swap.quote().is_none());

        let statuses: Vec<_> = results(&mut rx).into_iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![SettlementStatus::Submitted, SettlementStatus::Confirmed]
        );

        match &h.signer.signed.lock()[0].intent {
            TransactionIntent::Swap(signed) => assert_eq!(signed.id, quote.id),
            other => panic!("unexpected intent {:?}", other),
        };
    }

    #[tokio::test]
    async fn test_insufficient_balance_never_quotes() {
        let h = harness(FixedQuoteApi::returning(1), Duration::from_secs(30)).await;
        h.swap.set_amount("30").unwrap();
        let mut rx = h.swap.subscribe();

        let err = h.swap.submit().await.unwrap_err();
        assert!(matches!(err, FlowError::InsufficientBalance { .. }));
        assert!(h.api.requests.lock().is_empty());
        assert_eq!(h.swap.state(), FlowState::Idle);
        assert_eq!(h.swap.form().amount, "30");

        let mut saw_failed = false;
        while let Ok(event) = rx.try_recv() {
            if let FlowEvent::StateChanged { state, .. } = event {
                saw_failed |= state == FlowState::Failed(FailureReason::InsufficientBalance);
            }
        }
        assert!(saw_failed);
    }

    #[tokio::test]
    async fn test_user_rejection_allows_resign_without_requote() {
        let h = harness(FixedQuoteApi::returning(250_000_000), Duration::from_secs(30)).await;
        *h.signer.sign_results.lock() = vec![Err(FlowError::UserRejected)];
        *h.rpc.statuses.lock() = vec![confirmed()];

        h.swap.submit().await.unwrap();
        let err = h.swap.confirm().await.unwrap_err();

        assert_eq!(err, FlowError::UserRejected);
        assert_eq!(h.swap.state(), FlowState::Idle);
        assert!(h.swap.quote().is_some());
        let form = h.swap.form();
        assert_eq!(form.amount, "10");
        assert_eq!(form.source, Some(Asset::sol()));
        assert_eq!(form.destination, Some(usdc()));

        let result = h.swap.confirm().await.unwrap();
        assert_eq!(result.status, SettlementStatus::Confirmed);
        assert_eq!(h.api.requests.lock().len(), 1);
        assert_eq!(h.signer.sign_calls(), 2);
    }

    #[tokio::test]
    async fn test_resign_rechecks_balance() {
        let h = harness(FixedQuoteApi::returning(250_000_000), Duration::from_secs(30)).await;
        *h.signer.sign_results.lock() = vec![Err(FlowError::UserRejected)];

        h.swap.submit().await.unwrap();
        assert_eq!(h.swap.confirm().await.unwrap_err(), FlowError::UserRejected);
        assert_eq!(*h.assembly.calls.lock(), 1);

        // Funds moved elsewhere before the user signs again
        *h.rpc.lamports.lock() = Ok(4_000_000_000);
        let mut rx = h.swap.subscribe();

        let err = h.swap.confirm().await.unwrap_err();
        assert!(matches!(err, FlowError::InsufficientBalance { .. }));
        assert_eq!(h.signer.sign_calls(), 1);
        assert_eq!(*h.assembly.calls.lock(), 1);
        assert!(h.swap.quote().is_none());
        assert_eq!(h.swap.state(), FlowState::Idle);
        assert_eq!(h.swap.form().amount, "10");

        let mut states = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let FlowEvent::StateChanged { state, .. } = event {
                states.push(state);
            }
        }
        assert_eq!(
            states,
            vec![
                FlowState::Validating,
                FlowState::Failed(FailureReason::InsufficientBalance),
                FlowState::Idle
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_quote_error_after_edit_reports_superseded() {
        let h = harness(
            FixedQuoteApi {
                delay: Some(Duration::from_millis(100)),
                ..FixedQuoteApi::returning(250_000_000)
            },
            Duration::from_secs(30),
        )
        .await;
        *h.api.out_amount.lock() = Err(FlowError::upstream("HTTP 503"));

        let swap = h.swap.clone();
        let in_flight = tokio::spawn(async move { swap.submit().await });

        tokio::time::sleep(Duration::from_millis(30)).await;
        h.swap.set_amount("2").unwrap();

        assert_eq!(in_flight.await.unwrap().unwrap_err(), FlowError::Superseded);
        assert_eq!(h.swap.state(), FlowState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_quote_for_superseded_pair_is_discarded() {
        let h = harness(
            FixedQuoteApi {
                delay: Some(Duration::from_millis(100)),
                ..FixedQuoteApi::returning(250_000_000)
            },
            Duration::from_secs(30),
        )
        .await;

        let swap = h.swap.clone();
        let in_flight = tokio::spawn(async move { swap.submit().await });

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(h.swap.state(), FlowState::Quoting);
        h.swap
            .set_destination(Asset::new(BONK_MINT, "BONK", "Bonk", 5))
            .unwrap();

        let late = in_flight.await.unwrap();
        assert_eq!(late.unwrap_err(), FlowError::Superseded);
        assert!(h.swap.quote().is_none());
        assert_eq!(h.swap.state(), FlowState::Idle);

        let quote = h.swap.submit().await.unwrap();
        assert_eq!(quote.destination.address, BONK_MINT);
        assert_eq!(h.swap.quote().unwrap().id, quote.id);
    }

    #[tokio::test]
    async fn test_expired_quote_prompts_requote() {
        let h = harness(FixedQuoteApi::returning(250_000_000), Duration::ZERO).await;

        h.swap.submit().await.unwrap();
        let err = h.swap.confirm().await.unwrap_err();

        assert!(matches!(err, FlowError::QuoteExpired { .. }));
        assert_eq!(
            err.user_message(),
            "Quote is no longer valid, re-quote to continue"
        );
        assert_eq!(*h.assembly.calls.lock(), 0);
        assert!(h.swap.quote().is_none());
        assert_eq!(h.swap.form().amount, "10");
    }

    #[tokio::test]
    async fn test_edit_drops_quote() {
        let h = harness(FixedQuoteApi::returning(250_000_000), Duration::from_secs(30)).await;
        h.swap.submit().await.unwrap();

        h.swap.flip().unwrap();
        assert!(h.swap.quote().is_none());
        assert_eq!(h.swap.form().source, Some(usdc()));
        assert!(matches!(
            h.swap.confirm().await,
            Err(FlowError::NothingToConfirm { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_settling_attempt_rejects_new_work_until_cancelled() {
        let h = harness(FixedQuoteApi::returning(250_000_000), Duration::from_secs(30)).await;
        h.swap.submit().await.unwrap();

        let swap = h.swap.clone();
        let confirming = tokio::spawn(async move { swap.confirm().await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(h.swap.state(), FlowState::Settling);
        assert!(matches!(
            h.swap.submit().await,
            Err(FlowError::AttemptInProgress { .. })
        ));
        assert!(matches!(
            h.swap.set_amount("1"),
            Err(FlowError::AttemptInProgress { .. })
        ));

        h.swap.cancel().unwrap();
        assert_eq!(confirming.await.unwrap().unwrap_err(), FlowError::Cancelled);
        assert_eq!(h.swap.state(), FlowState::Idle);
    }
}
