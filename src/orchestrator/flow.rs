/// Attempt bookkeeping shared by the swap and transfer orchestrators
///
/// Every attempt carries a generation number. Superseding an attempt bumps
/// the generation, and any result that arrives for an older generation is
/// dropped without touching state.
use super::events::{FlowEvent, FlowState};
use super::settlement::SettlementTracker;
use crate::errors::FlowError;
use crate::logger::{self, LogTag};
use crate::transactions::{PendingTransaction, TransactionResult};
use crate::utils::{short_address, with_timeout};
use crate::wallet::WalletSigner;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::AbortHandle;

const EVENT_CAPACITY: usize = 256;

/// Failure while signing or settling, with the signature if one was issued
pub type SettleFailure = (FlowError, Option<String>);

pub struct FlowCore {
    name: &'static str,
    tag: LogTag,
    state: Mutex<FlowState>,
    generation: AtomicU64,
    events: broadcast::Sender<FlowEvent>,
    settlement: Mutex<Option<AbortHandle>>,
}

impl FlowCore {
    pub fn new(name: &'static str, tag: LogTag) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            name,
            tag,
            state: Mutex::new(FlowState::Idle),
            generation: AtomicU64::new(0),
            events,
            settlement: Mutex::new(None),
        }
    }

    pub fn state(&self) -> FlowState {
        self.state.lock().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FlowEvent> {
        self.events.subscribe()
    }

    pub fn emit(&self, event: FlowEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation() == generation
    }

    pub fn ensure_current(&self, generation: u64) -> Result<(), FlowError> {
        if self.is_current(generation) {
            Ok(())
        } else {
            Err(FlowError::Superseded)
        }
    }

    /// A late error from a superseded attempt reports as `Superseded`
    pub fn resolve_error(&self, generation: u64, error: FlowError) -> FlowError {
        if self.is_current(generation) {
            error
        } else {
            FlowError::Superseded
        }
    }

    fn state_changed(&self, state: FlowState) {
        logger::debug(self.tag, &format!("{} flow → {}", self.name, state));
        self.emit(FlowEvent::StateChanged {
            flow: self.name,
            state,
        });
    }

    /// Start a new attempt in `Validating`, replacing any unconfirmed one
    pub fn begin(&self) -> Result<u64, FlowError> {
        let generation = {
            let mut state = self.state.lock();
            if state.is_committed() {
                return Err(FlowError::AttemptInProgress {
                    state: state.to_string(),
                });
            }
            *state = FlowState::Validating;
            self.generation.fetch_add(1, Ordering::SeqCst) + 1
        };
        self.state_changed(FlowState::Validating);
        Ok(generation)
    }

    /// Move the attempt awaiting confirmation into `Building`
    pub fn commit(&self) -> Result<u64, FlowError> {
        let generation = {
            let mut state = self.state.lock();
            match &*state {
                FlowState::AwaitingConfirmation => {}
                s if s.is_committed() => {
                    return Err(FlowError::AttemptInProgress {
                        state: s.to_string(),
                    })
                }
                s => {
                    return Err(FlowError::NothingToConfirm {
                        state: s.to_string(),
                    })
                }
            }
            *state = FlowState::Building;
            self.generation()
        };
        self.state_changed(FlowState::Building);
        Ok(generation)
    }

    /// Invalidate the unconfirmed attempt after an input edit
    pub fn supersede(&self) -> Result<(), FlowError> {
        let reset = {
            let mut state = self.state.lock();
            if state.is_committed() {
                return Err(FlowError::AttemptInProgress {
                    state: state.to_string(),
                });
            }
            self.generation.fetch_add(1, Ordering::SeqCst);
            let reset = state.is_supersedable();
            if reset {
                *state = FlowState::Idle;
            }
            reset
        };
        if reset {
            self.state_changed(FlowState::Idle);
        }
        Ok(())
    }

    /// Advance the attempt; fails with `Superseded` for a stale generation
    pub fn transition(&self, generation: u64, next: FlowState) -> Result<(), FlowError> {
        {
            let mut state = self.state.lock();
            self.ensure_current(generation)?;
            *state = next.clone();
        }
        self.state_changed(next);
        Ok(())
    }

    /// Record a failed attempt: `Failed(reason)`, then back to `Idle`
    ///
    /// Returns false when the attempt was already superseded.
    pub fn fail(
        &self,
        generation: u64,
        error: &FlowError,
        result: Option<TransactionResult>,
    ) -> bool {
        let failed = {
            let mut state = self.state.lock();
            if !self.is_current(generation) {
                return false;
            }
            let failed = error.reason().map(FlowState::Failed);
            *state = FlowState::Idle;
            failed
        };

        if error.reason().is_some() {
            logger::warning(
                self.tag,
                &format!("{} attempt failed: {}", self.name, error.user_message()),
            );
        }
        if let Some(failed) = failed {
            self.state_changed(failed);
        }
        if let Some(result) = result {
            self.emit(FlowEvent::Result(result));
        }
        self.state_changed(FlowState::Idle);
        true
    }

    pub fn succeed(&self, generation: u64, result: TransactionResult) {
        if self.transition(generation, FlowState::Succeeded).is_ok() {
            logger::info(
                self.tag,
                &format!(
                    "{} confirmed: {}",
                    self.name,
                    result.signature.as_deref().map(short_address).unwrap_or_default()
                ),
            );
            self.emit(FlowEvent::Result(result));
        }
    }

    /// Hand the payload to the wallet and track it to the commitment level
    ///
    /// Emits the `Submitted` result as soon as a signature exists.
    pub async fn sign_and_settle(
        &self,
        generation: u64,
        signer: &dyn WalletSigner,
        signer_timeout: Duration,
        tracker: &SettlementTracker,
        pending: &PendingTransaction,
    ) -> Result<TransactionResult, SettleFailure> {
        self.transition(generation, FlowState::Submitting)
            .map_err(|e| (e, None))?;

        let signature = with_timeout(
            signer_timeout,
            "Wallet signature",
            signer.sign_and_submit(pending),
        )
        .await
        .map_err(|e| (e, None))?;

        let submitted = TransactionResult::submitted(pending, &signature);
        logger::info(
            self.tag,
            &format!(
                "{} submitted: {} ({})",
                self.name,
                pending.intent.describe(),
                short_address(&signature)
            ),
        );
        self.emit(FlowEvent::Result(submitted.clone()));

        self.transition(generation, FlowState::Settling)
            .map_err(|e| (e, Some(signature.clone())))?;

        let handle = tracker.spawn(signature.clone());
        *self.settlement.lock() = Some(handle.abort_handle());
        let outcome = handle.await;
        self.settlement.lock().take();

        match outcome {
            Ok(Ok(_status)) => Ok(submitted.confirmed()),
            Ok(Err(e)) => Err((e, Some(signature))),
            Err(join) if join.is_cancelled() => {
                logger::info(
                    self.tag,
                    &format!("Stopped tracking {}", short_address(&signature)),
                );
                Err((FlowError::Cancelled, Some(signature)))
            }
            Err(join) => Err((
                FlowError::submission_failed(format!("Settlement task failed: {}", join)),
                Some(signature),
            )),
        }
    }

    /// Abandon the current attempt
    ///
    /// Refused while the wallet holds the transaction; settlement tracking
    /// is aborted but the transaction itself stays on its way.
    pub fn cancel(&self) -> Result<(), FlowError> {
        {
            let mut state = self.state.lock();
            if *state == FlowState::Submitting {
                return Err(FlowError::AttemptInProgress {
                    state: state.to_string(),
                });
            }
            self.generation.fetch_add(1, Ordering::SeqCst);
            *state = FlowState::Idle;
        }
        if let Some(handle) = self.settlement.lock().take() {
            handle.abort();
        }
        self.state_changed(FlowState::Idle);
        Ok(())
    }
}

impl Drop for FlowCore {
    fn drop(&mut self) {
        if let Some(handle) = self.settlement.lock().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FailureReason;

    fn drain(rx: &mut broadcast::Receiver<FlowEvent>) -> Vec<FlowState> {
        let mut states = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let FlowEvent::StateChanged { state, .. } = event {
                states.push(state);
            }
        }
        states
    }

    #[test]
    fn test_stale_generation_cannot_advance() {
        let core = FlowCore::new("swap", LogTag::Swap);
        let first = core.begin().unwrap();
        core.supersede().unwrap();

        assert_eq!(core.state(), FlowState::Idle);
        assert_eq!(
            core.transition(first, FlowState::Quoting),
            Err(FlowError::Superseded)
        );
        assert!(!core.fail(first, &FlowError::UserRejected, None));
        assert_eq!(core.state(), FlowState::Idle);
    }

    #[test]
    fn test_failure_passes_through_failed_to_idle() {
        let core = FlowCore::new("transfer", LogTag::Transfer);
        let mut rx = core.subscribe();
        let generation = core.begin().unwrap();

        assert!(core.fail(generation, &FlowError::UserRejected, None));
        assert_eq!(
            drain(&mut rx),
            vec![
                FlowState::Validating,
                FlowState::Failed(FailureReason::UserRejected),
                FlowState::Idle
            ]
        );
    }

    #[test]
    fn test_committed_attempt_blocks_new_work() {
        let core = FlowCore::new("swap", LogTag::Swap);
        let generation = core.begin().unwrap();
        assert!(matches!(core.commit(), Err(FlowError::NothingToConfirm { .. })));
        core.transition(generation, FlowState::AwaitingConfirmation)
            .unwrap();
        assert_eq!(core.commit().unwrap(), generation);

        assert!(matches!(core.begin(), Err(FlowError::AttemptInProgress { .. })));
        assert!(matches!(core.supersede(), Err(FlowError::AttemptInProgress { .. })));
        assert!(matches!(core.commit(), Err(FlowError::AttemptInProgress { .. })));
    }

    #[test]
    fn test_late_error_reports_superseded() {
        let core = FlowCore::new("swap", LogTag::Swap);
        let first = core.begin().unwrap();
        assert_eq!(
            core.resolve_error(first, FlowError::UserRejected),
            FlowError::UserRejected
        );
        core.supersede().unwrap();
        assert_eq!(
            core.resolve_error(first, FlowError::upstream("HTTP 503")),
            FlowError::Superseded
        );
    }
}
