use crate::errors::FailureReason;
use crate::quotes::Quote;
use crate::transactions::TransactionResult;
use serde::Serialize;

/// Position of the current attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FlowState {
    Idle,
    Validating,
    Quoting,
    AwaitingConfirmation,
    Building,
    Submitting,
    Settling,
    Succeeded,
    Failed(FailureReason),
}

impl FlowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowState::Idle => "Idle",
            FlowState::Validating => "Validating",
            FlowState::Quoting => "Quoting",
            FlowState::AwaitingConfirmation => "AwaitingConfirmation",
            FlowState::Building => "Building",
            FlowState::Submitting => "Submitting",
            FlowState::Settling => "Settling",
            FlowState::Succeeded => "Succeeded",
            FlowState::Failed(_) => "Failed",
        }
    }

    /// Past user confirmation: funds may move, so the attempt cannot be
    /// superseded or restarted
    pub fn is_committed(&self) -> bool {
        matches!(
            self,
            FlowState::Building | FlowState::Submitting | FlowState::Settling
        )
    }

    /// Work before confirmation that a newer attempt may replace
    pub fn is_supersedable(&self) -> bool {
        matches!(
            self,
            FlowState::Validating | FlowState::Quoting | FlowState::AwaitingConfirmation
        )
    }
}

impl std::fmt::Display for FlowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlowState::Failed(reason) => write!(f, "Failed({})", reason.as_str()),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

/// Emitted to subscribers of an orchestrator
#[derive(Debug, Clone)]
pub enum FlowEvent {
    StateChanged {
        flow: &'static str,
        state: FlowState,
    },
    QuoteReady(Quote),
    /// Submitted, confirmed or failed transaction
    Result(TransactionResult),
}
