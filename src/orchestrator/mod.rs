//! Swap and transfer orchestration
//!
//! Each orchestrator owns one attempt at a time and walks it through
//! `FlowState`. Presentation layers subscribe to `FlowEvent`s instead of
//! polling state.

pub mod events;
pub mod flow;
pub mod settlement;
pub mod swap;
pub mod transfer;

pub use events::{FlowEvent, FlowState};
pub use flow::FlowCore;
pub use settlement::SettlementTracker;
pub use swap::{SwapForm, SwapOrchestrator};
pub use transfer::{TransferForm, TransferOrchestrator};
