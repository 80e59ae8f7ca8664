/// Error taxonomy for swapdesk
///
/// Every component returns a tagged `FlowError`; the orchestrators are the
/// single place deciding messaging and whether partial progress survives.
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reason attached to a `Failed` attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureReason {
    InvalidAddress,
    InvalidRecipient,
    InvalidPair,
    InvalidAmount,
    InsufficientBalance,
    NoRouteFound,
    AmountTooSmall,
    UpstreamUnavailable,
    QuoteExpired,
    BuildFailed,
    AccountResolutionFailed,
    UserRejected,
    SubmissionFailed,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::InvalidAddress => "InvalidAddress",
            FailureReason::InvalidRecipient => "InvalidRecipient",
            FailureReason::InvalidPair => "InvalidPair",
            FailureReason::InvalidAmount => "InvalidAmount",
            FailureReason::InsufficientBalance => "InsufficientBalance",
            FailureReason::NoRouteFound => "NoRouteFound",
            FailureReason::AmountTooSmall => "AmountTooSmall",
            FailureReason::UpstreamUnavailable => "UpstreamUnavailable",
            FailureReason::QuoteExpired => "QuoteExpired",
            FailureReason::BuildFailed => "BuildFailed",
            FailureReason::AccountResolutionFailed => "AccountResolutionFailed",
            FailureReason::UserRejected => "UserRejected",
            FailureReason::SubmissionFailed => "SubmissionFailed",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where an error originated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Detected locally, never reached the network
    Validation,
    /// Reported by an external service
    Upstream,
    /// Reported by the wallet provider
    Signing,
    /// Caller misuse of the orchestrator (wrong state, missing input)
    Usage,
}

/// What the user should do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryHint {
    EditInput,
    Requote,
    Resign,
    Retry,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FlowError {
    #[error("Invalid address: {address}")]
    InvalidAddress { address: String },

    #[error("Invalid recipient: {address}")]
    InvalidRecipient { address: String },

    #[error("Source and destination asset are the same: {mint}")]
    InvalidPair { mint: String },

    #[error("Invalid amount: {message}")]
    InvalidAmount { message: String },

    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: String, available: String },

    #[error("No route found: {message}")]
    NoRouteFound { message: String },

    #[error("Amount too small: {message}")]
    AmountTooSmall { message: String },

    #[error("Upstream unavailable: {message}")]
    UpstreamUnavailable { message: String },

    #[error("Quote expired: {message}")]
    QuoteExpired { message: String },

    #[error("Transaction build failed: {message}")]
    BuildFailed { message: String },

    #[error("Account resolution failed: {message}")]
    AccountResolutionFailed { message: String },

    #[error("Rejected by user")]
    UserRejected,

    #[error("Submission failed: {message}")]
    SubmissionFailed { message: String },

    #[error("Form incomplete: {message}")]
    IncompleteForm { message: String },

    #[error("An attempt is already in progress ({state})")]
    AttemptInProgress { state: String },

    #[error("Nothing to confirm ({state})")]
    NothingToConfirm { state: String },

    #[error("Wallet not connected")]
    WalletNotConnected,

    #[error("Attempt superseded by a newer one")]
    Superseded,

    #[error("Attempt cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl FlowError {
    // Builder helpers

    pub fn invalid_amount(message: impl Into<String>) -> Self {
        FlowError::InvalidAmount {
            message: message.into(),
        }
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        FlowError::UpstreamUnavailable {
            message: message.into(),
        }
    }

    pub fn amount_too_small(message: impl Into<String>) -> Self {
        FlowError::AmountTooSmall {
            message: message.into(),
        }
    }

    pub fn quote_expired(message: impl Into<String>) -> Self {
        FlowError::QuoteExpired {
            message: message.into(),
        }
    }

    pub fn build_failed(message: impl Into<String>) -> Self {
        FlowError::BuildFailed {
            message: message.into(),
        }
    }

    pub fn submission_failed(message: impl Into<String>) -> Self {
        FlowError::SubmissionFailed {
            message: message.into(),
        }
    }

    pub fn incomplete(message: impl Into<String>) -> Self {
        FlowError::IncompleteForm {
            message: message.into(),
        }
    }

    /// Failure tag for errors that end an attempt; `None` for usage errors
    pub fn reason(&self) -> Option<FailureReason> {
        match self {
            FlowError::InvalidAddress { .. } => Some(FailureReason::InvalidAddress),
            FlowError::InvalidRecipient { .. } => Some(FailureReason::InvalidRecipient),
            FlowError::InvalidPair { .. } => Some(FailureReason::InvalidPair),
            FlowError::InvalidAmount { .. } => Some(FailureReason::InvalidAmount),
            FlowError::InsufficientBalance { .. } => Some(FailureReason::InsufficientBalance),
            FlowError::NoRouteFound { .. } => Some(FailureReason::NoRouteFound),
            FlowError::AmountTooSmall { .. } => Some(FailureReason::AmountTooSmall),
            FlowError::UpstreamUnavailable { .. } => Some(FailureReason::UpstreamUnavailable),
            FlowError::QuoteExpired { .. } => Some(FailureReason::QuoteExpired),
            FlowError::BuildFailed { .. } => Some(FailureReason::BuildFailed),
            FlowError::AccountResolutionFailed { .. } => {
                Some(FailureReason::AccountResolutionFailed)
            }
            FlowError::UserRejected => Some(FailureReason::UserRejected),
            FlowError::SubmissionFailed { .. } => Some(FailureReason::SubmissionFailed),
            FlowError::IncompleteForm { .. }
            | FlowError::AttemptInProgress { .. }
            | FlowError::NothingToConfirm { .. }
            | FlowError::WalletNotConnected
            | FlowError::Superseded
            | FlowError::Cancelled
            | FlowError::Config(_) => None,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            FlowError::InvalidAddress { .. }
            | FlowError::InvalidRecipient { .. }
            | FlowError::InvalidPair { .. }
            | FlowError::InvalidAmount { .. }
            | FlowError::InsufficientBalance { .. } => ErrorCategory::Validation,
            FlowError::NoRouteFound { .. }
            | FlowError::AmountTooSmall { .. }
            | FlowError::UpstreamUnavailable { .. }
            | FlowError::QuoteExpired { .. }
            | FlowError::BuildFailed { .. }
            | FlowError::AccountResolutionFailed { .. } => ErrorCategory::Upstream,
            FlowError::UserRejected | FlowError::SubmissionFailed { .. } => {
                ErrorCategory::Signing
            }
            FlowError::IncompleteForm { .. }
            | FlowError::AttemptInProgress { .. }
            | FlowError::NothingToConfirm { .. }
            | FlowError::WalletNotConnected
            | FlowError::Superseded
            | FlowError::Cancelled
            | FlowError::Config(_) => ErrorCategory::Usage,
        }
    }

    pub fn retry_hint(&self) -> RetryHint {
        match self {
            FlowError::QuoteExpired { .. } => RetryHint::Requote,
            FlowError::UserRejected | FlowError::SubmissionFailed { .. } => RetryHint::Resign,
            FlowError::UpstreamUnavailable { .. }
            | FlowError::BuildFailed { .. }
            | FlowError::AccountResolutionFailed { .. }
            | FlowError::AttemptInProgress { .. } => RetryHint::Retry,
            _ => RetryHint::EditInput,
        }
    }

    /// Signing errors leave a fetched quote usable
    pub fn keeps_quote(&self) -> bool {
        self.category() == ErrorCategory::Signing
    }

    /// Short user-facing prompt for this failure
    pub fn user_message(&self) -> String {
        match self.retry_hint() {
            RetryHint::Requote => "Quote is no longer valid, re-quote to continue".to_string(),
            RetryHint::Resign => format!("{}. Sign again to retry", self),
            RetryHint::Retry => format!("{}. Try again", self),
            RetryHint::EditInput => self.to_string(),
        }
    }
}
