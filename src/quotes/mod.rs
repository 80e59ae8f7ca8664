//! Swap pricing

pub mod service;
pub mod types;

pub use service::{prepare_quote_input, QuoteService};
pub use types::Quote;
