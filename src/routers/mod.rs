/// External routing API seams
///
/// `QuoteApi` prices an exchange, `SwapAssemblyApi` turns a priced route into
/// an unsigned transaction. Jupiter implements both.
use crate::errors::FlowError;
use async_trait::async_trait;
use serde_json::Value;

pub mod jupiter;

pub use jupiter::JupiterClient;

/// Quote request in smallest units
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteRequest {
    pub input_mint: String,
    pub output_mint: String,
    pub amount: u64,
    pub slippage_bps: u16,
}

/// Upstream answer to a `QuoteRequest`
#[derive(Debug, Clone)]
pub struct RouteQuote {
    pub out_amount: u64,
    pub price_impact_pct: f64,
    /// Human readable route, e.g. "Raydium → Orca"
    pub route_label: String,
    /// Opaque quote document handed back to the assembly endpoint
    pub reference: Value,
}

/// Unsigned transaction returned by the assembly endpoint
#[derive(Debug, Clone)]
pub struct AssembledSwap {
    pub transaction_base64: String,
    pub last_valid_block_height: Option<u64>,
}

#[async_trait]
pub trait QuoteApi: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_quote(&self, request: &QuoteRequest) -> Result<RouteQuote, FlowError>;
}

#[async_trait]
pub trait SwapAssemblyApi: Send + Sync {
    async fn assemble_swap(&self, reference: &Value, payer: &str)
        -> Result<AssembledSwap, FlowError>;
}
