use crate::constants::QUOTE_DISPLAY_DECIMALS;
use crate::tokens::{
    exchange_rate, format_raw_amount_fixed, format_raw_amount_trimmed, minimum_received, Asset,
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::{Duration, Instant};

/// A non-binding price estimate for one exact (source, destination, amount)
#[derive(Debug, Clone)]
pub struct Quote {
    pub id: String,
    pub source: Asset,
    pub destination: Asset,
    pub input_raw: u64,
    pub output_raw: u64,
    pub slippage_bps: u16,
    pub price_impact_pct: f64,
    pub route_label: String,
    /// Upstream quote document, consumed by transaction assembly
    pub reference: Value,
    pub quoted_at: DateTime<Utc>,
    fetched_at: Instant,
    valid_for: Duration,
}

impl Quote {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: Asset,
        destination: Asset,
        input_raw: u64,
        output_raw: u64,
        slippage_bps: u16,
        price_impact_pct: f64,
        route_label: String,
        reference: Value,
        valid_for: Duration,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source,
            destination,
            input_raw,
            output_raw,
            slippage_bps,
            price_impact_pct,
            route_label,
            reference,
            quoted_at: Utc::now(),
            fetched_at: Instant::now(),
            valid_for,
        }
    }

    /// Input in human units ("10", "0.5")
    pub fn input_amount(&self) -> String {
        format_raw_amount_trimmed(self.input_raw, self.source.decimals)
    }

    /// Displayed output estimate ("250.000000")
    pub fn output_estimate(&self) -> String {
        format_raw_amount_fixed(
            self.output_raw,
            self.destination.decimals,
            QUOTE_DISPLAY_DECIMALS,
        )
    }

    pub fn minimum_received_raw(&self) -> u64 {
        minimum_received(self.output_raw, self.slippage_bps)
    }

    pub fn minimum_received(&self) -> String {
        format_raw_amount_fixed(
            self.minimum_received_raw(),
            self.destination.decimals,
            QUOTE_DISPLAY_DECIMALS,
        )
    }

    /// Destination units per one source unit
    pub fn rate(&self) -> Option<String> {
        exchange_rate(
            self.input_raw,
            self.source.decimals,
            self.output_raw,
            self.destination.decimals,
            QUOTE_DISPLAY_DECIMALS,
        )
    }

    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }

    pub fn is_fresh(&self) -> bool {
        self.age() < self.valid_for
    }

    pub fn expires_in(&self) -> Duration {
        self.valid_for.saturating_sub(self.age())
    }

    /// Whether this quote was computed for exactly these inputs
    pub fn matches(&self, source: &Asset, destination: &Asset, input_raw: u64) -> bool {
        self.source.address == source.address
            && self.destination.address == destination.address
            && self.input_raw == input_raw
    }
}
