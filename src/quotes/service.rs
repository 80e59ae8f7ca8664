/// Quote service: validates a swap intent and prices it upstream
use super::types::Quote;
use crate::constants::MAX_SLIPPAGE_BPS;
use crate::errors::FlowError;
use crate::logger::{self, LogTag};
use crate::routers::{QuoteApi, QuoteRequest};
use crate::tokens::{parse_ui_amount, Asset};
use crate::utils::with_timeout;
use std::sync::Arc;
use std::time::Duration;

pub struct QuoteService {
    api: Arc<dyn QuoteApi>,
    timeout: Duration,
    validity: Duration,
}

/// Validate the pair and convert the human amount into source smallest units
pub fn prepare_quote_input(
    source: &Asset,
    destination: &Asset,
    amount: &str,
    slippage_bps: u16,
) -> Result<u64, FlowError> {
    if source.address == destination.address {
        return Err(FlowError::InvalidPair {
            mint: source.address.clone(),
        });
    }

    if slippage_bps > MAX_SLIPPAGE_BPS {
        return Err(FlowError::invalid_amount(format!(
            "slippage {}bps exceeds the {}bps limit",
            slippage_bps, MAX_SLIPPAGE_BPS
        )));
    }

    let raw = parse_ui_amount(amount, source.decimals)?;
    if raw == 0 {
        // A positive amount below one smallest unit is an upstream-style
        // rejection; a literal zero is an input error
        if amount.chars().any(|c| c.is_ascii_digit() && c != '0') {
            return Err(FlowError::amount_too_small(format!(
                "{} {} is below the smallest unit",
                amount.trim(),
                source.symbol
            )));
        }
        return Err(FlowError::invalid_amount("amount must be greater than zero"));
    }

    Ok(raw)
}

impl QuoteService {
    pub fn new(api: Arc<dyn QuoteApi>, timeout: Duration, validity: Duration) -> Self {
        Self {
            api,
            timeout,
            validity,
        }
    }

    pub fn validity(&self) -> Duration {
        self.validity
    }

    /// Price `amount` (human units) of `source` in `destination`
    ///
    /// Identical inputs may produce different estimates; nothing is cached.
    pub async fn quote(
        &self,
        source: &Asset,
        destination: &Asset,
        amount: &str,
        slippage_bps: u16,
    ) -> Result<Quote, FlowError> {
        let input_raw = prepare_quote_input(source, destination, amount, slippage_bps)?;

        let request = QuoteRequest {
            input_mint: source.address.clone(),
            output_mint: destination.address.clone(),
            amount: input_raw,
            slippage_bps,
        };

        let route = with_timeout(self.timeout, "Quote request", self.api.fetch_quote(&request))
            .await?;

        if route.out_amount == 0 {
            return Err(FlowError::amount_too_small(format!(
                "{} {} yields no {}",
                amount.trim(),
                source.symbol,
                destination.symbol
            )));
        }

        let quote = Quote::new(
            source.clone(),
            destination.clone(),
            input_raw,
            route.out_amount,
            slippage_bps,
            route.price_impact_pct,
            route.route_label,
            route.reference,
            self.validity,
        );

        logger::info(
            LogTag::Quote,
            &format!(
                "{} quote: {} {} → {} {} via {}",
                self.api.name(),
                quote.input_amount(),
                source.symbol,
                quote.output_estimate(),
                destination.symbol,
                quote.route_label
            ),
        );

        Ok(quote)
    }
}
