/// Jupiter Router Implementation
/// Quote: GET {base}/quote, assembly: POST {base}/swap (lite-api by default,
/// api.jup.ag when an API key is configured)
use super::{AssembledSwap, QuoteApi, QuoteRequest, RouteQuote, SwapAssemblyApi};
use crate::config::{QuotesConfig, SwapsConfig};
use crate::errors::FlowError;
use crate::logger::{self, LogTag};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

// ============================================================================
// API TYPES
// ============================================================================

#[derive(Debug, Serialize)]
struct JupiterQuoteRequest {
    #[serde(rename = "inputMint")]
    input_mint: String,
    #[serde(rename = "outputMint")]
    output_mint: String,
    amount: String,
    #[serde(rename = "slippageBps")]
    slippage_bps: u16,
    #[serde(rename = "swapMode")]
    swap_mode: &'static str,
}

#[derive(Debug, Deserialize)]
struct JupiterQuoteResponse {
    #[serde(rename = "outAmount")]
    out_amount: String,
    #[serde(rename = "priceImpactPct", default)]
    price_impact_pct: Option<String>,
    #[serde(rename = "routePlan", default)]
    route_plan: Vec<RoutePlanStep>,
}

#[derive(Debug, Deserialize)]
struct RoutePlanStep {
    #[serde(rename = "swapInfo")]
    swap_info: SwapInfo,
}

#[derive(Debug, Deserialize)]
struct SwapInfo {
    label: Option<String>,
}

#[derive(Debug, Serialize)]
struct JupiterSwapRequest<'a> {
    #[serde(rename = "quoteResponse")]
    quote_response: &'a Value,
    #[serde(rename = "userPublicKey")]
    user_public_key: &'a str,
    #[serde(rename = "wrapAndUnwrapSol")]
    wrap_and_unwrap_sol: bool,
    #[serde(rename = "dynamicComputeUnitLimit")]
    dynamic_compute_unit_limit: bool,
    #[serde(rename = "prioritizationFeeLamports")]
    prioritization_fee_lamports: Value,
}

#[derive(Debug, Deserialize)]
struct JupiterSwapResponse {
    #[serde(rename = "swapTransaction")]
    swap_transaction: String,
    #[serde(rename = "lastValidBlockHeight", default)]
    last_valid_block_height: Option<u64>,
}

/// Error document returned with 4xx answers
#[derive(Debug, Default, Deserialize)]
struct JupiterErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(rename = "errorCode", default)]
    error_code: Option<String>,
}

// ============================================================================
// ERROR CLASSIFICATION
// ============================================================================

const NO_ROUTE_CODES: &[&str] = &[
    "COULD_NOT_FIND_ANY_ROUTE",
    "NO_ROUTES_FOUND",
    "TOKEN_NOT_TRADABLE",
    "CIRCULAR_ARBITRAGE_IS_DISABLED",
    "MARKET_NOT_FOUND",
];

fn read_error_body(text: &str) -> (String, String) {
    let body: JupiterErrorBody = serde_json::from_str(text).unwrap_or_default();
    let message = body.error.unwrap_or_else(|| text.trim().to_string());
    (body.error_code.unwrap_or_default(), message)
}

fn classify_quote_failure(status: StatusCode, text: &str) -> FlowError {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        return FlowError::upstream(format!("Jupiter quote failed ({})", status));
    }

    let (code, message) = read_error_body(text);
    let lowered = message.to_lowercase();

    if NO_ROUTE_CODES.contains(&code.as_str()) || lowered.contains("route") {
        FlowError::NoRouteFound { message }
    } else if code.contains("AMOUNT") || lowered.contains("too small") || lowered.contains("amount")
    {
        FlowError::amount_too_small(message)
    } else {
        FlowError::NoRouteFound {
            message: format!("Jupiter rejected the quote request ({}): {}", status, message),
        }
    }
}

fn classify_swap_failure(status: StatusCode, text: &str) -> FlowError {
    let (code, message) = read_error_body(text);
    let lowered = format!("{} {}", code, message).to_lowercase();

    if lowered.contains("expired") || lowered.contains("stale") || lowered.contains("too old") {
        FlowError::quote_expired(message)
    } else {
        FlowError::build_failed(format!("Jupiter swap failed ({}): {}", status, message))
    }
}

fn transport_error(what: &str, e: reqwest::Error) -> FlowError {
    if e.is_timeout() {
        FlowError::upstream(format!("{} timed out", what))
    } else {
        FlowError::upstream(format!("{} request failed: {}", what, e))
    }
}

/// "auto" or a lamport amount, as Jupiter expects it
fn prioritization_fee_value(raw: &str) -> Value {
    match raw.trim().parse::<u64>() {
        Ok(lamports) => Value::from(lamports),
        Err(_) => Value::from("auto"),
    }
}

// ============================================================================
// JUPITER CLIENT
// ============================================================================

pub struct JupiterClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    quote_timeout: Duration,
    swap_timeout: Duration,
    wrap_and_unwrap_sol: bool,
    dynamic_compute_unit_limit: bool,
    prioritization_fee: Value,
}

impl JupiterClient {
    pub fn new(quotes: &QuotesConfig, swaps: &SwapsConfig) -> Self {
        let api_key = Some(quotes.api_key.trim().to_string()).filter(|k| !k.is_empty());
        Self {
            client: Client::new(),
            base_url: quotes.base_url.trim_end_matches('/').to_string(),
            api_key,
            quote_timeout: quotes.timeout(),
            swap_timeout: swaps.timeout(),
            wrap_and_unwrap_sol: swaps.wrap_and_unwrap_sol,
            dynamic_compute_unit_limit: swaps.dynamic_compute_unit_limit,
            prioritization_fee: prioritization_fee_value(&swaps.prioritization_fee_lamports),
        }
    }

    fn with_key(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("x-api-key", key),
            None => request,
        }
    }

    /// Build route plan summary from Jupiter response
    fn build_route_plan(route_plan: &[RoutePlanStep]) -> String {
        if route_plan.is_empty() {
            return "Direct".to_string();
        }

        route_plan
            .iter()
            .map(|step| {
                step.swap_info
                    .label
                    .clone()
                    .unwrap_or_else(|| "Unknown".to_string())
            })
            .collect::<Vec<_>>()
            .join(" → ")
    }
}

#[async_trait]
impl QuoteApi for JupiterClient {
    fn name(&self) -> &'static str {
        "Jupiter"
    }

    async fn fetch_quote(&self, request: &QuoteRequest) -> Result<RouteQuote, FlowError> {
        let quote_req = JupiterQuoteRequest {
            input_mint: request.input_mint.clone(),
            output_mint: request.output_mint.clone(),
            amount: request.amount.to_string(),
            slippage_bps: request.slippage_bps,
            swap_mode: "ExactIn",
        };

        logger::debug(
            LogTag::Quote,
            &format!(
                "Jupiter quote request: {} {} → {} (slippage: {}bps)",
                request.amount, request.input_mint, request.output_mint, request.slippage_bps
            ),
        );

        let url = format!("{}/quote", self.base_url);
        let response = self
            .with_key(self.client.get(&url))
            .timeout(self.quote_timeout)
            .query(&quote_req)
            .send()
            .await
            .map_err(|e| transport_error("Jupiter quote", e))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| transport_error("Jupiter quote", e))?;

        if !status.is_success() {
            logger::debug(
                LogTag::Quote,
                &format!("Jupiter quote failed ({}): {}", status, response_text),
            );
            return Err(classify_quote_failure(status, &response_text));
        }

        // Keep the whole document; the swap endpoint needs every field
        let reference: Value = serde_json::from_str(&response_text)
            .map_err(|e| FlowError::upstream(format!("Jupiter quote parse failed: {}", e)))?;
        let quote_response: JupiterQuoteResponse = serde_json::from_value(reference.clone())
            .map_err(|e| FlowError::upstream(format!("Jupiter quote parse failed: {}", e)))?;

        let out_amount = quote_response
            .out_amount
            .parse::<u64>()
            .map_err(|e| FlowError::upstream(format!("Invalid output amount: {}", e)))?;

        let price_impact_pct = quote_response
            .price_impact_pct
            .as_deref()
            .and_then(|p| p.parse::<f64>().ok())
            .unwrap_or(0.0);

        let route_label = Self::build_route_plan(&quote_response.route_plan);

        logger::debug(
            LogTag::Quote,
            &format!(
                "Jupiter quote: {} output, {:.4}% impact, route: {}",
                out_amount, price_impact_pct, route_label
            ),
        );

        Ok(RouteQuote {
            out_amount,
            price_impact_pct,
            route_label,
            reference,
        })
    }
}

#[async_trait]
impl SwapAssemblyApi for JupiterClient {
    async fn assemble_swap(
        &self,
        reference: &Value,
        payer: &str,
    ) -> Result<AssembledSwap, FlowError> {
        let swap_req = JupiterSwapRequest {
            quote_response: reference,
            user_public_key: payer,
            wrap_and_unwrap_sol: self.wrap_and_unwrap_sol,
            dynamic_compute_unit_limit: self.dynamic_compute_unit_limit,
            prioritization_fee_lamports: self.prioritization_fee.clone(),
        };

        logger::debug(
            LogTag::Swap,
            &format!("Jupiter swap request: user={}", payer),
        );

        let url = format!("{}/swap", self.base_url);
        let response = self
            .with_key(self.client.post(&url))
            .timeout(self.swap_timeout)
            .json(&swap_req)
            .send()
            .await
            .map_err(|e| transport_error("Jupiter swap", e))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| transport_error("Jupiter swap", e))?;

        if !status.is_success() {
            logger::warning(
                LogTag::Swap,
                &format!("Jupiter swap failed ({}): {}", status, response_text),
            );
            return Err(classify_swap_failure(status, &response_text));
        }

        let swap_response: JupiterSwapResponse = serde_json::from_str(&response_text)
            .map_err(|e| FlowError::build_failed(format!("Jupiter swap parse failed: {}", e)))?;

        Ok(AssembledSwap {
            transaction_base64: swap_response.swap_transaction,
            last_valid_block_height: swap_response.last_valid_block_height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn client_for(server: &mockito::Server) -> JupiterClient {
        let quotes = QuotesConfig {
            base_url: server.url(),
            ..QuotesConfig::default()
        };
        JupiterClient::new(&quotes, &SwapsConfig::default())
    }

    fn sol_to_usdc(amount: u64) -> QuoteRequest {
        QuoteRequest {
            input_mint: crate::constants::SOL_MINT.to_string(),
            output_mint: crate::constants::USDC_MINT.to_string(),
            amount,
            slippage_bps: 50,
        }
    }

    #[tokio::test]
    async fn test_quote_success_keeps_reference() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/quote")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("amount".into(), "10000000000".into()),
                Matcher::UrlEncoded("slippageBps".into(), "50".into()),
                Matcher::UrlEncoded("swapMode".into(), "ExactIn".into()),
            ]))
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "inputMint": crate::constants::SOL_MINT,
                    "inAmount": "10000000000",
                    "outputMint": crate::constants::USDC_MINT,
                    "outAmount": "250000000",
                    "otherAmountThreshold": "248750000",
                    "priceImpactPct": "0.0012",
                    "routePlan": [
                        {"swapInfo": {"ammKey": "a", "label": "Raydium"}},
                        {"swapInfo": {"ammKey": "b", "label": "Orca"}}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let quote = client_for(&server)
            .fetch_quote(&sol_to_usdc(10_000_000_000))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(quote.out_amount, 250_000_000);
        assert_eq!(quote.route_label, "Raydium → Orca");
        assert_eq!(quote.reference["otherAmountThreshold"], "248750000");
    }

    #[tokio::test]
    async fn test_quote_no_route() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/quote")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"error":"Could not find any route","errorCode":"COULD_NOT_FIND_ANY_ROUTE"}"#)
            .create_async()
            .await;

        let err = client_for(&server)
            .fetch_quote(&sol_to_usdc(1))
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::NoRouteFound { .. }));
    }

    #[tokio::test]
    async fn test_quote_server_error_is_upstream_unavailable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/quote")
            .match_query(Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let err = client_for(&server)
            .fetch_quote(&sol_to_usdc(1_000))
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::UpstreamUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_swap_request_carries_fee_preferences() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/swap")
            .match_body(Matcher::PartialJson(json!({
                "userPublicKey": "Payer1111111111111111111111111111111111111",
                "wrapAndUnwrapSol": true,
                "dynamicComputeUnitLimit": true,
                "prioritizationFeeLamports": "auto",
                "quoteResponse": {"outAmount": "1"}
            })))
            .with_body(r#"{"swapTransaction":"AQID","lastValidBlockHeight":12345}"#)
            .create_async()
            .await;

        let assembled = client_for(&server)
            .assemble_swap(
                &json!({"outAmount": "1"}),
                "Payer1111111111111111111111111111111111111",
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(assembled.transaction_base64, "AQID");
        assert_eq!(assembled.last_valid_block_height, Some(12_345));
    }

    #[tokio::test]
    async fn test_stale_quote_rejection_is_quote_expired() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/swap")
            .with_status(422)
            .with_body(r#"{"error":"Quote has expired, please request a new quote"}"#)
            .create_async()
            .await;

        let err = client_for(&server)
            .assemble_swap(&json!({}), "Payer")
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::QuoteExpired { .. }));
    }

    #[tokio::test]
    async fn test_other_swap_failures_are_build_failed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/swap")
            .with_status(500)
            .with_body("internal error")
            .create_async()
            .await;

        let err = client_for(&server)
            .assemble_swap(&json!({}), "Payer")
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::BuildFailed { .. }));
    }

    #[test]
    fn test_prioritization_fee_value() {
        assert_eq!(prioritization_fee_value("auto"), json!("auto"));
        assert_eq!(prioritization_fee_value("5000"), json!(5000));
    }
}
