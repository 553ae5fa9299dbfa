use serde_json::Value;
use solana_sdk::pubkey::Pubkey;
use std::{str::FromStr, sync::Arc};
use tracing::{debug, info};

use super::{calculate_min_out, Quote, Route, RouteHop};
use crate::infrastructure::aggregator::{
    QuoteRequest, SwapAggregator, SwapMode, WireQuote, WireRoutePlanStep,
};
use crate::shared::errors::PaymentError;

/// Requests and validates exact-input quotes
pub struct QuoteClient {
    aggregator: Arc<dyn SwapAggregator>,
}

impl QuoteClient {
    pub fn new(aggregator: Arc<dyn SwapAggregator>) -> Self {
        Self { aggregator }
    }

    /// Quote spending exactly `amount` base units of `input_mint`.
    /// `max_accounts` bounds the accounts the route may touch; `None` leaves it to the provider.
    pub async fn get_quote(
        &self,
        input_mint: &Pubkey,
        output_mint: &Pubkey,
        amount: u64,
        slippage_bps: u16,
        max_accounts: Option<u16>,
    ) -> Result<Quote, PaymentError> {
        if amount == 0 {
            return Err(PaymentError::InvalidQuote("input amount must be positive".into()));
        }

        let request = QuoteRequest {
            input_mint: input_mint.to_string(),
            output_mint: output_mint.to_string(),
            amount,
            slippage_bps,
            swap_mode: SwapMode::ExactIn,
            max_accounts,
        };
        let raw = self.aggregator.quote(&request).await?;
        let quote = parse_quote(raw, &request)?;

        info!(
            "Quote: {} -> {} ({} hop(s): {})",
            quote.in_amount,
            quote.out_amount,
            quote.route.hops.len(),
            quote.route.labels().join(" → ")
        );
        Ok(quote)
    }
}

fn parse_amount(field: &str, value: Option<&str>) -> Result<u64, PaymentError> {
    let text = value.ok_or_else(|| PaymentError::InvalidQuote(format!("missing {}", field)))?;
    let amount = text
        .parse::<u64>()
        .map_err(|_| PaymentError::InvalidQuote(format!("{} is not an integer: {}", field, text)))?;
    if amount == 0 {
        return Err(PaymentError::InvalidQuote(format!("{} is zero", field)));
    }
    Ok(amount)
}

fn parse_pubkey(field: &str, value: &str) -> Result<Pubkey, PaymentError> {
    Pubkey::from_str(value)
        .map_err(|_| PaymentError::InvalidQuote(format!("{} is not an address: {}", field, value)))
}

fn parse_hop(step: &WireRoutePlanStep) -> Result<RouteHop, PaymentError> {
    let info = &step.swap_info;
    Ok(RouteHop {
        venue: parse_pubkey("ammKey", &info.amm_key)?,
        label: info.label.clone(),
        input_mint: parse_pubkey("inputMint", &info.input_mint)?,
        output_mint: parse_pubkey("outputMint", &info.output_mint)?,
        in_amount: info.in_amount.parse().unwrap_or(0),
        out_amount: info.out_amount.parse().unwrap_or(0),
        percent: step.percent,
    })
}

fn parse_quote(raw: Value, request: &QuoteRequest) -> Result<Quote, PaymentError> {
    let wire: WireQuote = serde_json::from_value(raw.clone())
        .map_err(|e| PaymentError::InvalidQuote(format!("unexpected quote shape: {}", e)))?;

    if let Some(error) = wire.error {
        return Err(PaymentError::InvalidQuote(error));
    }
    if let Some(mode) = wire.swap_mode.as_deref() {
        if mode != SwapMode::ExactIn.as_str() {
            return Err(PaymentError::InvalidQuote(format!("expected ExactIn quote, got {}", mode)));
        }
    }

    let in_amount = parse_amount("inAmount", wire.in_amount.as_deref())?;
    let out_amount = parse_amount("outAmount", wire.out_amount.as_deref())?;
    if in_amount != request.amount {
        return Err(PaymentError::InvalidQuote(format!(
            "quote spends {} but {} was requested",
            in_amount, request.amount
        )));
    }

    let slippage_bps = wire.slippage_bps.unwrap_or(request.slippage_bps);
    let min_out_amount = match wire.other_amount_threshold.as_deref() {
        Some(threshold) => threshold.parse::<u64>().map_err(|_| {
            PaymentError::InvalidQuote(format!("otherAmountThreshold is not an integer: {}", threshold))
        })?,
        None => {
            debug!("Quote has no otherAmountThreshold, deriving from slippage");
            calculate_min_out(out_amount, slippage_bps)
        }
    };

    let hops = wire
        .route_plan
        .iter()
        .map(parse_hop)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Quote {
        input_mint: parse_pubkey("inputMint", &request.input_mint)?,
        output_mint: parse_pubkey("outputMint", &request.output_mint)?,
        in_amount,
        out_amount,
        min_out_amount,
        slippage_bps,
        route: Route { hops },
        account_limit: request.max_accounts,
        raw,
    })
}
