//! Quote domain - exact-input price quotes and the routes that fill them

mod quote_client;

pub use quote_client::QuoteClient;

use serde_json::Value;
use solana_sdk::pubkey::Pubkey;

/// One venue hop of an aggregator route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteHop {
    pub venue: Pubkey,
    pub label: Option<String>,
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    pub in_amount: u64,
    pub out_amount: u64,
    pub percent: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Route {
    pub hops: Vec<RouteHop>,
}

impl Route {
    pub fn labels(&self) -> Vec<&str> {
        self.hops
            .iter()
            .map(|hop| hop.label.as_deref().unwrap_or("unknown"))
            .collect()
    }
}

/// Validated exact-input quote.
/// `in_amount` and `out_amount` are always strictly positive.
#[derive(Debug, Clone)]
pub struct Quote {
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    pub in_amount: u64,
    pub out_amount: u64,
    pub min_out_amount: u64,
    pub slippage_bps: u16,
    pub route: Route,
    /// Route-complexity limit the quote was requested under
    pub account_limit: Option<u16>,
    /// Provider payload, echoed back verbatim when requesting instructions
    pub raw: Value,
}

/// Minimum output accepted for `amount_out` under `slippage_bps`, rounded down
pub fn calculate_min_out(amount_out: u64, slippage_bps: u16) -> u64 {
    let keep = 10_000u128.saturating_sub(slippage_bps as u128);
    (amount_out as u128 * keep / 10_000) as u64
}
