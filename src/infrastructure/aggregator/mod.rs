//! Liquidity aggregator access: the `SwapAggregator` seam and its wire types

pub mod jupiter_client;

pub use jupiter_client::JupiterClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::shared::errors::PaymentError;

/// Base trait for aggregator API clients
#[async_trait]
pub trait SwapAggregator: Send + Sync {
    /// Fetch a raw exact-input quote. Validation happens in the quote domain.
    async fn quote(&self, request: &QuoteRequest) -> Result<Value, PaymentError>;

    /// Fetch the native instruction encoding for a previously obtained quote
    async fn swap_instructions(
        &self,
        request: &SwapInstructionsRequest,
    ) -> Result<SwapInstructionsResponse, PaymentError>;
}

/// Swap mode; only exact-input is ever requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwapMode {
    ExactIn,
}

impl SwapMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwapMode::ExactIn => "ExactIn",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteRequest {
    pub input_mint: String,
    pub output_mint: String,
    pub amount: u64,
    pub slippage_bps: u16,
    pub swap_mode: SwapMode,
    /// Upper bound on accounts the route may touch
    pub max_accounts: Option<u16>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapInstructionsRequest {
    pub user_public_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
    pub quote_response: Value,
    pub destination_token_account: String,
    pub wrap_and_unwrap_sol: bool,
    pub use_token_ledger: bool,
    pub dynamic_compute_unit_limit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prioritization_fee_lamports: Option<u64>,
}

/// Quote response fields the pipeline reads. Everything is optional on the wire
/// so a missing field turns into `InvalidQuote` rather than a decode error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireQuote {
    pub input_mint: Option<String>,
    pub in_amount: Option<String>,
    pub output_mint: Option<String>,
    pub out_amount: Option<String>,
    pub other_amount_threshold: Option<String>,
    pub swap_mode: Option<String>,
    pub slippage_bps: Option<u16>,
    pub price_impact_pct: Option<String>,
    #[serde(default)]
    pub route_plan: Vec<WireRoutePlanStep>,
    pub context_slot: Option<u64>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireRoutePlanStep {
    pub swap_info: WireSwapInfo,
    #[serde(default)]
    pub percent: u8,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireSwapInfo {
    pub amm_key: String,
    pub label: Option<String>,
    pub input_mint: String,
    pub output_mint: String,
    pub in_amount: String,
    pub out_amount: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireAccountMeta {
    pub pubkey: String,
    pub is_signer: bool,
    pub is_writable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireInstruction {
    pub program_id: String,
    pub accounts: Vec<WireAccountMeta>,
    /// base64 payload
    pub data: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapInstructionsResponse {
    pub token_ledger_instruction: Option<WireInstruction>,
    #[serde(default)]
    pub compute_budget_instructions: Vec<WireInstruction>,
    #[serde(default)]
    pub setup_instructions: Vec<WireInstruction>,
    pub swap_instruction: Option<WireInstruction>,
    pub cleanup_instruction: Option<WireInstruction>,
    #[serde(default)]
    pub other_instructions: Vec<WireInstruction>,
    #[serde(default)]
    pub address_lookup_table_addresses: Vec<String>,
    pub error: Option<String>,
}
