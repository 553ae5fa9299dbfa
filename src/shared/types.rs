//! Common types used across the pipeline

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::fmt;

/// Part a principal plays in one payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Funder,
    FeePayer,
    Destination,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Funder => "funder",
            Role::FeePayer => "fee payer",
            Role::Destination => "destination",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Amount representation with precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Serialize, Deserialize)]
pub struct Amount {
    pub value: u64,
    pub decimals: u8,
}

impl Amount {
    pub fn new(value: u64, decimals: u8) -> Self {
        Self { value, decimals }
    }

    pub fn from_lamports(value: u64) -> Self {
        Self { value, decimals: 9 }
    }

    pub fn to_ui(&self) -> f64 {
        self.value as f64 / 10_f64.powi(self.decimals as i32)
    }
}

/// Mint as seen on chain: its owning token program and precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintInfo {
    pub mint: Pubkey,
    pub token_program: Pubkey,
    pub decimals: u8,
}

/// Balances observed at one instant. `funder_input` is the funder's balance of
/// the input asset (lamports when the input is native SOL), `destination_output`
/// the destination holding account's token balance (0 if it does not exist yet).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub funder_native: u64,
    pub fee_payer_native: u64,
    pub funder_input: u64,
    pub destination_output: u64,
}

/// Authoritative outcome of a payment, derived from on-chain balances
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub signature: String,
    /// Observed decrease of the funder's input balance. When the funder also pays
    /// fees and the input is native SOL, this includes the network fee and any
    /// account rent; `fee_payer_balance_delta` then reports the same drain.
    pub input_amount_consumed: u64,
    pub output_amount_received: u64,
    pub funder_balance_delta: i64,
    pub fee_payer_balance_delta: i64,
    /// Aggregator's predicted output, advisory only
    pub quoted_output_amount: u64,
    pub output_decimals: u8,
    pub route_account_limit: Option<u16>,
    pub attempts: u32,
    pub recovered_from_timeout: bool,
    pub completed_at: chrono::DateTime<chrono::Utc>,
}

impl ExecutionResult {
    pub fn output_ui_amount(&self) -> f64 {
        Amount::new(self.output_amount_received, self.output_decimals).to_ui()
    }
}
