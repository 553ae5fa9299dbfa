//! Balance verification - on-chain snapshots are the source of truth for results

use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::infrastructure::blockchain::LedgerRpc;
use crate::shared::errors::PaymentError;
use crate::shared::types::BalanceSnapshot;
use crate::shared::utils::balance_delta;

/// Accounts observed for one payment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchedAccounts {
    pub funder: Pubkey,
    pub fee_payer: Pubkey,
    /// Funder's input token account; `None` when the input is native SOL
    pub funder_input_account: Option<Pubkey>,
    pub destination_holding: Pubkey,
}

/// Signed change between two snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BalanceDelta {
    pub funder_native: i64,
    pub fee_payer_native: i64,
    pub funder_input: i64,
    pub destination_output: i64,
}

impl BalanceDelta {
    pub fn between(before: &BalanceSnapshot, after: &BalanceSnapshot) -> Self {
        Self {
            funder_native: balance_delta(before.funder_native, after.funder_native),
            fee_payer_native: balance_delta(before.fee_payer_native, after.fee_payer_native),
            funder_input: balance_delta(before.funder_input, after.funder_input),
            destination_output: balance_delta(before.destination_output, after.destination_output),
        }
    }

    pub fn input_consumed(&self) -> u64 {
        self.funder_input.min(0).unsigned_abs()
    }

    pub fn output_received(&self) -> u64 {
        self.destination_output.max(0) as u64
    }
}

/// What balances say about whether a swap executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandingVerdict {
    /// Funder debited by the expected amount and destination credited
    Landed,
    /// No funder debit beyond tolerance
    NotLanded,
    /// Funder debited but the destination shows nothing
    DebitedWithoutCredit,
}

pub struct BalanceVerifier {
    ledger: Arc<dyn LedgerRpc>,
}

impl BalanceVerifier {
    pub fn new(ledger: Arc<dyn LedgerRpc>) -> Self {
        Self { ledger }
    }

    pub async fn snapshot(&self, accounts: &WatchedAccounts) -> Result<BalanceSnapshot, PaymentError> {
        let (funder_native, fee_payer_native, input_token, destination_output) = futures::try_join!(
            self.ledger.get_balance(&accounts.funder),
            self.ledger.get_balance(&accounts.fee_payer),
            self.token_balance(accounts.funder_input_account),
            self.token_balance(Some(accounts.destination_holding)),
        )?;

        let snapshot = BalanceSnapshot {
            funder_native,
            fee_payer_native,
            funder_input: match accounts.funder_input_account {
                Some(_) => input_token,
                None => funder_native,
            },
            destination_output,
        };
        debug!("Balance snapshot: {:?}", snapshot);
        Ok(snapshot)
    }

    async fn token_balance(&self, account: Option<Pubkey>) -> Result<u64, PaymentError> {
        match account {
            Some(account) => Ok(self.ledger.get_token_balance(&account).await?.unwrap_or(0)),
            None => Ok(0),
        }
    }

    /// Decide from balances alone whether a swap of `expected_input` landed.
    /// `tolerance` absorbs fees when the funder also pays them in the input asset.
    pub fn verify_landed(
        before: &BalanceSnapshot,
        after: &BalanceSnapshot,
        expected_input: u64,
        tolerance: u64,
    ) -> LandingVerdict {
        let delta = BalanceDelta::between(before, after);
        let debited = delta.input_consumed() >= expected_input.saturating_sub(tolerance);

        match (debited, delta.output_received() > 0) {
            (true, true) => LandingVerdict::Landed,
            (true, false) => {
                warn!(
                    "⚠️ Funder debited {} but destination balance unchanged",
                    delta.input_consumed()
                );
                LandingVerdict::DebitedWithoutCredit
            }
            (false, _) => LandingVerdict::NotLanded,
        }
    }
}
