//! Submission & reconciliation controller
//!
//! Drives one payment through `Built → Submitted → {Confirmed, Rejected, TimedOut}`
//! across a fixed list of route-complexity tiers and a bounded retry budget.
//! Every terminal outcome is backed by balance snapshots.

use solana_sdk::pubkey::Pubkey;
use std::{sync::Arc, time::Duration};
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::classifier::classify_transaction_error;
use super::transaction_builder::{DualSignerBuilder, SignedTransaction};
use crate::domain::balance::{BalanceDelta, BalanceVerifier, LandingVerdict, WatchedAccounts};
use crate::domain::instructions::{DestinationAccount, InstructionAssembler};
use crate::domain::keys::Principal;
use crate::domain::quote::{Quote, QuoteClient};
use crate::infrastructure::blockchain::{LedgerRpc, SignatureStatus};
use crate::shared::config::ExecutionConfig;
use crate::shared::errors::{PaymentError, PaymentFailure, Recovery};
use crate::shared::types::{BalanceSnapshot, ExecutionResult};
use crate::shared::utils::backoff_delay;

/// Balance reads tried after a send before the outcome is declared unreadable
const SETTLEMENT_READ_ATTEMPTS: u32 = 5;

/// Everything resolved about one payment before the first quote
#[derive(Debug)]
pub struct PaymentPlan {
    pub funder: Principal,
    pub fee_payer: Principal,
    pub input_mint: Pubkey,
    pub input_amount: u64,
    pub slippage_bps: u16,
    pub destination: DestinationAccount,
    pub accounts: WatchedAccounts,
}

/// Where a single attempt ended up after submission
#[derive(Debug)]
enum SubmissionState {
    Confirmed,
    Rejected(PaymentError),
    TimedOut,
}

/// Successful attempt, before it is turned into an `ExecutionResult`
struct Settlement {
    signed: SignedTransaction,
    quote: Quote,
    before: BalanceSnapshot,
    after: BalanceSnapshot,
    recovered_from_timeout: bool,
}

/// Error from one attempt plus the freshest balances seen during it
struct AttemptError {
    error: PaymentError,
    balances: Option<BalanceSnapshot>,
}

impl From<PaymentError> for AttemptError {
    fn from(error: PaymentError) -> Self {
        Self {
            error,
            balances: None,
        }
    }
}

pub struct SubmissionController {
    ledger: Arc<dyn LedgerRpc>,
    quotes: QuoteClient,
    assembler: InstructionAssembler,
    builder: DualSignerBuilder,
    verifier: BalanceVerifier,
    config: ExecutionConfig,
}

impl SubmissionController {
    pub fn new(
        ledger: Arc<dyn LedgerRpc>,
        quotes: QuoteClient,
        assembler: InstructionAssembler,
        config: ExecutionConfig,
    ) -> Self {
        Self {
            builder: DualSignerBuilder::new(ledger.clone()),
            verifier: BalanceVerifier::new(ledger.clone()),
            ledger,
            quotes,
            assembler,
            config,
        }
    }

    /// Run the payment to a definite outcome
    pub async fn run(
        &self,
        plan: &PaymentPlan,
        initial: BalanceSnapshot,
    ) -> Result<ExecutionResult, PaymentFailure> {
        let tiers = self.config.tiers();
        let mut tier = 0usize;
        let mut attempts = 0u32;
        let mut retries = 0u32;
        let mut last_balances = initial;

        loop {
            attempts += 1;
            let limit = tiers.get(tier).copied().flatten();
            let span = info_span!("attempt", attempt = attempts, max_accounts = ?limit);

            let err = match self.attempt(plan, limit).instrument(span).await {
                Ok(settlement) => {
                    return Ok(self.settle(settlement, attempts, plan.destination.mint.decimals))
                }
                Err(err) => err,
            };
            if let Some(balances) = err.balances {
                last_balances = balances;
            }
            let error = err.error;

            match error.recovery() {
                Recovery::TightenRoute if tier + 1 < tiers.len() => {
                    tier += 1;
                    warn!(
                        "⚠️ {}; re-quoting with max {} accounts",
                        error,
                        tiers[tier].map_or_else(|| "unbounded".to_string(), |n| n.to_string())
                    );
                }
                Recovery::Retry if retries + 1 < self.config.max_attempts => {
                    retries += 1;
                    let delay = backoff_delay(
                        retries,
                        self.config.backoff_base_ms,
                        self.config.backoff_max_ms,
                    );
                    warn!("⚠️ {}; retry {} in {:?}", error, retries, delay);
                    sleep(delay).await;
                }
                _ => {
                    error!("❌ Payment failed after {} attempt(s): {}", attempts, error);
                    return Err(PaymentFailure::new(error, attempts, Some(last_balances)));
                }
            }
        }
    }

    async fn attempt(&self, plan: &PaymentPlan, limit: Option<u16>) -> Result<Settlement, AttemptError> {
        let quote = self
            .quotes
            .get_quote(
                &plan.input_mint,
                &plan.destination.mint.mint,
                plan.input_amount,
                plan.slippage_bps,
                limit,
            )
            .await?;
        let set = self
            .assembler
            .assemble(
                &quote,
                &plan.funder.pubkey(),
                &plan.fee_payer.pubkey(),
                &plan.destination,
            )
            .await?;

        let before = self.verifier.snapshot(&plan.accounts).await?;
        let signed = self
            .builder
            .build(&set, &plan.funder, &plan.fee_payer)
            .await
            .map_err(|error| AttemptError {
                error,
                balances: Some(before),
            })?;

        let state = match self
            .ledger
            .send_transaction(&signed.transaction, self.config.skip_preflight)
            .await
        {
            Ok(signature) => {
                info!("📤 Submitted {}", signature);
                self.await_confirmation(&signed).await
            }
            Err(PaymentError::LikelyLanded(_)) => {
                warn!("⚠️ Submission of {} may have landed", signed.signature);
                SubmissionState::TimedOut
            }
            Err(error) => SubmissionState::Rejected(error),
        };

        match state {
            SubmissionState::Confirmed => {
                let after = self.settled_snapshot(&signed, before, &plan.accounts).await?;
                info!("✅ Confirmed {}", signed.signature);
                Ok(Settlement {
                    signed,
                    quote,
                    before,
                    after,
                    recovered_from_timeout: false,
                })
            }
            SubmissionState::Rejected(error) => Err(AttemptError {
                error,
                balances: Some(before),
            }),
            SubmissionState::TimedOut => self.reconcile(plan, signed, quote, before).await,
        }
    }

    /// Poll until confirmed, failed, expired or out of time
    async fn await_confirmation(&self, signed: &SignedTransaction) -> SubmissionState {
        let deadline = Instant::now() + Duration::from_millis(self.config.confirm_timeout_ms);
        let poll = Duration::from_millis(self.config.poll_interval_ms);

        loop {
            match self.ledger.get_signature_status(&signed.signature).await {
                Ok(SignatureStatus::Confirmed) => return SubmissionState::Confirmed,
                Ok(SignatureStatus::Failed(err)) => {
                    return SubmissionState::Rejected(classify_transaction_error(&err))
                }
                Ok(SignatureStatus::Pending) => {}
                Err(e) => debug!("Status poll failed: {}", e),
            }

            if self.is_expired(signed).await {
                debug!("Blockhash for {} expired while pending", signed.signature);
                return SubmissionState::TimedOut;
            }
            if Instant::now() >= deadline {
                return SubmissionState::TimedOut;
            }
            sleep(poll).await;
        }
    }

    async fn is_expired(&self, signed: &SignedTransaction) -> bool {
        matches!(
            self.ledger.get_block_height().await,
            Ok(height) if height > signed.recency.last_valid_block_height
        )
    }

    /// Resolve an unknown outcome from balances, never by resubmitting blind
    async fn reconcile(
        &self,
        plan: &PaymentPlan,
        signed: SignedTransaction,
        quote: Quote,
        before: BalanceSnapshot,
    ) -> Result<Settlement, AttemptError> {
        warn!("⚠️ Outcome of {} unknown, checking balances", signed.signature);

        let seen = self.settled_snapshot(&signed, before, &plan.accounts).await?;
        if self.verdict(&before, &seen, &quote) == LandingVerdict::Landed {
            return Ok(self.recovered(signed, quote, before, seen));
        }

        // Not visible yet: wait for the blockhash to expire so the answer is final
        let expired = self.wait_for_expiry(&signed).await;
        let after = self.settled_snapshot(&signed, seen, &plan.accounts).await?;
        match self.verdict(&before, &after, &quote) {
            LandingVerdict::Landed => Ok(self.recovered(signed, quote, before, after)),
            LandingVerdict::DebitedWithoutCredit => Err(AttemptError {
                error: PaymentError::rejected(format!(
                    "funder debited by {} but destination {} was not credited",
                    BalanceDelta::between(&before, &after).input_consumed(),
                    plan.destination.holding_account
                )),
                balances: Some(after),
            }),
            LandingVerdict::NotLanded if expired => Err(AttemptError {
                error: PaymentError::Expired(format!(
                    "{} did not land before its blockhash expired",
                    signed.signature
                )),
                balances: Some(after),
            }),
            LandingVerdict::NotLanded => Err(AttemptError {
                error: PaymentError::rejected(format!(
                    "{} unresolved: no balance change and blockhash not yet expired",
                    signed.signature
                )),
                balances: Some(after),
            }),
        }
    }

    /// Wait, bounded by the grace period, until the blockhash can no longer land
    async fn wait_for_expiry(&self, signed: &SignedTransaction) -> bool {
        let deadline = Instant::now() + Duration::from_millis(self.config.expiry_grace_ms);
        let poll = Duration::from_millis(self.config.poll_interval_ms);
        loop {
            if self.is_expired(signed).await {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(poll).await;
        }
    }

    /// Balances after a send. Read failures must not reach the pipeline retry
    /// (it would sign and send again), so they are retried here and exhaustion is terminal.
    async fn settled_snapshot(
        &self,
        signed: &SignedTransaction,
        last_seen: BalanceSnapshot,
        accounts: &WatchedAccounts,
    ) -> Result<BalanceSnapshot, AttemptError> {
        let poll = Duration::from_millis(self.config.poll_interval_ms);
        let mut reads = 0u32;
        loop {
            reads += 1;
            match self.verifier.snapshot(accounts).await {
                Ok(snapshot) => return Ok(snapshot),
                Err(e) if reads < SETTLEMENT_READ_ATTEMPTS => {
                    debug!("Balance read {} for {} failed: {}", reads, signed.signature, e);
                    sleep(poll).await;
                }
                Err(e) => {
                    error!("❌ Balances for {} unreadable after {} reads: {}", signed.signature, reads, e);
                    return Err(AttemptError {
                        error: PaymentError::rejected(format!(
                            "{} was submitted but its outcome could not be read ({}); check balances before resubmitting",
                            signed.signature, e
                        )),
                        balances: Some(last_seen),
                    });
                }
            }
        }
    }

    fn verdict(&self, before: &BalanceSnapshot, after: &BalanceSnapshot, quote: &Quote) -> LandingVerdict {
        BalanceVerifier::verify_landed(before, after, quote.in_amount, self.config.landed_tolerance_lamports)
    }

    fn recovered(
        &self,
        signed: SignedTransaction,
        quote: Quote,
        before: BalanceSnapshot,
        after: BalanceSnapshot,
    ) -> Settlement {
        info!("✅ {} landed despite timeout", signed.signature);
        Settlement {
            signed,
            quote,
            before,
            after,
            recovered_from_timeout: true,
        }
    }

    fn settle(&self, settlement: Settlement, attempts: u32, output_decimals: u8) -> ExecutionResult {
        let delta = BalanceDelta::between(&settlement.before, &settlement.after);
        if delta.output_received() == 0 {
            warn!("⚠️ Confirmed swap shows no destination credit yet");
        }

        ExecutionResult {
            signature: settlement.signed.signature.to_string(),
            input_amount_consumed: delta.input_consumed(),
            output_amount_received: delta.output_received(),
            funder_balance_delta: delta.funder_input,
            fee_payer_balance_delta: delta.fee_payer_native,
            quoted_output_amount: settlement.quote.out_amount,
            output_decimals,
            route_account_limit: settlement.quote.account_limit,
            attempts,
            recovered_from_timeout: settlement.recovered_from_timeout,
            completed_at: chrono::Utc::now(),
        }
    }
}
