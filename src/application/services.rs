//! Application services and use cases

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::{str::FromStr, sync::Arc};
use tracing::{info, info_span, Instrument};

use crate::domain::balance::{BalanceVerifier, WatchedAccounts};
use crate::domain::execution::{PaymentPlan, SubmissionController};
use crate::domain::instructions::{DestinationAccount, InstructionAssembler};
use crate::domain::keys::{holding_account, parse_address, parse_credential, OwnerCurve};
use crate::domain::quote::QuoteClient;
use crate::infrastructure::aggregator::{JupiterClient, SwapAggregator};
use crate::infrastructure::blockchain::{LedgerRpc, SolanaRpcClient};
use crate::shared::config::PaymentConfig;
use crate::shared::errors::{PaymentError, PaymentFailure};
use crate::shared::types::{ExecutionResult, Role};
use crate::shared::utils::{format_amount, generate_id};

/// One sponsored swap-payment, as supplied by the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    /// Funder keypair, base58 or JSON byte array
    pub funder_credential: String,
    /// Fee payer keypair, base58 or JSON byte array
    pub fee_payer_credential: String,
    pub destination_address: String,
    pub input_mint: String,
    pub output_mint: String,
    /// Input in base units
    pub input_amount: u64,
    /// Overrides the configured default slippage
    #[serde(default)]
    pub slippage_bps: Option<u16>,
    /// Destination is a program-derived address
    #[serde(default)]
    pub allow_off_curve_destination: bool,
}

/// Application service for sponsored swap-payments
pub struct PaymentService {
    config: PaymentConfig,
    aggregator: Arc<dyn SwapAggregator>,
    ledger: Arc<dyn LedgerRpc>,
}

impl PaymentService {
    pub fn new(
        config: PaymentConfig,
        aggregator: Arc<dyn SwapAggregator>,
        ledger: Arc<dyn LedgerRpc>,
    ) -> Self {
        Self {
            config,
            aggregator,
            ledger,
        }
    }

    /// Service wired to the Jupiter API and a Solana RPC node
    pub fn from_config(config: PaymentConfig) -> Result<Self, PaymentError> {
        config.validate()?;
        let aggregator = Arc::new(JupiterClient::new(&config.aggregator)?);
        let ledger = Arc::new(SolanaRpcClient::new(&config.network)?);
        Ok(Self::new(config, aggregator, ledger))
    }

    pub async fn execute(&self, request: &PaymentRequest) -> Result<ExecutionResult, PaymentFailure> {
        let op_id = generate_id();
        let span = info_span!("payment", op_id = %op_id);
        self.execute_inner(request).instrument(span).await
    }

    async fn execute_inner(&self, request: &PaymentRequest) -> Result<ExecutionResult, PaymentFailure> {
        let plan = self.plan(request).await?;
        info!(
            "🚀 Paying {} of {} → {} for {} (fee payer {})",
            request.input_amount,
            plan.input_mint,
            plan.destination.mint.mint,
            plan.destination.owner,
            plan.fee_payer.pubkey()
        );

        let verifier = BalanceVerifier::new(self.ledger.clone());
        let initial = verifier.snapshot(&plan.accounts).await?;
        if initial.funder_input < plan.input_amount {
            return Err(PaymentFailure::new(
                PaymentError::insufficient(
                    Role::Funder,
                    format!("need {}, have {}", plan.input_amount, initial.funder_input),
                ),
                0,
                Some(initial),
            ));
        }
        if initial.fee_payer_native < self.config.execution.min_fee_payer_lamports {
            return Err(PaymentFailure::new(
                PaymentError::insufficient(
                    Role::FeePayer,
                    format!(
                        "need at least {} lamports, have {}",
                        self.config.execution.min_fee_payer_lamports, initial.fee_payer_native
                    ),
                ),
                0,
                Some(initial),
            ));
        }

        let controller = SubmissionController::new(
            self.ledger.clone(),
            QuoteClient::new(self.aggregator.clone()),
            InstructionAssembler::new(
                self.aggregator.clone(),
                self.config.aggregator.clone(),
                self.config.execution.create_destination_account,
                self.config.execution.compute_unit_limit,
            ),
            self.config.execution.clone(),
        );
        let result = controller.run(&plan, initial).await?;

        info!(
            "✅ Paid {}: consumed {}, delivered {}",
            result.signature,
            result.input_amount_consumed,
            format_amount(result.output_amount_received, result.output_decimals)
        );
        Ok(result)
    }

    /// Parse credentials and resolve every account the payment touches
    async fn plan(&self, request: &PaymentRequest) -> Result<PaymentPlan, PaymentError> {
        let funder = parse_credential(Role::Funder, &request.funder_credential)?;
        let fee_payer = parse_credential(Role::FeePayer, &request.fee_payer_credential)?;
        let owner = parse_address(Role::Destination, &request.destination_address)?.pubkey();

        if request.input_amount == 0 {
            return Err(PaymentError::InvalidQuote("input amount must be positive".into()));
        }
        let input_mint = parse_mint(&request.input_mint)?;
        let output_mint = parse_mint(&request.output_mint)?;
        if input_mint == output_mint {
            return Err(PaymentError::InvalidQuote("input and output mint are the same".into()));
        }

        let output = self.ledger.get_mint_info(&output_mint).await?;
        let curve = if request.allow_off_curve_destination {
            OwnerCurve::AllowOffCurve
        } else {
            OwnerCurve::RequireOnCurve
        };
        let destination_holding = holding_account(&owner, &output_mint, &output.token_program, curve)?;

        let funder_input_account = if input_mint == spl_token::native_mint::id() {
            None
        } else {
            let input = self.ledger.get_mint_info(&input_mint).await?;
            Some(holding_account(
                &funder.pubkey(),
                &input_mint,
                &input.token_program,
                OwnerCurve::RequireOnCurve,
            )?)
        };

        let accounts = WatchedAccounts {
            funder: funder.pubkey(),
            fee_payer: fee_payer.pubkey(),
            funder_input_account,
            destination_holding,
        };
        Ok(PaymentPlan {
            funder,
            fee_payer,
            input_mint,
            input_amount: request.input_amount,
            slippage_bps: request
                .slippage_bps
                .unwrap_or(self.config.aggregator.default_slippage_bps),
            destination: DestinationAccount {
                owner,
                holding_account: destination_holding,
                mint: output,
            },
            accounts,
        })
    }
}

fn parse_mint(mint: &str) -> Result<Pubkey, PaymentError> {
    Pubkey::from_str(mint.trim()).map_err(|_| PaymentError::InvalidQuote(format!("invalid mint: {}", mint)))
}
