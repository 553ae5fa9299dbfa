use solana_sdk::pubkey::Pubkey;
use spl_associated_token_account::instruction::create_associated_token_account_idempotent;
use std::{str::FromStr, sync::Arc};
use tracing::{debug, info};

use super::{compute_budget, InstructionKind, InstructionSet, TaggedInstruction};
use crate::domain::quote::Quote;
use crate::infrastructure::aggregator::{SwapAggregator, SwapInstructionsRequest};
use crate::shared::config::AggregatorConfig;
use crate::shared::errors::PaymentError;
use crate::shared::types::MintInfo;

/// Where the swapped tokens go: the recipient, its holding account and the output mint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DestinationAccount {
    pub owner: Pubkey,
    pub holding_account: Pubkey,
    pub mint: MintInfo,
}

/// Turns a quote into an ordered, native instruction set
pub struct InstructionAssembler {
    aggregator: Arc<dyn SwapAggregator>,
    config: AggregatorConfig,
    create_destination_account: bool,
    compute_unit_limit: u32,
}

impl InstructionAssembler {
    pub fn new(
        aggregator: Arc<dyn SwapAggregator>,
        config: AggregatorConfig,
        create_destination_account: bool,
        compute_unit_limit: u32,
    ) -> Self {
        Self {
            aggregator,
            config,
            create_destination_account,
            compute_unit_limit,
        }
    }

    /// Fetch and decode the swap for `quote`, delivering output to the
    /// destination's holding account. `fee_payer` funds rent and account creation.
    pub async fn assemble(
        &self,
        quote: &Quote,
        funder: &Pubkey,
        fee_payer: &Pubkey,
        destination: &DestinationAccount,
    ) -> Result<InstructionSet, PaymentError> {
        let request = SwapInstructionsRequest {
            user_public_key: funder.to_string(),
            payer: (fee_payer != funder).then(|| fee_payer.to_string()),
            quote_response: quote.raw.clone(),
            destination_token_account: destination.holding_account.to_string(),
            wrap_and_unwrap_sol: self.config.wrap_and_unwrap_sol,
            use_token_ledger: self.config.use_token_ledger,
            dynamic_compute_unit_limit: self.config.dynamic_compute_unit_limit,
            prioritization_fee_lamports: self.config.prioritization_fee_lamports,
        };
        let response = self.aggregator.swap_instructions(&request).await?;

        if let Some(error) = response.error {
            return Err(PaymentError::RouteBuildFailed(error));
        }
        let swap = response
            .swap_instruction
            .as_ref()
            .ok_or_else(|| PaymentError::RouteBuildFailed("response has no swap instruction".into()))?;

        let mut instructions = Vec::new();

        for wire in &response.compute_budget_instructions {
            instructions.push(TaggedInstruction::decode(InstructionKind::ComputeBudget, wire)?);
        }
        if response.compute_budget_instructions.is_empty() {
            if let Some(fee) = self.config.prioritization_fee_lamports {
                debug!("Synthesizing compute budget: {} CU, {} lamports", self.compute_unit_limit, fee);
                instructions.extend(
                    compute_budget::create_compute_budget_instructions(self.compute_unit_limit, fee)
                        .into_iter()
                        .map(|ix| TaggedInstruction::new(InstructionKind::ComputeBudget, ix)),
                );
            }
        }

        if self.create_destination_account {
            instructions.push(TaggedInstruction::new(
                InstructionKind::Setup,
                create_associated_token_account_idempotent(
                    fee_payer,
                    &destination.owner,
                    &destination.mint.mint,
                    &destination.mint.token_program,
                ),
            ));
        }
        for wire in &response.setup_instructions {
            instructions.push(TaggedInstruction::decode(InstructionKind::Setup, wire)?);
        }
        if let Some(wire) = &response.token_ledger_instruction {
            instructions.push(TaggedInstruction::decode(InstructionKind::TokenLedger, wire)?);
        }
        instructions.push(TaggedInstruction::decode(InstructionKind::Main, swap)?);
        if let Some(wire) = &response.cleanup_instruction {
            instructions.push(TaggedInstruction::decode(InstructionKind::Cleanup, wire)?);
        }
        for wire in &response.other_instructions {
            instructions.push(TaggedInstruction::decode(InstructionKind::Cleanup, wire)?);
        }

        let tables = response
            .address_lookup_table_addresses
            .iter()
            .map(|address| {
                Pubkey::from_str(address).map_err(|_| {
                    PaymentError::RouteBuildFailed(format!("invalid lookup table address: {}", address))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let set = InstructionSet::new(instructions, tables)?;
        info!(
            "Assembled {} instruction(s), {} lookup table(s)",
            set.len(),
            set.lookup_table_addresses().len()
        );
        Ok(set)
    }
}
