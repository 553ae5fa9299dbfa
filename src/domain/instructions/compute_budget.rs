use solana_sdk::{compute_budget::ComputeBudgetInstruction, instruction::Instruction};

const MICRO_LAMPORTS_PER_LAMPORT: u128 = 1_000_000;

/// Per-unit price (micro-lamports) that spends roughly `total_fee_lamports`
/// when the full `compute_units` budget is used
pub fn unit_price_for_fee(total_fee_lamports: u64, compute_units: u32) -> u64 {
    if compute_units == 0 {
        return 0;
    }
    let price = total_fee_lamports as u128 * MICRO_LAMPORTS_PER_LAMPORT / compute_units as u128;
    price.min(u64::MAX as u128) as u64
}

/// Create ComputeBudget instruction to set priority fee
pub fn create_priority_fee_instruction(micro_lamports_per_unit: u64) -> Instruction {
    ComputeBudgetInstruction::set_compute_unit_price(micro_lamports_per_unit)
}

/// Create ComputeBudget instruction to set compute unit limit
pub fn create_compute_unit_limit_instruction(compute_units: u32) -> Instruction {
    ComputeBudgetInstruction::set_compute_unit_limit(compute_units)
}

/// Limit plus price for a prioritized swap
pub fn create_compute_budget_instructions(
    compute_units: u32,
    priority_fee_lamports: u64,
) -> Vec<Instruction> {
    vec![
        create_compute_unit_limit_instruction(compute_units),
        create_priority_fee_instruction(unit_price_for_fee(priority_fee_lamports, compute_units)),
    ]
}
