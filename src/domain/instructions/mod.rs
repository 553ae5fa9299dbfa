//! Instruction domain - tagged native instructions in execution order

mod assembler;
pub mod compute_budget;

pub use assembler::{DestinationAccount, InstructionAssembler};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};
use std::str::FromStr;

use crate::infrastructure::aggregator::WireInstruction;
use crate::shared::errors::PaymentError;

/// Phase an instruction belongs to. Variant order is execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InstructionKind {
    ComputeBudget,
    Setup,
    TokenLedger,
    Main,
    Cleanup,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedInstruction {
    pub kind: InstructionKind,
    pub instruction: Instruction,
}

impl TaggedInstruction {
    pub fn new(kind: InstructionKind, instruction: Instruction) -> Self {
        Self { kind, instruction }
    }

    /// Decode a provider instruction: program id, account metas, base64 payload
    pub fn decode(kind: InstructionKind, wire: &WireInstruction) -> Result<Self, PaymentError> {
        let program_id = decode_pubkey(&wire.program_id)?;
        let accounts = wire
            .accounts
            .iter()
            .map(|meta| {
                Ok(AccountMeta {
                    pubkey: decode_pubkey(&meta.pubkey)?,
                    is_signer: meta.is_signer,
                    is_writable: meta.is_writable,
                })
            })
            .collect::<Result<Vec<_>, PaymentError>>()?;
        let data = STANDARD.decode(&wire.data).map_err(|e| {
            PaymentError::RouteBuildFailed(format!("instruction for {} has bad payload: {}", program_id, e))
        })?;

        Ok(Self::new(
            kind,
            Instruction {
                program_id,
                accounts,
                data,
            },
        ))
    }
}

fn decode_pubkey(value: &str) -> Result<Pubkey, PaymentError> {
    Pubkey::from_str(value)
        .map_err(|_| PaymentError::RouteBuildFailed(format!("invalid address in instruction: {}", value)))
}

/// Ordered instruction sequence for one swap plus the lookup tables it references.
/// Exactly one `Main` instruction; kinds never decrease along the sequence.
#[derive(Debug, Clone)]
pub struct InstructionSet {
    instructions: Vec<TaggedInstruction>,
    lookup_table_addresses: Vec<Pubkey>,
}

impl InstructionSet {
    pub fn new(
        instructions: Vec<TaggedInstruction>,
        lookup_table_addresses: Vec<Pubkey>,
    ) -> Result<Self, PaymentError> {
        let mains = instructions
            .iter()
            .filter(|ix| ix.kind == InstructionKind::Main)
            .count();
        if mains != 1 {
            return Err(PaymentError::RouteBuildFailed(format!(
                "expected exactly one swap instruction, found {}",
                mains
            )));
        }
        if instructions.windows(2).any(|pair| pair[0].kind > pair[1].kind) {
            return Err(PaymentError::RouteBuildFailed(
                "instructions out of setup → swap → cleanup order".into(),
            ));
        }

        let mut tables = Vec::with_capacity(lookup_table_addresses.len());
        for table in lookup_table_addresses {
            if !tables.contains(&table) {
                tables.push(table);
            }
        }

        Ok(Self {
            instructions,
            lookup_table_addresses: tables,
        })
    }

    pub fn tagged(&self) -> &[TaggedInstruction] {
        &self.instructions
    }

    pub fn kinds(&self) -> Vec<InstructionKind> {
        self.instructions.iter().map(|ix| ix.kind).collect()
    }

    /// Native instructions in execution order
    pub fn ordered(&self) -> Vec<Instruction> {
        self.instructions.iter().map(|ix| ix.instruction.clone()).collect()
    }

    pub fn main(&self) -> Option<&Instruction> {
        self.instructions
            .iter()
            .find(|ix| ix.kind == InstructionKind::Main)
            .map(|ix| &ix.instruction)
    }

    pub fn lookup_table_addresses(&self) -> &[Pubkey] {
        &self.lookup_table_addresses
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::aggregator::WireAccountMeta;

    fn ix(kind: InstructionKind) -> TaggedInstruction {
        TaggedInstruction::new(kind, Instruction::new_with_bytes(Pubkey::new_unique(), &[1], vec![]))
    }

    #[test]
    fn test_decode_wire_instruction() {
        let program = Pubkey::new_unique();
        let account = Pubkey::new_unique();
        let wire = WireInstruction {
            program_id: program.to_string(),
            accounts: vec![WireAccountMeta {
                pubkey: account.to_string(),
                is_signer: true,
                is_writable: false,
            }],
            data: STANDARD.encode([7u8, 8, 9]),
        };

        let decoded = TaggedInstruction::decode(InstructionKind::Main, &wire).unwrap();
        assert_eq!(decoded.instruction.program_id, program);
        assert_eq!(decoded.instruction.accounts, vec![AccountMeta::new_readonly(account, true)]);
        assert_eq!(decoded.instruction.data, vec![7, 8, 9]);
    }

    #[test]
    fn test_decode_rejects_bad_payload() {
        let wire = WireInstruction {
            program_id: Pubkey::new_unique().to_string(),
            accounts: vec![],
            data: "not base64!".into(),
        };
        assert!(matches!(
            TaggedInstruction::decode(InstructionKind::Setup, &wire),
            Err(PaymentError::RouteBuildFailed(_))
        ));
    }

    #[test]
    fn test_set_requires_single_main() {
        assert!(InstructionSet::new(vec![ix(InstructionKind::Setup)], vec![]).is_err());
        assert!(InstructionSet::new(
            vec![ix(InstructionKind::Main), ix(InstructionKind::Main)],
            vec![]
        )
        .is_err());
    }

    #[test]
    fn test_set_rejects_reordering() {
        let err = InstructionSet::new(
            vec![ix(InstructionKind::Main), ix(InstructionKind::Setup)],
            vec![],
        )
        .unwrap_err();
        assert!(matches!(err, PaymentError::RouteBuildFailed(_)));
    }

    #[test]
    fn test_set_dedupes_tables() {
        let table = Pubkey::new_unique();
        let set = InstructionSet::new(vec![ix(InstructionKind::Main)], vec![table, table]).unwrap();
        assert_eq!(set.lookup_table_addresses(), &[table]);
    }
}
