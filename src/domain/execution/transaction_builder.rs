//! Transaction building and signing

use solana_sdk::{
    message::{v0, VersionedMessage},
    packet::PACKET_DATA_SIZE,
    signature::{Signature, Signer},
    transaction::VersionedTransaction,
};
use std::sync::Arc;
use tracing::{debug, info};

use super::classifier::classify_compile_error;
use crate::domain::instructions::InstructionSet;
use crate::domain::keys::Principal;
use crate::infrastructure::blockchain::{LedgerRpc, RecencyToken};
use crate::shared::errors::PaymentError;

/// Fully signed v0 transaction, ready to transmit as-is
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub transaction: VersionedTransaction,
    /// Fee payer's signature, which identifies the transaction
    pub signature: Signature,
    pub recency: RecencyToken,
    pub size: usize,
}

/// Builds transactions where the fee payer and the funder sign separately
pub struct DualSignerBuilder {
    ledger: Arc<dyn LedgerRpc>,
}

impl DualSignerBuilder {
    pub fn new(ledger: Arc<dyn LedgerRpc>) -> Self {
        Self { ledger }
    }

    pub async fn build(
        &self,
        set: &InstructionSet,
        funder: &Principal,
        fee_payer: &Principal,
    ) -> Result<SignedTransaction, PaymentError> {
        let funder_key = funder.require_keypair()?;
        let fee_payer_key = fee_payer.require_keypair()?;

        let tables = self.ledger.get_lookup_tables(set.lookup_table_addresses()).await?;
        let recency = self.ledger.get_latest_blockhash().await?;

        let message = v0::Message::try_compile(
            &fee_payer_key.pubkey(),
            &set.ordered(),
            &tables,
            recency.blockhash,
        )
        .map_err(|e| classify_compile_error(&e))?;

        // Signers in message order: the fee payer is always account 0
        let required = message.header.num_required_signatures as usize;
        let mut signers: Vec<&dyn Signer> = Vec::with_capacity(required);
        for key in message.account_keys.iter().take(required) {
            if *key == fee_payer_key.pubkey() {
                signers.push(fee_payer_key);
            } else if *key == funder_key.pubkey() {
                signers.push(funder_key);
            } else {
                return Err(PaymentError::RouteBuildFailed(format!(
                    "route requires a signature from unknown account {}",
                    key
                )));
            }
        }
        if !message.account_keys[..required].contains(&funder_key.pubkey()) {
            return Err(PaymentError::RouteBuildFailed(
                "route does not require the funder's authorization".into(),
            ));
        }

        let transaction = VersionedTransaction::try_new(VersionedMessage::V0(message), &signers)
            .map_err(|e| PaymentError::RouteBuildFailed(format!("signing failed: {}", e)))?;

        let size = bincode::serialized_size(&transaction)
            .map_err(|e| PaymentError::RouteBuildFailed(format!("serialization failed: {}", e)))?
            as usize;
        if size > PACKET_DATA_SIZE {
            return Err(PaymentError::SizeExceeded {
                size,
                limit: PACKET_DATA_SIZE,
            });
        }

        let signature = transaction
            .signatures
            .first()
            .copied()
            .ok_or_else(|| PaymentError::RouteBuildFailed("transaction has no signatures".into()))?;

        debug!("Built transaction: {} bytes, {} signature(s)", size, transaction.signatures.len());
        info!("✅ Signed transaction {}", signature);
        Ok(SignedTransaction {
            transaction,
            signature,
            recency,
            size,
        })
    }
}
