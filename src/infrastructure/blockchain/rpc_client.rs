//! Solana RPC client for the payment pipeline

use async_trait::async_trait;
use solana_client::{nonblocking::rpc_client::RpcClient, rpc_config::RpcSendTransactionConfig};
use solana_sdk::{
    address_lookup_table::state::AddressLookupTable,
    commitment_config::{CommitmentConfig, CommitmentLevel},
    message::AddressLookupTableAccount,
    program_pack::Pack,
    pubkey::Pubkey,
    signature::Signature,
    transaction::VersionedTransaction,
};
use solana_transaction_status::TransactionStatus;
use std::{str::FromStr, time::Duration};
use tracing::debug;

use super::{LedgerRpc, RecencyToken, SignatureStatus};
use crate::domain::execution::classifier::{classify_client_error, classify_send_error};
use crate::domain::keys::is_token_program;
use crate::shared::config::NetworkConfig;
use crate::shared::errors::PaymentError;
use crate::shared::types::MintInfo;

/// Solana RPC client wrapper
pub struct SolanaRpcClient {
    client: RpcClient,
    commitment: CommitmentConfig,
}

impl SolanaRpcClient {
    pub fn new(config: &NetworkConfig) -> Result<Self, PaymentError> {
        let level = CommitmentLevel::from_str(&config.commitment).map_err(|e| {
            PaymentError::Configuration(format!("Invalid commitment {}: {}", config.commitment, e))
        })?;
        let commitment = CommitmentConfig { commitment: level };

        Ok(Self {
            client: RpcClient::new_with_timeout_and_commitment(
                config.rpc_url.clone(),
                Duration::from_millis(config.request_timeout_ms),
                commitment,
            ),
            commitment,
        })
    }

    async fn fetch_account_data(&self, address: &Pubkey) -> Result<Option<(Pubkey, Vec<u8>)>, PaymentError> {
        let response = self
            .client
            .get_account_with_commitment(address, self.commitment)
            .await
            .map_err(|e| classify_client_error(&e))?;
        Ok(response.value.map(|account| (account.owner, account.data)))
    }
}

#[async_trait]
impl LedgerRpc for SolanaRpcClient {
    async fn get_balance(&self, address: &Pubkey) -> Result<u64, PaymentError> {
        self.client
            .get_balance_with_commitment(address, self.commitment)
            .await
            .map(|response| response.value)
            .map_err(|e| classify_client_error(&e))
    }

    async fn get_token_balance(&self, account: &Pubkey) -> Result<Option<u64>, PaymentError> {
        let Some((owner, data)) = self.fetch_account_data(account).await? else {
            return Ok(None);
        };
        if !is_token_program(&owner) || data.len() < spl_token::state::Account::LEN {
            return Err(PaymentError::rejected(format!(
                "{} is not a token account (owner {})",
                account, owner
            )));
        }
        // Token-2022 extensions live after the base layout, which both programs share
        let parsed = spl_token::state::Account::unpack_from_slice(&data[..spl_token::state::Account::LEN])
            .map_err(|e| PaymentError::rejected(format!("unreadable token account {}: {}", account, e)))?;
        Ok(Some(parsed.amount))
    }

    async fn get_mint_info(&self, mint: &Pubkey) -> Result<MintInfo, PaymentError> {
        let (owner, data) = self
            .fetch_account_data(mint)
            .await?
            .ok_or_else(|| PaymentError::InvalidQuote(format!("mint {} does not exist", mint)))?;
        if !is_token_program(&owner) || data.len() < spl_token::state::Mint::LEN {
            return Err(PaymentError::InvalidQuote(format!("{} is not a token mint", mint)));
        }
        let parsed = spl_token::state::Mint::unpack_from_slice(&data[..spl_token::state::Mint::LEN])
            .map_err(|e| PaymentError::InvalidQuote(format!("unreadable mint {}: {}", mint, e)))?;

        Ok(MintInfo {
            mint: *mint,
            token_program: owner,
            decimals: parsed.decimals,
        })
    }

    async fn get_lookup_tables(
        &self,
        addresses: &[Pubkey],
    ) -> Result<Vec<AddressLookupTableAccount>, PaymentError> {
        if addresses.is_empty() {
            return Ok(Vec::new());
        }
        let accounts = self
            .client
            .get_multiple_accounts_with_commitment(addresses, self.commitment)
            .await
            .map_err(|e| classify_client_error(&e))?
            .value;

        addresses
            .iter()
            .zip(accounts)
            .map(|(key, account)| {
                let account = account.ok_or(PaymentError::StaleRoute(*key))?;
                let table = AddressLookupTable::deserialize(&account.data)
                    .map_err(|_| PaymentError::StaleRoute(*key))?;
                if table.meta.deactivation_slot != u64::MAX {
                    return Err(PaymentError::StaleRoute(*key));
                }
                Ok(AddressLookupTableAccount {
                    key: *key,
                    addresses: table.addresses.to_vec(),
                })
            })
            .collect()
    }

    async fn get_latest_blockhash(&self) -> Result<RecencyToken, PaymentError> {
        let (blockhash, last_valid_block_height) = self
            .client
            .get_latest_blockhash_with_commitment(self.commitment)
            .await
            .map_err(|e| classify_client_error(&e))?;
        Ok(RecencyToken {
            blockhash,
            last_valid_block_height,
        })
    }

    async fn get_block_height(&self) -> Result<u64, PaymentError> {
        self.client
            .get_block_height_with_commitment(self.commitment)
            .await
            .map_err(|e| classify_client_error(&e))
    }

    async fn send_transaction(
        &self,
        transaction: &VersionedTransaction,
        skip_preflight: bool,
    ) -> Result<Signature, PaymentError> {
        let config = RpcSendTransactionConfig {
            skip_preflight,
            preflight_commitment: Some(self.commitment.commitment),
            // Resubmission is driven by the controller, not the RPC node
            max_retries: Some(0),
            ..RpcSendTransactionConfig::default()
        };
        self.client
            .send_transaction_with_config(transaction, config)
            .await
            .map_err(|e| {
                classify_send_error(&e, transaction.signatures.first().copied().unwrap_or_default())
            })
    }

    async fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> Result<SignatureStatus, PaymentError> {
        let response = self
            .client
            .get_signature_statuses(&[*signature])
            .await
            .map_err(|e| classify_client_error(&e))?;

        let status = interpret_status(response.value.into_iter().next().flatten(), self.commitment);
        debug!("Signature {} status: {:?}", signature, status);
        Ok(status)
    }
}

/// Collapse a raw status into pending / confirmed / failed at `commitment`.
/// A failed execution is final as soon as it is seen at any commitment.
fn interpret_status(status: Option<TransactionStatus>, commitment: CommitmentConfig) -> SignatureStatus {
    match status {
        None => SignatureStatus::Pending,
        Some(status) => match status.err {
            Some(err) => SignatureStatus::Failed(err),
            None if status.satisfies_commitment(commitment) => SignatureStatus::Confirmed,
            None => SignatureStatus::Pending,
        },
    }
}
