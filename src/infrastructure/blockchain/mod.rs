//! Ledger access for the payment pipeline

pub mod rpc_client;

pub use rpc_client::SolanaRpcClient;

use async_trait::async_trait;
use solana_sdk::{
    hash::Hash, message::AddressLookupTableAccount, pubkey::Pubkey, signature::Signature,
    transaction::{TransactionError, VersionedTransaction},
};

use crate::shared::errors::PaymentError;
use crate::shared::types::MintInfo;

/// Recent blockhash plus the last block height at which it is still accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecencyToken {
    pub blockhash: Hash,
    pub last_valid_block_height: u64,
}

/// Status of a submitted signature at the configured commitment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureStatus {
    /// Unknown to the cluster or not yet at the target commitment
    Pending,
    Confirmed,
    Failed(TransactionError),
}

/// Read/submit surface of the ledger RPC the pipeline needs.
/// Implementations classify their own failures into `PaymentError`.
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// Native balance in lamports
    async fn get_balance(&self, address: &Pubkey) -> Result<u64, PaymentError>;

    /// Token balance in base units, `None` when the account does not exist
    async fn get_token_balance(&self, account: &Pubkey) -> Result<Option<u64>, PaymentError>;

    async fn get_mint_info(&self, mint: &Pubkey) -> Result<MintInfo, PaymentError>;

    /// Resolve lookup tables in order; a table that does not resolve is `StaleRoute`
    async fn get_lookup_tables(
        &self,
        addresses: &[Pubkey],
    ) -> Result<Vec<AddressLookupTableAccount>, PaymentError>;

    async fn get_latest_blockhash(&self) -> Result<RecencyToken, PaymentError>;

    async fn get_block_height(&self) -> Result<u64, PaymentError>;

    /// Transmit signed bytes. `LikelyLanded` when the request may have reached
    /// the cluster even though no reply came back.
    async fn send_transaction(
        &self,
        transaction: &VersionedTransaction,
        skip_preflight: bool,
    ) -> Result<Signature, PaymentError>;

    async fn get_signature_status(&self, signature: &Signature)
        -> Result<SignatureStatus, PaymentError>;
}
