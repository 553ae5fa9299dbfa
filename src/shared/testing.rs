//! In-memory ledger and aggregator for pipeline tests

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};
use solana_sdk::{
    hash::Hash,
    message::AddressLookupTableAccount,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    transaction::VersionedTransaction,
};
use spl_associated_token_account::get_associated_token_address_with_program_id;
use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{Arc, Mutex},
};

use crate::application::services::{PaymentRequest, PaymentService};
use crate::infrastructure::aggregator::{
    QuoteRequest, SwapAggregator, SwapInstructionsRequest, SwapInstructionsResponse, WireAccountMeta,
    WireInstruction,
};
use crate::infrastructure::blockchain::{LedgerRpc, RecencyToken, SignatureStatus};
use crate::shared::config::PaymentConfig;
use crate::shared::errors::PaymentError;
use crate::shared::types::MintInfo;

pub const FEE_PER_SIGNATURE: u64 = 5_000;
const BLOCKHASH_VALIDITY: u64 = 20;

/// Balance an effect applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BalanceKey {
    Native(Pubkey),
    Token(Pubkey),
}

/// What the fake cluster does with the next submitted transaction
#[derive(Debug, Clone)]
pub enum SendBehavior {
    /// Accept and execute
    Land,
    /// Accept, then never execute
    Drop,
    /// Execute, but the reply is lost in transit
    LandButLose,
    /// Refuse with this error
    Fail(PaymentError),
}

#[derive(Default)]
struct LedgerState {
    native: HashMap<Pubkey, u64>,
    tokens: HashMap<Pubkey, u64>,
    mints: HashMap<Pubkey, MintInfo>,
    tables: HashMap<Pubkey, Vec<Pubkey>>,
    block_height: u64,
    sends: VecDeque<SendBehavior>,
    swap_effect: Vec<(BalanceKey, i64)>,
    landed: HashSet<Signature>,
    hide_confirmations: bool,
    frozen: bool,
    balance_failures_after_send: u32,
    sent: Vec<VersionedTransaction>,
}

impl LedgerState {
    fn apply(&mut self, key: BalanceKey, change: i64) {
        let balance = match key {
            BalanceKey::Native(address) => self.native.entry(address).or_default(),
            BalanceKey::Token(account) => self.tokens.entry(account).or_default(),
        };
        *balance = balance.saturating_add_signed(change);
    }
}

/// Cluster double: balances, lookup tables and scripted submission outcomes.
/// A landed transaction charges its fee payer and applies the configured swap effect.
#[derive(Default)]
pub struct FakeLedger {
    state: Mutex<LedgerState>,
}

impl FakeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_native(&self, address: &Pubkey, lamports: u64) {
        self.state.lock().unwrap().native.insert(*address, lamports);
    }

    pub fn set_token(&self, account: &Pubkey, amount: u64) {
        self.state.lock().unwrap().tokens.insert(*account, amount);
    }

    pub fn native(&self, address: &Pubkey) -> u64 {
        self.state.lock().unwrap().native.get(address).copied().unwrap_or(0)
    }

    pub fn add_mint(&self, mint: &Pubkey, token_program: Pubkey, decimals: u8) {
        self.state.lock().unwrap().mints.insert(
            *mint,
            MintInfo {
                mint: *mint,
                token_program,
                decimals,
            },
        );
    }

    pub fn add_lookup_table(&self, table: &Pubkey, addresses: Vec<Pubkey>) {
        self.state.lock().unwrap().tables.insert(*table, addresses);
    }

    pub fn set_swap_effect(&self, effect: Vec<(BalanceKey, i64)>) {
        self.state.lock().unwrap().swap_effect = effect;
    }

    pub fn script_sends(&self, behaviors: Vec<SendBehavior>) {
        self.state.lock().unwrap().sends = behaviors.into();
    }

    /// Keep reporting landed transactions as pending
    pub fn hide_confirmations(&self, hide: bool) {
        self.state.lock().unwrap().hide_confirmations = hide;
    }

    /// Stop the block height from advancing, so no blockhash ever expires
    pub fn freeze_chain(&self) {
        self.state.lock().unwrap().frozen = true;
    }

    /// Fail the next `count` native balance reads made after the first submission
    pub fn fail_balance_reads_after_send(&self, count: u32) {
        self.state.lock().unwrap().balance_failures_after_send = count;
    }

    pub fn sent(&self) -> Vec<VersionedTransaction> {
        self.state.lock().unwrap().sent.clone()
    }
}

#[async_trait]
impl LedgerRpc for FakeLedger {
    async fn get_balance(&self, address: &Pubkey) -> Result<u64, PaymentError> {
        let mut state = self.state.lock().unwrap();
        if !state.sent.is_empty() && state.balance_failures_after_send > 0 {
            state.balance_failures_after_send -= 1;
            return Err(PaymentError::transient("rpc node unavailable"));
        }
        Ok(state.native.get(address).copied().unwrap_or(0))
    }

    async fn get_token_balance(&self, account: &Pubkey) -> Result<Option<u64>, PaymentError> {
        Ok(self.state.lock().unwrap().tokens.get(account).copied())
    }

    async fn get_mint_info(&self, mint: &Pubkey) -> Result<MintInfo, PaymentError> {
        self.state
            .lock()
            .unwrap()
            .mints
            .get(mint)
            .copied()
            .ok_or_else(|| PaymentError::InvalidQuote(format!("mint {} does not exist", mint)))
    }

    async fn get_lookup_tables(
        &self,
        addresses: &[Pubkey],
    ) -> Result<Vec<AddressLookupTableAccount>, PaymentError> {
        let state = self.state.lock().unwrap();
        addresses
            .iter()
            .map(|key| {
                state
                    .tables
                    .get(key)
                    .map(|addresses| AddressLookupTableAccount {
                        key: *key,
                        addresses: addresses.clone(),
                    })
                    .ok_or(PaymentError::StaleRoute(*key))
            })
            .collect()
    }

    async fn get_latest_blockhash(&self) -> Result<RecencyToken, PaymentError> {
        let state = self.state.lock().unwrap();
        Ok(RecencyToken {
            blockhash: Hash::new_unique(),
            last_valid_block_height: state.block_height + BLOCKHASH_VALIDITY,
        })
    }

    /// Every query advances the chain by one block unless it is frozen
    async fn get_block_height(&self) -> Result<u64, PaymentError> {
        let mut state = self.state.lock().unwrap();
        if !state.frozen {
            state.block_height += 1;
        }
        Ok(state.block_height)
    }

    async fn send_transaction(
        &self,
        transaction: &VersionedTransaction,
        _skip_preflight: bool,
    ) -> Result<Signature, PaymentError> {
        if !transaction.verify_with_results().iter().all(|ok| *ok) {
            return Err(PaymentError::rejected("signature verification failed"));
        }

        let mut state = self.state.lock().unwrap();
        let behavior = state.sends.pop_front().unwrap_or(SendBehavior::Land);
        let signature = transaction.signatures[0];
        match &behavior {
            SendBehavior::Fail(error) => return Err(error.clone()),
            SendBehavior::Drop => {}
            SendBehavior::Land | SendBehavior::LandButLose => {
                let fee_payer = transaction.message.static_account_keys()[0];
                let fee = FEE_PER_SIGNATURE * transaction.signatures.len() as u64;
                state.apply(BalanceKey::Native(fee_payer), -(fee as i64));
                for (key, change) in state.swap_effect.clone() {
                    state.apply(key, change);
                }
                state.landed.insert(signature);
            }
        }
        state.sent.push(transaction.clone());
        match behavior {
            SendBehavior::LandButLose => Err(PaymentError::LikelyLanded(signature)),
            _ => Ok(signature),
        }
    }

    async fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> Result<SignatureStatus, PaymentError> {
        let state = self.state.lock().unwrap();
        if !state.hide_confirmations && state.landed.contains(signature) {
            Ok(SignatureStatus::Confirmed)
        } else {
            Ok(SignatureStatus::Pending)
        }
    }
}

/// Aggregator double: scripted quotes and instruction sets keyed by route limit
#[derive(Default)]
pub struct FakeAggregator {
    quotes: Mutex<HashMap<Option<u16>, Value>>,
    default_quote: Mutex<Option<Value>>,
    instructions: Mutex<HashMap<Option<u16>, SwapInstructionsResponse>>,
    default_instructions: Mutex<Option<SwapInstructionsResponse>>,
    quote_requests: Mutex<Vec<QuoteRequest>>,
    swap_requests: Mutex<Vec<SwapInstructionsRequest>>,
}

impl FakeAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_quote(&self, max_accounts: Option<u16>, body: Value) {
        self.quotes.lock().unwrap().insert(max_accounts, body);
    }

    pub fn set_default_quote(&self, body: Value) {
        *self.default_quote.lock().unwrap() = Some(body);
    }

    pub fn set_instructions(&self, max_accounts: Option<u16>, response: SwapInstructionsResponse) {
        self.instructions.lock().unwrap().insert(max_accounts, response);
    }

    pub fn set_default_instructions(&self, response: SwapInstructionsResponse) {
        *self.default_instructions.lock().unwrap() = Some(response);
    }

    pub fn quote_requests(&self) -> Vec<QuoteRequest> {
        self.quote_requests.lock().unwrap().clone()
    }

    pub fn swap_requests(&self) -> Vec<SwapInstructionsRequest> {
        self.swap_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SwapAggregator for FakeAggregator {
    async fn quote(&self, request: &QuoteRequest) -> Result<Value, PaymentError> {
        self.quote_requests.lock().unwrap().push(request.clone());
        let scripted = self.quotes.lock().unwrap().get(&request.max_accounts).cloned();
        scripted
            .or_else(|| self.default_quote.lock().unwrap().clone())
            .ok_or_else(|| PaymentError::InvalidQuote("No routes found".into()))
    }

    /// Answers for the route limit of the most recent quote
    async fn swap_instructions(
        &self,
        request: &SwapInstructionsRequest,
    ) -> Result<SwapInstructionsResponse, PaymentError> {
        self.swap_requests.lock().unwrap().push(request.clone());
        let limit = self
            .quote_requests
            .lock()
            .unwrap()
            .last()
            .and_then(|r| r.max_accounts);
        let scripted = self.instructions.lock().unwrap().get(&limit).cloned();
        scripted
            .or_else(|| self.default_instructions.lock().unwrap().clone())
            .ok_or_else(|| PaymentError::RouteBuildFailed("no instructions scripted".into()))
    }
}

/// Single-hop exact-input quote body as the aggregator returns it
pub fn sample_quote_json(input: &Pubkey, output: &Pubkey, in_amount: u64, out_amount: u64) -> Value {
    json!({
        "inputMint": input.to_string(),
        "inAmount": in_amount.to_string(),
        "outputMint": output.to_string(),
        "outAmount": out_amount.to_string(),
        "swapMode": "ExactIn",
        "slippageBps": 50,
        "priceImpactPct": "0.0001",
        "routePlan": [{
            "swapInfo": {
                "ammKey": Pubkey::new_unique().to_string(),
                "label": "Whirlpool",
                "inputMint": input.to_string(),
                "outputMint": output.to_string(),
                "inAmount": in_amount.to_string(),
                "outAmount": out_amount.to_string(),
            },
            "percent": 100
        }],
        "contextSlot": 1
    })
}

/// Instruction whose listed accounts are writable signers
pub fn wire_instruction(program: &Pubkey, signers: &[Pubkey], data: &[u8]) -> WireInstruction {
    WireInstruction {
        program_id: program.to_string(),
        accounts: signers
            .iter()
            .map(|key| WireAccountMeta {
                pubkey: key.to_string(),
                is_signer: true,
                is_writable: true,
            })
            .collect(),
        data: STANDARD.encode(data),
    }
}

/// Response with a single swap instruction signed by `funder` touching `extra_accounts` more accounts
pub fn swap_response(funder: &Pubkey, extra_accounts: usize, tables: Vec<Pubkey>) -> SwapInstructionsResponse {
    let mut swap = wire_instruction(&Pubkey::new_unique(), &[*funder], &[0xe5, 0x17, 0xcb, 0x97]);
    swap.accounts.extend((0..extra_accounts).map(|_| WireAccountMeta {
        pubkey: Pubkey::new_unique().to_string(),
        is_signer: false,
        is_writable: true,
    }));

    SwapInstructionsResponse {
        swap_instruction: Some(swap),
        address_lookup_table_addresses: tables.iter().map(|t| t.to_string()).collect(),
        ..SwapInstructionsResponse::default()
    }
}

/// Funded principals, a 6-decimal output mint and fakes wired for a 0.5 SOL → 1 token swap
pub struct Harness {
    pub ledger: Arc<FakeLedger>,
    pub aggregator: Arc<FakeAggregator>,
    pub funder: Keypair,
    pub fee_payer: Keypair,
    pub destination: Pubkey,
    pub output_mint: Pubkey,
    pub destination_holding: Pubkey,
    pub config: PaymentConfig,
}

impl Harness {
    pub fn new() -> Self {
        let funder = Keypair::new();
        let fee_payer = Keypair::new();
        let destination = Keypair::new().pubkey();
        let output_mint = Pubkey::new_unique();
        let destination_holding =
            get_associated_token_address_with_program_id(&destination, &output_mint, &spl_token::id());

        let ledger = Arc::new(FakeLedger::new());
        ledger.set_native(&funder.pubkey(), 2_000_000_000);
        ledger.set_native(&fee_payer.pubkey(), 1_000_000_000);
        ledger.add_mint(&output_mint, spl_token::id(), 6);
        ledger.set_swap_effect(vec![
            (BalanceKey::Native(funder.pubkey()), -500_000_000),
            (BalanceKey::Token(destination_holding), 1_000_000),
        ]);

        let aggregator = Arc::new(FakeAggregator::new());
        aggregator.set_default_quote(sample_quote_json(
            &spl_token::native_mint::id(),
            &output_mint,
            500_000_000,
            1_000_000,
        ));
        aggregator.set_default_instructions(swap_response(&funder.pubkey(), 4, vec![]));

        Self {
            ledger,
            aggregator,
            funder,
            fee_payer,
            destination,
            output_mint,
            destination_holding,
            config: PaymentConfig::default(),
        }
    }

    pub fn service(&self) -> PaymentService {
        PaymentService::new(self.config.clone(), self.aggregator.clone(), self.ledger.clone())
    }

    pub fn request(&self, input_amount: u64) -> PaymentRequest {
        PaymentRequest {
            funder_credential: self.funder.to_base58_string(),
            fee_payer_credential: self.fee_payer.to_base58_string(),
            destination_address: self.destination.to_string(),
            input_mint: spl_token::native_mint::id().to_string(),
            output_mint: self.output_mint.to_string(),
            input_amount,
            slippage_bps: None,
            allow_off_curve_destination: false,
        }
    }
}
