//! Maps provider error shapes onto the payment error taxonomy.
//!
//! Classification reads structured fields (RPC error codes, preflight
//! simulation results, `TransactionError` variants), never log text.

use solana_client::{
    client_error::{ClientError, ClientErrorKind},
    rpc_request::{RpcError, RpcResponseErrorData},
};
use solana_sdk::{
    instruction::InstructionError, message::CompileError, signature::Signature,
    transaction::TransactionError,
};

use crate::shared::errors::PaymentError;
use crate::shared::types::Role;

/// JSON-RPC invalid params, returned for oversized or undecodable payloads
const JSON_RPC_INVALID_PARAMS: i64 = -32602;
const JSON_RPC_SERVER_ERROR_BLOCK_NOT_AVAILABLE: i64 = -32004;
const JSON_RPC_SERVER_ERROR_NODE_UNHEALTHY: i64 = -32005;
const JSON_RPC_SERVER_ERROR_MIN_CONTEXT_SLOT_NOT_REACHED: i64 = -32016;

/// Aggregator program's "slippage tolerance exceeded" custom error
pub const AGGREGATOR_SLIPPAGE_EXCEEDED: u32 = 6001;

pub fn classify_client_error(err: &ClientError) -> PaymentError {
    match err.kind() {
        ClientErrorKind::Io(e) => PaymentError::transient(format!("io: {}", e)),
        ClientErrorKind::Reqwest(e) => PaymentError::transient(format!("http: {}", e)),
        ClientErrorKind::TransactionError(e) => classify_transaction_error(e),
        ClientErrorKind::RpcError(rpc) => classify_rpc_error(rpc),
        ClientErrorKind::SerdeJson(e) => PaymentError::transient(format!("malformed RPC reply: {}", e)),
        other => PaymentError::rejected(other.to_string()),
    }
}

/// Send-side classification. Transport failures and `AlreadyProcessed` mean the
/// transaction may be on chain, reported under its own `signature`.
pub fn classify_send_error(err: &ClientError, signature: Signature) -> PaymentError {
    match err.kind() {
        ClientErrorKind::Io(_) | ClientErrorKind::Reqwest(_) => PaymentError::LikelyLanded(signature),
        _ if err.get_transaction_error() == Some(TransactionError::AlreadyProcessed) => {
            PaymentError::LikelyLanded(signature)
        }
        _ => classify_client_error(err),
    }
}

fn classify_rpc_error(err: &RpcError) -> PaymentError {
    match err {
        RpcError::RpcRequestError(msg) | RpcError::ForUser(msg) => PaymentError::transient(msg.clone()),
        RpcError::ParseError(msg) => PaymentError::transient(format!("parse: {}", msg)),
        RpcError::RpcResponseError { code, message, data } => match data {
            RpcResponseErrorData::SendTransactionPreflightFailure(sim) => match &sim.err {
                Some(tx_err) => classify_transaction_error(tx_err),
                None => PaymentError::rejected(message.clone()),
            },
            RpcResponseErrorData::NodeUnhealthy { .. } => PaymentError::transient(message.clone()),
            RpcResponseErrorData::Empty => match *code {
                JSON_RPC_INVALID_PARAMS => PaymentError::SizeExceeded {
                    size: 0,
                    limit: solana_sdk::packet::PACKET_DATA_SIZE,
                },
                JSON_RPC_SERVER_ERROR_NODE_UNHEALTHY
                | JSON_RPC_SERVER_ERROR_BLOCK_NOT_AVAILABLE
                | JSON_RPC_SERVER_ERROR_MIN_CONTEXT_SLOT_NOT_REACHED => {
                    PaymentError::transient(message.clone())
                }
                _ => PaymentError::rejected(format!("RPC {}: {}", code, message)),
            },
        },
    }
}

pub fn classify_transaction_error(err: &TransactionError) -> PaymentError {
    match err {
        TransactionError::BlockhashNotFound => PaymentError::Expired(err.to_string()),
        TransactionError::InsufficientFundsForFee
        | TransactionError::InsufficientFundsForRent { .. } => {
            PaymentError::insufficient(Role::FeePayer, err.to_string())
        }
        TransactionError::InstructionError(_, InstructionError::InsufficientFunds) => {
            PaymentError::insufficient(Role::Funder, err.to_string())
        }
        TransactionError::InstructionError(index, InstructionError::Custom(code))
            if *code == AGGREGATOR_SLIPPAGE_EXCEEDED =>
        {
            PaymentError::transient(format!("slippage exceeded at instruction {}", index))
        }
        TransactionError::TooManyAccountLocks => PaymentError::SizeExceeded {
            size: 0,
            limit: solana_sdk::packet::PACKET_DATA_SIZE,
        },
        TransactionError::AccountInUse
        | TransactionError::ClusterMaintenance
        | TransactionError::WouldExceedMaxBlockCostLimit
        | TransactionError::WouldExceedMaxAccountCostLimit
        | TransactionError::WouldExceedMaxVoteCostLimit
        | TransactionError::WouldExceedAccountDataBlockLimit
        | TransactionError::WouldExceedAccountDataTotalLimit => {
            PaymentError::transient(err.to_string())
        }
        _ => PaymentError::rejected(err.to_string()),
    }
}

/// Message compilation only fails when the route references more accounts
/// than a v0 message can index
pub fn classify_compile_error(err: &CompileError) -> PaymentError {
    match err {
        CompileError::AccountIndexOverflow | CompileError::AddressTableLookupIndexOverflow => {
            PaymentError::SizeExceeded {
                size: 0,
                limit: solana_sdk::packet::PACKET_DATA_SIZE,
            }
        }
        other => PaymentError::RouteBuildFailed(other.to_string()),
    }
}
