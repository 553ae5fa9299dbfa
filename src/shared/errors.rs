//! Error handling for the payment pipeline

use solana_sdk::{pubkey::Pubkey, signature::Signature};
use thiserror::Error;

use crate::shared::types::{BalanceSnapshot, Role};

/// How the submission controller reacts to a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Re-quote with the next, stricter route-complexity tier
    TightenRoute,
    /// Re-run the whole pipeline after a backoff delay
    Retry,
    /// Terminal, surface to the caller
    Fail,
}

/// Payment pipeline errors
#[derive(Error, Debug, Clone)]
pub enum PaymentError {
    #[error("Malformed {role} credential: {reason}")]
    MalformedCredential { role: Role, reason: String },

    #[error("Invalid quote: {0}")]
    InvalidQuote(String),

    #[error("Route build failed: {0}")]
    RouteBuildFailed(String),

    #[error("Stale route: lookup table {0} no longer resolves")]
    StaleRoute(Pubkey),

    #[error("Transaction too large: {size} bytes (limit {limit})")]
    SizeExceeded { size: usize, limit: usize },

    /// Confirmation wait ran out while the transaction may already be on chain.
    /// Resolved by the controller, never returned from `PaymentService::execute`.
    #[error("Confirmation timed out, transaction {0} may have landed")]
    LikelyLanded(Signature),

    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("Recency token expired: {0}")]
    Expired(String),

    #[error("Insufficient {role} balance: {detail}")]
    InsufficientBalance { role: Role, detail: String },

    #[error("Transaction rejected: {0}")]
    Rejected(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl PaymentError {
    /// Stable classification label reported to callers
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedCredential { .. } => "MalformedCredential",
            Self::InvalidQuote(_) => "InvalidQuote",
            Self::RouteBuildFailed(_) => "RouteBuildFailed",
            Self::StaleRoute(_) => "StaleRoute",
            Self::SizeExceeded { .. } => "SizeExceeded",
            Self::LikelyLanded(_) => "LikelyLanded",
            Self::Transient(_) => "Transient",
            Self::Expired(_) => "Expired",
            Self::InsufficientBalance { .. } => "InsufficientBalance",
            Self::Rejected(_) => "Rejected",
            Self::Configuration(_) => "Configuration",
        }
    }

    pub fn recovery(&self) -> Recovery {
        match self {
            Self::SizeExceeded { .. } => Recovery::TightenRoute,
            Self::Transient(_) | Self::Expired(_) => Recovery::Retry,
            Self::MalformedCredential { .. }
            | Self::InvalidQuote(_)
            | Self::RouteBuildFailed(_)
            | Self::StaleRoute(_)
            | Self::LikelyLanded(_)
            | Self::InsufficientBalance { .. }
            | Self::Rejected(_)
            | Self::Configuration(_) => Recovery::Fail,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.recovery() != Recovery::Fail
    }

    pub fn transient(reason: impl Into<String>) -> Self {
        Self::Transient(reason.into())
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected(reason.into())
    }

    pub fn insufficient(role: Role, detail: impl Into<String>) -> Self {
        Self::InsufficientBalance {
            role,
            detail: detail.into(),
        }
    }

    pub fn malformed(role: Role, reason: impl Into<String>) -> Self {
        Self::MalformedCredential {
            role,
            reason: reason.into(),
        }
    }
}

/// Terminal failure handed back to the caller: the classified error plus
/// whatever balances were last observed, so a resubmit decision is safe.
#[derive(Error, Debug, Clone)]
#[error("{error} (after {attempts} attempt(s))")]
pub struct PaymentFailure {
    pub error: PaymentError,
    pub attempts: u32,
    pub last_balances: Option<BalanceSnapshot>,
}

impl PaymentFailure {
    pub fn new(error: PaymentError, attempts: u32, last_balances: Option<BalanceSnapshot>) -> Self {
        Self {
            error,
            attempts,
            last_balances,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.error.kind()
    }
}

impl From<PaymentError> for PaymentFailure {
    fn from(error: PaymentError) -> Self {
        Self::new(error, 0, None)
    }
}
