//! Sponsorswap - sponsored swap-payments on Solana
//! Quote → assemble → dual-sign → submit → reconcile, with a fee payer distinct from the funder

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;

// Re-export main types for convenience
pub use application::{PaymentRequest, PaymentService};
pub use shared::config::{ConfigLoader, PaymentConfig};
pub use shared::errors::{PaymentError, PaymentFailure};
pub use shared::types::{BalanceSnapshot, ExecutionResult};
