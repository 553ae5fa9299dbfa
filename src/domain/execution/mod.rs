//! Execution domain - signing, submission and failure classification

pub mod classifier;
mod controller;
mod transaction_builder;

pub use controller::{PaymentPlan, SubmissionController};
pub use transaction_builder::{DualSignerBuilder, SignedTransaction};
