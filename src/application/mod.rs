//! Application layer - the caller-facing payment operation

pub mod services;

pub use services::{PaymentRequest, PaymentService};
