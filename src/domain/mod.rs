//! Domain layer - the quote → assemble → sign → submit → reconcile pipeline

pub mod balance;
pub mod execution;
pub mod instructions;
pub mod keys;
pub mod quote;
