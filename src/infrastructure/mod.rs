//! Infrastructure layer - aggregator HTTP API and ledger RPC

pub mod aggregator;
pub mod blockchain;
