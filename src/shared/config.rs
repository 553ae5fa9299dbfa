//! Configuration record for the pipeline, loaded from TOML and passed
//! explicitly into every component.

use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::shared::errors::PaymentError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub rpc_url: String,
    pub commitment: String,
    pub request_timeout_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://api.mainnet-beta.solana.com".to_string(),
            commitment: "confirmed".to_string(),
            request_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    /// Quote and instruction fetches are pure reads, keep this short
    pub timeout_ms: u64,
    pub default_slippage_bps: u16,
    pub wrap_and_unwrap_sol: bool,
    pub use_token_ledger: bool,
    pub dynamic_compute_unit_limit: bool,
    pub prioritization_fee_lamports: Option<u64>,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            base_url: "https://quote-api.jup.ag/v6".to_string(),
            api_key: None,
            timeout_ms: 5_000,
            default_slippage_bps: 50,
            wrap_and_unwrap_sol: true,
            use_token_ledger: false,
            dynamic_compute_unit_limit: true,
            prioritization_fee_lamports: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Ceiling for transient retries of the whole pipeline
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub confirm_timeout_ms: u64,
    pub poll_interval_ms: u64,
    /// Upper bound on waiting for a timed-out transaction's blockhash to expire
    pub expiry_grace_ms: u64,
    pub skip_preflight: bool,
    /// Route-complexity tiers (max accounts), each stricter than the last.
    /// 0 leaves the route unconstrained and is only allowed as the first tier.
    pub route_tiers: Vec<u16>,
    pub create_destination_account: bool,
    pub min_fee_payer_lamports: u64,
    /// Slack allowed when comparing an observed funder decrease to the input amount
    pub landed_tolerance_lamports: u64,
    pub compute_unit_limit: u32,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 500,
            backoff_max_ms: 8_000,
            confirm_timeout_ms: 60_000,
            poll_interval_ms: 1_000,
            expiry_grace_ms: 90_000,
            skip_preflight: false,
            route_tiers: vec![0, 40, 24],
            create_destination_account: true,
            min_fee_payer_lamports: 10_000,
            landed_tolerance_lamports: 10_000,
            compute_unit_limit: 400_000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentConfig {
    pub network: NetworkConfig,
    pub aggregator: AggregatorConfig,
    pub execution: ExecutionConfig,
}

impl ExecutionConfig {
    pub fn tiers(&self) -> Vec<Option<u16>> {
        self.route_tiers
            .iter()
            .map(|&limit| if limit == 0 { None } else { Some(limit) })
            .collect()
    }
}

impl PaymentConfig {
    pub fn validate(&self) -> Result<(), PaymentError> {
        let exec = &self.execution;
        if exec.max_attempts == 0 {
            return Err(PaymentError::Configuration("max_attempts must be at least 1".into()));
        }
        if exec.route_tiers.is_empty() {
            return Err(PaymentError::Configuration("route_tiers must not be empty".into()));
        }
        // Tiers must strictly tighten; an unconstrained tier may only come first.
        let tiers = exec.tiers();
        for pair in tiers.windows(2) {
            match (pair[0], pair[1]) {
                (None, Some(_)) => {}
                (Some(a), Some(b)) if b < a => {}
                _ => {
                    return Err(PaymentError::Configuration(format!(
                        "route_tiers must strictly tighten: {:?}",
                        exec.route_tiers
                    )))
                }
            }
        }
        if exec.poll_interval_ms == 0 || exec.confirm_timeout_ms == 0 {
            return Err(PaymentError::Configuration("confirmation timings must be non-zero".into()));
        }
        if self.aggregator.default_slippage_bps > 10_000 {
            return Err(PaymentError::Configuration(format!(
                "slippage {} bps exceeds 100%",
                self.aggregator.default_slippage_bps
            )));
        }
        if self.network.rpc_url.is_empty() || self.aggregator.base_url.is_empty() {
            return Err(PaymentError::Configuration("endpoint URLs must be set".into()));
        }
        Ok(())
    }
}

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PaymentConfig, PaymentError> {
        let config_content = fs::read_to_string(path.as_ref())
            .map_err(|e| PaymentError::Configuration(format!("Failed to read config file: {}", e)))?;
        Self::parse(&config_content)
    }

    pub fn parse(content: &str) -> Result<PaymentConfig, PaymentError> {
        let config: PaymentConfig = toml::from_str(content)
            .map_err(|e| PaymentError::Configuration(format!("Failed to parse config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PaymentConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.execution.tiers(), vec![None, Some(40), Some(24)]);
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = ConfigLoader::parse(
            r#"
            [network]
            rpc_url = "http://localhost:8899"

            [execution]
            max_attempts = 5
            route_tiers = [64, 40, 20]
            "#,
        )
        .unwrap();

        assert_eq!(config.network.rpc_url, "http://localhost:8899");
        assert_eq!(config.network.commitment, "confirmed");
        assert_eq!(config.execution.max_attempts, 5);
        assert_eq!(config.execution.tiers(), vec![Some(64), Some(40), Some(20)]);
        assert_eq!(config.aggregator.timeout_ms, 5_000);
    }

    #[test]
    fn test_rejects_loosening_tiers() {
        let mut config = PaymentConfig::default();
        config.execution.route_tiers = vec![24, 40];
        assert!(matches!(config.validate(), Err(PaymentError::Configuration(_))));

        config.execution.route_tiers = vec![40, 0];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_attempts() {
        let mut config = PaymentConfig::default();
        config.execution.max_attempts = 0;
        assert!(config.validate().is_err());
    }
}
