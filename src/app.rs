// src/app.rs
use anyhow::{Context, Result};
use serde_json::json;
use std::fs;
use tracing::{error, info};

use sponsorswap::{ConfigLoader, PaymentConfig, PaymentRequest, PaymentService};

use crate::Args;

#[derive(Debug, Clone)]
pub struct AppCfg {
    pub config: PaymentConfig,
    pub request: PaymentRequest,
}

impl AppCfg {
    /// Priority: CLI args > config file > defaults
    pub fn from_args(args: Args) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => ConfigLoader::load_config(path)?,
            None => PaymentConfig::default(),
        };
        if let Some(rpc_url) = args.rpc_url {
            config.network.rpc_url = rpc_url;
        }

        let request = PaymentRequest {
            funder_credential: read_credential(&args.funder_keypair)?,
            fee_payer_credential: read_credential(&args.fee_payer_keypair)?,
            destination_address: args.destination,
            input_mint: args.input_mint,
            output_mint: args.output_mint,
            input_amount: args.amount,
            slippage_bps: args.slippage_bps,
            allow_off_curve_destination: args.allow_off_curve,
        };

        Ok(Self { config, request })
    }
}

fn read_credential(path: &str) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read keypair file {}", path))
}

/// Execute one payment and print the outcome as JSON on stdout. Returns the exit code.
pub async fn run(app_cfg: AppCfg) -> Result<i32> {
    info!("RPC endpoint: {}", app_cfg.config.network.rpc_url);
    let service = PaymentService::from_config(app_cfg.config)?;

    match service.execute(&app_cfg.request).await {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&json!({ "status": "confirmed", "result": result }))?);
            Ok(0)
        }
        Err(failure) => {
            error!("❌ {}", failure);
            let report = json!({
                "status": "failed",
                "error": failure.kind(),
                "message": failure.error.to_string(),
                "attempts": failure.attempts,
                "last_balances": failure.last_balances,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(1)
        }
    }
}
