mod app;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Pay with a swap on Solana while a sponsor covers the network fee")]
pub struct Args {
    /// Path to config file (optional, defaults apply otherwise)
    #[arg(long)]
    config: Option<String>,

    /// RPC endpoint URL (overrides config)
    #[arg(long)]
    rpc_url: Option<String>,

    /// Keypair file of the account whose funds are swapped
    #[arg(long)]
    funder_keypair: String,

    /// Keypair file of the account paying network fees and rent
    #[arg(long)]
    fee_payer_keypair: String,

    /// Wallet that receives the output tokens
    #[arg(long)]
    destination: String,

    /// Input mint (defaults to native SOL)
    #[arg(long, default_value = "So11111111111111111111111111111111111111112")]
    input_mint: String,

    /// Output mint
    #[arg(long)]
    output_mint: String,

    /// Input amount in base units (lamports for SOL)
    #[arg(long)]
    amount: u64,

    /// Slippage tolerance in basis points (overrides config)
    #[arg(long)]
    slippage_bps: Option<u16>,

    /// Destination is a program-derived address
    #[arg(long)]
    allow_off_curve: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let app_cfg = app::AppCfg::from_args(args)?;
    let code = app::run(app_cfg).await?;
    std::process::exit(code)
}
