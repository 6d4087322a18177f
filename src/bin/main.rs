use alloy_primitives::U256;
use boost_mux::{Config, Service};
use clap::Parser;
use std::net::Ipv4Addr;
use std::str::FromStr;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_HOST: Ipv4Addr = Ipv4Addr::UNSPECIFIED;
const DEFAULT_PORT: u16 = 18550;

#[derive(Parser, Debug)]
#[clap(version, about, long_about = None)]
struct Args {
    /// Load the full configuration from a TOML file instead of flags
    #[clap(long)]
    config: Option<String>,

    #[clap(long, default_value_t = DEFAULT_HOST)]
    host: Ipv4Addr,

    #[clap(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// a comma-separated list of relay endpoints
    #[clap(long, default_value = "")]
    relays: String,

    /// a comma-separated list of relay monitor endpoints
    #[clap(long, default_value = "")]
    relay_monitors: String,

    /// probe relay status endpoints when serving the status endpoint
    #[clap(long)]
    relay_check: bool,

    /// minimum acceptable bid value, in wei
    #[clap(long, default_value = "0")]
    min_bid: String,

    #[clap(long, default_value = "0x00000000")]
    genesis_fork_version: String,
}

fn split_list(input: &str) -> Vec<String> {
    input.split(',').filter(|entry| !entry.is_empty()).map(String::from).collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => {
            tracing::info!("loading config from {path}...");
            boost_mux::config::from_toml_file(path)?
        }
        None => Config {
            host: args.host,
            port: args.port,
            relays: split_list(&args.relays),
            relay_monitors: split_list(&args.relay_monitors),
            relay_check: args.relay_check,
            min_bid: U256::from_str(&args.min_bid)?,
            genesis_fork_version: args.genesis_fork_version,
            ..Default::default()
        },
    };

    if config.relays.is_empty() {
        tracing::error!("no relays provided, please restart with at least one relay provided")
    }

    let service = Service::from(config);
    service.run().await?;
    Ok(())
}
