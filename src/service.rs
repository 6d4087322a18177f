use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use url::Url;

use crate::bid_cache::SWEEP_INTERVAL;
use crate::client::RelayClient;
use crate::config::Config;
use crate::error::Error;
use crate::relay::{build_directory, RelayEndpoint};
use crate::relay_mux::RelayMux;
use crate::server::Server;
use crate::signing::{compute_builder_domain, fork_version_from_hex};

fn parse_url(input: &str) -> Result<Url, Error> {
    input.parse().map_err(|err| {
        tracing::warn!(input, "error parsing URL: `{err}`");
        Error::RelayUrl(input.to_string())
    })
}

fn build_relay_mux(config: &Config) -> Result<RelayMux, Error> {
    let endpoints = config
        .relays
        .iter()
        .map(|relay| RelayEndpoint::try_from(parse_url(relay)?))
        .collect::<Result<Vec<_>, _>>()?;
    let relays = build_directory(endpoints)?;

    let relay_monitors = config
        .relay_monitors
        .iter()
        .map(|monitor| parse_url(monitor))
        .collect::<Result<Vec<_>, _>>()?;

    let client = RelayClient::new(
        Duration::from_millis(config.timeout_get_header_ms),
        Duration::from_millis(config.timeout_get_payload_ms),
        Duration::from_millis(config.timeout_register_validator_ms),
        config.max_retries,
    )?;

    let genesis_fork_version = fork_version_from_hex(&config.genesis_fork_version)?;
    let signing_domain = compute_builder_domain(genesis_fork_version);

    Ok(RelayMux::new(
        relays,
        relay_monitors,
        client,
        signing_domain,
        config.min_bid,
        config.relay_check,
    ))
}

pub struct Service {
    config: Config,
    started: AtomicBool,
}

impl Service {
    pub fn from(config: Config) -> Self {
        Self { config, started: AtomicBool::new(false) }
    }

    /// Build the relay mux, start the bid cache sweeper, and serve the
    /// builder API until the listener stops. Starting twice is refused.
    pub async fn run(&self) -> Result<(), Error> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(Error::ServerAlreadyRunning);
        }

        let relay_mux = build_relay_mux(&self.config)?;

        let sweeper = relay_mux.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(SWEEP_INTERVAL).await;
                sweeper.bid_cache().sweep();
            }
        });

        let server = Server::new(self.config.host, self.config.port, relay_mux).serve()?;
        tracing::info!("listening at {}...", server.local_addr());
        server.await.map_err(Error::Hyper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relay_url() -> String {
        "https://0x845bd072b7cd566f02faeb0a4033ce9399e42839ced64e8b2adcfc859ed1e8e1a5a293336a49feac6d9a5edb779be53a@relay.example.org".to_string()
    }

    #[tokio::test]
    async fn refuses_to_build_without_relays() {
        let config = Config::default();
        assert!(matches!(build_relay_mux(&config), Err(Error::NoRelays)));
    }

    #[tokio::test]
    async fn refuses_malformed_relay_urls() {
        let config = Config { relays: vec!["@not a url@".to_string()], ..Default::default() };
        assert!(matches!(build_relay_mux(&config), Err(Error::RelayUrl(_))));
    }

    #[tokio::test]
    async fn refuses_unrecognized_fork_version() {
        let config = Config {
            relays: vec![relay_url()],
            genesis_fork_version: "0xdeadbeefcafe".to_string(),
            ..Default::default()
        };
        assert!(matches!(build_relay_mux(&config), Err(Error::InvalidForkVersion(_))));
    }

    #[tokio::test]
    async fn second_start_is_refused() {
        let config = Config {
            relays: vec![relay_url()],
            port: 0,
            ..Default::default()
        };
        let service = std::sync::Arc::new(Service::from(config));

        let runner = service.clone();
        tokio::spawn(async move { runner.run().await });
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;

        assert!(matches!(service.run().await, Err(Error::ServerAlreadyRunning)));
    }
}
