// Configuration management module
// This file handles loading and parsing of configuration settings from an
// optional YAML file and environment variables
//
// Numan Thabit 2025 Nov

use crate::chains::solana::Commitment;
use crate::chains::ChainFamily;
use crate::router::execution::DEFAULT_CONFIRMATION_TIMEOUT;
use crate::router::routes::TransferRequest;
use crate::transport::stargate::{RouteEndpoint, DEFAULT_API_BASE};
use anyhow::{Context, Result};
use config::{builder::DefaultState, ConfigBuilder, Environment, File, FileFormat};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use url::Url;

/// Environment variable naming an optional YAML config file
pub const CONFIG_FILE_ENV: &str = "STARGATE_CONFIG";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Stargate API base, e.g. https://stargate.finance/api/v1
    pub stargate_api: Option<Url>,
    /// `routes` (default) or `quotes`
    pub route_endpoint: Option<RouteEndpoint>,
    /// Route name to prefer over the first usable one, e.g. `stargate/v2/taxi`
    pub preferred_route: Option<String>,
    /// HTTP timeout for the quote service and RPC calls
    pub http_timeout_secs: Option<u64>,
    /// Chain family of the source chain: `evm` or `solana`
    pub chain_family: ChainFamily,
    /// JSON-RPC endpoint of the source chain
    pub rpc_endpoint: Url,
    /// EVM: 32-byte hex private key. Solana: 64-byte keypair, hex or base58.
    pub secret_key: Secret,
    /// EVM: blocks required on top of (and including) the receipt's block
    pub confirmations: Option<u64>,
    /// Solana: commitment level a signature must reach
    pub commitment: Option<Commitment>,
    /// Upper bound on waiting for one step to finalize
    pub confirmation_timeout_secs: Option<u64>,
    /// Initial finality polling interval
    pub poll_interval_ms: Option<u64>,
    pub transfer: TransferConfig,
}

/// Transfer parameters as configured. Amounts stay decimal strings until
/// `transfer_request` so values past `u64` survive the environment layer.
#[derive(Debug, Clone, Deserialize)]
pub struct TransferConfig {
    pub src_token: String,
    pub dst_token: String,
    pub src_address: String,
    pub dst_address: String,
    pub src_chain_key: String,
    pub dst_chain_key: String,
    pub src_amount: String,
    pub dst_amount_min: String,
}

/// Secret material that never shows up in `Debug` output.
#[derive(Clone, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl AppConfig {
    /// Load from `$STARGATE_CONFIG` (if set) overlaid with `STARGATE_*`
    /// environment variables; nested keys use `__`, e.g.
    /// `STARGATE_TRANSFER__SRC_AMOUNT`.
    pub fn load() -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
            builder = builder.add_source(File::with_name(&path).required(true));
        }
        Self::build(builder.add_source(
            Environment::with_prefix("STARGATE")
                .prefix_separator("_")
                .separator("__"),
        ))
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        Self::build(config::Config::builder().add_source(File::from_str(contents, FileFormat::Yaml)))
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let cfg = builder.build().context("assemble configuration sources")?;
        cfg.try_deserialize().context("deserialize configuration")
    }

    pub fn stargate_api(&self) -> Result<Url> {
        match &self.stargate_api {
            Some(url) => Ok(url.clone()),
            None => Url::parse(DEFAULT_API_BASE).context("parse default Stargate API base"),
        }
    }

    pub fn route_endpoint(&self) -> RouteEndpoint {
        self.route_endpoint.unwrap_or_default()
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.unwrap_or(30))
    }

    pub fn confirmation_timeout(&self) -> Duration {
        self.confirmation_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_CONFIRMATION_TIMEOUT)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.unwrap_or(1_000))
    }

    pub fn confirmations(&self) -> u64 {
        self.confirmations.unwrap_or(1)
    }

    pub fn commitment(&self) -> Commitment {
        self.commitment.unwrap_or(Commitment::Confirmed)
    }

    pub fn transfer_request(&self) -> Result<TransferRequest> {
        let t = &self.transfer;
        let src_amount = t
            .src_amount
            .trim()
            .parse::<u128>()
            .with_context(|| format!("invalid srcAmount: {}", t.src_amount))?;
        let dst_amount_min = t
            .dst_amount_min
            .trim()
            .parse::<u128>()
            .with_context(|| format!("invalid dstAmountMin: {}", t.dst_amount_min))?;
        Ok(TransferRequest {
            src_token: t.src_token.clone(),
            dst_token: t.dst_token.clone(),
            src_address: t.src_address.clone(),
            dst_address: t.dst_address.clone(),
            src_chain_key: t.src_chain_key.clone(),
            dst_chain_key: t.dst_chain_key.clone(),
            src_amount,
            dst_amount_min,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOLANA_YAML: &str = r#"
chain_family: solana
rpc_endpoint: https://api.mainnet-beta.solana.com
secret_key: "4wBqpZM9xaSheZzJSMawUHDgZ7miWfSsxmfVF5jJpYP"
commitment: finalized
confirmation_timeout_secs: 90
transfer:
  src_token: DEkqHyPN7GMRJ5cArtQFAWefqbZb33Hyf6s5iCwjEonT
  dst_token: "0x5d3a1Ff2b6BAb83b63cd9AD0787074081a52ef34"
  src_address: 9hWTHmE8T2fTeuog1K2ZzBtg8pfKhh3fcYAJUo54Vz37
  dst_address: "0x9F1473c484Ce6b227538765b1c996DDfEc853DAA"
  src_chain_key: solana
  dst_chain_key: optimism
  src_amount: "3308758007"
  dst_amount_min: "3215670426000000000"
"#;

    #[test]
    fn loads_yaml_with_defaults() {
        let cfg = AppConfig::from_yaml(SOLANA_YAML).unwrap();
        assert_eq!(cfg.chain_family, ChainFamily::Solana);
        assert_eq!(cfg.commitment(), Commitment::Finalized);
        assert_eq!(cfg.confirmation_timeout(), Duration::from_secs(90));
        assert_eq!(cfg.poll_interval(), Duration::from_secs(1));
        assert_eq!(cfg.route_endpoint(), RouteEndpoint::Routes);
        assert_eq!(
            cfg.stargate_api().unwrap().as_str(),
            "https://stargate.finance/api/v1"
        );

        let req = cfg.transfer_request().unwrap();
        assert_eq!(req.src_amount, 3_308_758_007);
        assert_eq!(req.dst_amount_min, 3_215_670_426_000_000_000);
    }

    #[test]
    fn secret_is_redacted_in_debug() {
        let cfg = AppConfig::from_yaml(SOLANA_YAML).unwrap();
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("4wBqpZM9"));
        assert!(rendered.contains("Secret(***)"));
    }

    #[test]
    fn bad_amount_is_reported() {
        let yaml = SOLANA_YAML.replace("\"3308758007\"", "\"1.5\"");
        let cfg = AppConfig::from_yaml(&yaml).unwrap();
        let err = cfg.transfer_request().unwrap_err();
        assert!(err.to_string().contains("invalid srcAmount"));
    }

    #[test]
    fn missing_required_field_fails() {
        let yaml = SOLANA_YAML.replace("chain_family: solana\n", "");
        assert!(AppConfig::from_yaml(&yaml).is_err());
    }
}
