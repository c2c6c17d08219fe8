use std::{net::Ipv4Addr, num::NonZeroUsize, path::PathBuf, str::FromStr, time::Duration};

use clap::{Parser, command};
use serde::Deserialize;
use services::FeeHistoryConfig;
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub eth: Eth,
    pub app: App,
    pub fee_history: FeeHistory,
}

impl Config {
    pub fn validate(&self) -> crate::errors::Result<()> {
        if self.app.request_timeout.is_zero() {
            return Err(crate::errors::Error::Other(
                "app.request_timeout must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Eth {
    /// URL to an Ethereum RPC endpoint.
    #[serde(deserialize_with = "parse_url")]
    pub rpc: Url,
}

fn parse_url<'de, D>(deserializer: D) -> Result<Url, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let url_str: String = Deserialize::deserialize(deserializer)?;
    Url::from_str(&url_str).map_err(|e| {
        let msg = format!("Failed to parse URL '{url_str}': {e};");
        serde::de::Error::custom(msg)
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct App {
    /// Port used by the started server
    pub port: u16,
    /// IPv4 address on which the server will listen for connections
    pub host: Ipv4Addr,
    /// How long a fee history query may run before it is cancelled
    #[serde(deserialize_with = "human_readable_duration")]
    pub request_timeout: Duration,
}

fn human_readable_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let duration_str: String = Deserialize::deserialize(deserializer)?;
    humantime::parse_duration(&duration_str).map_err(|e| {
        let msg = format!("Failed to parse duration '{duration_str}': {e};");
        serde::de::Error::custom(msg)
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeeHistory {
    /// `max_header_history` and `max_block_history`, defaulting when absent
    #[serde(flatten)]
    pub limits: FeeHistoryConfig,
    /// Number of block fee stats kept in memory
    pub cache_size: NonZeroUsize,
}

#[derive(Debug, Clone)]
pub struct Internal {
    pub eth_errors_before_unhealthy: usize,
}

impl Default for Internal {
    fn default() -> Self {
        Self {
            eth_errors_before_unhealthy: 3,
        }
    }
}

#[derive(Parser)]
#[command(
    name = "fee-history-oracle",
    version,
    about,
    propagate_version = true,
    arg_required_else_help(true)
)]
struct Cli {
    #[arg(value_name = "FILE", help = "Path to the configuration file")]
    config_path: PathBuf,
}

pub fn parse() -> crate::errors::Result<Config> {
    let cli = Cli::parse();

    let config = config::Config::builder()
        .add_source(config::File::from(cli.config_path))
        .add_source(
            config::Environment::with_prefix("ORACLE")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(config.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use config::FileFormat;

    use super::*;

    fn load(toml: &str) -> crate::errors::Result<Config> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(toml, FileFormat::Toml))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    #[test]
    fn reads_a_complete_file() {
        // given
        let toml = r#"
            [eth]
            rpc = "http://localhost:8545"

            [app]
            host = "127.0.0.1"
            port = 8080
            request_timeout = "1s 500ms"

            [fee_history]
            max_header_history = 20
            max_block_history = 2
            cache_size = 2048
        "#;

        // when
        let config = load(toml).unwrap();

        // then
        assert_eq!(config.eth.rpc.as_str(), "http://localhost:8545/");
        assert_eq!(config.app.request_timeout, Duration::from_millis(1500));
        assert_eq!(
            config.fee_history.limits,
            FeeHistoryConfig {
                max_header_history: 20,
                max_block_history: 2,
            }
        );
        assert_eq!(config.fee_history.cache_size.get(), 2048);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn history_limits_have_defaults() {
        // given
        let toml = r#"
            eth = { rpc = "http://localhost:8545" }
            app = { host = "0.0.0.0", port = 8080, request_timeout = "5s" }
            fee_history = { cache_size = 16 }
        "#;

        // when
        let config = load(toml).unwrap();

        // then
        assert_eq!(config.fee_history.limits, FeeHistoryConfig::default());
    }

    #[test]
    fn zero_cache_size_is_rejected() {
        // given
        let toml = r#"
            eth = { rpc = "http://localhost:8545" }
            app = { host = "0.0.0.0", port = 8080, request_timeout = "5s" }
            fee_history = { cache_size = 0 }
        "#;

        // when
        let result = load(toml);

        // then
        assert!(result.is_err());
    }

    #[test]
    fn zero_request_timeout_fails_validation() {
        // given
        let toml = r#"
            eth = { rpc = "http://localhost:8545" }
            app = { host = "0.0.0.0", port = 8080, request_timeout = "0s" }
            fee_history = { cache_size = 16 }
        "#;

        // when
        let config = load(toml).unwrap();

        // then
        assert!(config.validate().is_err());
    }
}
