use std::time::Duration;

use alloy::primitives::Address;
use paychan::{LedgerConfig, DEFAULT_CHANNEL_CONTRACT, DEFAULT_RPC_URL, DEFAULT_STORE_PATH};
use thiserror::Error;
use url::Url;

const DEFAULT_PORT: u16 = 4024;
const DEFAULT_PRICE: &str = "1 wei";
const DEFAULT_RATE_LIMIT_RPM: u64 = 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingRequired(&'static str),

    #[error("invalid {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[derive(Clone)]
pub struct ServerConfig {
    /// Account every accepted channel must pay
    pub receiver_address: Address,
    /// Channel contract and RPC endpoint
    pub ledger: LedgerConfig,
    /// Price of the demo route, e.g. "1 wei" or "2 gwei"
    pub price: String,
    /// SQLite channel state path
    pub store_path: String,
    /// Server port
    pub port: u16,
    /// Rate limit requests per minute per IP
    pub rate_limit_rpm: u64,
    /// CORS allowed origins (empty = localhost only)
    pub allowed_origins: Vec<String>,
    /// Bearer token required for /metrics (None = forbidden)
    pub metrics_token: Option<String>,
    /// Bearer token required for /channels (None = disabled)
    pub admin_token: Option<String>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("receiver_address", &self.receiver_address)
            .field("ledger", &self.ledger)
            .field("price", &self.price)
            .field("store_path", &self.store_path)
            .field("port", &self.port)
            .field("rate_limit_rpm", &self.rate_limit_rpm)
            .field("allowed_origins", &self.allowed_origins)
            .field(
                "metrics_token",
                &self.metrics_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field(
                "admin_token",
                &self.admin_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let receiver_address = var("RECEIVER_ADDRESS")
            .ok_or(ConfigError::MissingRequired("RECEIVER_ADDRESS"))?
            .parse::<Address>()
            .map_err(|e| ConfigError::Invalid {
                var: "RECEIVER_ADDRESS",
                reason: e.to_string(),
            })?;

        let contract_address = match var("CHANNEL_CONTRACT") {
            Some(raw) => raw.parse::<Address>().map_err(|e| ConfigError::Invalid {
                var: "CHANNEL_CONTRACT",
                reason: e.to_string(),
            })?,
            None => DEFAULT_CHANNEL_CONTRACT,
        };

        let rpc_url = var("RPC_URL").unwrap_or_else(|| DEFAULT_RPC_URL.to_string());
        Url::parse(&rpc_url).map_err(|e| ConfigError::Invalid {
            var: "RPC_URL",
            reason: e.to_string(),
        })?;

        let timeout = match var("LEDGER_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(parse_number(&raw, "LEDGER_TIMEOUT_SECS")?),
            None => paychan::DEFAULT_LEDGER_TIMEOUT,
        };

        let port = match var("PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::Invalid {
                var: "PORT",
                reason: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };

        let rate_limit_rpm = match var("RATE_LIMIT_RPM") {
            Some(raw) => parse_number(&raw, "RATE_LIMIT_RPM")?,
            None => DEFAULT_RATE_LIMIT_RPM,
        };
        if rate_limit_rpm == 0 {
            return Err(ConfigError::Invalid {
                var: "RATE_LIMIT_RPM",
                reason: "must be at least 1".to_string(),
            });
        }

        let allowed_origins = var("ALLOWED_ORIGINS")
            .map(|origins| {
                origins
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            receiver_address,
            ledger: LedgerConfig {
                rpc_url,
                contract_address,
                timeout,
            },
            price: var("PRICE").unwrap_or_else(|| DEFAULT_PRICE.to_string()),
            store_path: var("STORE_PATH").unwrap_or_else(|| DEFAULT_STORE_PATH.to_string()),
            port,
            rate_limit_rpm,
            allowed_origins,
            metrics_token: var("METRICS_TOKEN"),
            admin_token: var("ADMIN_TOKEN"),
        })
    }
}

fn parse_number(raw: &str, var: &'static str) -> Result<u64, ConfigError> {
    raw.parse::<u64>().map_err(|e| ConfigError::Invalid {
        var,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    const RECEIVER: &str = "0x3b63b366a72e5742b2aaa13a5e86725ed06a68f3";

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[("RECEIVER_ADDRESS", RECEIVER)])).unwrap();
        assert_eq!(config.receiver_address, RECEIVER.parse::<Address>().unwrap());
        assert_eq!(config.ledger.contract_address, DEFAULT_CHANNEL_CONTRACT);
        assert_eq!(config.ledger.rpc_url, DEFAULT_RPC_URL);
        assert_eq!(config.price, "1 wei");
        assert_eq!(config.store_path, "signatures.db");
        assert_eq!(config.port, 4024);
        assert_eq!(config.rate_limit_rpm, 60);
        assert!(config.allowed_origins.is_empty());
        assert!(config.metrics_token.is_none());
    }

    #[test]
    fn test_missing_receiver() {
        let err = ServerConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired("RECEIVER_ADDRESS")));
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("RECEIVER_ADDRESS", RECEIVER),
            ("CHANNEL_CONTRACT", "0x00000000000000000000000000000000000000aa"),
            ("RPC_URL", "https://rpc.example.com"),
            ("PRICE", "2 gwei"),
            ("PORT", "8080"),
            ("LEDGER_TIMEOUT_SECS", "3"),
            ("ALLOWED_ORIGINS", "https://a.example, https://b.example,"),
            ("ADMIN_TOKEN", "admin"),
        ]))
        .unwrap();
        assert_eq!(config.ledger.rpc_url, "https://rpc.example.com");
        assert_eq!(config.ledger.timeout, Duration::from_secs(3));
        assert_eq!(config.price, "2 gwei");
        assert_eq!(config.port, 8080);
        assert_eq!(
            config.allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(config.admin_token.as_deref(), Some("admin"));
    }

    fn with_receiver(var: &str, value: &str) -> Result<ServerConfig, ConfigError> {
        ServerConfig::from_lookup(lookup(&[("RECEIVER_ADDRESS", RECEIVER), (var, value)]))
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            ServerConfig::from_lookup(lookup(&[("RECEIVER_ADDRESS", "nope")])),
            Err(ConfigError::Invalid {
                var: "RECEIVER_ADDRESS",
                ..
            })
        ));
        assert!(matches!(
            with_receiver("PORT", "99999"),
            Err(ConfigError::Invalid { var: "PORT", .. })
        ));
        assert!(matches!(
            with_receiver("RPC_URL", "not a url"),
            Err(ConfigError::Invalid { var: "RPC_URL", .. })
        ));
        assert!(matches!(
            with_receiver("RATE_LIMIT_RPM", "0"),
            Err(ConfigError::Invalid {
                var: "RATE_LIMIT_RPM",
                ..
            })
        ));
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("RECEIVER_ADDRESS", RECEIVER),
            ("METRICS_TOKEN", "very-secret"),
        ]))
        .unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("very-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
