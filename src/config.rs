use anyhow::{Context, Result, bail};
use std::env;
use std::time::Duration;

use crate::models::AccountAddress;

const DEFAULT_RECEIPT_POLL_INTERVAL_MS: u64 = 1000;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub ledger_rpc_url: Option<String>,
    pub registry_address: AccountAddress,
    pub receipt_poll_interval: Duration,
    pub status_labels: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// # Environment Variables
    /// - `LEDGER_RPC_URL`: Optional - JSON-RPC endpoint of the ledger provider.
    ///   Leaving it unset means no provider is available, which `connect` reports.
    /// - `REGISTRY_ADDRESS`: Required - Shipment registry contract address (0x-prefixed hex)
    /// - `RECEIPT_POLL_INTERVAL_MS`: Optional - Receipt polling interval (default: 1000)
    /// - `SHIPMENT_STATUS_LABELS`: Optional - Comma-separated display labels indexed by status code
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Parse provider endpoint (optional)
        let ledger_rpc_url = lookup("LEDGER_RPC_URL")
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        // Parse registry address (required)
        let registry_address = lookup("REGISTRY_ADDRESS")
            .context("REGISTRY_ADDRESS not set")?;

        if registry_address.trim().is_empty() {
            bail!("REGISTRY_ADDRESS cannot be empty");
        }

        let registry_address: AccountAddress = registry_address
            .parse()
            .with_context(|| format!("REGISTRY_ADDRESS {:?} is not a valid address", registry_address))?;

        if registry_address.is_zero() {
            bail!("REGISTRY_ADDRESS cannot be the zero address");
        }

        // Parse receipt polling interval (optional, has default)
        let receipt_poll_interval_ms = match lookup("RECEIPT_POLL_INTERVAL_MS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("RECEIPT_POLL_INTERVAL_MS {:?} is not a number", raw))?,
            None => DEFAULT_RECEIPT_POLL_INTERVAL_MS,
        };

        if receipt_poll_interval_ms == 0 {
            bail!("RECEIPT_POLL_INTERVAL_MS must be greater than zero");
        }

        // Parse status labels (optional)
        let status_labels = lookup("SHIPMENT_STATUS_LABELS")
            .map(|raw| {
                raw.split(',')
                    .map(|label| label.trim().to_string())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        Ok(Config {
            ledger_rpc_url,
            registry_address,
            receipt_poll_interval: Duration::from_millis(receipt_poll_interval_ms),
            status_labels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const REGISTRY: &str = "0x10e119dedaD58d59A671BA1920160135CcF8EA3a";

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn minimal_configuration_uses_defaults() {
        let config = load(&[("REGISTRY_ADDRESS", REGISTRY)]).unwrap();
        assert_eq!(config.ledger_rpc_url, None);
        assert_eq!(config.registry_address.to_string(), REGISTRY.to_lowercase());
        assert_eq!(config.receipt_poll_interval, Duration::from_millis(1000));
        assert!(config.status_labels.is_empty());
    }

    #[test]
    fn reads_all_variables() {
        let config = load(&[
            ("LEDGER_RPC_URL", " http://127.0.0.1:8545 "),
            ("REGISTRY_ADDRESS", REGISTRY),
            ("RECEIPT_POLL_INTERVAL_MS", "250"),
            ("SHIPMENT_STATUS_LABELS", "Created, InTransit,Delivered"),
        ])
        .unwrap();

        assert_eq!(config.ledger_rpc_url.as_deref(), Some("http://127.0.0.1:8545"));
        assert_eq!(config.receipt_poll_interval, Duration::from_millis(250));
        assert_eq!(config.status_labels, vec!["Created", "InTransit", "Delivered"]);
    }

    #[test]
    fn blank_rpc_url_counts_as_missing() {
        let config = load(&[("REGISTRY_ADDRESS", REGISTRY), ("LEDGER_RPC_URL", "  ")]).unwrap();
        assert_eq!(config.ledger_rpc_url, None);
    }

    #[test]
    fn registry_address_is_required_and_validated() {
        assert!(load(&[]).is_err());
        assert!(load(&[("REGISTRY_ADDRESS", "")]).is_err());
        // A bare numeric literal is not an address.
        assert!(load(&[("REGISTRY_ADDRESS", "1234567890")]).is_err());
        assert!(load(&[("REGISTRY_ADDRESS", "0x0000000000000000000000000000000000000000")]).is_err());
    }

    #[test]
    fn rejects_zero_or_garbage_poll_interval() {
        assert!(load(&[("REGISTRY_ADDRESS", REGISTRY), ("RECEIPT_POLL_INTERVAL_MS", "0")]).is_err());
        assert!(load(&[("REGISTRY_ADDRESS", REGISTRY), ("RECEIPT_POLL_INTERVAL_MS", "soon")]).is_err());
    }
}
