//! Configuration management for the Meridian resolver
//!
//! Loads configuration from TOML files with environment variable substitution.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub resolver: ResolverConfig,
    pub timelocks: TimelockConfig,
    pub api: ApiConfig,
    pub metrics: MetricsConfig,
    pub chains: HashMap<String, ChainConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolverConfig {
    pub instance_id: String,
    /// Resolver identity presented to makers (chain-native address string)
    pub resolver_address: String,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    /// Capacity of the bounded order-ingestion channel
    pub order_channel_capacity: usize,
    /// Recovery supervisor scan interval
    pub recovery_interval_secs: u64,
    /// Non-terminal swaps older than this are logged for operator alerting
    pub stale_swap_secs: u64,
    /// Orders are archived this long after their auction window closes
    pub order_grace_secs: u64,
}

/// Timelock derivation for new swaps, in seconds from the source chain clock.
///
/// The destination timelock must expire strictly before the source timelock:
/// the source party always gets more time to reclaim than the counter-party.
#[derive(Debug, Clone, Deserialize)]
pub struct TimelockConfig {
    pub src_secs: u64,
    pub dst_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub name: String,
    pub kind: ChainKind,
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ChainKind {
    Ethereum,
    Cosmos,
}

impl Settings {
    /// Load settings from configuration files
    pub fn load() -> Result<Self> {
        let config_path = env::var("MERIDIAN_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        // Substitute environment variables
        let config_str = substitute_env_vars(&config_str);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        // At least one chain must be enabled
        if self.enabled_chains().is_empty() {
            anyhow::bail!("At least one chain must be enabled");
        }

        // Destination timelock expiring after the source timelock would let a
        // counter-party strand source funds; reject it outright.
        if self.timelocks.dst_secs >= self.timelocks.src_secs {
            anyhow::bail!(
                "timelocks.dst_secs ({}) must be less than timelocks.src_secs ({})",
                self.timelocks.dst_secs,
                self.timelocks.src_secs
            );
        }

        if self.resolver.order_channel_capacity == 0 {
            anyhow::bail!("resolver.order_channel_capacity must be greater than zero");
        }

        Ok(())
    }

    /// Get list of enabled chains
    pub fn enabled_chains(&self) -> Vec<(&String, &ChainConfig)> {
        self.chains.iter().filter(|(_, c)| c.enabled).collect()
    }

    /// Get chain config by chain ID
    pub fn get_chain_by_id(&self, chain_id: u64) -> Option<&ChainConfig> {
        self.chains.values().find(|c| c.chain_id == chain_id)
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let mut result = input.to_string();
    let re = regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();

    for cap in re.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}
