//! Relayer configuration.

use alloy_primitives::Address;
use provenance_types::ModuleAddresses;
use serde::Deserialize;
use tracing::{error, warn};

/// Local/private development chain or a public network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NetworkKind {
    #[default]
    Local,
    Public,
}

impl NetworkKind {
    pub fn default_confirmations(self) -> u64 {
        match self {
            NetworkKind::Local => 0,
            NetworkKind::Public => 1,
        }
    }
}

/// Configuration for the relay client.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "defaults::rpc_url")]
    pub rpc_url: String,

    #[serde(default = "defaults::fallback_rpc_url")]
    pub fallback_rpc_url: String,

    #[serde(default)]
    pub network: NetworkKind,

    /// Overrides the network default. 0 waits for inclusion only.
    #[serde(default)]
    pub confirmations: Option<u64>,

    #[serde(default = "defaults::poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Fetched with `eth_chainId` when unset.
    #[serde(default)]
    pub chain_id: Option<u64>,

    #[serde(default = "defaults::domain_name")]
    pub domain_name: String,

    #[serde(default = "defaults::domain_version")]
    pub domain_version: String,

    /// Relay diamond: verifies requests, owns the type registry and dispatch table.
    #[serde(default)]
    pub relay_address: Address,

    #[serde(default)]
    pub custody_address: Address,

    /// Helper the custody account delegate-calls to run batches.
    #[serde(default)]
    pub multi_send_address: Address,

    #[serde(default)]
    pub modules: ModuleAddresses,

    #[serde(default = "defaults::read_retries")]
    pub read_retries: u32,

    #[serde(default = "defaults::retry_base_ms")]
    pub retry_base_ms: u64,

    #[serde(default = "defaults::keys_path")]
    pub keys_path: String,

    /// Base64 AES-256 key. Plaintext key store when unset.
    #[serde(default)]
    pub keys_encryption_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: defaults::rpc_url(),
            fallback_rpc_url: defaults::fallback_rpc_url(),
            network: NetworkKind::default(),
            confirmations: None,
            poll_interval_ms: defaults::poll_interval_ms(),
            chain_id: None,
            domain_name: defaults::domain_name(),
            domain_version: defaults::domain_version(),
            relay_address: Address::ZERO,
            custody_address: Address::ZERO,
            multi_send_address: Address::ZERO,
            modules: ModuleAddresses::default(),
            read_retries: defaults::read_retries(),
            retry_base_ms: defaults::retry_base_ms(),
            keys_path: defaults::keys_path(),
            keys_encryption_key: None,
        }
    }
}

impl Config {
    /// `relayer.toml` (optional) overlaid with `RELAYER_`-prefixed env vars.
    ///
    /// Falls back to defaults only when nothing is configured; parse errors fail.
    pub fn load() -> Result<Self, crate::Error> {
        let built = config::Config::builder()
            .add_source(config::File::with_name("relayer").required(false))
            .add_source(config::Environment::with_prefix("RELAYER").separator("__"))
            .build()
            .and_then(|c| c.try_deserialize::<Config>());
        match built {
            Ok(config) => Ok(config),
            Err(e) => {
                let err_str = e.to_string();
                if err_str.contains("not found") {
                    warn!(error = %e, "No config file found, using defaults");
                    Ok(Config::default())
                } else {
                    error!(error = %e, "Config error, fix env vars or relayer.toml");
                    Err(crate::Error::Config(err_str))
                }
            }
        }
    }

    /// Effective confirmation count.
    pub fn confirmations(&self) -> u64 {
        self.confirmations
            .unwrap_or_else(|| self.network.default_confirmations())
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.poll_interval_ms)
    }
}

mod defaults {
    pub fn rpc_url() -> String {
        "http://127.0.0.1:8545".into()
    }

    pub fn fallback_rpc_url() -> String {
        "http://127.0.0.1:8545".into()
    }

    pub fn poll_interval_ms() -> u64 {
        1_000
    }

    pub fn domain_name() -> String {
        "ProvenanceRelay".into()
    }

    pub fn domain_version() -> String {
        "1".into()
    }

    pub fn read_retries() -> u32 {
        3
    }

    pub fn retry_base_ms() -> u64 {
        200
    }

    pub fn keys_path() -> String {
        "./account_keys/relayer.json".into()
    }
}
