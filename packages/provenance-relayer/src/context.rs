//! Per-network relay context handed to every component.

use provenance_types::{Domain, ModuleAddresses, TypeCatalog};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::ledger::Ledger;
use crate::rpc::RpcClient;
use crate::{Config, Error};

/// Configuration, signing domain, type catalog and ledger handle for one network.
pub struct RelayContext {
    pub config: Config,
    pub domain: Domain,
    pub catalog: TypeCatalog,
    pub ledger: Arc<dyn Ledger>,
}

impl RelayContext {
    /// Build with the built-in catalog for `config.modules`.
    pub fn new(config: Config, chain_id: u64, ledger: Arc<dyn Ledger>) -> Result<Self, Error> {
        let catalog = TypeCatalog::from_kinds(&config.modules)?;
        let domain = Domain {
            name: config.domain_name.clone(),
            version: config.domain_version.clone(),
            chain_id,
            verifying_contract: config.relay_address,
        };
        Ok(Self {
            config,
            domain,
            catalog,
            ledger,
        })
    }

    /// Connect over JSON-RPC, asking the node for the chain id when unconfigured.
    pub async fn connect(config: Config) -> Result<Self, Error> {
        let rpc = Arc::new(RpcClient::from_config(&config));
        let chain_id = match config.chain_id {
            Some(id) => id,
            None => rpc.chain_id().await?,
        };
        info!(
            chain_id,
            relay = %config.relay_address,
            network = ?config.network,
            confirmations = config.confirmations(),
            "Relay context ready"
        );
        Self::new(config, chain_id, rpc)
    }

    pub fn with_catalog(mut self, catalog: TypeCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn modules(&self) -> &ModuleAddresses {
        &self.config.modules
    }

    pub fn confirmations(&self) -> u64 {
        self.config.confirmations()
    }

    pub fn poll_interval(&self) -> Duration {
        self.config.poll_interval()
    }
}
