//! Provenance relay client: builds, signs and submits gasless requests, and
//! drives custody-account batches for catalog and dispatch-table changes.

pub mod assembler;
pub mod config;
pub mod context;
pub mod custody;
pub mod error;
pub mod key_store;
pub mod ledger;
pub mod metrics;
pub mod registrar;
pub mod rpc;
pub mod submitter;
pub mod telemetry;
pub mod upgrade;

pub use assembler::RequestAssembler;
pub use config::{Config, NetworkKind};
pub use context::RelayContext;
pub use custody::{CustodyAccount, LedgerCustody};
pub use error::Error;
pub use key_store::KeyStore;
pub use ledger::{Ledger, Receipt, RelayState};
pub use registrar::Registrar;
pub use rpc::RpcClient;
pub use submitter::{RelayOutcome, RelaySubmitter};
pub use upgrade::UpgradeExecutor;
