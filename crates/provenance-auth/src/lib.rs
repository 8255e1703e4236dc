//! Off-ledger auth for provenance relay requests: local secp256k1 signers,
//! signature collection, signer recovery and the sequence-counter read.

mod auth_types;
mod collect;
mod error;
pub mod nonce;
mod signer;
mod verify;

pub use auth_types::{AccountPolicy, RelayPath, SignatureEntry, SignatureSet};
pub use collect::sign_request;
pub use error::AuthError;
pub use signer::LocalSigner;
pub use verify::{recover_signer, verify_signature};
