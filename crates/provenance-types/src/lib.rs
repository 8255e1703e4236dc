//! Shared types and pure-logic encoders for the provenance relay protocol.
//! No network or key-management dependency; usable off the relayer as well.

pub mod abi;
pub mod batch;
pub mod catalog;
mod crypto;
pub mod destination;
pub mod dispatch;
mod error;
mod primitive;
pub mod request;
pub mod selector;
pub mod typed_data;

pub use abi::AbiValue;
pub use batch::{decode_batch, encode_batch, multi_send_calldata, BatchMode, BatchOperation};
pub use catalog::{
    ModuleAddresses, ModuleRole, OperationKind, OperationType, TypeCatalog, TypedField,
};
pub use crypto::{
    address_from_key_bytes, signature_bytes, signature_parts, uncompressed_key_bytes,
    SIGNATURE_LEN,
};
pub use destination::with_destination;
pub use dispatch::{plan_upgrade, DispatchAction, DispatchEdit, UpgradePlan};
pub use error::CodecError;
pub use primitive::PrimitiveType;
pub use request::{EncodedRequest, RelayCall, Request, WireRequest};
pub use typed_data::Domain;

pub use alloy_primitives::{Address, Selector, B256, U256};
