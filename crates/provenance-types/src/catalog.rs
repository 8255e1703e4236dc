//! Operation-type catalog: canonical field lists, type strings and type hashes.
//!
//! Every field list starts with the fixed header `sender, nonce`. A single
//! opaque `data: bytes` field follows whenever any declared field is
//! variable-length. The verifier matches catalog entries by exact field-list
//! equality, so this rule is applied uniformly.

use alloy_primitives::{keccak256, Address, Selector, B256};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::{abi, destination, CodecError, PrimitiveType};

pub const SENDER_FIELD: &str = "sender";
pub const NONCE_FIELD: &str = "nonce";
/// Opaque payload field carrying `abi.encode` of every non-header field.
pub const DATA_FIELD: &str = "data";
pub const DESTINATION_FIELD: &str = "destination";

const RESERVED_FIELDS: [&str; 4] = [SENDER_FIELD, NONCE_FIELD, DATA_FIELD, DESTINATION_FIELD];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypedField {
    pub name: String,
    pub ty: PrimitiveType,
}

impl TypedField {
    pub fn new(name: impl Into<String>, ty: PrimitiveType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }

    /// Parse a `(name, type)` pair.
    pub fn parse(name: &str, ty: &str) -> Result<Self, CodecError> {
        Ok(Self::new(name, ty.parse()?))
    }
}

/// Prepend the fixed header to `declared`, plus the opaque `data` field if
/// any declared field is variable-length.
pub fn build_type_list(declared: &[TypedField]) -> Result<Vec<TypedField>, CodecError> {
    let mut seen = HashSet::with_capacity(declared.len());
    for field in declared {
        if RESERVED_FIELDS.contains(&field.name.as_str()) || !seen.insert(field.name.as_str()) {
            return Err(CodecError::DuplicateField(field.name.clone()));
        }
    }

    let has_dynamic = declared.iter().any(|f| f.ty.is_dynamic());
    let mut fields = Vec::with_capacity(declared.len() + 3);
    fields.push(TypedField::new(SENDER_FIELD, PrimitiveType::Address));
    fields.push(TypedField::new(NONCE_FIELD, PrimitiveType::Uint(256)));
    if has_dynamic {
        fields.push(TypedField::new(DATA_FIELD, PrimitiveType::Bytes));
    }
    fields.extend(declared.iter().cloned());
    Ok(fields)
}

/// A recognised operation shape. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationType {
    pub key: String,
    pub fields: Vec<TypedField>,
    pub target_module: Address,
    pub function_selector: Selector,
}

impl OperationType {
    pub fn new(
        key: impl Into<String>,
        declared: &[TypedField],
        target_module: Address,
        function_selector: Selector,
    ) -> Result<Self, CodecError> {
        Ok(Self {
            key: key.into(),
            fields: build_type_list(declared)?,
            target_module,
            function_selector,
        })
    }

    /// Whether the opaque `data` field follows the header.
    pub fn has_opaque_payload(&self) -> bool {
        self.fields.get(2).is_some_and(|f| f.name == DATA_FIELD)
    }

    /// `sender, nonce` and, when present, `data`.
    pub fn header_len(&self) -> usize {
        if self.has_opaque_payload() { 3 } else { 2 }
    }

    /// Fields whose values come from the request payload.
    pub fn body_fields(&self) -> &[TypedField] {
        &self.fields[self.header_len()..]
    }

    pub fn is_proxied(&self) -> bool {
        self.fields
            .get(self.header_len())
            .is_some_and(|f| f.name == DESTINATION_FIELD)
    }

    /// `Key(type1 name1,type2 name2,...)`.
    pub fn type_string(&self) -> String {
        let params: Vec<String> = self
            .fields
            .iter()
            .map(|f| format!("{} {}", f.ty, f.name))
            .collect();
        format!("{}({})", self.key, params.join(","))
    }

    pub fn type_hash(&self) -> B256 {
        keccak256(self.type_string().as_bytes())
    }
}

/// Module a built-in operation dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleRole {
    Registry,
    Token,
    Wallet,
}

/// Deployed module addresses, one per role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleAddresses {
    pub registry: Address,
    pub token: Address,
    pub wallet: Address,
}

impl ModuleAddresses {
    pub fn get(&self, role: ModuleRole) -> Address {
        match role {
            ModuleRole::Registry => self.registry,
            ModuleRole::Token => self.token,
            ModuleRole::Wallet => self.wallet,
        }
    }
}

/// Built-in provenance operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    RegisterRecord,
    UpdateRecordMetadata,
    TransferRecord,
    AttestRecord,
    MintToken,
    BurnToken,
    ConfigureWallet,
}

impl OperationKind {
    pub const ALL: [OperationKind; 7] = [
        Self::RegisterRecord,
        Self::UpdateRecordMetadata,
        Self::TransferRecord,
        Self::AttestRecord,
        Self::MintToken,
        Self::BurnToken,
        Self::ConfigureWallet,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::RegisterRecord => "RegisterRecord",
            Self::UpdateRecordMetadata => "UpdateRecordMetadata",
            Self::TransferRecord => "TransferRecord",
            Self::AttestRecord => "AttestRecord",
            Self::MintToken => "MintToken",
            Self::BurnToken => "BurnToken",
            Self::ConfigureWallet => "ConfigureWallet",
        }
    }

    /// Declared `(name, type)` pairs in signing order.
    pub fn declared(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::RegisterRecord => &[
                ("recordId", "bytes32"),
                ("contentHash", "bytes32"),
                ("metadataCID", "string"),
            ],
            Self::UpdateRecordMetadata => &[("recordId", "bytes32"), ("metadataCID", "string")],
            Self::TransferRecord => &[("recordId", "bytes32"), ("to", "address")],
            Self::AttestRecord => &[("recordId", "bytes32"), ("tags", "string[]")],
            Self::MintToken => &[("tokenId", "uint256"), ("metadataCID", "string")],
            Self::BurnToken => &[("tokenId", "uint256")],
            Self::ConfigureWallet => &[
                ("wallet", "address"),
                ("owner", "address"),
                ("threshold", "uint256"),
            ],
        }
    }

    pub fn module(self) -> ModuleRole {
        match self {
            Self::RegisterRecord
            | Self::UpdateRecordMetadata
            | Self::TransferRecord
            | Self::AttestRecord => ModuleRole::Registry,
            Self::MintToken | Self::BurnToken => ModuleRole::Token,
            Self::ConfigureWallet => ModuleRole::Wallet,
        }
    }

    /// Module function the verifier forwards to after authentication.
    pub fn function_signature(self) -> String {
        let name = match self {
            Self::RegisterRecord => "registerRecord",
            Self::UpdateRecordMetadata => "updateRecordMetadata",
            Self::TransferRecord => "transferRecord",
            Self::AttestRecord => "attestRecord",
            Self::MintToken => "mintToken",
            Self::BurnToken => "burnToken",
            Self::ConfigureWallet => "configureWallet",
        };
        let types: Vec<&str> = self.declared().iter().map(|(_, ty)| *ty).collect();
        format!("{name}({})", types.join(","))
    }

    pub fn declared_fields(self) -> Result<Vec<TypedField>, CodecError> {
        self.declared()
            .iter()
            .map(|(name, ty)| TypedField::parse(name, ty))
            .collect()
    }

    pub fn operation_type(self, modules: &ModuleAddresses) -> Result<OperationType, CodecError> {
        OperationType::new(
            self.key(),
            &self.declared_fields()?,
            modules.get(self.module()),
            abi::function_selector(&self.function_signature()),
        )
    }
}

/// Immutable `key → OperationType` map. Built once, then shared by reference.
#[derive(Debug, Clone, Default)]
pub struct TypeCatalog {
    entries: BTreeMap<String, OperationType>,
}

impl TypeCatalog {
    pub fn from_types(types: impl IntoIterator<Item = OperationType>) -> Result<Self, CodecError> {
        let mut entries = BTreeMap::new();
        for op in types {
            if entries.contains_key(&op.key) {
                return Err(CodecError::DuplicateKey(op.key));
            }
            entries.insert(op.key.clone(), op);
        }
        Ok(Self { entries })
    }

    /// Every built-in kind plus its proxied variant.
    pub fn from_kinds(modules: &ModuleAddresses) -> Result<Self, CodecError> {
        let mut types = Vec::with_capacity(OperationKind::ALL.len() * 2);
        for kind in OperationKind::ALL {
            let base = kind.operation_type(modules)?;
            types.push(destination::with_destination(&base)?);
            types.push(base);
        }
        Self::from_types(types)
    }

    pub fn get(&self, key: &str) -> Option<&OperationType> {
        self.entries.get(key)
    }

    pub fn by_type_hash(&self, type_hash: &B256) -> Option<&OperationType> {
        self.entries.values().find(|op| op.type_hash() == *type_hash)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OperationType> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
