//! Callable-selector introspection from compiled module ABIs.

use alloy_primitives::Selector;
use serde_json::Value;
use std::collections::BTreeSet;

use crate::{abi, CodecError};

/// `supportsInterface(bytes4)`, present in every module and never routed per module.
pub const INTROSPECTION_SELECTOR: Selector = Selector::new([0x01, 0xff, 0xc9, 0xa7]);

/// Canonical signatures (`name(type,...)`) of every function in an ABI.
///
/// Accepts either the bare ABI array or a build artifact with an `abi` key.
pub fn function_signatures(artifact: &Value) -> Result<Vec<String>, CodecError> {
    let entries = match artifact {
        Value::Array(entries) => entries,
        Value::Object(obj) => obj
            .get("abi")
            .and_then(Value::as_array)
            .ok_or_else(|| CodecError::InvalidAbi("artifact has no 'abi' array".into()))?,
        _ => return Err(CodecError::InvalidAbi("expected ABI array or artifact".into())),
    };

    entries
        .iter()
        .filter(|entry| entry.get("type").and_then(Value::as_str) == Some("function"))
        .map(|entry| {
            let name = entry
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| CodecError::InvalidAbi("function entry without name".into()))?;
            let params = match entry.get("inputs") {
                Some(Value::Array(inputs)) => inputs
                    .iter()
                    .map(canonical_param)
                    .collect::<Result<Vec<_>, _>>()?,
                None => Vec::new(),
                Some(_) => return Err(CodecError::InvalidAbi(format!("{name}: bad inputs"))),
            };
            Ok(format!("{name}({})", params.join(",")))
        })
        .collect()
}

/// Tuples expand to `(component,...)` keeping any array suffix.
fn canonical_param(param: &Value) -> Result<String, CodecError> {
    let ty = param
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| CodecError::InvalidAbi("parameter without type".into()))?;
    let Some(suffix) = ty.strip_prefix("tuple") else {
        return Ok(ty.to_string());
    };
    let components = param
        .get("components")
        .and_then(Value::as_array)
        .ok_or_else(|| CodecError::InvalidAbi("tuple parameter without components".into()))?;
    let inner = components
        .iter()
        .map(canonical_param)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(format!("({}){suffix}", inner.join(",")))
}

/// Every callable selector of an ABI, minus [`INTROSPECTION_SELECTOR`].
pub fn module_selectors(artifact: &Value) -> Result<BTreeSet<Selector>, CodecError> {
    Ok(function_signatures(artifact)?
        .iter()
        .map(|sig| abi::function_selector(sig))
        .filter(|sel| *sel != INTROSPECTION_SELECTOR)
        .collect())
}
