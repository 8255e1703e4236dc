//! Proxied operation variants: splice a `destination: address` field into a
//! base field list.

use crate::catalog::{OperationType, TypedField, DESTINATION_FIELD};
use crate::{CodecError, PrimitiveType};

/// Key suffix of a proxied variant.
pub const PROXIED_SUFFIX: &str = "Proxied";

/// Insert `destination` right after the fixed header: index 3 when the opaque
/// `data` field is present, otherwise index 2. Any other placement changes the
/// type hash and breaks verification.
pub fn with_destination(base: &OperationType) -> Result<OperationType, CodecError> {
    if base.fields.iter().any(|f| f.name == DESTINATION_FIELD) {
        return Err(CodecError::DuplicateField(DESTINATION_FIELD.to_string()));
    }

    let mut fields = base.fields.clone();
    fields.insert(
        base.header_len(),
        TypedField::new(DESTINATION_FIELD, PrimitiveType::Address),
    );

    Ok(OperationType {
        key: format!("{}{PROXIED_SUFFIX}", base.key),
        fields,
        target_module: base.target_module,
        function_selector: base.function_selector,
    })
}
