//! Primitive field types understood by the structured-message verifier.

use std::fmt;
use std::str::FromStr;

use crate::CodecError;

/// A structured-message primitive type. `uint`/`int` parse as their 256-bit form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Address,
    Bool,
    String,
    Bytes,
    /// `bytesN`, 1..=32.
    FixedBytes(usize),
    /// `uintN`, N a multiple of 8 in 8..=256.
    Uint(usize),
    Int(usize),
    Array(Box<PrimitiveType>),
    FixedArray(Box<PrimitiveType>, usize),
}

impl PrimitiveType {
    /// Variable-length for catalog purposes: text, raw bytes, or any array.
    pub fn is_dynamic(&self) -> bool {
        matches!(
            self,
            Self::String | Self::Bytes | Self::Array(_) | Self::FixedArray(..)
        )
    }

    /// Dynamic in the ABI head/tail sense. Fixed arrays of static elements are static.
    pub fn is_abi_dynamic(&self) -> bool {
        match self {
            Self::String | Self::Bytes | Self::Array(_) => true,
            Self::FixedArray(inner, _) => inner.is_abi_dynamic(),
            _ => false,
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address => f.write_str("address"),
            Self::Bool => f.write_str("bool"),
            Self::String => f.write_str("string"),
            Self::Bytes => f.write_str("bytes"),
            Self::FixedBytes(n) => write!(f, "bytes{n}"),
            Self::Uint(bits) => write!(f, "uint{bits}"),
            Self::Int(bits) => write!(f, "int{bits}"),
            Self::Array(inner) => write!(f, "{inner}[]"),
            Self::FixedArray(inner, len) => write!(f, "{inner}[{len}]"),
        }
    }
}

impl FromStr for PrimitiveType {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || CodecError::InvalidType(s.to_string());

        if let Some(stripped) = s.strip_suffix(']') {
            let open = stripped.rfind('[').ok_or_else(invalid)?;
            let inner: PrimitiveType = stripped[..open].parse()?;
            let dim = &stripped[open + 1..];
            if dim.is_empty() {
                return Ok(Self::Array(Box::new(inner)));
            }
            let len: usize = dim.parse().map_err(|_| invalid())?;
            if len == 0 {
                return Err(invalid());
            }
            return Ok(Self::FixedArray(Box::new(inner), len));
        }

        match s {
            "address" => return Ok(Self::Address),
            "bool" => return Ok(Self::Bool),
            "string" => return Ok(Self::String),
            "bytes" => return Ok(Self::Bytes),
            "uint" => return Ok(Self::Uint(256)),
            "int" => return Ok(Self::Int(256)),
            _ => {}
        }

        if let Some(n) = s.strip_prefix("bytes") {
            let n: usize = n.parse().map_err(|_| invalid())?;
            return if (1..=32).contains(&n) {
                Ok(Self::FixedBytes(n))
            } else {
                Err(invalid())
            };
        }

        let (bits, signed) = if let Some(b) = s.strip_prefix("uint") {
            (b, false)
        } else if let Some(b) = s.strip_prefix("int") {
            (b, true)
        } else {
            return Err(invalid());
        };
        let bits: usize = bits.parse().map_err(|_| invalid())?;
        if bits == 0 || bits > 256 || bits % 8 != 0 {
            return Err(invalid());
        }
        Ok(if signed { Self::Int(bits) } else { Self::Uint(bits) })
    }
}
