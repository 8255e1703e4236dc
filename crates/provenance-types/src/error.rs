/// Protocol-independent encoding error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    InvalidType(String),
    InvalidValue { field: String, reason: String },
    MissingField(String),
    UnexpectedField(String),
    DuplicateField(String),
    DuplicateKey(String),
    EmptyBatch,
    CorruptBatch(String),
    InvalidAbi(String),
    InvalidSignature(String),
}

impl CodecError {
    pub(crate) fn value(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidType(ty) => write!(f, "invalid primitive type: {ty}"),
            Self::InvalidValue { field, reason } => {
                write!(f, "invalid value for field '{field}': {reason}")
            }
            Self::MissingField(name) => write!(f, "missing payload field: {name}"),
            Self::UnexpectedField(name) => write!(f, "unexpected payload field: {name}"),
            Self::DuplicateField(name) => write!(f, "duplicate or reserved field name: {name}"),
            Self::DuplicateKey(key) => write!(f, "operation key registered twice: {key}"),
            Self::EmptyBatch => write!(f, "batch must contain at least one operation"),
            Self::CorruptBatch(msg) => write!(f, "corrupt batch blob: {msg}"),
            Self::InvalidAbi(msg) => write!(f, "invalid abi: {msg}"),
            Self::InvalidSignature(msg) => write!(f, "invalid signature bytes: {msg}"),
        }
    }
}

impl std::error::Error for CodecError {}
