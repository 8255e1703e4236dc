use alloy_primitives::Address;
use provenance_types::CodecError;

/// Off-ledger signing and policy error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    NoSignersProvided,
    InvalidKey(String),
    SignatureInvalid,
    /// Signature set does not fit the account's execution path.
    InvalidPath(String),
    SequenceMismatch { expected: u64, live: u64 },
    UnexpectedSigner { expected: Address, recovered: Address },
    Codec(CodecError),
}

impl From<CodecError> for AuthError {
    fn from(err: CodecError) -> Self {
        Self::Codec(err)
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoSignersProvided => write!(f, "no signing keys provided"),
            Self::InvalidKey(msg) => write!(f, "invalid signing key: {msg}"),
            Self::SignatureInvalid => write!(f, "invalid secp256k1 signature"),
            Self::InvalidPath(msg) => write!(f, "invalid execution path: {msg}"),
            Self::SequenceMismatch { expected, live } => {
                write!(f, "sequence mismatch: request has {expected}, ledger has {live}")
            }
            Self::UnexpectedSigner {
                expected,
                recovered,
            } => write!(f, "signature recovers to {recovered}, expected {expected}"),
            Self::Codec(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for AuthError {}
