//! Error types for the relayer.

use provenance_auth::AuthError;
use provenance_types::CodecError;

/// Relayer error type.
///
/// Local policy failures are raised before any network call. Ledger-surfaced
/// failures carry the revert reason verbatim. `Rpc` covers transport.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid execution path: {0}")]
    InvalidPath(String),
    #[error("no signing keys provided")]
    NoSignersProvided,
    #[error("unknown operation kind: {0}")]
    UnknownOperationKind(String),
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("encoding error: {0}")]
    Codec(#[from] CodecError),
    #[error("signing error: {0}")]
    Signing(String),
    #[error("config error: {0}")]
    Config(String),

    #[error("sequence mismatch: {0}")]
    SequenceMismatch(String),
    #[error("custody threshold not met: {0}")]
    ThresholdNotMet(String),
    #[error("operation type already registered: {0}")]
    AlreadyRegistered(String),
    #[error("operation type not registered: {0}")]
    NotRegistered(String),
    #[error("execution reverted: {reason}")]
    ExecutionReverted { reason: String },

    #[error("rpc error: {0}")]
    Rpc(String),
}

impl Error {
    /// Classify a ledger revert by its reason text.
    ///
    /// Only reasons raised by the relay contract itself (`Relay:`), the
    /// custody account (`Custody:`) and the type registry (`Registry: type`)
    /// map to protocol errors. Module reverts stay `ExecutionReverted` whatever
    /// words they contain.
    pub fn from_revert(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        match protocol_revert(&reason) {
            Some(ProtocolRevert::Sequence) => Self::SequenceMismatch(reason),
            Some(ProtocolRevert::Threshold) => Self::ThresholdNotMet(reason),
            Some(ProtocolRevert::AlreadyRegistered) => Self::AlreadyRegistered(reason),
            Some(ProtocolRevert::NotRegistered) => Self::NotRegistered(reason),
            None => Self::ExecutionReverted { reason },
        }
    }

    /// True when rebuilding the request with a fresh sequence number can succeed.
    pub fn is_resubmittable(&self) -> bool {
        matches!(self, Self::SequenceMismatch(_))
    }

    /// Verbatim revert reason of a ledger-surfaced error.
    pub fn revert_reason(&self) -> Option<&str> {
        match self {
            Self::SequenceMismatch(reason)
            | Self::ThresholdNotMet(reason)
            | Self::AlreadyRegistered(reason)
            | Self::NotRegistered(reason)
            | Self::ExecutionReverted { reason } => Some(reason),
            _ => None,
        }
    }

    /// True for failures the ledger reported after executing the transaction.
    pub fn is_ledger_surfaced(&self) -> bool {
        matches!(
            self,
            Self::SequenceMismatch(_)
                | Self::ThresholdNotMet(_)
                | Self::AlreadyRegistered(_)
                | Self::NotRegistered(_)
                | Self::ExecutionReverted { .. }
        )
    }
}

enum ProtocolRevert {
    Sequence,
    Threshold,
    AlreadyRegistered,
    NotRegistered,
}

fn protocol_revert(reason: &str) -> Option<ProtocolRevert> {
    let reason = reason.trim_start();
    if let Some(body) = reason.strip_prefix("Relay:") {
        let body = body.to_ascii_lowercase();
        if body.contains("nonce") || body.contains("sequence") {
            Some(ProtocolRevert::Sequence)
        } else if body.contains("threshold") {
            Some(ProtocolRevert::Threshold)
        } else if body.contains("not registered") {
            Some(ProtocolRevert::NotRegistered)
        } else {
            None
        }
    } else if let Some(body) = reason.strip_prefix("Custody:") {
        body.to_ascii_lowercase()
            .contains("threshold")
            .then_some(ProtocolRevert::Threshold)
    } else if let Some(body) = reason.strip_prefix("Registry: type") {
        let body = body.to_ascii_lowercase();
        if body.contains("already registered") {
            Some(ProtocolRevert::AlreadyRegistered)
        } else if body.contains("not registered") {
            Some(ProtocolRevert::NotRegistered)
        } else {
            None
        }
    } else {
        None
    }
}

impl From<AuthError> for Error {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::NoSignersProvided => Self::NoSignersProvided,
            AuthError::InvalidPath(msg) => Self::InvalidPath(msg),
            AuthError::SequenceMismatch { .. } => Self::SequenceMismatch(err.to_string()),
            AuthError::Codec(codec) => Self::Codec(codec),
            other => Self::Signing(other.to_string()),
        }
    }
}
