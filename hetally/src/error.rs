use crate::*;

use thiserror::Error;

/// Error types
///
/// Every variant aborts the current operation. Nothing is retried here and no
/// tally is written on the way out.
#[derive(Debug, Error)]
pub enum Error {
    #[error("hetally: voting stage is {0}, submissions require ongoing")]
    StageViolation(Stage),

    #[error("hetally: cannot move voting stage from {from} to {to}")]
    InvalidTransition { from: Stage, to: Stage },

    #[error("hetally configuration: {0}")]
    Configuration(String),

    #[error("hetally key material: {0}")]
    KeyMaterial(String),

    #[error("hetally: cannot decode ciphertext: {0}")]
    Decode(String),

    #[error("hetally: incompatible operands: ciphertext belongs to context {found}, active context is {expected}")]
    OperandMismatch { expected: ContextId, found: ContextId },

    #[error("hetally: invalid ballot: {0}")]
    InvalidBallot(String),

    #[error("hetally: corrupt ledger state under key {0}")]
    CorruptState(String),

    #[error("hetally: invalid setting {0}: {1}")]
    Config(&'static str, String),

    #[error("hetally: backend error: {0}")]
    Backend(String),

    #[error("hetally: io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("hetally: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("hetally: CBOR error: {0}")]
    Cbor(#[from] serde_cbor::Error),

    #[error("hetally: cannot parse transaction payload: empty or unknown format")]
    UnknownPayloadFormat,
}

impl Error {
    /// Errors that compromise the whole voting round rather than one request.
    ///
    /// These need an administrator, not a retry.
    pub fn is_deployment_fatal(&self) -> bool {
        matches!(self, Error::Configuration(_) | Error::KeyMaterial(_))
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error::Decode(format!("invalid base64: {}", err))
    }
}
