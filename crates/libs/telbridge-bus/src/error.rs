use serde::{Deserialize, Serialize};

/// Failures reported by the upstream remote-object bus.
///
/// `Transport` is fatal to the whole session — the owning process is
/// expected to restart rather than retry the bus internally. The other
/// variants map remote error semantics onto the downstream typed codes
/// via `From<BusError> for BridgeError`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[non_exhaustive]
pub enum BusError {
    #[error("bus transport failure: {reason}")]
    Transport { reason: String },

    #[error("operation not supported by remote: {operation}")]
    NotSupported { operation: String },

    #[error("remote object not found: {path}")]
    NotFound { path: String },

    #[error("invalid arguments: {message}")]
    InvalidArguments { message: String },

    #[error("remote operation failed: {message}")]
    Failed { message: String },
}

impl BusError {
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport { reason: reason.into() }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed { message: message.into() }
    }

    /// Transport failures kill the session; everything else is
    /// answered to the caller and the session keeps running.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

/// Typed error codes of the downstream request/response protocol.
///
/// Every request receives exactly one terminal response: a success
/// payload or one of these codes. Codes are the only failure shape the
/// downstream caller ever sees — remote failures are mapped, never
/// re-thrown.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[non_exhaustive]
pub enum BridgeError {
    #[error("generic failure")]
    GenericFailure,

    #[error("request not supported")]
    RequestNotSupported,

    #[error("mode not supported")]
    ModeNotSupported,

    #[error("no such element")]
    NoSuchElement,

    #[error("no resources")]
    NoResources,

    #[error("invalid state")]
    InvalidState,
}

impl From<BusError> for BridgeError {
    fn from(error: BusError) -> Self {
        match error {
            BusError::NotSupported { .. } => Self::RequestNotSupported,
            BusError::NotFound { .. } => Self::NoSuchElement,
            BusError::InvalidArguments { .. }
            | BusError::Failed { .. }
            | BusError::Transport { .. } => Self::GenericFailure,
        }
    }
}
