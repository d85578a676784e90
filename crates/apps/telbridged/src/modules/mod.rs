//! Entity modules: per-domain components deriving the downstream
//! surface from mirrored remote properties. Peers, not layered —
//! only the dispatcher wires them together.

pub mod call;
pub mod dataconn;
pub mod modem;
pub mod sim;
pub mod sms;
pub mod supplementary;

use telbridge_bus::{BridgeError, BusError};

/// Coalesced notification purposes. One debounce key per downstream
/// "state changed" broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotifyKind {
    CallState,
    DataCallList,
    NetworkState,
    SimStatus,
}

/// Failure of one dispatched operation.
///
/// Modules propagate both shapes with `?`: typed downstream codes and
/// raw bus failures. The session maps the latter to a typed code at
/// the domain boundary and checks fatality there, so the distinction
/// survives until the one place that needs it.
#[derive(Debug)]
pub enum OpError {
    Bridge(BridgeError),
    Bus(BusError),
}

impl OpError {
    /// The typed code delivered downstream.
    pub fn code(&self) -> BridgeError {
        match self {
            Self::Bridge(code) => *code,
            Self::Bus(error) => BridgeError::from(error.clone()),
        }
    }

    /// Transport failures end the session; everything else is
    /// answered and the session keeps running.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Bus(error) if error.is_fatal())
    }
}

impl From<BridgeError> for OpError {
    fn from(code: BridgeError) -> Self {
        Self::Bridge(code)
    }
}

impl From<BusError> for OpError {
    fn from(error: BusError) -> Self {
        Self::Bus(error)
    }
}

pub type OpResult = Result<telbridge_bus::ResponsePayload, OpError>;
