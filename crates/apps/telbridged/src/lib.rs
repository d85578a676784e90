//! The telbridge daemon: a stateful bridge between a token-correlated
//! request/response telephony interface and a remote-object
//! property-bag telephony stack.
//!
//! [`session::Session`] owns the two execution domains and wires the
//! entity modules; [`config::BridgeConfig`] carries the tunables the
//! legacy semantics left open (debounce window, call-slot count, the
//! bulk-hangup eligible state set).

pub mod config;
pub mod modules;
pub mod session;

pub use config::BridgeConfig;
pub use session::{Session, SessionHandle};
