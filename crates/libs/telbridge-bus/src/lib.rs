//! Boundary traits for the telbridge daemon.
//!
//! The bridge has three external surfaces, each captured here as a
//! trait plus its wire-adjacent types:
//!
//! - [`RemoteBus`] — the upstream remote-object tree (bulk property
//!   fetch, fire-and-confirm mutation, entity/property events)
//! - [`ResponseSink`] / [`NotificationSink`] — the downstream
//!   token-correlated request surface and its unsolicited broadcasts
//! - [`NetIfControl`] — local network interface side effects for data
//!   connections
//!
//! [`FakeBus`] and the recording sinks give tests an in-memory remote
//! tree with scripted bags and injectable events.

pub mod error;
pub mod fake;
pub mod traits;
pub mod types;

pub use telbridge_core::{PropValue, PropertyBag};

pub use error::{BridgeError, BusError};
pub use fake::{FakeBus, NetIfOp, RecordingNetIf, RecordingSinks};
pub use traits::{NetIfControl, NotificationSink, RemoteBus, ResponseSink};
pub use types::*;
