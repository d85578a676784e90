//! Core machinery for the telbridge daemon.
//!
//! The bridge sits between a token-correlated request/response
//! telephony interface and a remote-object property-bag stack. This
//! crate holds the generic pieces that make that translation correct:
//!
//! - [`PropertyStore`] / [`EntityStore`] — mirrored property bags with
//!   change detection
//! - [`SlotPool`] / [`SequenceMap`] — stable integer handles for
//!   ephemeral remote paths
//! - [`DebouncedSignal`] — burst-coalescing delayed notifications
//! - [`RequestCorrelator`] — at-most-once terminal completion per
//!   outstanding request

pub mod correlator;
pub mod debounce;
pub mod registry;
pub mod store;
pub mod value;

pub use correlator::{PendingRequest, RequestCorrelator};
pub use debounce::DebouncedSignal;
pub use registry::{RegistryError, SequenceMap, SlotPool};
pub use store::{EntityStore, PropertyStore};
pub use value::{bag_from, PropValue, PropertyBag};
