use async_trait::async_trait;
use telbridge_core::{PropValue, PropertyBag};

use crate::error::BusError;
use crate::types::{Notification, Response};

/// The upstream remote-object tree.
///
/// Entities are addressed by ephemeral hierarchical path strings and
/// mirrored through bulk fetch plus change events. Mutation is
/// fire-and-confirm: `set_property` returns when the bus acks the
/// request, the actual effect is confirmed later by an ordinary
/// `PropertyChanged` event.
#[async_trait]
pub trait RemoteBus: Send + Sync {
    /// Bulk-fetch the property bag of one object/interface pair.
    async fn fetch_properties(
        &self,
        path: &str,
        interface: &'static str,
    ) -> Result<PropertyBag, BusError>;

    /// Request a property change. Fire-and-confirm.
    async fn set_property(
        &self,
        path: &str,
        interface: &'static str,
        name: &str,
        value: PropValue,
    ) -> Result<(), BusError>;

    /// Invoke a remote method with positional arguments.
    async fn call(
        &self,
        path: &str,
        interface: &'static str,
        method: &str,
        args: Vec<PropValue>,
    ) -> Result<Vec<PropValue>, BusError>;
}

/// Delivery of terminal responses back to the downstream caller.
/// Invoked only from the completion domain; implementations mirror
/// whatever threading model the host's response mechanism requires.
#[async_trait]
pub trait ResponseSink: Send + Sync {
    async fn deliver(&self, response: Response);
}

/// Delivery of unsolicited downstream notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: Notification);
}

/// Local network interface control for data connections.
///
/// Every call may fail independently; failures are logged by the
/// caller and are never fatal to the bridge.
#[async_trait]
pub trait NetIfControl: Send + Sync {
    async fn bring_up(&self, ifname: &str) -> Result<(), BusError>;
    async fn bring_down(&self, ifname: &str) -> Result<(), BusError>;
    async fn add_address(&self, ifname: &str, address: &str, prefix: u8) -> Result<(), BusError>;
    async fn clear_addresses(&self, ifname: &str) -> Result<(), BusError>;
    async fn set_gateway(&self, ifname: &str, gateway: &str) -> Result<(), BusError>;
    async fn set_mtu(&self, ifname: &str, mtu: u32) -> Result<(), BusError>;
}
