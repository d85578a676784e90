use std::sync::Arc;
use telbridge_bus::{
    iface, BridgeError, BusError, ClirMode, PropValue, RemoteBus, ResponsePayload,
};
use telbridge_core::PropertyStore;

use super::OpResult;

/// Supplementary services: the CLIR setting mirrored from the remote
/// call-settings interface. Call forwarding and call waiting stay
/// unimplemented and answer as such.
pub struct SupplementaryModule {
    bus: Arc<dyn RemoteBus>,
    path: String,
    props: PropertyStore,
}

impl SupplementaryModule {
    pub fn new(bus: Arc<dyn RemoteBus>, path: String) -> Self {
        Self { bus, path, props: PropertyStore::new() }
    }

    pub async fn init(&mut self) -> Result<(), BusError> {
        let bag = self.bus.fetch_properties(&self.path, iface::CALL_SETTINGS).await?;
        self.props.initialize(bag, |_, _| {});
        Ok(())
    }

    pub fn handle_property(&mut self, name: &str, value: PropValue) {
        self.props.update(name, value);
    }

    /// CLIR query from the mirror. A remote that never reported the
    /// setting means the feature is unavailable, not broken.
    pub fn query_clir(&self) -> OpResult {
        let mode = self
            .props
            .get("HiddenCallerId")
            .and_then(PropValue::as_str)
            .and_then(ClirMode::from_remote)
            .ok_or(BridgeError::RequestNotSupported)?;
        Ok(ResponsePayload::Clir { mode })
    }

    pub async fn set_clir(&self, mode: ClirMode) -> OpResult {
        self.bus
            .set_property(
                &self.path,
                iface::CALL_SETTINGS,
                "HiddenCallerId",
                mode.to_remote().into(),
            )
            .await?;
        Ok(ResponsePayload::Ack)
    }
}
