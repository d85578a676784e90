use std::sync::Arc;
use std::time::Duration;
use telbridge_bus::{iface, BridgeError, BusError, PropValue, RemoteBus, SimPinState, SimStatus};
use telbridge_core::{DebouncedSignal, PropertyStore};

use super::{NotifyKind, OpError};

/// SIM state mirror: presence, lock state, subscriber identity.
pub struct SimModule {
    bus: Arc<dyn RemoteBus>,
    path: String,
    props: PropertyStore,
    debounce: DebouncedSignal<NotifyKind>,
    window: Duration,
}

impl SimModule {
    pub fn new(
        bus: Arc<dyn RemoteBus>,
        path: String,
        debounce: DebouncedSignal<NotifyKind>,
        window: Duration,
    ) -> Self {
        Self { bus, path, props: PropertyStore::new(), debounce, window }
    }

    pub async fn init(&mut self) -> Result<(), BusError> {
        let bag = self.bus.fetch_properties(&self.path, iface::SIM).await?;
        let debounce = self.debounce.clone();
        let window = self.window;
        self.props.initialize(bag, |name, _| {
            if matches!(name, "Present" | "PinRequired") {
                debounce.arm(NotifyKind::SimStatus, window);
            }
        });
        Ok(())
    }

    pub fn handle_property(&mut self, name: &str, value: PropValue) {
        if self.props.update(name, value) && matches!(name, "Present" | "PinRequired") {
            self.debounce.arm(NotifyKind::SimStatus, self.window);
        }
    }

    pub fn sim_status(&self) -> SimStatus {
        let present = self.props.get("Present").and_then(PropValue::as_bool).unwrap_or(false);
        let pin_state = match self.props.get("PinRequired").and_then(PropValue::as_str) {
            Some("none") => SimPinState::Ready,
            Some("pin") => SimPinState::SimPin,
            Some("puk") => SimPinState::SimPuk,
            _ => SimPinState::Unknown,
        };
        SimStatus { present, pin_state }
    }

    pub fn imsi(&self) -> Result<String, OpError> {
        self.props
            .get("SubscriberIdentity")
            .and_then(PropValue::as_str)
            .filter(|imsi| !imsi.is_empty())
            .map(str::to_string)
            .ok_or_else(|| BridgeError::NoSuchElement.into())
    }
}
