use std::sync::Arc;
use std::time::Duration;
use telbridge_bus::{iface, BusError, PropValue, RadioState, RemoteBus, TechClass};
use telbridge_core::{DebouncedSignal, PropertyStore};

use super::{NotifyKind, OpError};

/// Mirror of the modem object plus its network-adjacent interfaces.
///
/// Holds the radio on/off state the rest of the bridge keys off and
/// the bearer-technology classification the data-connection policy
/// consumes.
pub struct ModemModule {
    bus: Arc<dyn RemoteBus>,
    path: String,
    props: PropertyStore,
    /// NetworkRegistration + ConnectionManager properties (Technology,
    /// Bearer, Strength) share one mirror; names do not collide.
    net: PropertyStore,
    available: bool,
    debounce: DebouncedSignal<NotifyKind>,
    window: Duration,
}

impl ModemModule {
    pub fn new(
        bus: Arc<dyn RemoteBus>,
        path: String,
        debounce: DebouncedSignal<NotifyKind>,
        window: Duration,
    ) -> Self {
        Self {
            bus,
            path,
            props: PropertyStore::new(),
            net: PropertyStore::new(),
            available: false,
            debounce,
            window,
        }
    }

    /// Seed both mirrors from bulk fetches. A failed fetch propagates;
    /// the session treats that as fatal at startup.
    pub async fn init(&mut self) -> Result<(), BusError> {
        let bag = self.bus.fetch_properties(&self.path, iface::MODEM).await?;
        let debounce = self.debounce.clone();
        let window = self.window;
        self.props.initialize(bag, |name, _| {
            if name == "Online" {
                debounce.arm(NotifyKind::NetworkState, window);
            }
        });

        let net = self.bus.fetch_properties(&self.path, iface::NETWORK).await?;
        let debounce = self.debounce.clone();
        self.net.initialize(net, |_, _| debounce.arm(NotifyKind::NetworkState, window));

        self.available = true;
        Ok(())
    }

    pub fn online(&self) -> bool {
        self.props.get("Online").and_then(PropValue::as_bool).unwrap_or(false)
    }

    pub fn radio_state(&self) -> RadioState {
        if !self.available {
            return RadioState::Unavailable;
        }
        if self.online() {
            RadioState::On
        } else {
            RadioState::Off
        }
    }

    /// Current bearer technology family. The remote reports the bearer
    /// on the connection manager and the access technology on network
    /// registration; either answers the classification. Unknown or
    /// unreported defaults to GSM, matching the legacy downstream
    /// assumption.
    pub fn tech_class(&self) -> TechClass {
        self.net
            .get("Bearer")
            .or_else(|| self.net.get("Technology"))
            .and_then(PropValue::as_str)
            .and_then(TechClass::from_bearer)
            .unwrap_or(TechClass::Gsm)
    }

    /// Apply one property change. Returns true when the modem just
    /// went offline, so the dispatcher can reset the per-entity
    /// modules.
    pub fn handle_property(&mut self, interface: &'static str, name: &str, value: PropValue) -> bool {
        let was_online = self.online();
        let changed = match interface {
            iface::MODEM => self.props.update(name, value),
            _ => self.net.update(name, value),
        };
        if !changed {
            return false;
        }

        match name {
            "Online" | "Technology" | "Bearer" | "Strength" | "Status" => {
                self.debounce.arm(NotifyKind::NetworkState, self.window);
            }
            _ => {}
        }

        was_online && !self.online()
    }

    pub async fn set_radio_power(&self, on: bool) -> Result<(), OpError> {
        self.bus
            .set_property(&self.path, iface::MODEM, "Online", PropValue::Bool(on))
            .await?;
        Ok(())
    }
}
