use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use telbridge_bus::{
    iface, ApnSettings, BridgeError, DataCallRecord, DeactivateReason, NetIfControl, PropValue,
    RemoteBus, ResponsePayload, TechClass,
};
use telbridge_core::{DebouncedSignal, EntityStore, PropertyBag, SequenceMap};

use super::{NotifyKind, OpResult};

/// Data-connection lifecycle: mirrors connection contexts, hands out
/// monotonic connection ids, and drives the local interface
/// configuration side effects on activation transitions.
pub struct DataConnModule {
    bus: Arc<dyn RemoteBus>,
    netif: Arc<dyn NetIfControl>,
    modem_path: String,
    contexts: EntityStore,
    ids: SequenceMap,
    /// Teardown fires after the remote has already cleared the
    /// authoritative settings, so the interface name is cached as it
    /// is learned.
    last_ifname: HashMap<String, String>,
    configured: HashSet<String>,
    debounce: DebouncedSignal<NotifyKind>,
    window: Duration,
}

/// Parsed interface settings of one context.
#[derive(Debug, Default, Clone, PartialEq)]
struct IfSettings {
    ifname: String,
    addresses: Vec<String>,
    gateway: Option<String>,
    dns: Vec<String>,
    mtu: Option<u32>,
}

impl DataConnModule {
    pub fn new(
        bus: Arc<dyn RemoteBus>,
        netif: Arc<dyn NetIfControl>,
        modem_path: String,
        debounce: DebouncedSignal<NotifyKind>,
        window: Duration,
    ) -> Self {
        Self {
            bus,
            netif,
            modem_path,
            contexts: EntityStore::new(),
            ids: SequenceMap::new(),
            last_ifname: HashMap::new(),
            configured: HashSet::new(),
            debounce,
            window,
        }
    }

    pub async fn handle_added(&mut self, path: &str, properties: PropertyBag) {
        let cid = self.ids.allocate(path);
        log::debug!("context {path} -> cid {cid}");
        self.contexts.upsert(path, properties);
        self.learn_ifname(path);
        if self.is_active(path) {
            self.try_configure(path).await;
        }
        self.debounce.arm(NotifyKind::DataCallList, self.window);
    }

    pub async fn handle_removed(&mut self, path: &str) {
        if self.contexts.remove(path).is_none() {
            return;
        }
        self.teardown(path).await;
        self.ids.release(path);
        self.last_ifname.remove(path);
        self.debounce.arm(NotifyKind::DataCallList, self.window);
    }

    pub async fn handle_property(&mut self, path: &str, name: &str, value: PropValue) {
        let was_active = self.is_active(path);
        if !self.contexts.update(path, name, value) {
            return;
        }
        self.learn_ifname(path);

        let now_active = self.is_active(path);
        if now_active && !self.configured.contains(path) {
            // Activation and its settings can arrive in either order;
            // configure once both are present.
            self.try_configure(path).await;
        } else if was_active && !now_active {
            self.teardown(path).await;
        }

        self.debounce.arm(NotifyKind::DataCallList, self.window);
    }

    /// Tear down every active context. Used on modem-offline
    /// transitions; ids are released but never reused.
    pub async fn reset(&mut self) {
        let paths: Vec<String> = self.contexts.keys().map(str::to_string).collect();
        for path in &paths {
            self.teardown(path).await;
            self.ids.release(path);
        }
        self.contexts.clear();
        self.last_ifname.clear();
        if !paths.is_empty() {
            self.debounce.arm(NotifyKind::DataCallList, self.window);
        }
    }

    pub fn data_call_list(&self) -> Vec<DataCallRecord> {
        let mut records: Vec<DataCallRecord> = self
            .contexts
            .iter()
            .filter_map(|(path, bag)| self.derive_record(path, bag))
            .collect();
        records.sort_by_key(|record| record.cid);
        records
    }

    pub async fn setup_data_call(
        &mut self,
        tech: TechClass,
        apn: ApnSettings,
        modem_class: TechClass,
    ) -> OpResult {
        // The bridge does not switch technology families on behalf of
        // a setup request.
        if tech != modem_class {
            return Err(BridgeError::ModeNotSupported.into());
        }

        let result = self
            .bus
            .call(&self.modem_path, iface::CONN_MANAGER, "AddContext", vec!["internet".into()])
            .await?;
        let path = result
            .first()
            .and_then(PropValue::as_str)
            .ok_or(BridgeError::GenericFailure)?
            .to_string();

        let cid = self.ids.allocate(&path);
        let mut provisional = PropertyBag::new();
        provisional.insert("AccessPointName".to_string(), PropValue::Str(apn.apn.clone()));
        self.contexts.upsert(&path, provisional);

        self.bus
            .set_property(
                &path,
                iface::CONN_CONTEXT,
                "AccessPointName",
                PropValue::Str(apn.apn),
            )
            .await?;
        if let Some(username) = apn.username {
            self.bus
                .set_property(&path, iface::CONN_CONTEXT, "Username", PropValue::Str(username))
                .await?;
        }
        if let Some(password) = apn.password {
            self.bus
                .set_property(&path, iface::CONN_CONTEXT, "Password", PropValue::Str(password))
                .await?;
        }
        // Fire-and-confirm: activation is confirmed by the later
        // Active/Settings property changes.
        self.bus
            .set_property(&path, iface::CONN_CONTEXT, "Active", PropValue::Bool(true))
            .await?;

        let record = self
            .contexts
            .get(&path)
            .and_then(|bag| self.derive_record(&path, bag))
            .unwrap_or(DataCallRecord {
                cid,
                active: false,
                ifname: String::new(),
                addresses: Vec::new(),
                gateways: Vec::new(),
                dns: Vec::new(),
                mtu: None,
            });
        Ok(ResponsePayload::DataCall { call: record })
    }

    pub async fn deactivate_data_call(&self, cid: u32, reason: DeactivateReason) -> OpResult {
        let path = self.ids.reverse(cid).ok_or(BridgeError::NoSuchElement)?.to_string();
        log::debug!("deactivating cid {cid} ({path}), reason {reason:?}");
        self.bus
            .set_property(&path, iface::CONN_CONTEXT, "Active", PropValue::Bool(false))
            .await?;
        Ok(ResponsePayload::Ack)
    }

    fn is_active(&self, path: &str) -> bool {
        self.contexts
            .get(path)
            .and_then(|bag| bag.get("Active"))
            .and_then(PropValue::as_bool)
            .unwrap_or(false)
    }

    fn learn_ifname(&mut self, path: &str) {
        let ifname = self
            .contexts
            .get(path)
            .and_then(|bag| parse_settings(bag))
            .map(|settings| settings.ifname);
        if let Some(ifname) = ifname {
            if !ifname.is_empty() {
                self.last_ifname.insert(path.to_string(), ifname);
            }
        }
    }

    /// Bring the local interface up for an activated context. Failures
    /// are logged and never abort the coalesced notification.
    async fn try_configure(&mut self, path: &str) {
        let Some(settings) = self.contexts.get(path).and_then(|bag| parse_settings(bag)) else {
            return;
        };
        if settings.ifname.is_empty() {
            return;
        }
        // Single-address-only is a hard constraint downstream; more
        // than one address means the connection is not actionable.
        if settings.addresses.len() != 1 {
            log::warn!(
                "context {path} reports {} addresses; not actionable",
                settings.addresses.len()
            );
            return;
        }
        let (address, prefix) = match parse_address(&settings.addresses[0]) {
            Some(parsed) => parsed,
            None => {
                log::warn!("context {path}: unparseable address {:?}", settings.addresses[0]);
                return;
            }
        };

        if let Err(err) = self.netif.bring_up(&settings.ifname).await {
            log::warn!("bring_up {} failed: {err}", settings.ifname);
        }
        if let Err(err) = self.netif.add_address(&settings.ifname, &address, prefix).await {
            log::warn!("add_address {} failed: {err}", settings.ifname);
        }
        if let Some(gateway) = &settings.gateway {
            if let Err(err) = self.netif.set_gateway(&settings.ifname, gateway).await {
                log::warn!("set_gateway {} failed: {err}", settings.ifname);
            }
        }
        if let Some(mtu) = settings.mtu {
            if let Err(err) = self.netif.set_mtu(&settings.ifname, mtu).await {
                log::warn!("set_mtu {} failed: {err}", settings.ifname);
            }
        }
        self.configured.insert(path.to_string());
    }

    /// Tear the interface down with the last-known name; the
    /// authoritative settings are already gone by the time this fires.
    async fn teardown(&mut self, path: &str) {
        self.configured.remove(path);
        let Some(ifname) = self.last_ifname.get(path) else {
            log::debug!("teardown of {path}: interface name never learned, nothing to do");
            return;
        };
        if let Err(err) = self.netif.clear_addresses(ifname).await {
            log::warn!("clear_addresses {ifname} failed: {err}");
        }
        if let Err(err) = self.netif.bring_down(ifname).await {
            log::warn!("bring_down {ifname} failed: {err}");
        }
    }

    fn derive_record(&self, path: &str, bag: &PropertyBag) -> Option<DataCallRecord> {
        let cid = match self.ids.lookup(path) {
            Some(cid) => cid,
            None => {
                log::warn!("context {path} has no connection id; skipping");
                return None;
            }
        };
        let settings = parse_settings(bag).unwrap_or_default();
        Some(DataCallRecord {
            cid,
            active: bag.get("Active").and_then(PropValue::as_bool).unwrap_or(false),
            ifname: settings.ifname,
            addresses: settings.addresses,
            gateways: settings.gateway.into_iter().collect(),
            dns: settings.dns,
            mtu: settings.mtu,
        })
    }
}

fn parse_settings(bag: &PropertyBag) -> Option<IfSettings> {
    let settings = bag.get("Settings").and_then(PropValue::as_bag)?;
    let ifname = settings
        .get("Interface")
        .and_then(PropValue::as_str)
        .unwrap_or("")
        .to_string();
    let addresses = settings
        .get("Address")
        .and_then(PropValue::as_str)
        .map(|raw| raw.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();
    let gateway = settings
        .get("Gateway")
        .and_then(PropValue::as_str)
        .filter(|gateway| !gateway.is_empty())
        .map(str::to_string);
    let dns = settings
        .get("DomainNameServers")
        .and_then(PropValue::as_str_list)
        .map(<[String]>::to_vec)
        .unwrap_or_default();
    let mtu = bag
        .get("MaximumTransmissionUnit")
        .and_then(PropValue::as_int)
        .and_then(|mtu| u32::try_from(mtu).ok());
    Some(IfSettings { ifname, addresses, gateway, dns, mtu })
}

/// Accepts `addr/prefix` or a bare address paired with a `Netmask`
/// already folded into the string upstream; a bare address defaults to
/// a host prefix.
fn parse_address(raw: &str) -> Option<(String, u8)> {
    match raw.split_once('/') {
        Some((address, prefix)) => {
            let prefix: u8 = prefix.parse().ok()?;
            if address.is_empty() || prefix > 128 {
                return None;
            }
            Some((address.to_string(), prefix))
        }
        None if !raw.is_empty() => Some((raw.to_string(), 32)),
        None => None,
    }
}
