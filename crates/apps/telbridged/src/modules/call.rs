use std::sync::Arc;
use std::time::Duration;
use telbridge_bus::{
    iface, BridgeError, CallRecord, CallState, ClirMode, Presentation, PropValue, RemoteBus,
    ResponsePayload,
};
use telbridge_core::{DebouncedSignal, EntityStore, PropertyBag, RegistryError, SlotPool};

use super::{NotifyKind, OpResult};

/// Provisional key attached to a locally dialed call before the remote
/// "added" event arrives with the authoritative bag. Survives the
/// merge; the remote never reports a property of this name.
const PROP_ORIGINATED: &str = "Originated";

/// Call lifecycle: tracks voice-call entities, stabilizes their
/// ephemeral paths into the 1..=N call indexes the downstream protocol
/// requires, and answers the call request surface.
pub struct CallModule {
    bus: Arc<dyn RemoteBus>,
    modem_path: String,
    calls: EntityStore,
    slots: SlotPool,
    debounce: DebouncedSignal<NotifyKind>,
    window: Duration,
    bulk_hangup_states: Vec<CallState>,
}

impl CallModule {
    pub fn new(
        bus: Arc<dyn RemoteBus>,
        modem_path: String,
        slots: u32,
        bulk_hangup_states: Vec<CallState>,
        debounce: DebouncedSignal<NotifyKind>,
        window: Duration,
    ) -> Self {
        Self {
            bus,
            modem_path,
            calls: EntityStore::new(),
            slots: SlotPool::new(slots),
            debounce,
            window,
            bulk_hangup_states,
        }
    }

    pub fn handle_added(&mut self, path: &str, properties: PropertyBag) {
        match self.slots.allocate(path) {
            Ok(index) => {
                log::debug!("call {path} -> index {index}");
                self.calls.upsert(path, properties);
                self.debounce.arm(NotifyKind::CallState, self.window);
            }
            Err(RegistryError::Exhausted { limit }) => {
                // The downstream protocol cannot address this call; it
                // stays untracked rather than corrupting a live index.
                log::warn!("no free call slot (limit {limit}) for {path}; call not tracked");
            }
        }
    }

    pub fn handle_removed(&mut self, path: &str) {
        if self.calls.remove(path).is_some() {
            self.slots.release(path);
            self.debounce.arm(NotifyKind::CallState, self.window);
        }
    }

    pub fn handle_property(&mut self, path: &str, name: &str, value: PropValue) {
        if self.calls.update(path, name, value) {
            self.debounce.arm(NotifyKind::CallState, self.window);
        }
    }

    /// Forget every tracked call. Used on modem-offline transitions;
    /// slots become reusable immediately.
    pub fn reset(&mut self) {
        if !self.calls.is_empty() {
            self.calls.clear();
            self.slots.clear();
            self.debounce.arm(NotifyKind::CallState, self.window);
        }
    }

    /// Snapshot of all tracked calls, sorted by index (a stable total
    /// order; the legacy consumer re-sorts but expects determinism).
    /// Entities whose state or handle cannot be resolved are skipped
    /// with a warning, never fatal.
    pub fn current_calls(&self) -> Vec<CallRecord> {
        let mut records: Vec<CallRecord> = self
            .calls
            .iter()
            .filter_map(|(path, bag)| self.derive_call(path, bag))
            .collect();
        records.sort_by_key(|record| record.index);
        records
    }

    fn derive_call(&self, path: &str, bag: &PropertyBag) -> Option<CallRecord> {
        let index = match self.slots.lookup(path) {
            Some(index) => index,
            None => {
                log::warn!("call {path} has no slot; skipping");
                return None;
            }
        };
        let state_str = bag.get("State").and_then(PropValue::as_str);
        let mut state = match state_str.and_then(CallState::from_remote) {
            Some(state) => state,
            None => {
                log::warn!("call {path} reports unusable state {state_str:?}; skipping");
                return None;
            }
        };

        let originated =
            bag.get(PROP_ORIGINATED).and_then(PropValue::as_bool).unwrap_or(false);
        // Remote-driver quirk: a mobile-terminated call can be
        // reported as DIALING. Normalize to INCOMING; deliberately not
        // generalized to other state combinations.
        if !originated && state == CallState::Dialing {
            state = CallState::Incoming;
        }

        let number = bag
            .get("LineIdentification")
            .and_then(PropValue::as_str)
            .unwrap_or("")
            .to_string();
        let name = bag.get("Name").and_then(PropValue::as_str).unwrap_or("").to_string();

        Some(CallRecord {
            index,
            state,
            mobile_terminated: !originated,
            number_presentation: presentation_of(&number),
            name_presentation: presentation_of(&name),
            number,
            name,
        })
    }

    pub async fn dial(&mut self, address: String, clir: ClirMode) -> OpResult {
        // Answering the dial with a corrupted or duplicate handle is
        // worse than refusing it; refuse while the pool is full.
        if self.slots.in_use() >= self.slots.limit() as usize {
            return Err(BridgeError::NoResources.into());
        }

        let result = self
            .bus
            .call(
                &self.modem_path,
                iface::CALL_MANAGER,
                "Dial",
                vec![address.clone().into(), clir.to_remote().into()],
            )
            .await?;

        // The remote answers with the new entity path; attach the
        // origination flag before the added event lands so the merge
        // preserves it.
        match result.first().and_then(PropValue::as_str) {
            Some(path) => {
                let mut provisional = PropertyBag::new();
                provisional.insert(PROP_ORIGINATED.to_string(), PropValue::Bool(true));
                provisional
                    .insert("LineIdentification".to_string(), PropValue::Str(address));
                self.calls.upsert(path, provisional);
            }
            None => log::warn!("dial succeeded but remote returned no call path"),
        }
        Ok(ResponsePayload::Ack)
    }

    pub async fn hangup(&self, index: u32) -> OpResult {
        let path = self.slots.reverse(index).ok_or(BridgeError::NoSuchElement)?;
        self.bus.call(path, iface::CALL, "Hangup", Vec::new()).await?;
        Ok(ResponsePayload::Ack)
    }

    pub async fn answer_incoming(&self) -> OpResult {
        let path = self
            .calls
            .iter()
            .find(|(path, bag)| {
                matches!(
                    self.derive_call(path, bag).map(|call| call.state),
                    Some(CallState::Incoming | CallState::Waiting)
                )
            })
            .map(|(path, _)| path.to_string())
            .ok_or(BridgeError::NoSuchElement)?;
        self.bus.call(&path, iface::CALL, "Answer", Vec::new()).await?;
        Ok(ResponsePayload::Ack)
    }

    /// Hang up every call whose state is in the configured eligible
    /// set. Success if at least one hangup went through; element-not-
    /// found if nothing matched; generic failure only when attempts
    /// were made and every one of them failed.
    pub async fn hangup_waiting_or_background(&self) -> OpResult {
        let targets: Vec<String> = self
            .calls
            .iter()
            .filter(|(path, bag)| {
                self.derive_call(path, bag)
                    .map(|call| self.bulk_hangup_states.contains(&call.state))
                    .unwrap_or(false)
            })
            .map(|(path, _)| path.to_string())
            .collect();

        if targets.is_empty() {
            return Err(BridgeError::NoSuchElement.into());
        }

        let mut succeeded = 0_usize;
        for path in &targets {
            match self.bus.call(path, iface::CALL, "Hangup", Vec::new()).await {
                Ok(_) => succeeded += 1,
                Err(err) => log::warn!("bulk hangup of {path} failed: {err}"),
            }
        }
        if succeeded == 0 {
            return Err(BridgeError::GenericFailure.into());
        }
        Ok(ResponsePayload::Ack)
    }
}

fn presentation_of(value: &str) -> Presentation {
    match value {
        "" => Presentation::Unknown,
        "withheld" => Presentation::Restricted,
        _ => Presentation::Allowed,
    }
}
