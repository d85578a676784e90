use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use telbridge_core::{PropValue, PropertyBag};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::error::BusError;
use crate::traits::{NetIfControl, NotificationSink, RemoteBus, ResponseSink};
use crate::types::{Notification, Response};

/// In-memory remote-object tree for tests: scripted property bags,
/// scripted method results, and a record of every mutating call.
#[derive(Default)]
pub struct FakeBus {
    bags: Mutex<HashMap<(String, &'static str), PropertyBag>>,
    call_results: Mutex<HashMap<String, Vec<Result<Vec<PropValue>, BusError>>>>,
    pub calls: Mutex<Vec<RecordedCall>>,
    pub property_sets: Mutex<Vec<RecordedSet>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub path: String,
    pub interface: &'static str,
    pub method: String,
    pub args: Vec<PropValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedSet {
    pub path: String,
    pub interface: &'static str,
    pub name: String,
    pub value: PropValue,
}

impl FakeBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_properties(&self, path: &str, interface: &'static str, bag: PropertyBag) {
        if let Ok(mut bags) = self.bags.lock() {
            bags.insert((path.to_string(), interface), bag);
        }
    }

    /// Script the next result for `method` (FIFO per method name).
    /// Unscripted methods succeed with no return values.
    pub fn script_call(&self, method: &str, result: Result<Vec<PropValue>, BusError>) {
        if let Ok(mut results) = self.call_results.lock() {
            results.entry(method.to_string()).or_default().push(result);
        }
    }

    pub fn recorded_calls(&self, method: &str) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .map(|calls| calls.iter().filter(|call| call.method == method).cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RemoteBus for FakeBus {
    async fn fetch_properties(
        &self,
        path: &str,
        interface: &'static str,
    ) -> Result<PropertyBag, BusError> {
        let bags = self.bags.lock().map_err(|_| BusError::failed("poisoned fake"))?;
        Ok(bags.get(&(path.to_string(), interface)).cloned().unwrap_or_default())
    }

    async fn set_property(
        &self,
        path: &str,
        interface: &'static str,
        name: &str,
        value: PropValue,
    ) -> Result<(), BusError> {
        if let Ok(mut sets) = self.property_sets.lock() {
            sets.push(RecordedSet {
                path: path.to_string(),
                interface,
                name: name.to_string(),
                value,
            });
        }
        Ok(())
    }

    async fn call(
        &self,
        path: &str,
        interface: &'static str,
        method: &str,
        args: Vec<PropValue>,
    ) -> Result<Vec<PropValue>, BusError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                path: path.to_string(),
                interface,
                method: method.to_string(),
                args,
            });
        }
        let scripted = self
            .call_results
            .lock()
            .ok()
            .and_then(|mut results| results.get_mut(method).and_then(|queue| {
                if queue.is_empty() {
                    None
                } else {
                    Some(queue.remove(0))
                }
            }));
        scripted.unwrap_or(Ok(Vec::new()))
    }
}

/// Response and notification sinks backed by channels the test drains.
pub struct RecordingSinks {
    response_tx: UnboundedSender<Response>,
    notification_tx: UnboundedSender<Notification>,
}

impl RecordingSinks {
    pub fn new() -> (Self, UnboundedReceiver<Response>, UnboundedReceiver<Notification>) {
        let (response_tx, response_rx) = unbounded_channel();
        let (notification_tx, notification_rx) = unbounded_channel();
        (Self { response_tx, notification_tx }, response_rx, notification_rx)
    }
}

#[async_trait]
impl ResponseSink for RecordingSinks {
    async fn deliver(&self, response: Response) {
        let _ = self.response_tx.send(response);
    }
}

#[async_trait]
impl NotificationSink for RecordingSinks {
    async fn notify(&self, notification: Notification) {
        let _ = self.notification_tx.send(notification);
    }
}

/// Records every interface-control call; individual operations can be
/// scripted to fail.
#[derive(Default)]
pub struct RecordingNetIf {
    pub ops: Mutex<Vec<NetIfOp>>,
    failing: Mutex<Vec<&'static str>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NetIfOp {
    BringUp { ifname: String },
    BringDown { ifname: String },
    AddAddress { ifname: String, address: String, prefix: u8 },
    ClearAddresses { ifname: String },
    SetGateway { ifname: String, gateway: String },
    SetMtu { ifname: String, mtu: u32 },
}

impl RecordingNetIf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(&self, op: &'static str) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.push(op);
        }
    }

    fn record(&self, op: NetIfOp, name: &'static str) -> Result<(), BusError> {
        if let Ok(mut ops) = self.ops.lock() {
            ops.push(op);
        }
        let fails = self
            .failing
            .lock()
            .map(|failing| failing.contains(&name))
            .unwrap_or(false);
        if fails {
            return Err(BusError::failed(format!("{name} scripted to fail")));
        }
        Ok(())
    }

    pub fn recorded(&self) -> Vec<NetIfOp> {
        self.ops.lock().map(|ops| ops.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl NetIfControl for RecordingNetIf {
    async fn bring_up(&self, ifname: &str) -> Result<(), BusError> {
        self.record(NetIfOp::BringUp { ifname: ifname.to_string() }, "bring_up")
    }

    async fn bring_down(&self, ifname: &str) -> Result<(), BusError> {
        self.record(NetIfOp::BringDown { ifname: ifname.to_string() }, "bring_down")
    }

    async fn add_address(&self, ifname: &str, address: &str, prefix: u8) -> Result<(), BusError> {
        self.record(
            NetIfOp::AddAddress {
                ifname: ifname.to_string(),
                address: address.to_string(),
                prefix,
            },
            "add_address",
        )
    }

    async fn clear_addresses(&self, ifname: &str) -> Result<(), BusError> {
        self.record(NetIfOp::ClearAddresses { ifname: ifname.to_string() }, "clear_addresses")
    }

    async fn set_gateway(&self, ifname: &str, gateway: &str) -> Result<(), BusError> {
        self.record(
            NetIfOp::SetGateway { ifname: ifname.to_string(), gateway: gateway.to_string() },
            "set_gateway",
        )
    }

    async fn set_mtu(&self, ifname: &str, mtu: u32) -> Result<(), BusError> {
        self.record(NetIfOp::SetMtu { ifname: ifname.to_string(), mtu }, "set_mtu")
    }
}
