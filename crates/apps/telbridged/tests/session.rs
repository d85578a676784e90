//! End-to-end session tests: downstream requests and upstream events
//! flow through the real dispatcher against the in-memory bus.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use telbridge_bus::{
    iface, ApnSettings, BridgeError, BusEvent, CallRecord, CallState, ClirMode, DeactivateReason,
    FakeBus, NetIfOp, Notification, Presentation, PropValue, RadioState, RecordingNetIf,
    RecordingSinks, Request, RequestToken, Response, ResponsePayload, SimPinState, TechClass,
};
use telbridge_core::{bag_from, PropertyBag};
use telbridge_daemon::{BridgeConfig, Session, SessionHandle};

const MODEM: &str = "/modem0";

struct Harness {
    bus: Arc<FakeBus>,
    netif: Arc<RecordingNetIf>,
    handle: SessionHandle,
    event_tx: UnboundedSender<BusEvent>,
    responses: UnboundedReceiver<Response>,
    notifications: UnboundedReceiver<Notification>,
}

fn registered_bus() -> FakeBus {
    let bus = FakeBus::new();
    bus.seed_properties(
        MODEM,
        iface::MODEM,
        bag_from([("Powered", true.into()), ("Online", true.into())]),
    );
    bus.seed_properties(
        MODEM,
        iface::NETWORK,
        bag_from([
            ("Status", "registered".into()),
            ("Technology", "lte".into()),
            ("Strength", 60i64.into()),
        ]),
    );
    bus.seed_properties(
        MODEM,
        iface::SIM,
        bag_from([
            ("Present", true.into()),
            ("PinRequired", "none".into()),
            ("SubscriberIdentity", "001010123456789".into()),
        ]),
    );
    bus.seed_properties(
        MODEM,
        iface::CALL_SETTINGS,
        bag_from([("HiddenCallerId", "default".into())]),
    );
    bus
}

/// Let every spawned task run to idle; paused time advances past any
/// pending debounce timer only when asked for explicitly.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

async fn past_debounce_window() {
    tokio::time::sleep(Duration::from_millis(400)).await;
}

impl Harness {
    async fn spawn(bus: FakeBus) -> Self {
        let bus = Arc::new(bus);
        let netif = Arc::new(RecordingNetIf::new());
        let (sinks, responses, notifications) = RecordingSinks::new();
        let sinks = Arc::new(sinks);
        let (event_tx, event_rx) = unbounded_channel();
        let handle = Session::spawn(
            bus.clone(),
            netif.clone(),
            sinks.clone(),
            sinks,
            event_rx,
            &BridgeConfig::default(),
        );
        let mut harness = Self { bus, netif, handle, event_tx, responses, notifications };
        // Startup arms the network-state debounce; flush it so tests
        // observe only their own notifications.
        past_debounce_window().await;
        harness.drained_notifications();
        harness
    }

    async fn request(&mut self, token: u64, request: Request) -> Response {
        self.handle.submit(RequestToken(token), request);
        settle().await;
        self.responses.recv().await.expect("terminal response")
    }

    fn event(&self, event: BusEvent) {
        self.event_tx.send(event).expect("session alive");
    }

    fn call_added(&self, path: &str, properties: PropertyBag) {
        self.event(BusEvent::EntityAdded {
            path: path.to_string(),
            interface: iface::CALL,
            properties,
        });
    }

    fn call_property(&self, path: &str, name: &str, value: PropValue) {
        self.event(BusEvent::PropertyChanged {
            path: path.to_string(),
            interface: iface::CALL,
            name: name.to_string(),
            value,
        });
    }

    fn context_property(&self, path: &str, name: &str, value: PropValue) {
        self.event(BusEvent::PropertyChanged {
            path: path.to_string(),
            interface: iface::CONN_CONTEXT,
            name: name.to_string(),
            value,
        });
    }

    fn drained_notifications(&mut self) -> Vec<Notification> {
        let mut drained = Vec::new();
        while let Ok(notification) = self.notifications.try_recv() {
            drained.push(notification);
        }
        drained
    }

    async fn current_calls(&mut self, token: u64) -> Vec<CallRecord> {
        match self.request(token, Request::GetCurrentCalls).await.result {
            Ok(ResponsePayload::Calls { calls }) => calls,
            other => panic!("unexpected call list answer: {other:?}"),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn mobile_originated_call_keeps_its_origination_through_the_added_event() {
    let bus = registered_bus();
    bus.script_call("Dial", Ok(vec!["/modem0/voicecall01".into()]));
    let mut harness = Harness::spawn(bus).await;

    let response = harness
        .request(
            1,
            Request::Dial { address: "+15551234567".into(), clir: ClirMode::Default },
        )
        .await;
    assert_eq!(response.token, RequestToken(1));
    assert_eq!(response.result, Ok(ResponsePayload::Ack));

    // The added event carries DIALING with no origination marker; the
    // provisional bag from the dial answer supplies it.
    harness.call_added("/modem0/voicecall01", bag_from([("State", "dialing".into())]));
    settle().await;

    let calls = harness.current_calls(2).await;
    assert_eq!(
        calls,
        vec![CallRecord {
            index: 1,
            state: CallState::Dialing,
            mobile_terminated: false,
            number: "+15551234567".into(),
            number_presentation: Presentation::Allowed,
            name: String::new(),
            name_presentation: Presentation::Unknown,
        }]
    );

    past_debounce_window().await;
    assert!(harness
        .drained_notifications()
        .contains(&Notification::CallStateChanged));
}

#[tokio::test(start_paused = true)]
async fn terminated_call_reported_as_dialing_is_normalized_to_incoming() {
    let mut harness = Harness::spawn(registered_bus()).await;

    harness.call_added(
        "/modem0/voicecall01",
        bag_from([("State", "dialing".into()), ("LineIdentification", "+15550001111".into())]),
    );
    settle().await;

    let calls = harness.current_calls(1).await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].state, CallState::Incoming);
    assert!(calls[0].mobile_terminated);
}

#[tokio::test(start_paused = true)]
async fn incoming_call_is_answered_then_hung_up_by_index() {
    let mut harness = Harness::spawn(registered_bus()).await;

    harness.call_added(
        "/modem0/voicecall01",
        bag_from([("State", "incoming".into()), ("LineIdentification", "+15550001111".into())]),
    );
    settle().await;

    let answered = harness.request(1, Request::AnswerIncoming).await;
    assert_eq!(answered.result, Ok(ResponsePayload::Ack));
    assert_eq!(harness.bus.recorded_calls("Answer").len(), 1);
    assert_eq!(harness.bus.recorded_calls("Answer")[0].path, "/modem0/voicecall01");

    let hung_up = harness.request(2, Request::Hangup { index: 1 }).await;
    assert_eq!(hung_up.result, Ok(ResponsePayload::Ack));
    assert_eq!(harness.bus.recorded_calls("Hangup")[0].path, "/modem0/voicecall01");

    harness.event(BusEvent::EntityRemoved {
        path: "/modem0/voicecall01".into(),
        interface: iface::CALL,
    });
    settle().await;
    assert!(harness.current_calls(3).await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn hangup_of_unknown_index_is_no_such_element() {
    let mut harness = Harness::spawn(registered_bus()).await;
    let response = harness.request(1, Request::Hangup { index: 4 }).await;
    assert_eq!(response.result, Err(BridgeError::NoSuchElement));
}

#[tokio::test(start_paused = true)]
async fn bulk_hangup_succeeds_when_at_least_one_attempt_lands() {
    let bus = registered_bus();
    // First hangup attempt fails, the second goes through.
    bus.script_call("Hangup", Err(telbridge_bus::BusError::failed("busy")));
    let mut harness = Harness::spawn(bus).await;

    harness.call_added("/modem0/voicecall01", bag_from([("State", "held".into())]));
    harness.call_added("/modem0/voicecall02", bag_from([("State", "waiting".into())]));
    settle().await;

    let response = harness.request(1, Request::HangupWaitingOrBackground).await;
    assert_eq!(response.result, Ok(ResponsePayload::Ack));
    assert_eq!(harness.bus.recorded_calls("Hangup").len(), 2);
}

#[tokio::test(start_paused = true)]
async fn bulk_hangup_with_no_eligible_calls_is_no_such_element() {
    let mut harness = Harness::spawn(registered_bus()).await;
    harness.call_added("/modem0/voicecall01", bag_from([("State", "active".into())]));
    settle().await;

    let response = harness.request(1, Request::HangupWaitingOrBackground).await;
    assert_eq!(response.result, Err(BridgeError::NoSuchElement));
    assert!(harness.bus.recorded_calls("Hangup").is_empty());
}

#[tokio::test(start_paused = true)]
async fn data_call_setup_and_activation_configure_the_interface() {
    let bus = registered_bus();
    bus.script_call("AddContext", Ok(vec!["/modem0/context1".into()]));
    let mut harness = Harness::spawn(bus).await;

    let response = harness
        .request(
            1,
            Request::SetupDataCall {
                tech: TechClass::Gsm,
                apn: ApnSettings { apn: "internet".into(), ..ApnSettings::default() },
            },
        )
        .await;
    let call = match response.result {
        Ok(ResponsePayload::DataCall { call }) => call,
        other => panic!("unexpected setup answer: {other:?}"),
    };
    assert_eq!(call.cid, 1);
    assert!(!call.active);

    let sets = harness.bus.property_sets.lock().expect("sets");
    assert!(sets
        .iter()
        .any(|set| set.name == "AccessPointName" && set.value == PropValue::Str("internet".into())));
    assert!(sets.iter().any(|set| set.name == "Active" && set.value == PropValue::Bool(true)));
    drop(sets);

    // Activation confirmed by the upstream property pair.
    harness.context_property(
        "/modem0/context1",
        "Settings",
        PropValue::Bag(bag_from([
            ("Interface", "rmnet0".into()),
            ("Address", "10.0.0.5/24".into()),
            ("Gateway", "10.0.0.1".into()),
            ("DomainNameServers", PropValue::StrList(vec!["8.8.8.8".into()])),
        ])),
    );
    harness.context_property("/modem0/context1", "Active", true.into());
    settle().await;

    let ops = harness.netif.recorded();
    assert!(ops.contains(&NetIfOp::BringUp { ifname: "rmnet0".into() }));
    assert!(ops.contains(&NetIfOp::AddAddress {
        ifname: "rmnet0".into(),
        address: "10.0.0.5".into(),
        prefix: 24,
    }));
    assert!(ops.contains(&NetIfOp::SetGateway {
        ifname: "rmnet0".into(),
        gateway: "10.0.0.1".into(),
    }));

    let listed = harness.request(2, Request::DataCallList).await;
    match listed.result {
        Ok(ResponsePayload::DataCalls { calls }) => {
            assert_eq!(calls.len(), 1);
            assert!(calls[0].active);
            assert_eq!(calls[0].ifname, "rmnet0");
        }
        other => panic!("unexpected list answer: {other:?}"),
    }

    let deactivated = harness
        .request(3, Request::DeactivateDataCall { cid: 1, reason: DeactivateReason::Normal })
        .await;
    assert_eq!(deactivated.result, Ok(ResponsePayload::Ack));

    harness.context_property("/modem0/context1", "Active", false.into());
    settle().await;
    let ops = harness.netif.recorded();
    assert!(ops.contains(&NetIfOp::ClearAddresses { ifname: "rmnet0".into() }));
    assert!(ops.contains(&NetIfOp::BringDown { ifname: "rmnet0".into() }));
}

#[tokio::test(start_paused = true)]
async fn setup_for_the_wrong_technology_family_is_rejected() {
    let mut harness = Harness::spawn(registered_bus()).await;
    let response = harness
        .request(
            1,
            Request::SetupDataCall {
                tech: TechClass::Cdma,
                apn: ApnSettings { apn: "internet".into(), ..ApnSettings::default() },
            },
        )
        .await;
    assert_eq!(response.result, Err(BridgeError::ModeNotSupported));
    assert!(harness.bus.recorded_calls("AddContext").is_empty());
}

#[tokio::test(start_paused = true)]
async fn radio_going_offline_resets_calls_and_data_connections() {
    let bus = registered_bus();
    bus.script_call("AddContext", Ok(vec!["/modem0/context1".into()]));
    let mut harness = Harness::spawn(bus).await;

    harness.call_added("/modem0/voicecall01", bag_from([("State", "active".into())]));
    harness
        .request(
            1,
            Request::SetupDataCall {
                tech: TechClass::Gsm,
                apn: ApnSettings { apn: "internet".into(), ..ApnSettings::default() },
            },
        )
        .await;
    harness.context_property(
        "/modem0/context1",
        "Settings",
        PropValue::Bag(bag_from([
            ("Interface", "rmnet0".into()),
            ("Address", "10.0.0.5/24".into()),
        ])),
    );
    harness.context_property("/modem0/context1", "Active", true.into());
    settle().await;
    past_debounce_window().await;
    harness.drained_notifications();

    harness.event(BusEvent::PropertyChanged {
        path: MODEM.into(),
        interface: iface::MODEM,
        name: "Online".into(),
        value: false.into(),
    });
    settle().await;

    assert!(harness.current_calls(2).await.is_empty());
    match harness.request(3, Request::DataCallList).await.result {
        Ok(ResponsePayload::DataCalls { calls }) => assert!(calls.is_empty()),
        other => panic!("unexpected list answer: {other:?}"),
    }
    match harness.request(4, Request::GetRadioState).await.result {
        Ok(ResponsePayload::Radio { state }) => assert_eq!(state, RadioState::Off),
        other => panic!("unexpected radio answer: {other:?}"),
    }
    // The configured interface is torn down with the last-known name.
    assert!(harness.netif.recorded().contains(&NetIfOp::BringDown { ifname: "rmnet0".into() }));

    past_debounce_window().await;
    let notifications = harness.drained_notifications();
    assert!(notifications.contains(&Notification::CallStateChanged));
    assert!(notifications.contains(&Notification::DataCallListChanged));
    assert!(notifications.contains(&Notification::NetworkStateChanged));
}

#[tokio::test(start_paused = true)]
async fn rapid_property_changes_coalesce_into_one_notification() {
    let mut harness = Harness::spawn(registered_bus()).await;

    for strength in [10i64, 20, 30] {
        harness.event(BusEvent::PropertyChanged {
            path: MODEM.into(),
            interface: iface::NETWORK,
            name: "Strength".into(),
            value: strength.into(),
        });
    }
    settle().await;
    past_debounce_window().await;

    let network_changes = harness
        .drained_notifications()
        .into_iter()
        .filter(|notification| *notification == Notification::NetworkStateChanged)
        .count();
    assert_eq!(network_changes, 1);
}

#[tokio::test(start_paused = true)]
async fn call_state_churn_coalesces_into_one_notification() {
    let mut harness = Harness::spawn(registered_bus()).await;

    harness.call_added("/modem0/voicecall01", bag_from([("State", "active".into())]));
    past_debounce_window().await;
    harness.drained_notifications();

    for state in ["held", "active", "held"] {
        harness.call_property("/modem0/voicecall01", "State", state.into());
    }
    settle().await;
    past_debounce_window().await;

    let call_changes = harness
        .drained_notifications()
        .into_iter()
        .filter(|notification| *notification == Notification::CallStateChanged)
        .count();
    assert_eq!(call_changes, 1);

    let calls = harness.current_calls(1).await;
    assert_eq!(calls[0].state, CallState::Held);
}

#[tokio::test(start_paused = true)]
async fn cancelled_request_gets_no_response() {
    let mut harness = Harness::spawn(registered_bus()).await;

    harness.handle.submit(RequestToken(7), Request::GetCurrentCalls);
    harness.handle.cancel_request(RequestToken(7));
    settle().await;

    let response = harness.request(8, Request::GetCurrentCalls).await;
    assert_eq!(response.token, RequestToken(8));
    assert!(harness.responses.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn legacy_operations_answer_not_supported_without_the_domain_hop() {
    let mut harness = Harness::spawn(registered_bus()).await;
    let response =
        harness.request(1, Request::Legacy { name: "GET_NEIGHBORING_CELL_IDS".into() }).await;
    assert_eq!(response.result, Err(BridgeError::RequestNotSupported));
}

#[tokio::test(start_paused = true)]
async fn sim_status_and_imsi_come_from_the_mirror() {
    let mut harness = Harness::spawn(registered_bus()).await;

    match harness.request(1, Request::GetSimStatus).await.result {
        Ok(ResponsePayload::Sim { status }) => {
            assert!(status.present);
            assert_eq!(status.pin_state, SimPinState::Ready);
        }
        other => panic!("unexpected sim answer: {other:?}"),
    }
    assert_eq!(
        harness.request(2, Request::GetImsi).await.result,
        Ok(ResponsePayload::Imsi { imsi: "001010123456789".into() })
    );
}

#[tokio::test(start_paused = true)]
async fn incoming_message_signal_is_forwarded_immediately() {
    let mut harness = Harness::spawn(registered_bus()).await;

    harness.event(BusEvent::Signal {
        path: MODEM.into(),
        interface: iface::MESSAGES,
        name: "IncomingMessage".into(),
        args: vec!["ping".into(), PropValue::Bag(bag_from([("Sender", "+15550001111".into())]))],
    });
    settle().await;

    assert_eq!(
        harness.drained_notifications(),
        vec![Notification::IncomingSms { sender: "+15550001111".into(), text: "ping".into() }]
    );
}

#[tokio::test(start_paused = true)]
async fn clir_round_trip_through_the_call_settings_mirror() {
    let mut harness = Harness::spawn(registered_bus()).await;

    assert_eq!(
        harness.request(1, Request::QueryClir).await.result,
        Ok(ResponsePayload::Clir { mode: ClirMode::Default })
    );

    let set = harness.request(2, Request::SetClir { mode: ClirMode::Invocation }).await;
    assert_eq!(set.result, Ok(ResponsePayload::Ack));
    let sets = harness.bus.property_sets.lock().expect("sets");
    assert!(sets
        .iter()
        .any(|set| set.name == "HiddenCallerId" && set.value == PropValue::Str("enabled".into())));
}

#[tokio::test(start_paused = true)]
async fn radio_power_request_drives_the_online_property() {
    let mut harness = Harness::spawn(registered_bus()).await;

    let response = harness.request(1, Request::SetRadioPower { on: false }).await;
    assert_eq!(response.result, Ok(ResponsePayload::Ack));
    let sets = harness.bus.property_sets.lock().expect("sets");
    assert!(sets
        .iter()
        .any(|set| set.interface == iface::MODEM
            && set.name == "Online"
            && set.value == PropValue::Bool(false)));
}
