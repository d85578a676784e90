use serde::{Deserialize, Serialize};
use telbridge_core::{PropValue, PropertyBag};

/// Remote interface names of the upstream entity tree.
pub mod iface {
    pub const MODEM: &str = "org.ofono.Modem";
    pub const NETWORK: &str = "org.ofono.NetworkRegistration";
    pub const CALL_MANAGER: &str = "org.ofono.VoiceCallManager";
    pub const CALL: &str = "org.ofono.VoiceCall";
    pub const CONN_MANAGER: &str = "org.ofono.ConnectionManager";
    pub const CONN_CONTEXT: &str = "org.ofono.ConnectionContext";
    pub const SIM: &str = "org.ofono.SimManager";
    pub const MESSAGES: &str = "org.ofono.MessageManager";
    pub const CALL_SETTINGS: &str = "org.ofono.CallSettings";
}

/// Opaque downstream request token. Minted by the host transport; the
/// bridge only correlates it, never interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestToken(pub u64);

impl std::fmt::Display for RequestToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Downstream-visible call state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    Active,
    Held,
    Dialing,
    Alerting,
    Incoming,
    Waiting,
    Disconnected,
}

impl CallState {
    /// Parse the remote state string. Unknown strings yield `None`;
    /// the entity is then skipped with a warning, not crashed on.
    pub fn from_remote(state: &str) -> Option<Self> {
        match state {
            "active" => Some(Self::Active),
            "held" => Some(Self::Held),
            "dialing" => Some(Self::Dialing),
            "alerting" => Some(Self::Alerting),
            "incoming" => Some(Self::Incoming),
            "waiting" => Some(Self::Waiting),
            "disconnected" => Some(Self::Disconnected),
            _ => None,
        }
    }
}

/// Line/name presentation reported downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Presentation {
    Allowed,
    Restricted,
    Unknown,
}

/// Caller-id restriction policy for an outgoing dial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClirMode {
    Default,
    Invocation,
    Suppression,
}

impl ClirMode {
    pub fn to_remote(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Invocation => "enabled",
            Self::Suppression => "disabled",
        }
    }

    pub fn from_remote(value: &str) -> Option<Self> {
        match value {
            "default" => Some(Self::Default),
            "enabled" => Some(Self::Invocation),
            "disabled" => Some(Self::Suppression),
            _ => None,
        }
    }
}

/// Radio technology family. The bridge refuses to switch families on
/// behalf of a data-call setup; mismatches are a typed error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TechClass {
    Gsm,
    Cdma,
}

impl TechClass {
    /// Classify the remote bearer/technology string.
    pub fn from_bearer(bearer: &str) -> Option<Self> {
        match bearer {
            "gsm" | "gprs" | "edge" | "umts" | "hspa" | "hsupa" | "hsdpa" | "lte" => {
                Some(Self::Gsm)
            }
            "cdma" | "evdo" | "1xrtt" => Some(Self::Cdma),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RadioState {
    Off,
    On,
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeactivateReason {
    Normal,
    RadioShutdown,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApnSettings {
    pub apn: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub protocol: Option<String>,
}

/// One call as reported downstream. Derived on demand from the
/// mirrored property bag plus the stable slot handle; never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRecord {
    pub index: u32,
    pub state: CallState,
    /// Mobile-terminated (incoming) as opposed to locally dialed.
    pub mobile_terminated: bool,
    pub number: String,
    pub number_presentation: Presentation,
    pub name: String,
    pub name_presentation: Presentation,
}

/// One data connection as reported downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataCallRecord {
    pub cid: u32,
    pub active: bool,
    pub ifname: String,
    pub addresses: Vec<String>,
    pub gateways: Vec<String>,
    pub dns: Vec<String>,
    #[serde(default)]
    pub mtu: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimPinState {
    Ready,
    SimPin,
    SimPuk,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimStatus {
    pub present: bool,
    pub pin_state: SimPinState,
}

/// Whether an operation may be answered inline by the dispatcher or
/// must be handed off to the serialized remote-call domain.
///
/// This is a static property of the operation table, checked before
/// the hand-off — not a runtime annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    Inline,
    RemoteCall,
}

/// The downstream request surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    GetCurrentCalls,
    Dial { address: String, clir: ClirMode },
    Hangup { index: u32 },
    AnswerIncoming,
    HangupWaitingOrBackground,
    GetRadioState,
    SetRadioPower { on: bool },
    DataCallList,
    SetupDataCall { tech: TechClass, apn: ApnSettings },
    DeactivateDataCall { cid: u32, reason: DeactivateReason },
    GetSimStatus,
    GetImsi,
    SendSms { destination: String, text: String },
    QueryClir,
    SetClir { mode: ClirMode },
    /// Legacy pass-through operation the bridge does not implement.
    Legacy { name: String },
}

impl Request {
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetCurrentCalls => "get_current_calls",
            Self::Dial { .. } => "dial",
            Self::Hangup { .. } => "hangup",
            Self::AnswerIncoming => "answer_incoming",
            Self::HangupWaitingOrBackground => "hangup_waiting_or_background",
            Self::GetRadioState => "get_radio_state",
            Self::SetRadioPower { .. } => "set_radio_power",
            Self::DataCallList => "data_call_list",
            Self::SetupDataCall { .. } => "setup_data_call",
            Self::DeactivateDataCall { .. } => "deactivate_data_call",
            Self::GetSimStatus => "get_sim_status",
            Self::GetImsi => "get_imsi",
            Self::SendSms { .. } => "send_sms",
            Self::QueryClir => "query_clir",
            Self::SetClir { .. } => "set_clir",
            Self::Legacy { .. } => "legacy",
        }
    }

    /// Static dispatch table: only operations that touch no mirrored
    /// state may be answered without the domain hand-off.
    pub fn dispatch_mode(&self) -> DispatchMode {
        match self {
            Self::Legacy { .. } => DispatchMode::Inline,
            _ => DispatchMode::RemoteCall,
        }
    }
}

/// Success payloads of the downstream protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponsePayload {
    Ack,
    Calls { calls: Vec<CallRecord> },
    Radio { state: RadioState },
    DataCalls { calls: Vec<DataCallRecord> },
    DataCall { call: DataCallRecord },
    Sim { status: SimStatus },
    Imsi { imsi: String },
    Clir { mode: ClirMode },
}

/// The single terminal response for one request token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub token: RequestToken,
    pub result: Result<ResponsePayload, crate::error::BridgeError>,
}

/// Unsolicited downstream notifications, uncorrelated to any token.
/// Best-effort, coalesced by the debounce window, never duplicated for
/// one underlying transition within that window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    CallStateChanged,
    DataCallListChanged,
    NetworkStateChanged,
    SimStatusChanged,
    IncomingSms { sender: String, text: String },
}

/// Events emitted by the upstream remote-object tree.
#[derive(Debug, Clone, PartialEq)]
pub enum BusEvent {
    PropertyChanged { path: String, interface: &'static str, name: String, value: PropValue },
    EntityAdded { path: String, interface: &'static str, properties: PropertyBag },
    EntityRemoved { path: String, interface: &'static str },
    /// Non-property signal (e.g. an incoming message) with positional
    /// arguments.
    Signal { path: String, interface: &'static str, name: String, args: Vec<PropValue> },
}
