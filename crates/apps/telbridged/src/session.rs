use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;

use telbridge_bus::{
    iface, BridgeError, BusEvent, DispatchMode, NetIfControl, Notification, NotificationSink,
    RemoteBus, Request, RequestToken, Response, ResponsePayload, ResponseSink,
};
use telbridge_core::{DebouncedSignal, RequestCorrelator};

use crate::config::BridgeConfig;
use crate::modules::call::CallModule;
use crate::modules::dataconn::DataConnModule;
use crate::modules::modem::ModemModule;
use crate::modules::sim::SimModule;
use crate::modules::sms::SmsModule;
use crate::modules::supplementary::SupplementaryModule;
use crate::modules::{NotifyKind, OpResult};

/// Work items of the remote-call domain, processed strictly in
/// arrival order.
enum Job {
    Request { token: RequestToken, request: Request },
}

/// Front door of the bridge: accepts downstream requests, hands them
/// to the remote-call domain, and exposes cancellation and shutdown.
///
/// Cloneable and cheap; the host transport keeps one per connection.
#[derive(Clone)]
pub struct SessionHandle {
    job_tx: UnboundedSender<Job>,
    completion_tx: UnboundedSender<Response>,
    correlator: Arc<Mutex<RequestCorrelator>>,
    cancel: CancellationToken,
}

impl SessionHandle {
    /// Accept one downstream request. Exactly one terminal response
    /// for `token` will eventually reach the response sink.
    pub fn submit(&self, token: RequestToken, request: Request) {
        let origin = request.name();
        {
            let Ok(mut correlator) = self.correlator.lock() else {
                return;
            };
            if !correlator.register(token.0, origin) {
                return;
            }
        }

        match request.dispatch_mode() {
            // Stateless operations skip the domain hand-off; the
            // dispatch table says which those are.
            DispatchMode::Inline => self.finish(token, inline_answer(&request)),
            DispatchMode::RemoteCall => {
                if self.job_tx.send(Job::Request { token, request }).is_err() {
                    log::warn!("remote-call domain gone; failing request {token}");
                    self.finish(token, Err(BridgeError::GenericFailure));
                }
            }
        }
    }

    /// Best-effort cancel: the in-flight remote call proceeds, only
    /// its completion is discarded.
    pub fn cancel_request(&self, token: RequestToken) {
        if let Ok(mut correlator) = self.correlator.lock() {
            correlator.cancel(token.0);
        }
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Resolves when the session has terminated (shutdown requested or
    /// fatal transport failure).
    pub async fn closed(&self) {
        self.cancel.cancelled().await;
    }

    fn finish(&self, token: RequestToken, result: Result<ResponsePayload, BridgeError>) {
        let released = self
            .correlator
            .lock()
            .ok()
            .and_then(|mut correlator| correlator.complete(token.0));
        if released.is_some() {
            let _ = self.completion_tx.send(Response { token, result });
        }
    }
}

fn inline_answer(request: &Request) -> Result<ResponsePayload, BridgeError> {
    match request {
        Request::Legacy { name } => {
            log::debug!("legacy operation {name} answered not-supported");
            Err(BridgeError::RequestNotSupported)
        }
        _ => Err(BridgeError::GenericFailure),
    }
}

/// The remote-call domain: owns the single remote-object tree handle,
/// every mirror, registry and entity module, and processes downstream
/// requests, upstream events and debounce firings on one serialized
/// task. The completion domain is a second task that only delivers
/// already-finalized results.
pub struct Session {
    modem: ModemModule,
    calls: CallModule,
    data: DataConnModule,
    sim: SimModule,
    sms: SmsModule,
    supplementary: SupplementaryModule,
    notification_sink: Arc<dyn NotificationSink>,
    completion_tx: UnboundedSender<Response>,
    correlator: Arc<Mutex<RequestCorrelator>>,
    cancel: CancellationToken,
}

impl Session {
    /// Construct the modules with their collaborators, spawn both
    /// domains, and return the handle. No global state: every module
    /// receives exactly the dependencies it needs.
    pub fn spawn(
        bus: Arc<dyn RemoteBus>,
        netif: Arc<dyn NetIfControl>,
        response_sink: Arc<dyn ResponseSink>,
        notification_sink: Arc<dyn NotificationSink>,
        events: UnboundedReceiver<BusEvent>,
        config: &BridgeConfig,
    ) -> SessionHandle {
        let window = config.debounce_window();
        let (notify_tx, notify_rx) = unbounded_channel();
        let debounce = DebouncedSignal::new(notify_tx);
        let (job_tx, job_rx) = unbounded_channel();
        let (completion_tx, completion_rx) = unbounded_channel();
        let correlator = Arc::new(Mutex::new(RequestCorrelator::new()));
        let cancel = CancellationToken::new();

        let modem_path = config.modem_path.clone();
        let session = Session {
            modem: ModemModule::new(bus.clone(), modem_path.clone(), debounce.clone(), window),
            calls: CallModule::new(
                bus.clone(),
                modem_path.clone(),
                config.call_slots,
                config.hangup_states(),
                debounce.clone(),
                window,
            ),
            data: DataConnModule::new(
                bus.clone(),
                netif,
                modem_path.clone(),
                debounce.clone(),
                window,
            ),
            sim: SimModule::new(bus.clone(), modem_path.clone(), debounce, window),
            sms: SmsModule::new(bus.clone(), modem_path.clone()),
            supplementary: SupplementaryModule::new(bus, modem_path),
            notification_sink,
            completion_tx: completion_tx.clone(),
            correlator: Arc::clone(&correlator),
            cancel: cancel.clone(),
        };

        tokio::spawn(completion_loop(completion_rx, response_sink, cancel.clone()));
        tokio::spawn(session.run(job_rx, events, notify_rx));

        SessionHandle { job_tx, completion_tx, correlator, cancel }
    }

    async fn run(
        mut self,
        mut job_rx: UnboundedReceiver<Job>,
        mut events: UnboundedReceiver<BusEvent>,
        mut notify_rx: UnboundedReceiver<NotifyKind>,
    ) {
        if let Err(err) = self.modem.init().await {
            log::error!("modem bulk fetch failed, session unusable: {err}");
            self.cancel.cancel();
            return;
        }
        // SIM and call-settings interfaces may be absent on this
        // modem; those features report unavailable instead of killing
        // the session.
        if let Err(err) = self.sim.init().await {
            log::warn!("sim bulk fetch failed: {err}");
        }
        if let Err(err) = self.supplementary.init().await {
            log::warn!("call-settings bulk fetch failed: {err}");
        }

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                job = job_rx.recv() => match job {
                    Some(job) => self.handle_job(job).await,
                    None => break,
                },
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => {
                        log::error!("upstream event stream closed; ending session");
                        self.cancel.cancel();
                        break;
                    }
                },
                kind = notify_rx.recv() => match kind {
                    Some(kind) => self.emit(kind).await,
                    None => break,
                },
            }
        }
        log::info!("remote-call domain stopped");
    }

    async fn handle_job(&mut self, job: Job) {
        match job {
            Job::Request { token, request } => {
                let name = request.name();
                let result = match self.dispatch(request).await {
                    Ok(payload) => Ok(payload),
                    Err(err) => {
                        // Every failure becomes a typed code; an
                        // unanswered request would leave the caller
                        // with no recovery path at all.
                        if err.is_fatal() {
                            log::error!("{name}: fatal bus failure: {:?}", err.code());
                            self.cancel.cancel();
                        } else {
                            log::debug!("{name} failed: {:?}", err.code());
                        }
                        Err(err.code())
                    }
                };

                let released = self
                    .correlator
                    .lock()
                    .ok()
                    .and_then(|mut correlator| correlator.complete(token.0));
                if released.is_some() {
                    let _ = self.completion_tx.send(Response { token, result });
                }
            }
        }
    }

    /// Explicit operation dispatch; each arm names the owning module.
    async fn dispatch(&mut self, request: Request) -> OpResult {
        match request {
            Request::GetCurrentCalls => {
                Ok(ResponsePayload::Calls { calls: self.calls.current_calls() })
            }
            Request::Dial { address, clir } => self.calls.dial(address, clir).await,
            Request::Hangup { index } => self.calls.hangup(index).await,
            Request::AnswerIncoming => self.calls.answer_incoming().await,
            Request::HangupWaitingOrBackground => {
                self.calls.hangup_waiting_or_background().await
            }
            Request::GetRadioState => {
                Ok(ResponsePayload::Radio { state: self.modem.radio_state() })
            }
            Request::SetRadioPower { on } => {
                self.modem.set_radio_power(on).await?;
                Ok(ResponsePayload::Ack)
            }
            Request::DataCallList => {
                Ok(ResponsePayload::DataCalls { calls: self.data.data_call_list() })
            }
            Request::SetupDataCall { tech, apn } => {
                let modem_class = self.modem.tech_class();
                self.data.setup_data_call(tech, apn, modem_class).await
            }
            Request::DeactivateDataCall { cid, reason } => {
                self.data.deactivate_data_call(cid, reason).await
            }
            Request::GetSimStatus => Ok(ResponsePayload::Sim { status: self.sim.sim_status() }),
            Request::GetImsi => Ok(ResponsePayload::Imsi { imsi: self.sim.imsi()? }),
            Request::SendSms { destination, text } => self.sms.send(destination, text).await,
            Request::QueryClir => self.supplementary.query_clir(),
            Request::SetClir { mode } => self.supplementary.set_clir(mode).await,
            Request::Legacy { .. } => Err(BridgeError::RequestNotSupported.into()),
        }
    }

    async fn handle_event(&mut self, event: BusEvent) {
        match event {
            BusEvent::PropertyChanged { path, interface, name, value } => match interface {
                iface::MODEM | iface::NETWORK | iface::CONN_MANAGER => {
                    if self.modem.handle_property(interface, &name, value) {
                        self.handle_modem_offline().await;
                    }
                }
                iface::CALL => self.calls.handle_property(&path, &name, value),
                iface::CONN_CONTEXT => self.data.handle_property(&path, &name, value).await,
                iface::SIM => self.sim.handle_property(&name, value),
                iface::CALL_SETTINGS => self.supplementary.handle_property(&name, value),
                other => log::debug!("ignoring property change on {other}"),
            },
            BusEvent::EntityAdded { path, interface, properties } => match interface {
                iface::CALL => self.calls.handle_added(&path, properties),
                iface::CONN_CONTEXT => self.data.handle_added(&path, properties).await,
                other => log::debug!("ignoring entity added on {other}"),
            },
            BusEvent::EntityRemoved { path, interface } => match interface {
                iface::CALL => self.calls.handle_removed(&path),
                iface::CONN_CONTEXT => self.data.handle_removed(&path).await,
                other => log::debug!("ignoring entity removed on {other}"),
            },
            BusEvent::Signal { interface, name, args, .. } => match interface {
                iface::MESSAGES => {
                    if let Some(notification) = self.sms.handle_signal(&name, &args) {
                        self.notification_sink.notify(notification).await;
                    }
                }
                other => log::debug!("ignoring signal {name} on {other}"),
            },
        }
    }

    /// The modem just went offline: every per-entity conclusion is now
    /// stale. Calls and contexts are dropped, their coalesced
    /// notifications fire once the window elapses.
    async fn handle_modem_offline(&mut self) {
        log::info!("modem went offline; resetting call and data state");
        self.calls.reset();
        self.data.reset().await;
    }

    async fn emit(&self, kind: NotifyKind) {
        let notification = match kind {
            NotifyKind::CallState => Notification::CallStateChanged,
            NotifyKind::DataCallList => Notification::DataCallListChanged,
            NotifyKind::NetworkState => Notification::NetworkStateChanged,
            NotifyKind::SimStatus => Notification::SimStatusChanged,
        };
        self.notification_sink.notify(notification).await;
    }
}

/// The completion domain: delivers finalized responses, never touches
/// shared state.
async fn completion_loop(
    mut completion_rx: UnboundedReceiver<Response>,
    response_sink: Arc<dyn ResponseSink>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            response = completion_rx.recv() => match response {
                Some(response) => response_sink.deliver(response).await,
                None => break,
            },
        }
    }
}
