//! Loopback harness for the bridge: a JSON-lines request surface on
//! stdin/stdout against an in-memory upstream. The real bus and radio
//! transports plug in at the [`telbridge_bus`] traits; this binary
//! exists to exercise the session end to end during development.
//!
//! Input lines: `{"token": 1, "op": "dial", "address": "...", "clir":
//! "default"}` or `{"cancel": 1}`. Responses and notifications come
//! back one JSON object per line.

use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc::unbounded_channel;

use async_trait::async_trait;
use telbridge_bus::{
    iface, BusError, FakeBus, NetIfControl, Notification, NotificationSink, Request, RequestToken,
    Response, ResponseSink,
};
use telbridge_core::bag_from;
use telbridge_daemon::{BridgeConfig, Session};

#[derive(Parser, Debug)]
#[command(name = "telbridged")]
struct Args {
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the modem object path from the config file.
    #[arg(long)]
    modem_path: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum InputLine {
    Cancel {
        cancel: u64,
    },
    Request {
        token: u64,
        #[serde(flatten)]
        request: Request,
    },
}

/// Writes responses and notifications as JSON lines on stdout.
struct JsonLineSink;

#[async_trait]
impl ResponseSink for JsonLineSink {
    async fn deliver(&self, response: Response) {
        match serde_json::to_string(&response) {
            Ok(line) => println!("{line}"),
            Err(err) => log::error!("unserializable response: {err}"),
        }
    }
}

#[async_trait]
impl NotificationSink for JsonLineSink {
    async fn notify(&self, notification: Notification) {
        match serde_json::to_string(&notification) {
            Ok(line) => println!("{line}"),
            Err(err) => log::error!("unserializable notification: {err}"),
        }
    }
}

/// Interface control that only logs. The harness has no interfaces to
/// configure; failures here never reach it anyway.
struct LogNetIf;

#[async_trait]
impl NetIfControl for LogNetIf {
    async fn bring_up(&self, ifname: &str) -> Result<(), BusError> {
        log::info!("netif: bring up {ifname}");
        Ok(())
    }

    async fn bring_down(&self, ifname: &str) -> Result<(), BusError> {
        log::info!("netif: bring down {ifname}");
        Ok(())
    }

    async fn add_address(&self, ifname: &str, address: &str, prefix: u8) -> Result<(), BusError> {
        log::info!("netif: {ifname} addr {address}/{prefix}");
        Ok(())
    }

    async fn clear_addresses(&self, ifname: &str) -> Result<(), BusError> {
        log::info!("netif: {ifname} clear addresses");
        Ok(())
    }

    async fn set_gateway(&self, ifname: &str, gateway: &str) -> Result<(), BusError> {
        log::info!("netif: {ifname} gateway {gateway}");
        Ok(())
    }

    async fn set_mtu(&self, ifname: &str, mtu: u32) -> Result<(), BusError> {
        log::info!("netif: {ifname} mtu {mtu}");
        Ok(())
    }
}

fn load_config(args: &Args) -> BridgeConfig {
    let mut config = match args.config.as_ref() {
        Some(path) => match BridgeConfig::from_path(path) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("failed to load config {}: {err}; using defaults", path.display());
                BridgeConfig::default()
            }
        },
        None => BridgeConfig::default(),
    };
    if let Some(path) = args.modem_path.clone() {
        config.modem_path = path;
    }
    config
}

/// A plausible registered modem so every operation has something to
/// answer with.
fn seeded_bus(config: &BridgeConfig) -> FakeBus {
    let bus = FakeBus::new();
    let path = config.modem_path.as_str();
    bus.seed_properties(
        path,
        iface::MODEM,
        bag_from([("Powered", true.into()), ("Online", true.into())]),
    );
    bus.seed_properties(
        path,
        iface::NETWORK,
        bag_from([
            ("Status", "registered".into()),
            ("Technology", "lte".into()),
            ("Strength", 60i64.into()),
        ]),
    );
    bus.seed_properties(
        path,
        iface::SIM,
        bag_from([
            ("Present", true.into()),
            ("PinRequired", "none".into()),
            ("SubscriberIdentity", "001010123456789".into()),
        ]),
    );
    bus.seed_properties(
        path,
        iface::CALL_SETTINGS,
        bag_from([("HiddenCallerId", "default".into())]),
    );
    for index in 1..=8 {
        bus.script_call("Dial", Ok(vec![format!("{path}/voicecall{index:02}").into()]));
        bus.script_call("AddContext", Ok(vec![format!("{path}/context{index}").into()]));
    }
    bus
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = load_config(&args);
    log::info!("bridging modem {}", config.modem_path);

    let bus = Arc::new(seeded_bus(&config));
    let sink = Arc::new(JsonLineSink);
    // Events would come from the bus transport; the harness has none,
    // but the sender must outlive the session or it shuts down.
    let (_event_tx, event_rx) = unbounded_channel();
    let handle =
        Session::spawn(bus, Arc::new(LogNetIf), sink.clone(), sink, event_rx, &config);

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = handle.closed() => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<InputLine>(&line) {
                        Ok(InputLine::Cancel { cancel }) => {
                            handle.cancel_request(RequestToken(cancel));
                        }
                        Ok(InputLine::Request { token, request }) => {
                            handle.submit(RequestToken(token), request);
                        }
                        Err(err) => log::warn!("unparseable input line: {err}"),
                    }
                }
                Ok(None) => {
                    handle.shutdown();
                    break;
                }
                Err(err) => {
                    log::error!("stdin read failed: {err}");
                    handle.shutdown();
                    break;
                }
            },
        }
    }
}
