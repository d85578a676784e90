use std::sync::Arc;
use telbridge_bus::{iface, Notification, PropValue, RemoteBus, ResponsePayload};

use super::OpResult;

/// Outgoing message submission and incoming message forwarding.
///
/// The bridge hands text and destination straight to the remote
/// message manager; PDU encoding and decoding live on the other side
/// of both boundaries.
pub struct SmsModule {
    bus: Arc<dyn RemoteBus>,
    modem_path: String,
}

impl SmsModule {
    pub fn new(bus: Arc<dyn RemoteBus>, modem_path: String) -> Self {
        Self { bus, modem_path }
    }

    pub async fn send(&self, destination: String, text: String) -> OpResult {
        self.bus
            .call(
                &self.modem_path,
                iface::MESSAGES,
                "SendMessage",
                vec![destination.into(), text.into()],
            )
            .await?;
        Ok(ResponsePayload::Ack)
    }

    /// Map an incoming-message signal to its downstream notification.
    /// Signals carry `(text, info-bag)` positionally; a malformed
    /// signal is logged and dropped, never fatal.
    pub fn handle_signal(&self, name: &str, args: &[PropValue]) -> Option<Notification> {
        if name != "IncomingMessage" {
            return None;
        }
        let text = args.first().and_then(PropValue::as_str);
        let sender = args
            .get(1)
            .and_then(PropValue::as_bag)
            .and_then(|info| info.get("Sender"))
            .and_then(PropValue::as_str);
        match (text, sender) {
            (Some(text), Some(sender)) => Some(Notification::IncomingSms {
                sender: sender.to_string(),
                text: text.to_string(),
            }),
            _ => {
                log::warn!("malformed IncomingMessage signal; dropped");
                None
            }
        }
    }
}
