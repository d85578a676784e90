use std::collections::HashSet;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

/// Coalesced delayed notifications, keyed by logical purpose.
///
/// Remote property churn arrives in bursts (several call properties
/// change in one state transition). The first `arm` of a burst
/// schedules exactly one firing `delay` later; re-arms for the same
/// purpose within the window are no-ops — they neither reset the
/// delay nor queue extra firings. Latency is therefore bounded by
/// `delay` even under continuous churn, and the downstream channel
/// sees at most one notification per burst.
///
/// Firings are messages on an mpsc channel the session drains in its
/// serialized notify path; the armed set is one of the two explicit
/// cross-domain locks in the bridge (the other is the correlator).
pub struct DebouncedSignal<K> {
    armed: Arc<Mutex<HashSet<K>>>,
    tx: UnboundedSender<K>,
}

impl<K> Clone for DebouncedSignal<K> {
    fn clone(&self) -> Self {
        Self { armed: Arc::clone(&self.armed), tx: self.tx.clone() }
    }
}

impl<K> DebouncedSignal<K>
where
    K: Clone + Eq + Hash + Send + 'static,
{
    /// Firings for every purpose are delivered through `tx`.
    pub fn new(tx: UnboundedSender<K>) -> Self {
        Self { armed: Arc::new(Mutex::new(HashSet::new())), tx }
    }

    /// Schedule `purpose` to fire once, `delay` from now, unless a
    /// firing for it is already pending.
    pub fn arm(&self, purpose: K, delay: Duration) {
        {
            let Ok(mut armed) = self.armed.lock() else {
                return;
            };
            if !armed.insert(purpose.clone()) {
                return;
            }
        }

        let armed = Arc::clone(&self.armed);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Ok(mut guard) = armed.lock() {
                guard.remove(&purpose);
            }
            // Receiver gone means the session is shutting down.
            let _ = tx.send(purpose);
        });
    }

    /// Whether a firing for `purpose` is currently pending.
    pub fn is_armed(&self, purpose: &K) -> bool {
        self.armed.lock().map(|armed| armed.contains(purpose)).unwrap_or(false)
    }
}
