use std::collections::HashMap;
use std::time::Instant;

/// Correlation record for one outstanding downstream request.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub token: u64,
    /// Entity module (or dispatcher) the request was routed to.
    pub origin: &'static str,
    pub issued_at: Instant,
    cancelled: bool,
}

/// Maps outstanding request tokens to their correlation records and
/// enforces at-most-one terminal completion per token.
///
/// An unanswered request is worse than a wrong answer (the downstream
/// caller has no timeout recovery path), and a second answer for the
/// same token is a programming error. The correlator is the single
/// cross-domain handoff point for request state: the session registers
/// and completes from the remote-call domain, cancellation arrives
/// from the caller's side.
#[derive(Debug, Default)]
pub struct RequestCorrelator {
    pending: HashMap<u64, PendingRequest>,
}

impl RequestCorrelator {
    pub fn new() -> Self {
        Self { pending: HashMap::new() }
    }

    /// Track a newly issued request. Registering a token that is
    /// already outstanding is a defect: loud in development, rejected
    /// (and the original record kept) in production.
    pub fn register(&mut self, token: u64, origin: &'static str) -> bool {
        if self.pending.contains_key(&token) {
            debug_assert!(false, "duplicate request token {token}");
            log::error!("duplicate registration for request token {token} ({origin})");
            return false;
        }
        self.pending.insert(
            token,
            PendingRequest { token, origin, issued_at: Instant::now(), cancelled: false },
        );
        true
    }

    /// Claim the single terminal completion for `token`.
    ///
    /// Returns the record exactly once per registered token. A second
    /// claim is detected and rejected; a claim for a cancelled token
    /// returns `None` so the late result is discarded rather than
    /// delivered to an abandoned request.
    pub fn complete(&mut self, token: u64) -> Option<PendingRequest> {
        match self.pending.remove(&token) {
            Some(record) if record.cancelled => {
                log::debug!("discarding late completion for cancelled token {token}");
                None
            }
            Some(record) => Some(record),
            None => {
                debug_assert!(false, "completion for unknown token {token}");
                log::error!("second or unknown completion for request token {token}");
                None
            }
        }
    }

    /// Best-effort cancel: the in-flight remote call is not aborted,
    /// the entry is only marked so its eventual completion is dropped.
    pub fn cancel(&mut self, token: u64) -> bool {
        match self.pending.get_mut(&token) {
            Some(record) => {
                record.cancelled = true;
                true
            }
            None => false,
        }
    }

    pub fn outstanding(&self) -> usize {
        self.pending.len()
    }
}
