//! Liveness supervisor.
//!
//! After `interval` of silence one probe goes out; if nothing at all has
//! arrived by `grace` after the last traffic, the peer is declared dead.
//! Any inbound frame counts as an answer, not just a ping response.

/// What the connection should do this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepaliveAction {
    Idle,
    SendPing,
    Expired,
}

#[derive(Debug, Clone)]
pub struct Keepalive {
    interval_ms: u64,
    grace_ms: u64,
    last_traffic: u64,
    probe_pending: bool,
}

impl Keepalive {
    pub fn new(interval_ms: u64, grace_ms: u64, now_ms: u64) -> Self {
        Self {
            interval_ms,
            grace_ms,
            last_traffic: now_ms,
            probe_pending: false,
        }
    }

    /// Record inbound traffic.
    pub fn on_traffic(&mut self, now_ms: u64) {
        self.last_traffic = now_ms;
        self.probe_pending = false;
    }

    /// Decide this tick's action. A returned `SendPing` marks the probe
    /// pending whether or not the caller manages to send it.
    pub fn poll(&mut self, now_ms: u64) -> KeepaliveAction {
        let silent = now_ms.saturating_sub(self.last_traffic);
        if self.probe_pending {
            if silent >= self.grace_ms {
                return KeepaliveAction::Expired;
            }
            return KeepaliveAction::Idle;
        }
        if silent >= self.interval_ms {
            self.probe_pending = true;
            return KeepaliveAction::SendPing;
        }
        KeepaliveAction::Idle
    }

    pub fn probe_pending(&self) -> bool {
        self.probe_pending
    }

    pub fn last_traffic(&self) -> u64 {
        self.last_traffic
    }
}
