//! Reconnect pacing for the event subscription.
//!
//! A session only counts as healthy once it has stayed open for
//! `stable_after`. Sessions that drop sooner keep growing the delay, and
//! the resync owed after a disconnect waits for a healthy session, so a
//! subscription that is accepted and closed in a tight loop neither
//! hammers the API nor re-runs the notify command.

use std::time::Duration;

use rand::Rng;

/// Delay and stability settings for reconnecting.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnect after a healthy session.
    pub initial: Duration,

    /// Upper bound on any delay.
    pub max: Duration,

    /// Fraction of the delay drawn as random spread in both directions.
    pub jitter: f64,

    /// How long a session must stay open to reset the delay.
    pub stable_after: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(30),
            jitter: 0.25,
            stable_after: Duration::from_secs(10),
        }
    }
}

impl ReconnectPolicy {
    /// Delay after `failures` consecutive failed or short-lived sessions.
    pub fn delay(&self, failures: u32) -> Duration {
        let nominal = self
            .initial
            .saturating_mul(1u32 << failures.min(20))
            .min(self.max);

        let spread = self.jitter.clamp(0.0, 1.0);
        if spread == 0.0 || nominal.is_zero() {
            return nominal;
        }
        let factor = rand::rng().random_range((1.0 - spread)..=(1.0 + spread));
        nominal.mul_f64(factor).min(self.max)
    }
}

/// Reconnect bookkeeping carried across sessions.
#[derive(Debug, Default)]
pub struct ReconnectTracker {
    failures: u32,
    resync_owed: bool,
}

impl ReconnectTracker {
    /// A connect attempt failed before the handshake completed.
    pub fn connect_failed(&mut self) {
        self.failures = self.failures.saturating_add(1);
    }

    /// A subscribed session ended.
    pub fn session_ended(&mut self, stable: bool) {
        if stable {
            self.failures = 0;
        } else {
            self.failures = self.failures.saturating_add(1);
        }
        self.resync_owed = true;
    }

    /// Delay before the next connect attempt.
    pub fn next_delay(&self, policy: &ReconnectPolicy) -> Duration {
        policy.delay(self.failures.saturating_sub(1))
    }

    /// True once per disconnect; the caller resyncs when this returns true.
    pub fn take_resync(&mut self) -> bool {
        std::mem::take(&mut self.resync_owed)
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }
}
