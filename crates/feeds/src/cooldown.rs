//! Throttle cooldown state and backoff policies.
//!
//! All callers of one client share a single cooldown deadline: once the
//! upstream answers 429, nobody issues a request until the deadline passes.

use rand::Rng;
use std::time::{Duration, Instant};

/// Backoff policy applied on HTTP 429.
///
/// The wait is the server's `Retry-After` hint when present, otherwise an
/// exponential delay that doubles with the consecutive-throttle streak,
/// capped, with a small random jitter on top to avoid herd resync.
#[derive(Debug, Clone)]
pub struct ThrottlePolicy {
    base_delay: Duration,
    max_delay: Duration,
    max_jitter: Duration,
    jitter_enabled: bool,
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            max_jitter: Duration::from_millis(400),
            jitter_enabled: true,
        }
    }
}

impl ThrottlePolicy {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            ..Default::default()
        }
    }

    /// Disable jitter (for deterministic tests).
    pub fn without_jitter(mut self) -> Self {
        self.jitter_enabled = false;
        self
    }

    /// Delay for a given consecutive-throttle streak (1-based). A server
    /// hint replaces the exponential base but is still capped and jittered.
    pub fn delay_for(&self, streak: u32, retry_after: Option<Duration>) -> Duration {
        let base = match retry_after {
            Some(hint) => hint,
            None => {
                // Cap the shift so the multiplier cannot overflow.
                let power = streak.saturating_sub(1).min(8);
                self.base_delay.saturating_mul(1 << power)
            }
        };
        let capped = base.min(self.max_delay);
        if self.jitter_enabled {
            let jitter_ms = rand::thread_rng().gen_range(0..=self.max_jitter.as_millis() as u64);
            capped + Duration::from_millis(jitter_ms)
        } else {
            capped
        }
    }
}

/// Retry policy for transient request failures (timeouts, 5xx).
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before retrying after the given failed attempt (1-based):
    /// doubles per attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let power = attempt.saturating_sub(1).min(8);
        self.initial_delay.saturating_mul(1 << power)
    }
}

/// Shared cooldown across all callers of one client.
///
/// Owned by the client instance and guarded by its mutex; nothing here is
/// global.
#[derive(Debug, Default)]
pub struct CooldownState {
    until: Option<Instant>,
    streak: u32,
}

impl CooldownState {
    /// Time left until requests may resume, if a cooldown is active.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        match self.until {
            Some(until) if until > now => Some(until - now),
            _ => None,
        }
    }

    /// Record a throttling response and extend the shared deadline.
    /// Returns the wait that was applied.
    pub fn note_throttled(
        &mut self,
        policy: &ThrottlePolicy,
        retry_after: Option<Duration>,
        now: Instant,
    ) -> Duration {
        self.streak = self.streak.saturating_add(1);
        let wait = policy.delay_for(self.streak, retry_after);
        let until = now + wait;
        // Concurrent 429s only ever push the deadline out, never pull it in.
        if self.until.map_or(true, |current| until > current) {
            self.until = Some(until);
        }
        wait
    }

    /// A successful response resets the streak.
    pub fn note_success(&mut self) {
        self.streak = 0;
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }
}
