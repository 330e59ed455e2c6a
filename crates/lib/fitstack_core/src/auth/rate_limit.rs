//! IP-based abuse throttling.
//!
//! Counts failed attempts per `(caller address, endpoint class)` and locks
//! the key out once the class threshold is reached. Per spec'd behavior of
//! the lockout window: it is computed once when the threshold is crossed
//! and is not extended by further failures while the lock is active.
//!
//! The store is an in-process concurrent map injected through shared state
//! (`Arc<RateLimiter>`); updates go through the map's entry API so the
//! increment-compare-lock sequence is atomic per key.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::warn;

/// Sweep interval for the background stale-entry task.
const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Classes of throttled endpoints.
///
/// Brute-force risk and legitimate retry frequency differ sharply per
/// endpoint: refresh happens automatically and often, registration abuse is
/// cheap to throttle hard.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EndpointClass {
    Login,
    Register,
    Refresh,
    General,
}

/// Threshold and lockout window for one endpoint class.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RatePolicy {
    /// Failures at which the key locks out.
    pub max_attempts: u32,
    /// How long the key stays locked.
    pub lockout: Duration,
}

/// Policy lookup table, one entry per endpoint class.
///
/// Kept as data rather than branching logic so adding a class is a table
/// change.
#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    entries: Vec<(EndpointClass, RatePolicy)>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            entries: vec![
                (
                    EndpointClass::Login,
                    RatePolicy {
                        max_attempts: 5,
                        lockout: Duration::from_secs(15 * 60),
                    },
                ),
                (
                    EndpointClass::Register,
                    RatePolicy {
                        max_attempts: 3,
                        lockout: Duration::from_secs(60 * 60),
                    },
                ),
                (
                    EndpointClass::Refresh,
                    RatePolicy {
                        max_attempts: 10,
                        lockout: Duration::from_secs(5 * 60),
                    },
                ),
                (
                    EndpointClass::General,
                    RatePolicy {
                        max_attempts: 100,
                        lockout: Duration::from_secs(60),
                    },
                ),
            ],
        }
    }
}

impl RateLimitConfig {
    /// Policy for a class. Every class has a table entry; the table is
    /// total by construction.
    pub fn policy(&self, class: EndpointClass) -> RatePolicy {
        self.entries
            .iter()
            .find(|(c, _)| *c == class)
            .map(|(_, p)| *p)
            .unwrap_or(RatePolicy {
                max_attempts: 100,
                lockout: Duration::from_secs(60),
            })
    }

    /// Override the policy for a class (configuration surface).
    pub fn set_policy(&mut self, class: EndpointClass, policy: RatePolicy) {
        match self.entries.iter_mut().find(|(c, _)| *c == class) {
            Some(entry) => entry.1 = policy,
            None => self.entries.push((class, policy)),
        }
    }
}

#[derive(Debug)]
struct AttemptRecord {
    failed_attempts: u32,
    locked_until: Option<Instant>,
    last_activity: Instant,
}

/// Per-(address, endpoint-class) failure counter with lockout.
pub struct RateLimiter {
    config: RateLimitConfig,
    records: DashMap<(String, EndpointClass), AttemptRecord>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            records: DashMap::new(),
        }
    }

    fn key(address: &str, class: EndpointClass) -> (String, EndpointClass) {
        (address.to_string(), class)
    }

    /// Whether an unexpired lockout is active for this key.
    pub fn is_blocked(&self, address: &str, class: EndpointClass) -> bool {
        self.records
            .get(&Self::key(address, class))
            .and_then(|r| r.locked_until)
            .is_some_and(|until| until > Instant::now())
    }

    /// Record a failed attempt; locks the key out when the class threshold
    /// is reached.
    ///
    /// While a lockout is already active the counter still increments but
    /// the window is not extended.
    pub fn record_failure(&self, address: &str, class: EndpointClass) {
        let policy = self.config.policy(class);
        let now = Instant::now();

        let mut entry = self
            .records
            .entry(Self::key(address, class))
            .or_insert_with(|| AttemptRecord {
                failed_attempts: 0,
                locked_until: None,
                last_activity: now,
            });

        entry.failed_attempts += 1;
        entry.last_activity = now;

        let already_locked = entry.locked_until.is_some_and(|until| until > now);
        if !already_locked && entry.failed_attempts >= policy.max_attempts {
            entry.locked_until = Some(now + policy.lockout);
            warn!(
                address,
                class = ?class,
                attempts = entry.failed_attempts,
                lockout_secs = policy.lockout.as_secs(),
                "address locked out"
            );
        }
    }

    /// Record a successful operation: clears both the counter and any
    /// lockout for this key.
    pub fn record_success(&self, address: &str, class: EndpointClass) {
        self.records.remove(&Self::key(address, class));
    }

    /// Seconds until the lockout lifts, or 0 when the key is not locked.
    pub fn remaining_lockout_secs(&self, address: &str, class: EndpointClass) -> u64 {
        self.records
            .get(&Self::key(address, class))
            .and_then(|r| r.locked_until)
            .map(|until| until.saturating_duration_since(Instant::now()).as_secs())
            .unwrap_or(0)
    }

    /// Current failure count for a key (monitoring).
    pub fn failed_attempts(&self, address: &str, class: EndpointClass) -> u32 {
        self.records
            .get(&Self::key(address, class))
            .map(|r| r.failed_attempts)
            .unwrap_or(0)
    }

    /// Drop entries with no active lock and no recent activity.
    ///
    /// "Recent" is twice the class lockout window, so a key that just
    /// failed a few times below threshold is still remembered for a while.
    pub fn sweep_stale(&self) {
        let now = Instant::now();
        self.records.retain(|(_, class), record| {
            if record.locked_until.is_some_and(|until| until > now) {
                return true;
            }
            let stale_after = self.config.policy(*class).lockout * 2;
            now.duration_since(record.last_activity) < stale_after
        });
    }

    /// Spawn a periodic stale-entry sweep.
    pub fn spawn_cleanup_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                limiter.sweep_stale();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> RateLimiter {
        RateLimiter::new(RateLimitConfig::default())
    }

    #[test]
    fn blocks_at_threshold_not_before() {
        let rl = limiter();
        for _ in 0..4 {
            rl.record_failure("1.2.3.4", EndpointClass::Login);
        }
        assert!(!rl.is_blocked("1.2.3.4", EndpointClass::Login));

        rl.record_failure("1.2.3.4", EndpointClass::Login);
        assert!(rl.is_blocked("1.2.3.4", EndpointClass::Login));
    }

    #[test]
    fn login_lockout_is_fifteen_minutes() {
        let rl = limiter();
        for _ in 0..5 {
            rl.record_failure("1.2.3.4", EndpointClass::Login);
        }
        let remaining = rl.remaining_lockout_secs("1.2.3.4", EndpointClass::Login);
        assert!((890..=900).contains(&remaining), "remaining={remaining}");
    }

    #[test]
    fn success_clears_counter_and_lockout() {
        let rl = limiter();
        for _ in 0..5 {
            rl.record_failure("1.2.3.4", EndpointClass::Login);
        }
        assert!(rl.is_blocked("1.2.3.4", EndpointClass::Login));

        rl.record_success("1.2.3.4", EndpointClass::Login);
        assert!(!rl.is_blocked("1.2.3.4", EndpointClass::Login));
        assert_eq!(rl.failed_attempts("1.2.3.4", EndpointClass::Login), 0);
        assert_eq!(rl.remaining_lockout_secs("1.2.3.4", EndpointClass::Login), 0);
    }

    #[test]
    fn failures_while_locked_do_not_extend_the_window() {
        let rl = limiter();
        for _ in 0..5 {
            rl.record_failure("1.2.3.4", EndpointClass::Login);
        }
        let before = rl.remaining_lockout_secs("1.2.3.4", EndpointClass::Login);

        rl.record_failure("1.2.3.4", EndpointClass::Login);
        let after = rl.remaining_lockout_secs("1.2.3.4", EndpointClass::Login);

        assert!(after <= before, "lockout extended: {before} -> {after}");
        assert_eq!(rl.failed_attempts("1.2.3.4", EndpointClass::Login), 6);
    }

    #[test]
    fn classes_are_isolated_per_address() {
        let rl = limiter();
        for _ in 0..5 {
            rl.record_failure("1.2.3.4", EndpointClass::Login);
        }
        assert!(rl.is_blocked("1.2.3.4", EndpointClass::Login));
        assert!(!rl.is_blocked("1.2.3.4", EndpointClass::Refresh));
        assert!(!rl.is_blocked("5.6.7.8", EndpointClass::Login));
    }

    #[test]
    fn register_threshold_is_stricter() {
        let rl = limiter();
        for _ in 0..3 {
            rl.record_failure("1.2.3.4", EndpointClass::Register);
        }
        assert!(rl.is_blocked("1.2.3.4", EndpointClass::Register));
        let remaining = rl.remaining_lockout_secs("1.2.3.4", EndpointClass::Register);
        assert!(remaining > 3500, "remaining={remaining}");
    }

    #[test]
    fn default_policy_table_matches_spec() {
        let config = RateLimitConfig::default();
        assert_eq!(config.policy(EndpointClass::Login).max_attempts, 5);
        assert_eq!(config.policy(EndpointClass::Register).max_attempts, 3);
        assert_eq!(config.policy(EndpointClass::Refresh).max_attempts, 10);
        assert_eq!(config.policy(EndpointClass::General).max_attempts, 100);
    }

    #[test]
    fn policy_override_is_a_data_change() {
        let mut config = RateLimitConfig::default();
        config.set_policy(
            EndpointClass::Login,
            RatePolicy {
                max_attempts: 2,
                lockout: Duration::from_secs(30),
            },
        );
        let rl = RateLimiter::new(config);
        rl.record_failure("9.9.9.9", EndpointClass::Login);
        assert!(!rl.is_blocked("9.9.9.9", EndpointClass::Login));
        rl.record_failure("9.9.9.9", EndpointClass::Login);
        assert!(rl.is_blocked("9.9.9.9", EndpointClass::Login));
    }

    #[test]
    fn sweep_keeps_locked_keys() {
        let rl = limiter();
        for _ in 0..5 {
            rl.record_failure("1.2.3.4", EndpointClass::Login);
        }
        rl.record_failure("5.6.7.8", EndpointClass::Login);

        rl.sweep_stale();
        // Both keys are recent; the locked one must survive regardless.
        assert!(rl.is_blocked("1.2.3.4", EndpointClass::Login));
        assert_eq!(rl.failed_attempts("5.6.7.8", EndpointClass::Login), 1);
    }
}
