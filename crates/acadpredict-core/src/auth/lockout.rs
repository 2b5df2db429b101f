//! Login lockout after repeated failures.
//!
//! Three consecutive bad-credential failures lock login attempts for five
//! minutes. Both the failure count and the unlock instant are persisted,
//! and whether the tracker is locked is always derived from the stored
//! unlock instant and the current time.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::notify::{NotificationKind, NotificationQueue};
use crate::storage::{keys, Storage, Write};

/// Consecutive failures that engage the lock
pub const MAX_FAILED_ATTEMPTS: u32 = 3;

/// How long the lock lasts once engaged
pub const LOCKOUT_MINUTES: i64 = 5;

/// How often a countdown re-evaluates the lock
const COUNTDOWN_TICK_SECS: u64 = 1;

/// Persisted lockout counters. `locked_until` is Unix milliseconds, `0`
/// when no lock was ever engaged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockoutState {
    pub failed_attempts: u32,
    pub locked_until: i64,
}

impl LockoutState {
    pub fn is_locked_at(&self, now: DateTime<Utc>) -> bool {
        self.locked_until > now.timestamp_millis()
    }

    /// `max(0, locked_until - now)`
    pub fn remaining_at(&self, now: DateTime<Utc>) -> Duration {
        Duration::milliseconds(
            self.locked_until
                .saturating_sub(now.timestamp_millis())
                .max(0),
        )
    }

    /// A lock was engaged and its instant has passed
    fn has_elapsed_at(&self, now: DateTime<Utc>) -> bool {
        self.locked_until != 0 && !self.is_locked_at(now)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStatus {
    Open {
        failed_attempts: u32,
        attempts_left: u32,
    },
    Locked {
        until: DateTime<Utc>,
        remaining: Duration,
    },
}

impl LockStatus {
    pub fn is_locked(&self) -> bool {
        matches!(self, LockStatus::Locked { .. })
    }
}

pub struct LockoutTracker {
    storage: Arc<Storage>,
    clock: Arc<dyn Clock>,
    notifications: Option<NotificationQueue>,
}

impl LockoutTracker {
    pub fn new(storage: Arc<Storage>, clock: Arc<dyn Clock>) -> Self {
        Self {
            storage,
            clock,
            notifications: None,
        }
    }

    /// Announce lifted locks on `queue`.
    pub fn with_notifications(mut self, queue: NotificationQueue) -> Self {
        self.notifications = Some(queue);
        self
    }

    fn read_state(&self) -> LockoutState {
        let failed_attempts = match self.storage.get(keys::FAILED_ATTEMPTS) {
            Some(raw) => raw.parse::<u32>().unwrap_or_else(|e| {
                warn!(error = %e, "Unreadable failed attempt count, treating as 0");
                0
            }),
            None => 0,
        };
        let locked_until = match self.storage.get(keys::LOCK_UNTIL) {
            Some(raw) => raw.parse::<i64>().unwrap_or_else(|e| {
                warn!(error = %e, "Unreadable lock instant, treating as unlocked");
                0
            }),
            None => 0,
        };
        LockoutState {
            failed_attempts,
            locked_until,
        }
    }

    fn write_state(&self, state: LockoutState) {
        if state == LockoutState::default() {
            self.storage.apply(&[
                Write::remove(keys::FAILED_ATTEMPTS),
                Write::remove(keys::LOCK_UNTIL),
            ]);
        } else {
            self.storage.apply(&[
                Write::set(keys::FAILED_ATTEMPTS, state.failed_attempts.to_string()),
                Write::set(keys::LOCK_UNTIL, state.locked_until.to_string()),
            ]);
        }
    }

    /// Current counters. Observing a lock whose instant has passed, or a
    /// full failure count with no lock in force, resets them to zero.
    pub fn state(&self) -> LockoutState {
        let now = self.clock.now();
        let state = self.read_state();

        let lapsed = state.has_elapsed_at(now)
            || (state.failed_attempts >= MAX_FAILED_ATTEMPTS && !state.is_locked_at(now));
        if !lapsed {
            return state;
        }

        self.write_state(LockoutState::default());
        info!("Login lock lifted");
        if let Some(ref queue) = self.notifications {
            queue.push("Login lock lifted. You can try again.", NotificationKind::Info);
        }
        LockoutState::default()
    }

    pub fn status(&self) -> LockStatus {
        let state = self.state();
        let now = self.clock.now();
        Self::status_of(state, now)
    }

    fn status_of(state: LockoutState, now: DateTime<Utc>) -> LockStatus {
        if state.is_locked_at(now) {
            LockStatus::Locked {
                until: DateTime::from_timestamp_millis(state.locked_until).unwrap_or(now),
                remaining: state.remaining_at(now),
            }
        } else {
            LockStatus::Open {
                failed_attempts: state.failed_attempts,
                attempts_left: MAX_FAILED_ATTEMPTS.saturating_sub(state.failed_attempts),
            }
        }
    }

    /// Time left until attempts are allowed again
    pub fn remaining(&self) -> Duration {
        self.state().remaining_at(self.clock.now())
    }

    /// Count one bad-credential failure and return the resulting status.
    /// A failure recorded while locked leaves the lock untouched.
    pub fn record_failure(&self) -> LockStatus {
        let now = self.clock.now();
        let mut state = self.state();
        if state.is_locked_at(now) {
            warn!("Failure recorded while locked, ignoring");
            return Self::status_of(state, now);
        }

        state.failed_attempts += 1;
        if state.failed_attempts >= MAX_FAILED_ATTEMPTS {
            let until = now + Duration::minutes(LOCKOUT_MINUTES);
            state.locked_until = until.timestamp_millis();
            warn!(
                failed_attempts = state.failed_attempts,
                locked_until = %until,
                "Too many failed logins, locking"
            );
        } else {
            debug!(failed_attempts = state.failed_attempts, "Failed login recorded");
        }

        self.write_state(state);
        Self::status_of(state, now)
    }

    /// Reset counters after a successful login
    pub fn record_success(&self) {
        if self.read_state() != LockoutState::default() {
            debug!("Resetting failed login count");
        }
        self.write_state(LockoutState::default());
    }

    /// Re-evaluate the lock once per second, reporting each status to
    /// `on_tick`, until attempts are allowed again. Returns the final
    /// (open) status.
    pub async fn watch_countdown<F>(&self, mut on_tick: F) -> LockStatus
    where
        F: FnMut(&LockStatus),
    {
        let mut interval = tokio::time::interval(StdDuration::from_secs(COUNTDOWN_TICK_SECS));
        loop {
            interval.tick().await;
            let status = self.status();
            on_tick(&status);
            if !status.is_locked() {
                return status;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::{KeyValueStore, MemoryStore};

    /// Starts on a whole second so millisecond round-trips compare equal
    fn start_clock() -> ManualClock {
        ManualClock::new(DateTime::from_timestamp(1_750_000_000, 0).unwrap())
    }

    fn tracker(backend: &MemoryStore, clock: &ManualClock) -> LockoutTracker {
        LockoutTracker::new(
            Arc::new(Storage::open(Box::new(backend.clone()))),
            Arc::new(clock.clone()),
        )
    }

    #[test]
    fn test_fresh_tracker_is_open() {
        let clock = start_clock();
        let tracker = tracker(&MemoryStore::default(), &clock);
        assert_eq!(tracker.state(), LockoutState::default());
        assert_eq!(
            tracker.status(),
            LockStatus::Open { failed_attempts: 0, attempts_left: 3 }
        );
    }

    #[test]
    fn test_three_failures_lock_for_five_minutes() {
        let clock = start_clock();
        let tracker = tracker(&MemoryStore::default(), &clock);

        assert_eq!(
            tracker.record_failure(),
            LockStatus::Open { failed_attempts: 1, attempts_left: 2 }
        );
        clock.advance(Duration::seconds(10));
        assert_eq!(
            tracker.record_failure(),
            LockStatus::Open { failed_attempts: 2, attempts_left: 1 }
        );
        clock.advance(Duration::seconds(10));
        let third_at = clock.now();
        let status = tracker.record_failure();

        assert_eq!(
            status,
            LockStatus::Locked {
                until: third_at + Duration::minutes(5),
                remaining: Duration::minutes(5),
            }
        );
        assert_eq!(
            tracker.state().locked_until,
            (third_at + Duration::minutes(5)).timestamp_millis()
        );
    }

    #[test]
    fn test_failure_while_locked_does_not_extend_lock() {
        let clock = start_clock();
        let tracker = tracker(&MemoryStore::default(), &clock);
        for _ in 0..3 {
            tracker.record_failure();
        }
        let until = tracker.state().locked_until;

        clock.advance(Duration::minutes(1));
        assert!(tracker.record_failure().is_locked());
        assert_eq!(tracker.state().locked_until, until);
        assert_eq!(tracker.state().failed_attempts, 3);
    }

    #[test]
    fn test_far_future_lock_instant_stays_locked() {
        let clock = start_clock();
        let backend = MemoryStore::default();
        backend
            .apply(&[
                Write::set(keys::FAILED_ATTEMPTS, "3"),
                Write::set(keys::LOCK_UNTIL, i64::MAX.to_string()),
            ])
            .unwrap();

        let tracker = tracker(&backend, &clock);
        match tracker.status() {
            LockStatus::Locked { remaining, .. } => {
                assert_eq!(
                    remaining.num_milliseconds(),
                    i64::MAX - clock.now().timestamp_millis()
                );
                assert!(crate::utils::format_countdown(remaining).contains(':'));
            }
            other => panic!("expected lock, got {:?}", other),
        }
    }

    #[test]
    fn test_success_resets_count() {
        let clock = start_clock();
        let tracker = tracker(&MemoryStore::default(), &clock);
        tracker.record_failure();
        tracker.record_failure();

        tracker.record_success();
        assert_eq!(tracker.state(), LockoutState::default());
    }

    #[test]
    fn test_lock_lifts_after_window() {
        let clock = start_clock();
        let tracker = tracker(&MemoryStore::default(), &clock);
        for _ in 0..3 {
            tracker.record_failure();
        }

        clock.advance(Duration::minutes(4) + Duration::seconds(59));
        assert!(tracker.status().is_locked());
        assert_eq!(tracker.remaining(), Duration::seconds(1));

        clock.advance(Duration::seconds(1));
        assert_eq!(
            tracker.status(),
            LockStatus::Open { failed_attempts: 0, attempts_left: 3 }
        );
        assert_eq!(tracker.state(), LockoutState::default());
    }

    #[test]
    fn test_state_survives_reload() {
        let backend = MemoryStore::default();
        let clock = start_clock();

        let first = tracker(&backend, &clock);
        first.record_failure();
        first.record_failure();
        drop(first);

        let reloaded = tracker(&backend, &clock);
        assert_eq!(reloaded.state().failed_attempts, 2);
        assert!(reloaded.record_failure().is_locked());
        drop(reloaded);

        let reloaded = tracker(&backend, &clock);
        assert!(reloaded.status().is_locked());
    }

    #[test]
    fn test_elapsed_lock_presents_open_after_reload() {
        let backend = MemoryStore::default();
        let clock = start_clock();

        let first = tracker(&backend, &clock);
        for _ in 0..3 {
            first.record_failure();
        }
        drop(first);

        clock.advance(Duration::minutes(6));
        let reloaded = tracker(&backend, &clock);
        assert_eq!(
            reloaded.status(),
            LockStatus::Open { failed_attempts: 0, attempts_left: 3 }
        );
        assert!(backend.load().unwrap().is_empty());
    }

    #[test]
    fn test_unreadable_counters_are_treated_as_zero() {
        let storage = Arc::new(Storage::in_memory());
        storage.set(keys::FAILED_ATTEMPTS, "lots");
        storage.set(keys::LOCK_UNTIL, "soon");
        let tracker = LockoutTracker::new(storage, Arc::new(start_clock()));
        assert_eq!(tracker.state(), LockoutState::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lifted_lock_is_announced() {
        let clock = start_clock();
        let queue = NotificationQueue::new(Arc::new(clock.clone()));
        let tracker = tracker(&MemoryStore::default(), &clock).with_notifications(queue.clone());
        for _ in 0..3 {
            tracker.record_failure();
        }

        clock.advance(Duration::minutes(5));
        assert!(!tracker.status().is_locked());

        let messages: Vec<_> = queue.snapshot().into_iter().map(|n| n.kind).collect();
        assert_eq!(messages, vec![NotificationKind::Info]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_countdown_ticks_until_open() {
        let clock = start_clock();
        let tracker = tracker(&MemoryStore::default(), &clock);
        for _ in 0..3 {
            tracker.record_failure();
        }

        let mut seen = Vec::new();
        let last = tracker
            .watch_countdown(|status| {
                if let LockStatus::Locked { remaining, .. } = status {
                    seen.push(*remaining);
                }
                clock.advance(Duration::minutes(1));
            })
            .await;

        assert!(!last.is_locked());
        assert_eq!(seen.first(), Some(&Duration::minutes(5)));
        assert_eq!(seen.len(), 5);
    }
}
