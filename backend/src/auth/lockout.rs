//! Failed-login lockout policy.
//!
//! An account is either open with a count of consecutive failures, or locked
//! until a point in time. Reaching the failure limit locks it; the first login
//! attempt after the lock expires clears the lock and the counter before the
//! supplied credentials are looked at.

use chrono::{DateTime, Duration, Utc};

use crate::config::{Config, seconds};
use crate::database::models::LockoutState;

/// Outcome of checking an account before comparing its password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockStatus {
    /// Reject without comparing the password.
    Locked { until: Option<DateTime<Utc>> },
    /// Proceed. `unlocked` is set when an expired lock was just cleared and
    /// the cleared state must be persisted.
    Open { state: LockoutState, unlocked: bool },
}

#[derive(Debug, Clone)]
pub struct LockoutPolicy {
    max_attempts: i64,
    lock_duration: Duration,
}

impl LockoutPolicy {
    pub fn new(max_attempts: u32, lock_duration: Duration) -> Self {
        Self {
            max_attempts: i64::from(max_attempts.max(1)),
            lock_duration,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.max_failed_login_attempts,
            seconds(config.lockout_duration_seconds),
        )
    }

    /// Decide whether a login attempt may proceed.
    ///
    /// A lock without an expiry was set outside this policy and stays in
    /// force until cleared by an administrator.
    pub fn evaluate(&self, state: &LockoutState, now: DateTime<Utc>) -> LockStatus {
        if !state.account_locked {
            return LockStatus::Open {
                state: state.clone(),
                unlocked: false,
            };
        }

        match state.account_locked_until {
            Some(until) if now > until => LockStatus::Open {
                state: LockoutState::cleared(),
                unlocked: true,
            },
            until => LockStatus::Locked { until },
        }
    }

    /// State after a failed password comparison.
    pub fn register_failure(&self, state: &LockoutState, now: DateTime<Utc>) -> LockoutState {
        let attempts = state.failed_login_attempts + 1;
        if attempts >= self.max_attempts {
            LockoutState {
                failed_login_attempts: attempts,
                account_locked: true,
                account_locked_until: Some(now + self.lock_duration),
            }
        } else {
            LockoutState {
                failed_login_attempts: attempts,
                account_locked: false,
                account_locked_until: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> LockoutPolicy {
        LockoutPolicy::new(5, Duration::minutes(30))
    }

    #[test]
    fn fifth_failure_locks_for_thirty_minutes() {
        let policy = policy();
        let now = Utc::now();
        let mut state = LockoutState::cleared();

        for attempt in 1..=4 {
            state = policy.register_failure(&state, now);
            assert_eq!(state.failed_login_attempts, attempt);
            assert!(!state.account_locked);
        }

        state = policy.register_failure(&state, now);
        assert!(state.account_locked);
        assert_eq!(state.account_locked_until, Some(now + Duration::minutes(30)));
    }

    #[test]
    fn locked_account_rejects_until_expiry() {
        let policy = policy();
        let now = Utc::now();
        let state = LockoutState {
            failed_login_attempts: 5,
            account_locked: true,
            account_locked_until: Some(now + Duration::minutes(30)),
        };

        assert!(matches!(
            policy.evaluate(&state, now + Duration::minutes(29)),
            LockStatus::Locked { .. }
        ));
        // The boundary instant itself is still locked.
        assert!(matches!(
            policy.evaluate(&state, now + Duration::minutes(30)),
            LockStatus::Locked { .. }
        ));
    }

    #[test]
    fn expired_lock_is_cleared_before_evaluation() {
        let policy = policy();
        let now = Utc::now();
        let state = LockoutState {
            failed_login_attempts: 5,
            account_locked: true,
            account_locked_until: Some(now - Duration::seconds(1)),
        };

        assert_eq!(
            policy.evaluate(&state, now),
            LockStatus::Open {
                state: LockoutState::cleared(),
                unlocked: true
            }
        );
    }

    #[test]
    fn lock_without_expiry_stays_locked() {
        let policy = policy();
        let state = LockoutState {
            failed_login_attempts: 0,
            account_locked: true,
            account_locked_until: None,
        };
        assert_eq!(
            policy.evaluate(&state, Utc::now()),
            LockStatus::Locked { until: None }
        );
    }

    #[test]
    fn open_account_passes_through() {
        let policy = policy();
        let state = LockoutState {
            failed_login_attempts: 3,
            account_locked: false,
            account_locked_until: None,
        };
        assert_eq!(
            policy.evaluate(&state, Utc::now()),
            LockStatus::Open {
                state: state.clone(),
                unlocked: false
            }
        );
    }

    #[test]
    fn out_of_range_duration_does_not_panic() {
        let mut config = Config::for_tests();
        config.lockout_duration_seconds = u64::MAX;
        let policy = LockoutPolicy::from_config(&config);

        let now = Utc::now();
        let mut state = LockoutState::cleared();
        for _ in 0..5 {
            state = policy.register_failure(&state, now);
        }
        assert!(state.account_locked);
        assert_eq!(state.account_locked_until, Some(now));
    }
}
