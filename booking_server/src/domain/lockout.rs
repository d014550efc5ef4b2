// Failed-login lockout carried entirely in a signed client cookie.
//
// The counter is tamper-evident, not replay-proof: a client that drops the
// cookie starts again from zero attempts.

use serde::{Deserialize, Serialize};

use crate::domain::errors::TokenError;
use crate::domain::token::TokenCodec;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_LOCK_DURATION_SECS: u64 = 30 * 60;
pub const DEFAULT_COUNTER_WINDOW_SECS: u64 = 15 * 60;

// Attempt-counter payload; `locked_until == 0` means not locked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptCounter {
    #[serde(rename = "cnt")]
    pub attempts: u32,
    #[serde(rename = "until")]
    pub locked_until: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LockoutPolicy {
    pub max_attempts: u32,
    pub lock_duration_secs: u64,
    // Cookie lifetime while not locked; only bounds retention.
    pub counter_window_secs: u64,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            lock_duration_secs: DEFAULT_LOCK_DURATION_SECS,
            counter_window_secs: DEFAULT_COUNTER_WINDOW_SECS,
        }
    }
}

// Cookie value plus the Max-Age it should be set with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CounterCookie {
    pub value: String,
    pub max_age_secs: u64,
}

impl CounterCookie {
    // An immediately-expired cookie that clears the counter.
    pub fn cleared() -> Self {
        Self {
            value: String::new(),
            max_age_secs: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gate {
    Open(AttemptCounter),
    Locked {
        counter: AttemptCounter,
        remaining_secs: u64,
    },
}

// Result of recording one failed credential check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureOutcome {
    Rejected(AttemptCounter),
    LockedOut {
        counter: AttemptCounter,
        remaining_secs: u64,
    },
}

#[derive(Clone)]
pub struct LockoutGuard {
    codec: TokenCodec,
    policy: LockoutPolicy,
}

impl LockoutGuard {
    pub fn new(codec: TokenCodec, policy: LockoutPolicy) -> Self {
        Self { codec, policy }
    }

    pub fn policy(&self) -> &LockoutPolicy {
        &self.policy
    }

    // Missing or invalid cookies count as zero attempts, never as an error.
    pub fn restore(&self, cookie: Option<&str>) -> AttemptCounter {
        cookie
            .filter(|value| !value.is_empty())
            .and_then(|value| self.codec.verify::<AttemptCounter>(value))
            .unwrap_or_default()
    }

    pub fn check(&self, counter: AttemptCounter, now: u64) -> Gate {
        if counter.locked_until > now {
            Gate::Locked {
                counter,
                remaining_secs: counter.locked_until - now,
            }
        } else {
            Gate::Open(counter)
        }
    }

    pub fn register_failure(&self, counter: AttemptCounter, now: u64) -> FailureOutcome {
        let attempts = counter.attempts.saturating_add(1);
        if attempts >= self.policy.max_attempts {
            let locked = AttemptCounter {
                attempts: self.policy.max_attempts,
                locked_until: now.saturating_add(self.policy.lock_duration_secs),
            };
            return FailureOutcome::LockedOut {
                counter: locked,
                remaining_secs: self.policy.lock_duration_secs,
            };
        }

        FailureOutcome::Rejected(AttemptCounter {
            attempts,
            locked_until: counter.locked_until,
        })
    }

    // Sign the counter for the response cookie; lifetime follows the lock if one is active.
    pub fn issue(&self, counter: AttemptCounter, now: u64) -> Result<CounterCookie, TokenError> {
        let max_age_secs = if counter.locked_until > now {
            counter.locked_until - now
        } else {
            self.policy.counter_window_secs
        };
        Ok(CounterCookie {
            value: self.codec.sign(&counter)?,
            max_age_secs,
        })
    }
}
