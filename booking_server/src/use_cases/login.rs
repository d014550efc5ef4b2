use subtle::ConstantTimeEq;

use crate::domain::errors::AuthError;
use crate::domain::lockout::{CounterCookie, FailureOutcome, Gate, LockoutGuard};
use crate::domain::ports::Clock;
use crate::domain::token::{CredentialClaims, TokenCodec};
use crate::interface_adapters::protocol::LoginRequest;

// The single administrator allowed to sign in.
#[derive(Clone, Debug)]
pub struct AdminAccount {
    pub username: String,
    pub password: String,
}

impl AdminAccount {
    fn matches(&self, request: &LoginRequest) -> bool {
        let user = request.username.as_bytes().ct_eq(self.username.as_bytes());
        let pass = request.password.as_bytes().ct_eq(self.password.as_bytes());
        bool::from(user & pass)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoginResult {
    Authenticated { token: String, expires_at: u64 },
    InvalidCredentials { attempts: u32, max_attempts: u32 },
    Locked { remaining_secs: u64 },
}

// Response returned by the login use case. The cookie always replaces the caller's counter.
#[derive(Clone, Debug)]
pub struct LoginResponse {
    pub result: LoginResult,
    pub cookie: CounterCookie,
}

// Admin login use case with injected dependencies.
pub struct LoginUseCase<C> {
    pub clock: C,
    pub codec: TokenCodec,
    pub guard: LockoutGuard,
    pub account: AdminAccount,
    pub session_ttl_secs: u64,
}

impl<C> LoginUseCase<C>
where
    C: Clock,
{
    // `request` is None when the body could not be parsed. That is only an
    // error once the lock check has passed.
    pub fn execute(
        &self,
        request: Option<LoginRequest>,
        counter_cookie: Option<&str>,
    ) -> Result<LoginResponse, AuthError> {
        let now = self.clock.now_epoch_seconds();
        let counter = match self.guard.check(self.guard.restore(counter_cookie), now) {
            Gate::Locked {
                counter,
                remaining_secs,
            } => {
                return Ok(LoginResponse {
                    result: LoginResult::Locked { remaining_secs },
                    cookie: self.guard.issue(counter, now)?,
                });
            }
            Gate::Open(counter) => counter,
        };

        let request = request.ok_or(AuthError::MalformedRequest)?;

        if self.account.matches(&request) {
            let expires_at = now.saturating_add(self.session_ttl_secs);
            let token = self.codec.sign(&CredentialClaims {
                subject: request.username,
                expires_at,
            })?;
            return Ok(LoginResponse {
                result: LoginResult::Authenticated { token, expires_at },
                cookie: CounterCookie::cleared(),
            });
        }

        let response = match self.guard.register_failure(counter, now) {
            FailureOutcome::Rejected(next) => LoginResponse {
                result: LoginResult::InvalidCredentials {
                    attempts: next.attempts,
                    max_attempts: self.guard.policy().max_attempts,
                },
                cookie: self.guard.issue(next, now)?,
            },
            FailureOutcome::LockedOut {
                counter,
                remaining_secs,
            } => LoginResponse {
                result: LoginResult::Locked { remaining_secs },
                cookie: self.guard.issue(counter, now)?,
            },
        };
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::lockout::{AttemptCounter, LockoutPolicy};
    use crate::use_cases::test_support::{FixedClock, TEST_NOW, test_codec};

    fn use_case(now: u64) -> LoginUseCase<FixedClock> {
        LoginUseCase {
            clock: FixedClock(now),
            codec: test_codec(),
            guard: LockoutGuard::new(test_codec(), LockoutPolicy::default()),
            account: AdminAccount {
                username: "admin".to_string(),
                password: "s3cret".to_string(),
            },
            session_ttl_secs: 12 * 3600,
        }
    }

    fn attempt(username: &str, password: &str) -> Option<LoginRequest> {
        Some(LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    #[test]
    fn when_credentials_match_then_token_is_issued_and_counter_cleared() {
        let use_case = use_case(TEST_NOW);

        let response = use_case
            .execute(attempt("admin", "s3cret"), None)
            .expect("expected login to succeed");

        let LoginResult::Authenticated { token, expires_at } = response.result else {
            panic!("expected authenticated result");
        };
        assert_eq!(expires_at, TEST_NOW + 12 * 3600);
        let claims = test_codec()
            .verify_credential(&token, TEST_NOW)
            .expect("expected issued token to verify");
        assert_eq!(claims.subject, "admin");
        assert_eq!(response.cookie, CounterCookie::cleared());
    }

    #[test]
    fn when_password_is_wrong_three_times_then_third_attempt_locks() {
        let use_case = use_case(TEST_NOW);

        let first = use_case
            .execute(attempt("admin", "nope"), None)
            .expect("first attempt");
        assert_eq!(
            first.result,
            LoginResult::InvalidCredentials {
                attempts: 1,
                max_attempts: 3
            }
        );
        assert_eq!(first.cookie.max_age_secs, 15 * 60);

        let second = use_case
            .execute(attempt("admin", "nope"), Some(&first.cookie.value))
            .expect("second attempt");
        assert_eq!(
            second.result,
            LoginResult::InvalidCredentials {
                attempts: 2,
                max_attempts: 3
            }
        );

        let third = use_case
            .execute(attempt("admin", "nope"), Some(&second.cookie.value))
            .expect("third attempt");
        assert_eq!(
            third.result,
            LoginResult::Locked {
                remaining_secs: 30 * 60
            }
        );
        assert_eq!(third.cookie.max_age_secs, 30 * 60);
    }

    #[test]
    fn when_login_succeeds_between_failures_then_count_restarts_at_one() {
        let use_case = use_case(TEST_NOW);

        let failed = use_case
            .execute(attempt("admin", "nope"), None)
            .expect("first attempt");
        assert!(matches!(
            failed.result,
            LoginResult::InvalidCredentials { attempts: 1, .. }
        ));

        let succeeded = use_case
            .execute(attempt("admin", "s3cret"), Some(&failed.cookie.value))
            .expect("successful attempt");
        assert!(matches!(
            succeeded.result,
            LoginResult::Authenticated { .. }
        ));

        let failed_again = use_case
            .execute(attempt("admin", "nope"), Some(&succeeded.cookie.value))
            .expect("attempt after success");
        assert_eq!(
            failed_again.result,
            LoginResult::InvalidCredentials {
                attempts: 1,
                max_attempts: 3
            }
        );
    }

    #[test]
    fn when_session_ttl_is_huge_then_expiry_saturates() {
        let use_case = LoginUseCase {
            session_ttl_secs: u64::MAX,
            ..use_case(TEST_NOW)
        };

        let response = use_case
            .execute(attempt("admin", "s3cret"), None)
            .expect("expected login to succeed");

        assert!(matches!(
            response.result,
            LoginResult::Authenticated {
                expires_at: u64::MAX,
                ..
            }
        ));
    }

    #[test]
    fn when_locked_then_even_correct_credentials_are_refused_without_counting() {
        let guard = LockoutGuard::new(test_codec(), LockoutPolicy::default());
        let locked = guard
            .issue(
                AttemptCounter {
                    attempts: 3,
                    locked_until: TEST_NOW + 600,
                },
                TEST_NOW,
            )
            .expect("cookie issues");

        let response = use_case(TEST_NOW)
            .execute(attempt("admin", "s3cret"), Some(&locked.value))
            .expect("locked attempt");

        assert_eq!(response.result, LoginResult::Locked { remaining_secs: 600 });
        let counter = guard.restore(Some(&response.cookie.value));
        assert_eq!(counter.attempts, 3);
        assert_eq!(counter.locked_until, TEST_NOW + 600);
    }

    #[test]
    fn when_lock_has_expired_then_correct_credentials_succeed() {
        let guard = LockoutGuard::new(test_codec(), LockoutPolicy::default());
        let stale = guard
            .issue(
                AttemptCounter {
                    attempts: 3,
                    locked_until: TEST_NOW - 1,
                },
                TEST_NOW - 1800,
            )
            .expect("cookie issues");

        let response = use_case(TEST_NOW)
            .execute(attempt("admin", "s3cret"), Some(&stale.value))
            .expect("login after lock");

        assert!(matches!(response.result, LoginResult::Authenticated { .. }));
        assert_eq!(response.cookie.max_age_secs, 0);
    }

    #[test]
    fn when_counter_cookie_is_forged_then_count_starts_fresh() {
        let response = use_case(TEST_NOW)
            .execute(attempt("admin", "nope"), Some("forged.deadbeef"))
            .expect("attempt");

        assert_eq!(
            response.result,
            LoginResult::InvalidCredentials {
                attempts: 1,
                max_attempts: 3
            }
        );
    }

    #[test]
    fn when_body_is_unparseable_then_returns_malformed_request() {
        let result = use_case(TEST_NOW).execute(None, None);

        assert!(matches!(result, Err(AuthError::MalformedRequest)));
    }

    #[test]
    fn when_body_is_unparseable_but_locked_then_lock_wins() {
        let guard = LockoutGuard::new(test_codec(), LockoutPolicy::default());
        let locked = guard
            .issue(
                AttemptCounter {
                    attempts: 3,
                    locked_until: TEST_NOW + 90,
                },
                TEST_NOW,
            )
            .expect("cookie issues");

        let response = use_case(TEST_NOW)
            .execute(None, Some(&locked.value))
            .expect("locked attempt");

        assert_eq!(response.result, LoginResult::Locked { remaining_secs: 90 });
    }

    #[test]
    fn when_username_differs_only_in_case_then_login_fails() {
        let response = use_case(TEST_NOW)
            .execute(attempt("Admin", "s3cret"), None)
            .expect("attempt");

        assert!(matches!(
            response.result,
            LoginResult::InvalidCredentials { attempts: 1, .. }
        ));
    }
}
