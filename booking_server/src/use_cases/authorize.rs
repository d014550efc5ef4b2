use crate::domain::errors::AuthError;
use crate::domain::token::{CredentialClaims, TokenCodec};

// Bearer token check shared by every protected operation.
pub(crate) fn authorize(
    codec: &TokenCodec,
    token: Option<&str>,
    now: u64,
) -> Result<CredentialClaims, AuthError> {
    let token = token
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(AuthError::InvalidToken)?;

    codec
        .verify_credential(token, now)
        .ok_or(AuthError::InvalidToken)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::use_cases::test_support::{TEST_NOW, admin_token, test_codec};

    #[test]
    fn when_token_is_valid_then_subject_is_returned() {
        let token = admin_token(TEST_NOW + 60);

        let claims = authorize(&test_codec(), Some(&token), TEST_NOW)
            .expect("expected token to authorize");

        assert_eq!(claims.subject, "admin");
        assert_eq!(claims.expires_at, TEST_NOW + 60);
    }

    #[test]
    fn when_token_is_padded_with_whitespace_then_it_still_authorizes() {
        let token = format!("  {}\n", admin_token(TEST_NOW + 60));

        assert!(authorize(&test_codec(), Some(&token), TEST_NOW).is_ok());
    }

    #[test]
    fn when_token_is_missing_or_blank_then_returns_invalid_token() {
        assert!(matches!(
            authorize(&test_codec(), None, TEST_NOW),
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            authorize(&test_codec(), Some("   "), TEST_NOW),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn when_token_expires_exactly_now_then_returns_invalid_token() {
        let token = admin_token(TEST_NOW);

        assert!(matches!(
            authorize(&test_codec(), Some(&token), TEST_NOW),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn when_token_is_signed_with_another_secret_then_returns_invalid_token() {
        let forged = TokenCodec::new("other-secret")
            .sign(&CredentialClaims {
                subject: "admin".to_string(),
                expires_at: TEST_NOW + 60,
            })
            .expect("expected token to sign");

        assert!(matches!(
            authorize(&test_codec(), Some(&forged), TEST_NOW),
            Err(AuthError::InvalidToken)
        ));
    }
}
