// Compact signed tokens: `base64url(json payload)` + `.` + `hex(hmac-sha256)`.
// The same codec carries admin credentials and the failed-login counter, so
// verification is payload-agnostic and only the credential path checks expiry.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::domain::errors::TokenError;

type HmacSha256 = Hmac<Sha256>;

pub const TOKEN_DELIMITER: char = '.';

// Credential payload issued on successful admin login.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialClaims {
    #[serde(rename = "u")]
    pub subject: String,
    #[serde(rename = "exp")]
    pub expires_at: u64,
}

#[derive(Clone)]
pub struct TokenCodec {
    secret: Vec<u8>,
}

impl TokenCodec {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn sign<P: Serialize>(&self, payload: &P) -> Result<String, TokenError> {
        if self.secret.is_empty() {
            return Err(TokenError::MissingSecret);
        }
        let encoded = URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload)?);
        let signature = hex::encode(self.mac(encoded.as_bytes())?.finalize().into_bytes());
        Ok(format!("{encoded}{TOKEN_DELIMITER}{signature}"))
    }

    /// Returns the decoded payload when the signature matches; never errors.
    pub fn verify<P: DeserializeOwned>(&self, token: &str) -> Option<P> {
        if self.secret.is_empty() {
            return None;
        }
        let (encoded, signature) = token.split_once(TOKEN_DELIMITER)?;
        if encoded.is_empty() || signature.is_empty() {
            return None;
        }
        let signature = hex::decode(signature).ok()?;

        // verify_slice compares in constant time.
        self.mac(encoded.as_bytes())
            .ok()?
            .verify_slice(&signature)
            .ok()?;

        let decoded = URL_SAFE_NO_PAD.decode(encoded).ok()?;
        serde_json::from_slice(&decoded).ok()
    }

    // Credential tokens must also be unexpired at `now`.
    pub fn verify_credential(&self, token: &str, now: u64) -> Option<CredentialClaims> {
        let claims: CredentialClaims = self.verify(token)?;
        (claims.expires_at > now).then_some(claims)
    }

    fn mac(&self, data: &[u8]) -> Result<HmacSha256, TokenError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| TokenError::MissingSecret)?;
        mac.update(data);
        Ok(mac)
    }
}
