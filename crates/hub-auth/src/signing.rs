//! Service signing authority
//!
//! Holds the service key id and secret and mints time-bounded API signatures:
//! `msg` is the expiration as ISO-8601 with millisecond precision and `sig` is
//! `BASE64URL(HMAC-SHA256(secret, msg))`. A user credential is the same
//! signature plus the token minted for a verified public key.

use std::fmt;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use common::Secret;
use hmac::{Hmac, Mac};
use hub_protocol::Credential;
use sha2::Sha256;
use tracing::debug;

use crate::error::{AuthError, Result};
use crate::token::Token;

type HmacSha256 = Hmac<Sha256>;

/// Mints credentials under a fixed service key. Constructed once at startup.
#[derive(Clone)]
pub struct SigningAuthority {
    key: String,
    mac: HmacSha256,
}

impl SigningAuthority {
    /// Build the authority, refusing a missing or blank key/secret.
    ///
    /// Callers must treat the error as fatal for the hosting process.
    pub fn new(key: impl Into<String>, secret: &Secret<String>) -> Result<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(AuthError::Configuration(
                "service key is missing or empty".into(),
            ));
        }
        if secret.is_blank() {
            return Err(AuthError::Configuration(
                "service secret is missing or empty".into(),
            ));
        }
        let mac = HmacSha256::new_from_slice(secret.expose().as_bytes())
            .map_err(|e| AuthError::Configuration(format!("unusable service secret: {e}")))?;
        Ok(Self { key, mac })
    }

    /// Service key identifier stamped into every credential.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Fresh service credential valid for `ttl` from now.
    pub fn sign(&self, ttl: Duration) -> Credential {
        self.sign_at(Utc::now(), ttl, None)
    }

    /// Credential for a verified user: API signature plus `token`.
    pub fn compose_user_credential(&self, token: &Token, ttl: Duration) -> Credential {
        self.sign_at(Utc::now(), ttl, Some(token))
    }

    fn sign_at(&self, now: DateTime<Utc>, ttl: Duration, token: Option<&Token>) -> Credential {
        let expiration = expiration_after(now, ttl);
        let msg = render_expiration(expiration);
        let sig = URL_SAFE_NO_PAD.encode(self.mac_over(&msg).finalize().into_bytes());
        debug!(key = %self.key, %msg, user = token.is_some(), "minted api signature");
        Credential {
            token: token.map(|t| t.as_str().to_owned()),
            key: self.key.clone(),
            sig,
            msg,
            expiration,
        }
    }

    /// Check a credential was minted by this authority and is still valid at `now`.
    pub fn verify(&self, credential: &Credential, now: DateTime<Utc>) -> Result<()> {
        if credential.key != self.key {
            return Err(AuthError::InvalidCredential(format!(
                "signed under unknown key {}",
                credential.key
            )));
        }
        if credential.msg != render_expiration(credential.expiration) {
            return Err(AuthError::InvalidCredential(
                "message does not match expiration".into(),
            ));
        }
        let sig = URL_SAFE_NO_PAD
            .decode(&credential.sig)
            .map_err(|_| AuthError::InvalidCredential("signature is not base64url".into()))?;
        self.mac_over(&credential.msg)
            .verify_slice(&sig)
            .map_err(|_| AuthError::InvalidCredential("signature mismatch".into()))?;
        if credential.is_expired_at(now) {
            return Err(AuthError::InvalidCredential("expired".into()));
        }
        Ok(())
    }

    fn mac_over(&self, msg: &str) -> HmacSha256 {
        let mut mac = self.mac.clone();
        mac.update(msg.as_bytes());
        mac
    }
}

impl fmt::Debug for SigningAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningAuthority")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// `now + ttl`, truncated to whole milliseconds so the rendered `msg` and the
/// structured expiration always agree.
fn expiration_after(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    let ttl = TimeDelta::milliseconds(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX / 2));
    let expiration = now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC);
    DateTime::from_timestamp_millis(expiration.timestamp_millis()).unwrap_or(expiration)
}

fn render_expiration(expiration: DateTime<Utc>) -> String {
    expiration.to_rfc3339_opts(SecondsFormat::Millis, true)
}
