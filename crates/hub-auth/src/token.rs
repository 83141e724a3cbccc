//! User tokens bound to a verified public key
//!
//! Tokens are compact HS256 JWTs signed with the service secret. They are an
//! intermediate artifact: the signing authority folds them into the final
//! credential handed to the client.

use std::fmt;
use std::time::Duration;

use chrono::Utc;
use common::Secret;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Result};
use crate::identity::PublicKey;

/// Claims carried by a user token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Verified public key (stable string encoding)
    pub sub: String,
    /// Service key id that issued the token
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

/// An encoded token.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token([REDACTED])")
    }
}

/// Mints and validates tokens under the service secret.
#[derive(Clone)]
pub struct TokenSigner {
    issuer: String,
    ttl: Duration,
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenSigner {
    pub fn new(issuer: impl Into<String>, secret: &Secret<String>, ttl: Duration) -> Result<Self> {
        if secret.is_blank() {
            return Err(AuthError::Configuration(
                "service secret is missing or empty".into(),
            ));
        }
        let bytes = secret.expose().as_bytes();
        Ok(Self {
            issuer: issuer.into(),
            ttl,
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
        })
    }

    /// Mint a token for a public key whose possession has been proven.
    pub fn mint(&self, public_key: &PublicKey) -> Result<Token> {
        let iat = Utc::now().timestamp();
        let exp = iat.saturating_add(i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX));
        let claims = TokenClaims {
            sub: public_key.to_string(),
            iss: self.issuer.clone(),
            iat,
            exp,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map(Token)
            .map_err(|e| AuthError::Token(format!("encoding failed: {e}")))
    }

    /// Decode and validate a token, returning its claims.
    pub fn verify(&self, token: &str) -> Result<TokenClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        jsonwebtoken::decode::<TokenClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::Token(e.to_string()))
    }
}

impl fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSigner")
            .field("issuer", &self.issuer)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
