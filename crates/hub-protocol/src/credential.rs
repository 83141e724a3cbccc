//! Credential wire type
//!
//! Possession of the whole object is what authorizes calls to the wrapped
//! storage and database services. `msg` is the expiration rendered as
//! ISO-8601 (millisecond precision) and `sig` is the service's signature over
//! `msg`, produced under the service key named by `key`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A minted, immutable authorization credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// User token bound to a verified public key (absent for service credentials)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Service key identifier the signature was produced under
    pub key: String,
    pub sig: String,
    pub msg: String,
    /// Absolute expiration
    pub expiration: DateTime<Utc>,
}

impl Credential {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiration <= now
    }
}
