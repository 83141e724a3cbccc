//! Protocol constants and deployment defaults

use std::time::Duration;

/// How long a client has to answer a challenge before the request fails.
pub const DEFAULT_CHALLENGE_TIMEOUT: Duration = Duration::from_millis(1500);

/// Validity window of an API signature / credential.
pub const DEFAULT_CREDENTIAL_TTL: Duration = Duration::from_secs(300);

/// Validity window of a user token minted after a successful challenge.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(3600);

/// Random bytes per challenge payload. Must stay >= 16.
pub const CHALLENGE_LEN: usize = 32;

/// Raw Ed25519 public key length.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Raw Ed25519 signature length.
pub const SIGNATURE_LEN: usize = 64;
