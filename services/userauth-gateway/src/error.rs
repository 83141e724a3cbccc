//! Service-specific error types

use thiserror::Error;

/// Gateway startup errors.
///
/// Per-message failures never surface here: the connection loop turns them
/// into `error` envelopes for the peer.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] common::Error),

    #[error("Signing setup failed: {0}")]
    Signing(#[from] hub_auth::AuthError),
}

/// Result alias using service Error
pub type Result<T> = std::result::Result<T, Error>;
