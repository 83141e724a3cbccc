//! Error types for challenge verification and credential minting

/// Errors from authentication operations.
///
/// Display strings are what the peer sees in an `error` envelope.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Missing/blank service secret or key. Fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    /// A stored private key that cannot be restored.
    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("challenge response timed out")]
    VerificationTimeout,

    #[error("signature rejected for public key")]
    VerificationRejected,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("token error: {0}")]
    Token(String),

    #[error("invalid credential: {0}")]
    InvalidCredential(String),
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, AuthError>;
