//! Errors from decoding and encoding envelopes

/// Malformed or out-of-order protocol traffic.
///
/// The display strings are sent verbatim to the peer inside an `error`
/// envelope, so they stay short and free of internal detail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("missing pubkey")]
    MissingPublicKey,

    #[error("missing signature (sig)")]
    MissingSignature,

    #[error("unexpected message: {0}")]
    Unexpected(&'static str),

    #[error("encoding failed: {0}")]
    Encode(String),
}

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
