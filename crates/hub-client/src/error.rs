use std::time::Duration;

use hub_protocol::ProtocolError;

/// Failures surfaced to callers of `AuthClient`.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Connection could not be opened or dropped before the handshake finished
    #[error("transport error: {0}")]
    Transport(String),

    /// Server sent something that does not fit the handshake
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Server answered with an `error` envelope
    #[error("server error: {0}")]
    Server(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("no response from server within {0:?}")]
    Timeout(Duration),
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_error_keeps_message() {
        let err = ClientError::Server("missing signature".into());
        assert_eq!(err.to_string(), "server error: missing signature");
    }

    #[test]
    fn protocol_error_converts() {
        let err: ClientError = ProtocolError::Unexpected("token").into();
        assert!(matches!(err, ClientError::Protocol(_)));
        assert!(err.to_string().contains("unexpected message: token"));
    }
}
