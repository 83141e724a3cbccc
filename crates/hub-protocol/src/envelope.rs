//! Envelope types exchanged over the `/ws/userauth` socket

use serde::{Deserialize, Serialize};

use crate::credential::Credential;
use crate::error::{ProtocolError, Result};

/// Messages sent by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Ask for a token for the claimed public key
    #[serde(rename = "token")]
    TokenRequest {
        #[serde(rename = "pubkey")]
        public_key: String,
    },
    /// Signature over the most recent challenge payload
    #[serde(rename = "challenge")]
    ChallengeResponse {
        #[serde(rename = "sig")]
        signature: Vec<u8>,
    },
}

/// Lenient shape used for decoding so that missing fields map to the
/// protocol's own error strings instead of serde's.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawClientMessage {
    Token {
        #[serde(default)]
        pubkey: Option<String>,
    },
    Challenge {
        #[serde(default, deserialize_with = "crate::bytes::deserialize_opt")]
        sig: Option<Vec<u8>>,
    },
}

impl ClientMessage {
    /// Decode one inbound frame.
    pub fn decode(frame: &str) -> Result<Self> {
        let raw: RawClientMessage =
            serde_json::from_str(frame).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
        match raw {
            RawClientMessage::Token { pubkey } => match pubkey {
                Some(public_key) if !public_key.is_empty() => {
                    Ok(ClientMessage::TokenRequest { public_key })
                }
                _ => Err(ProtocolError::MissingPublicKey),
            },
            RawClientMessage::Challenge { sig } => match sig {
                Some(signature) if !signature.is_empty() => {
                    Ok(ClientMessage::ChallengeResponse { signature })
                }
                _ => Err(ProtocolError::MissingSignature),
            },
        }
    }

    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    /// Wire tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::TokenRequest { .. } => "token",
            ClientMessage::ChallengeResponse { .. } => "challenge",
        }
    }
}

/// Messages sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Payload the client must sign with its private key
    #[serde(rename = "challenge")]
    Challenge {
        #[serde(rename = "value", deserialize_with = "crate::bytes::deserialize")]
        payload: Vec<u8>,
    },
    #[serde(rename = "token")]
    TokenIssued {
        #[serde(rename = "value")]
        credential: Credential,
    },
    #[serde(rename = "error")]
    Error {
        #[serde(rename = "value")]
        message: String,
    },
}

impl ServerMessage {
    pub fn error(message: impl ToString) -> Self {
        ServerMessage::Error {
            message: message.to_string(),
        }
    }

    pub fn decode(frame: &str) -> Result<Self> {
        serde_json::from_str(frame).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }

    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    /// Wire tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Challenge { .. } => "challenge",
            ServerMessage::TokenIssued { .. } => "token",
            ServerMessage::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn token_request_wire_shape() {
        let msg = ClientMessage::TokenRequest {
            public_key: "pk1".into(),
        };
        let json: serde_json::Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(json, serde_json::json!({"type": "token", "pubkey": "pk1"}));
        assert_eq!(ClientMessage::decode(&msg.encode().unwrap()).unwrap(), msg);
    }

    #[test]
    fn challenge_response_wire_shape() {
        let msg = ClientMessage::ChallengeResponse {
            signature: vec![1, 2, 255],
        };
        let json: serde_json::Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(json, serde_json::json!({"type": "challenge", "sig": [1, 2, 255]}));
    }

    #[test]
    fn decode_accepts_buffer_json_signature() {
        let msg =
            ClientMessage::decode(r#"{"type":"challenge","sig":{"type":"Buffer","data":[7,7]}}"#)
                .unwrap();
        assert_eq!(
            msg,
            ClientMessage::ChallengeResponse {
                signature: vec![7, 7]
            }
        );
    }

    #[test]
    fn decode_reports_missing_fields_in_protocol_terms() {
        assert_eq!(
            ClientMessage::decode(r#"{"type":"token"}"#),
            Err(ProtocolError::MissingPublicKey)
        );
        assert_eq!(
            ClientMessage::decode(r#"{"type":"token","pubkey":""}"#),
            Err(ProtocolError::MissingPublicKey)
        );
        assert_eq!(
            ClientMessage::decode(r#"{"type":"challenge"}"#),
            Err(ProtocolError::MissingSignature)
        );
        assert_eq!(
            ClientMessage::decode(r#"{"type":"challenge","sig":[]}"#),
            Err(ProtocolError::MissingSignature)
        );
    }

    #[test]
    fn decode_rejects_unknown_type_and_garbage() {
        let err = ClientMessage::decode(r#"{"type":"logout"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)), "got: {err:?}");
        assert!(err.to_string().starts_with("malformed message:"));

        let err = ClientMessage::decode("not json").unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }

    #[test]
    fn server_messages_use_value_field() {
        let challenge = ServerMessage::Challenge {
            payload: vec![1, 2, 3],
        };
        let json: serde_json::Value = serde_json::from_str(&challenge.encode().unwrap()).unwrap();
        assert_eq!(json, serde_json::json!({"type": "challenge", "value": [1, 2, 3]}));

        let error = ServerMessage::error("missing signature");
        let json: serde_json::Value = serde_json::from_str(&error.encode().unwrap()).unwrap();
        assert_eq!(json, serde_json::json!({"type": "error", "value": "missing signature"}));
    }

    #[test]
    fn token_issued_roundtrip() {
        let expiration = chrono::DateTime::from_timestamp_millis(Utc::now().timestamp_millis())
            .unwrap();
        let issued = ServerMessage::TokenIssued {
            credential: Credential {
                token: Some("tok".into()),
                key: "key".into(),
                sig: "sig".into(),
                msg: "msg".into(),
                expiration,
            },
        };
        let decoded = ServerMessage::decode(&issued.encode().unwrap()).unwrap();
        assert_eq!(decoded, issued);
        assert_eq!(decoded.kind(), "token");
    }
}
