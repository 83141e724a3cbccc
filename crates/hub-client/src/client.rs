//! Handshake driver
//!
//! One `authenticate` call opens one socket, runs exactly one
//! token → challenge → signature → credential exchange, and closes it.
//! Any envelope arriving out of order fails the call with a protocol error
//! instead of being skipped.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use hub_auth::Identity;
use hub_protocol::{ClientMessage, Credential, ProtocolError, ServerMessage, USERAUTH_PATH};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use crate::error::{ClientError, Result};

/// Bound on each wait for a server frame.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone)]
pub struct AuthClient {
    base_url: String,
    response_timeout: Duration,
    http: reqwest::Client,
}

impl AuthClient {
    /// `base_url` is the gateway's HTTP origin, e.g. `http://127.0.0.1:8080`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            http: reqwest::Client::new(),
        }
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn response_timeout(&self) -> Duration {
        self.response_timeout
    }

    /// Prove possession of `identity`'s private key and return the credential.
    ///
    /// Fails with `Server` carrying the gateway's message when it answers with
    /// an error envelope, `Protocol` on an envelope that does not fit the
    /// current step, `Transport` if the socket drops first, and `Timeout` if a
    /// step stalls longer than the response timeout.
    pub async fn authenticate(&self, identity: &Identity) -> Result<Credential> {
        let url = self.socket_url()?;
        let public_key = identity.public_key().to_string();
        debug!(%url, %public_key, "opening handshake connection");

        let (mut socket, _) = tokio::time::timeout(self.response_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| ClientError::Timeout(self.response_timeout))?
            .map_err(|e| ClientError::Transport(format!("connect to {url} failed: {e}")))?;

        send(&mut socket, &ClientMessage::TokenRequest { public_key: public_key.clone() })
            .await?;

        let payload = match self.next_message(&mut socket).await? {
            ServerMessage::Challenge { payload } => payload,
            ServerMessage::Error { message } => return Err(ClientError::Server(message)),
            other => return Err(ProtocolError::Unexpected(other.kind()).into()),
        };

        let signature = identity.sign(&payload);
        send(&mut socket, &ClientMessage::ChallengeResponse { signature }).await?;

        let credential = match self.next_message(&mut socket).await? {
            ServerMessage::TokenIssued { credential } => credential,
            ServerMessage::Error { message } => return Err(ClientError::Server(message)),
            other => return Err(ProtocolError::Unexpected(other.kind()).into()),
        };

        if let Err(e) = socket.close(None).await {
            debug!(error = %e, "close after handshake failed");
        }
        info!(%public_key, expiration = %credential.expiration, "authenticated");
        Ok(credential)
    }

    /// Fetch a service credential from the gateway's REST endpoint.
    pub async fn service_credential(&self) -> Result<Credential> {
        let url = format!("{}/api", self.base_url);
        let response = self
            .http
            .get(&url)
            .timeout(self.response_timeout)
            .send()
            .await
            .map_err(|e| ClientError::Http(format!("credential request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            return Err(ClientError::Http(format!(
                "credential endpoint returned {status}: {body}"
            )));
        }

        response
            .json::<Credential>()
            .await
            .map_err(|e| ClientError::Http(format!("invalid credential response: {e}")))
    }

    fn socket_url(&self) -> Result<String> {
        let rest = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else if self.base_url.starts_with("ws://") || self.base_url.starts_with("wss://") {
            self.base_url.clone()
        } else {
            return Err(ClientError::Transport(format!(
                "unsupported base url: {}",
                self.base_url
            )));
        };
        Ok(format!("{rest}{USERAUTH_PATH}"))
    }

    /// Next envelope from the server, skipping control frames.
    async fn next_message(&self, socket: &mut Socket) -> Result<ServerMessage> {
        loop {
            let frame = tokio::time::timeout(self.response_timeout, socket.next())
                .await
                .map_err(|_| ClientError::Timeout(self.response_timeout))?;

            let text = match frame {
                Some(Ok(Message::Text(text))) => text,
                Some(Ok(Message::Binary(bytes))) => String::from_utf8(bytes)
                    .map_err(|e| ProtocolError::Malformed(format!("binary frame: {e}")))?,
                Some(Ok(Message::Close(_))) | None => {
                    return Err(ClientError::Transport(
                        "connection closed before handshake completed".into(),
                    ));
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(ClientError::Transport(e.to_string())),
            };

            let message = ServerMessage::decode(&text)?;
            debug!(kind = message.kind(), "received envelope");
            return Ok(message);
        }
    }
}

async fn send(socket: &mut Socket, message: &ClientMessage) -> Result<()> {
    let frame = message.encode()?;
    socket.send(Message::Text(frame)).await.map_err(|e| {
        warn!(kind = message.kind(), error = %e, "send failed");
        ClientError::Transport(e.to_string())
    })
}
