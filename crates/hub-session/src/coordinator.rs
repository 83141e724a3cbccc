//! Session state machine for one connection
//!
//! States: `Idle` → `AwaitingChallengeResponse` → `Idle`.
//!
//! A token request starts an in-flight future that drives
//! `ChallengeIssuer::request_token`. Its verify callback pushes the challenge
//! onto the connection's outbound queue, then opens a one-shot response slot
//! and waits on it. The next `challenge` message from the peer fills that
//! slot. Until the challenge is queued there is no slot, and a response gets
//! `missing signature`. Only one request can be in flight at a time, so a
//! second token request is refused.
//!
//! The caller owns the socket. It feeds inbound frames to `handle_frame`,
//! polls `completion` for the in-flight request's result, and drains the
//! outbound queue. Dropping the coordinator drops the in-flight future and
//! with it the pending challenge.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::Utc;
use hub_auth::{AuthError, ChallengeIssuer, SigningAuthority};
use hub_protocol::{ClientMessage, Credential, ServerMessage};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::directory::UserDirectory;

/// Sent when a token request arrives while another is still in flight.
pub const REQUEST_IN_PROGRESS: &str = "request already in progress";

/// Sent when a challenge response arrives with nothing waiting for it.
pub const MISSING_SIGNATURE: &str = "missing signature";

/// Process-wide collaborators shared by every session.
#[derive(Debug)]
pub struct SessionContext {
    pub issuer: ChallengeIssuer,
    pub authority: SigningAuthority,
    pub directory: Arc<UserDirectory>,
    /// Validity of credentials handed out after a successful challenge
    pub credential_ttl: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingChallengeResponse,
}

impl SessionState {
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::AwaitingChallengeResponse => "awaiting_challenge_response",
        }
    }
}

type PendingRequest = Pin<Box<dyn Future<Output = Result<Credential, AuthError>> + Send>>;

/// Where the in-flight request parks its response sender once the challenge
/// is queued.
type ResponseSlot = Arc<Mutex<Option<oneshot::Sender<Vec<u8>>>>>;

fn lock(slot: &ResponseSlot) -> MutexGuard<'_, Option<oneshot::Sender<Vec<u8>>>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

struct InFlight {
    public_key: String,
    started: Instant,
    request: PendingRequest,
}

/// Per-connection coordinator. Not shared; handles one message at a time.
pub struct SessionCoordinator {
    context: Arc<SessionContext>,
    outbound: mpsc::Sender<ServerMessage>,
    response_slot: ResponseSlot,
    in_flight: Option<InFlight>,
}

impl SessionCoordinator {
    /// Create a coordinator whose challenges are pushed onto `outbound`.
    pub fn new(context: Arc<SessionContext>, outbound: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            context,
            outbound,
            response_slot: Arc::new(Mutex::new(None)),
            in_flight: None,
        }
    }

    pub fn state(&self) -> SessionState {
        if self.in_flight.is_some() {
            SessionState::AwaitingChallengeResponse
        } else {
            SessionState::Idle
        }
    }

    /// Decode and handle one inbound frame. Returns the immediate reply, if any.
    ///
    /// Malformed frames produce an `error` reply and leave the state untouched.
    pub fn handle_frame(&mut self, frame: &str) -> Option<ServerMessage> {
        match ClientMessage::decode(frame) {
            Ok(message) => self.handle(message),
            Err(e) => {
                debug!(error = %e, "rejecting malformed frame");
                Some(ServerMessage::error(e))
            }
        }
    }

    /// Handle one decoded message. Returns the immediate reply, if any.
    pub fn handle(&mut self, message: ClientMessage) -> Option<ServerMessage> {
        match message {
            ClientMessage::TokenRequest { public_key } => {
                if let Some(in_flight) = &self.in_flight {
                    warn!(
                        %public_key,
                        pending_for = %in_flight.public_key,
                        "token request while another is in flight"
                    );
                    return Some(ServerMessage::error(REQUEST_IN_PROGRESS));
                }
                self.start(public_key);
                None
            }
            ClientMessage::ChallengeResponse { signature } => {
                let waiter = lock(&self.response_slot).take();
                match waiter {
                    Some(waiter) => match waiter.send(signature) {
                        Ok(()) => None,
                        // the request already gave up waiting (deadline)
                        Err(_) => Some(ServerMessage::error(MISSING_SIGNATURE)),
                    },
                    None => {
                        debug!("challenge response with no outstanding challenge");
                        Some(ServerMessage::error(MISSING_SIGNATURE))
                    }
                }
            }
        }
    }

    fn start(&mut self, public_key: String) {
        let slot = self.response_slot.clone();
        let outbound = self.outbound.clone();
        let context = self.context.clone();
        let key = public_key.clone();

        let request = Box::pin(async move {
            let verify = move |payload: Vec<u8>| async move {
                outbound
                    .send(ServerMessage::Challenge { payload })
                    .await
                    .map_err(|_| AuthError::Transport("connection closed".into()))?;
                let (waiter, response) = oneshot::channel::<Vec<u8>>();
                *lock(&slot) = Some(waiter);
                response
                    .await
                    .map_err(|_| AuthError::Transport("challenge slot released".into()))
            };
            let token = context.issuer.request_token(&key, verify).await?;
            let credential = context
                .authority
                .compose_user_credential(&token, context.credential_ttl);
            context.directory.record_seen(&key, Utc::now()).await;
            Ok(credential)
        });

        info!(
            %public_key,
            deadline_ms = self.context.issuer.deadline().as_millis() as u64,
            "token request accepted, challenge pending"
        );
        self.in_flight = Some(InFlight {
            public_key,
            started: Instant::now(),
            request,
        });
    }

    /// Resolve when the in-flight request finishes; never resolves while idle.
    ///
    /// Cancel-safe: dropping the returned future keeps the request in flight.
    /// On completion the session is back to `Idle` and the reply to send is
    /// returned.
    pub async fn completion(&mut self) -> ServerMessage {
        let Some(in_flight) = self.in_flight.as_mut() else {
            return std::future::pending().await;
        };
        let result = (&mut in_flight.request).await;

        let in_flight = self.in_flight.take();
        lock(&self.response_slot).take();
        let (public_key, elapsed) = in_flight
            .map(|f| (f.public_key, f.started.elapsed()))
            .unwrap_or_default();

        let outcome = outcome_label(&result);
        metrics::counter!("userauth_challenges_total", "outcome" => outcome).increment(1);
        metrics::histogram!("userauth_challenge_duration_seconds", "outcome" => outcome)
            .record(elapsed.as_secs_f64());

        match result {
            Ok(credential) => {
                info!(
                    %public_key,
                    elapsed_ms = elapsed.as_millis() as u64,
                    expiration = %credential.expiration,
                    "credential issued"
                );
                ServerMessage::TokenIssued { credential }
            }
            Err(e) => {
                warn!(%public_key, error = %e, outcome, "token request failed");
                ServerMessage::error(e)
            }
        }
    }
}

impl Drop for SessionCoordinator {
    fn drop(&mut self) {
        if let Some(in_flight) = &self.in_flight {
            info!(
                public_key = %in_flight.public_key,
                "session closed with challenge pending, cancelling"
            );
            metrics::counter!("userauth_challenges_total", "outcome" => "cancelled").increment(1);
        }
    }
}

fn outcome_label(result: &Result<Credential, AuthError>) -> &'static str {
    match result {
        Ok(_) => "issued",
        Err(AuthError::VerificationRejected) => "rejected",
        Err(AuthError::VerificationTimeout) => "timeout",
        Err(_) => "error",
    }
}
