//! User authentication gateway
//!
//! Single-binary service that:
//! 1. Serves the challenge handshake on `/ws/userauth`, issuing credentials
//!    to clients that prove possession of their Ed25519 key
//! 2. Serves plain service credentials on `/api` for service-to-service calls
//! 3. Reports health and Prometheus metrics

mod config;
mod error;
mod gateway;
mod metrics;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use hub_auth::{ChallengeIssuer, SigningAuthority, TokenSigner};
use hub_protocol::USERAUTH_PATH;
use hub_session::{SessionContext, UserDirectory};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use metrics_exporter_prometheus::PrometheusHandle;

use crate::config::Config;
use crate::gateway::{ConnectionGuard, GatewayStats};

/// How long open connections get to finish after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared application state accessible from all handlers
#[derive(Clone)]
struct AppState {
    context: Arc<SessionContext>,
    stats: GatewayStats,
    prometheus: PrometheusHandle,
    max_connections: usize,
}

/// Build the axum router with all routes and shared state.
///
/// The concurrency limit bounds in-flight HTTP requests; upgraded sockets
/// are bounded separately by `ws_handler`.
fn build_router(state: AppState) -> Router {
    let max_connections = state.max_connections;
    Router::new()
        .route(USERAUTH_PATH, get(ws_handler))
        .route("/api", get(credential_handler))
        .route("/api/", get(credential_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

/// Construct the process-wide signing and session collaborators.
///
/// Fails when the key or secret is unusable; the caller must not start serving.
fn build_context(config: &Config) -> error::Result<SessionContext> {
    let secret = config
        .auth
        .api_secret
        .as_ref()
        .ok_or(common::Error::MissingSecret("USER_API_SECRET"))?;
    let authority = SigningAuthority::new(config.auth.api_key.clone(), secret)?;
    let tokens = TokenSigner::new(config.auth.api_key.clone(), secret, config.auth.token_ttl())?;

    Ok(SessionContext {
        issuer: ChallengeIssuer::new(tokens, config.auth.challenge_timeout()),
        authority,
        directory: Arc::new(UserDirectory::new()),
        credential_ttl: config.auth.credential_ttl(),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting hub-userauth-gateway");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle =
        metrics::install_recorder().context("failed to install Prometheus recorder")?;

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.server.listen_addr,
        api_key = %config.auth.api_key,
        challenge_timeout_ms = config.auth.challenge_timeout_ms,
        credential_ttl_secs = config.auth.credential_ttl_secs,
        max_connections = config.server.max_connections,
        "configuration loaded"
    );

    let context = build_context(&config).context("failed to initialize signing")?;
    let stats = GatewayStats::new();

    let app = build_router(AppState {
        context: Arc::new(context),
        stats: stats.clone(),
        prometheus: prometheus_handle,
        max_connections: config.server.max_connections,
    });

    let listen_addr = config.server.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "accepting connections");

    // The drain timer starts when the signal fires, not when the server starts.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => {
            info!("all in-flight requests drained");
        }
        Ok(Ok(Err(e))) => {
            error!(error = %e, "server error during shutdown");
        }
        Ok(Err(e)) => {
            error!(error = %e, "server task panicked");
        }
        Err(_) => {
            let remaining = stats.connections_active.load(Ordering::Relaxed);
            warn!(
                remaining,
                drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
                "drain timeout exceeded, forcing shutdown"
            );
        }
    }

    info!("shutdown complete");
    Ok(())
}

/// Upgrade to the handshake socket, refusing once `max_connections` sockets are open.
///
/// The slot is reserved before the upgrade and travels with the socket task;
/// a failed upgrade drops it unused.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let Some(guard) = ConnectionGuard::try_acquire(&state.stats, state.max_connections as u64)
    else {
        warn!(
            max_connections = state.max_connections,
            "connection limit reached, refusing upgrade"
        );
        return (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            "connection limit reached",
        )
            .into_response();
    };
    ws.on_upgrade(move |socket| {
        gateway::serve_connection(socket, state.context, state.stats, guard)
    })
}

/// Synchronous credential endpoint: a fresh service signature, no token.
async fn credential_handler(State(state): State<AppState>) -> impl IntoResponse {
    let credential = state.context.authority.sign(state.context.credential_ttl);
    metrics::record_service_credential();
    info!(expiration = %credential.expiration, "service credential issued");
    axum::Json(credential)
}

/// Health endpoint: JSON with status, uptime, and gateway counters.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let users_known = state.context.directory.len().await;
    let body = serde_json::json!({
        "status": "healthy",
        "uptime_seconds": state.stats.started_at.elapsed().as_secs(),
        "connections_active": state.stats.connections_active.load(Ordering::Relaxed),
        "users_known": users_known,
        "challenges_issued": state.stats.challenges_issued.load(Ordering::Relaxed),
    });

    (
        axum::http::StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// Prometheus metrics endpoint in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        axum::http::StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use common::Secret;
    use futures_util::{SinkExt, StreamExt};
    use hub_auth::Identity;
    use hub_client::AuthClient;
    use hub_protocol::{Credential, ServerMessage};
    use tokio::net::TcpStream;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
    use tower::ServiceExt;

    const KEY: &str = "bna3znzdlwedldezod5vtn7wd3a";
    const SECRET: &str = "bkcl6scbiyvceiwztljxuxfanfke22spxpzuhc5y";

    type RawSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

    /// PrometheusHandle without installing a global recorder.
    fn test_prometheus_handle() -> PrometheusHandle {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        recorder.handle()
    }

    fn test_config(challenge_timeout_ms: u64) -> Config {
        let mut config = Config::default();
        config.auth.api_key = KEY.into();
        config.auth.api_secret = Some(Secret::new(SECRET.into()));
        config.auth.challenge_timeout_ms = challenge_timeout_ms;
        config
    }

    fn test_app_state(challenge_timeout_ms: u64, max_connections: usize) -> AppState {
        AppState {
            context: Arc::new(build_context(&test_config(challenge_timeout_ms)).unwrap()),
            stats: GatewayStats::new(),
            prometheus: test_prometheus_handle(),
            max_connections,
        }
    }

    /// Serve the router on an ephemeral port and return its base URL.
    async fn start_gateway(state: AppState) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = build_router(state);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn open_socket(base: &str) -> RawSocket {
        let url = format!("{}{USERAUTH_PATH}", base.replacen("http://", "ws://", 1));
        let (socket, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
        socket
    }

    async fn send_raw(socket: &mut RawSocket, frame: &str) {
        socket.send(Message::Text(frame.to_string())).await.unwrap();
    }

    async fn send_token_request(socket: &mut RawSocket, identity: &Identity) {
        let frame = serde_json::json!({"type": "token", "pubkey": identity.public_key().to_string()});
        send_raw(socket, &frame.to_string()).await;
    }

    async fn send_signature(socket: &mut RawSocket, signature: &[u8]) {
        let frame = serde_json::json!({"type": "challenge", "sig": signature});
        send_raw(socket, &frame.to_string()).await;
    }

    async fn recv(socket: &mut RawSocket) -> ServerMessage {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
                .await
                .expect("gateway did not answer");
            match frame {
                Some(Ok(Message::Text(text))) => return ServerMessage::decode(&text).unwrap(),
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                other => panic!("unexpected frame: {other:?}"),
            }
        }
    }

    async fn recv_challenge(socket: &mut RawSocket) -> Vec<u8> {
        match recv(socket).await {
            ServerMessage::Challenge { payload } => payload,
            other => panic!("expected challenge, got {other:?}"),
        }
    }

    async fn recv_error(socket: &mut RawSocket) -> String {
        match recv(socket).await {
            ServerMessage::Error { message } => message,
            other => panic!("expected error, got {other:?}"),
        }
    }

    async fn recv_credential(socket: &mut RawSocket) -> Credential {
        match recv(socket).await {
            ServerMessage::TokenIssued { credential } => credential,
            other => panic!("expected credential, got {other:?}"),
        }
    }

    /// Poll until no sockets are open, failing after a bounded wait.
    async fn wait_for_idle(stats: &GatewayStats) {
        for _ in 0..100 {
            if stats.connections_active.load(Ordering::Relaxed) == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("connections never drained");
    }

    #[test]
    fn build_context_refuses_missing_secret() {
        let mut config = test_config(1500);
        config.auth.api_secret = None;
        let err = build_context(&config).unwrap_err();
        assert!(matches!(
            err,
            error::Error::Config(common::Error::MissingSecret(_))
        ));

        config.auth.api_secret = Some(Secret::new("  ".into()));
        assert!(matches!(
            build_context(&config),
            Err(error::Error::Signing(_))
        ));
    }

    #[tokio::test]
    async fn client_authenticates_end_to_end() {
        let state = test_app_state(1500, 64);
        let context = state.context.clone();
        let base = start_gateway(state).await;
        let identity = Identity::generate();

        let before = Utc::now();
        let credential = AuthClient::new(base)
            .authenticate(&identity)
            .await
            .unwrap();

        assert_eq!(credential.key, KEY);
        assert!(credential.expiration > before);
        assert_eq!(context.authority.verify(&credential, Utc::now()), Ok(()));

        let token = credential.token.as_deref().expect("user credential carries a token");
        let tokens = TokenSigner::new(KEY, &Secret::new(SECRET.into()), Duration::from_secs(3600))
            .unwrap();
        let claims = tokens.verify(token).unwrap();
        assert_eq!(claims.sub, identity.public_key().to_string());

        let record = context
            .directory
            .get(&identity.public_key().to_string())
            .await
            .expect("verified user is recorded");
        assert!(record.last_seen >= before);
    }

    #[tokio::test]
    async fn repeated_authentication_keeps_one_directory_record() {
        let state = test_app_state(1500, 64);
        let context = state.context.clone();
        let base = start_gateway(state).await;
        let identity = Identity::generate();
        let client = AuthClient::new(base);

        client.authenticate(&identity).await.unwrap();
        let first = context
            .directory
            .get(&identity.public_key().to_string())
            .await
            .unwrap();
        client.authenticate(&identity).await.unwrap();
        let second = context
            .directory
            .get(&identity.public_key().to_string())
            .await
            .unwrap();

        assert_eq!(context.directory.len().await, 1);
        assert!(second.last_seen >= first.last_seen);
    }

    #[tokio::test]
    async fn signature_without_request_is_missing_signature() {
        let base = start_gateway(test_app_state(1500, 64)).await;
        let mut socket = open_socket(&base).await;

        send_signature(&mut socket, &[1, 2, 3]).await;
        assert_eq!(recv_error(&mut socket).await, "missing signature");

        // connection stays usable
        let identity = Identity::generate();
        send_token_request(&mut socket, &identity).await;
        let payload = recv_challenge(&mut socket).await;
        send_signature(&mut socket, &identity.sign(&payload)).await;
        recv_credential(&mut socket).await;
    }

    #[tokio::test]
    async fn second_request_while_pending_is_refused() {
        let base = start_gateway(test_app_state(1500, 64)).await;
        let mut socket = open_socket(&base).await;
        let identity = Identity::generate();

        send_token_request(&mut socket, &identity).await;
        let payload = recv_challenge(&mut socket).await;

        send_token_request(&mut socket, &identity).await;
        assert_eq!(recv_error(&mut socket).await, "request already in progress");

        send_signature(&mut socket, &identity.sign(&payload)).await;
        let credential = recv_credential(&mut socket).await;
        assert_eq!(credential.key, KEY);

        // a subsequent request is accepted
        send_token_request(&mut socket, &identity).await;
        recv_challenge(&mut socket).await;
    }

    #[tokio::test]
    async fn pending_challenge_on_one_socket_is_invisible_to_another() {
        let base = start_gateway(test_app_state(1500, 64)).await;
        let mut first = open_socket(&base).await;
        let mut second = open_socket(&base).await;
        let identity = Identity::generate();

        send_token_request(&mut first, &identity).await;
        let payload = recv_challenge(&mut first).await;

        send_signature(&mut second, &identity.sign(&payload)).await;
        assert_eq!(recv_error(&mut second).await, "missing signature");

        send_signature(&mut first, &identity.sign(&payload)).await;
        recv_credential(&mut first).await;
    }

    #[tokio::test]
    async fn unanswered_challenge_times_out_and_slot_is_freed() {
        let base = start_gateway(test_app_state(150, 64)).await;
        let mut socket = open_socket(&base).await;
        let identity = Identity::generate();

        send_token_request(&mut socket, &identity).await;
        recv_challenge(&mut socket).await;
        assert_eq!(
            recv_error(&mut socket).await,
            "challenge response timed out"
        );

        send_token_request(&mut socket, &identity).await;
        let payload = recv_challenge(&mut socket).await;
        send_signature(&mut socket, &identity.sign(&payload)).await;
        recv_credential(&mut socket).await;
    }

    #[tokio::test]
    async fn signature_from_other_key_is_rejected() {
        let state = test_app_state(1500, 64);
        let context = state.context.clone();
        let base = start_gateway(state).await;
        let mut socket = open_socket(&base).await;
        let claimed = Identity::generate();
        let impostor = Identity::generate();

        send_token_request(&mut socket, &claimed).await;
        let payload = recv_challenge(&mut socket).await;
        send_signature(&mut socket, &impostor.sign(&payload)).await;

        assert_eq!(
            recv_error(&mut socket).await,
            "signature rejected for public key"
        );
        assert!(context.directory.is_empty().await);
    }

    #[tokio::test]
    async fn malformed_frames_are_reported_and_connection_survives() {
        let base = start_gateway(test_app_state(1500, 64)).await;
        let mut socket = open_socket(&base).await;

        send_raw(&mut socket, "not json").await;
        assert!(recv_error(&mut socket).await.starts_with("malformed message"));

        send_raw(&mut socket, r#"{"type":"token"}"#).await;
        assert_eq!(recv_error(&mut socket).await, "missing pubkey");

        send_raw(&mut socket, r#"{"type":"challenge"}"#).await;
        assert_eq!(recv_error(&mut socket).await, "missing signature (sig)");

        send_raw(&mut socket, r#"{"type":"token","pubkey":"pk1"}"#).await;
        assert!(
            recv_error(&mut socket)
                .await
                .starts_with("invalid public key")
        );

        let identity = Identity::generate();
        send_token_request(&mut socket, &identity).await;
        recv_challenge(&mut socket).await;
    }

    #[tokio::test]
    async fn binary_frames_are_decoded_like_text() {
        let base = start_gateway(test_app_state(1500, 64)).await;
        let mut socket = open_socket(&base).await;
        let identity = Identity::generate();

        let request =
            serde_json::json!({"type": "token", "pubkey": identity.public_key().to_string()});
        socket
            .send(Message::Binary(request.to_string().into_bytes()))
            .await
            .unwrap();
        let payload = recv_challenge(&mut socket).await;

        // not UTF-8: reported, and the pending request is untouched
        socket.send(Message::Binary(vec![0xff, 0xfe])).await.unwrap();
        assert!(recv_error(&mut socket).await.starts_with("malformed message"));

        let response = serde_json::json!({"type": "challenge", "sig": identity.sign(&payload)});
        socket
            .send(Message::Binary(response.to_string().into_bytes()))
            .await
            .unwrap();
        let credential = recv_credential(&mut socket).await;
        assert_eq!(credential.key, KEY);
    }

    #[tokio::test]
    async fn buffer_shaped_signature_is_accepted() {
        let base = start_gateway(test_app_state(1500, 64)).await;
        let mut socket = open_socket(&base).await;
        let identity = Identity::generate();

        send_token_request(&mut socket, &identity).await;
        let payload = recv_challenge(&mut socket).await;
        let frame = serde_json::json!({
            "type": "challenge",
            "sig": {"type": "Buffer", "data": identity.sign(&payload)},
        });
        send_raw(&mut socket, &frame.to_string()).await;
        recv_credential(&mut socket).await;
    }

    #[tokio::test]
    async fn closing_mid_challenge_releases_the_session() {
        let state = test_app_state(1500, 64);
        let stats = state.stats.clone();
        let context = state.context.clone();
        let base = start_gateway(state).await;
        let mut socket = open_socket(&base).await;
        let identity = Identity::generate();

        send_token_request(&mut socket, &identity).await;
        recv_challenge(&mut socket).await;
        assert_eq!(stats.connections_active.load(Ordering::Relaxed), 1);
        socket.close(None).await.unwrap();
        drop(socket);

        wait_for_idle(&stats).await;
        assert!(context.directory.is_empty().await);
        assert_eq!(stats.challenges_issued.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn upgrade_refused_past_connection_limit() {
        let base = start_gateway(test_app_state(1500, 1)).await;
        let mut first = open_socket(&base).await;

        // make sure the first socket is being served before opening another
        send_signature(&mut first, &[1]).await;
        recv_error(&mut first).await;

        let url = format!("{}{USERAUTH_PATH}", base.replacen("http://", "ws://", 1));
        assert!(tokio_tungstenite::connect_async(url.as_str()).await.is_err());
    }

    #[tokio::test]
    async fn closed_socket_frees_its_slot() {
        let state = test_app_state(1500, 1);
        let stats = state.stats.clone();
        let base = start_gateway(state).await;

        let mut first = open_socket(&base).await;
        send_signature(&mut first, &[1]).await;
        recv_error(&mut first).await;
        first.close(None).await.unwrap();
        drop(first);
        wait_for_idle(&stats).await;

        let mut second = open_socket(&base).await;
        send_signature(&mut second, &[1]).await;
        assert_eq!(recv_error(&mut second).await, "missing signature");
    }

    #[tokio::test]
    async fn request_without_upgrade_headers_reserves_nothing() {
        let state = test_app_state(1500, 1);
        let stats = state.stats.clone();
        let app = build_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri(USERAUTH_PATH)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_client_error());
        assert_eq!(stats.connections_active.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn service_credential_endpoint_over_http() {
        let state = test_app_state(1500, 64);
        let context = state.context.clone();
        let base = start_gateway(state).await;

        let before = Utc::now();
        let credential = AuthClient::new(base).service_credential().await.unwrap();
        assert_eq!(credential.key, KEY);
        assert!(credential.token.is_none());
        assert!(credential.expiration > before);
        assert_eq!(context.authority.verify(&credential, Utc::now()), Ok(()));
    }

    #[tokio::test]
    async fn service_credential_endpoint_with_trailing_slash() {
        let app = build_router(test_app_state(1500, 64));
        let response = app
            .oneshot(Request::builder().uri("/api/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["key"], KEY);
        for field in ["sig", "msg", "expiration"] {
            assert!(json[field].is_string(), "{field} must be present");
        }
        assert!(json.get("token").is_none());
    }

    #[tokio::test]
    async fn health_endpoint_reports_counters() {
        let state = test_app_state(1500, 64);
        state
            .context
            .directory
            .record_seen("pk-health", Utc::now())
            .await;
        let app = build_router(state);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "healthy");
        assert!(json["uptime_seconds"].is_u64());
        assert_eq!(json["connections_active"], 0);
        assert_eq!(json["users_known"], 1);
        assert_eq!(json["challenges_issued"], 0);
    }

    #[tokio::test]
    async fn metrics_endpoint_returns_prometheus_format() {
        let app = build_router(test_app_state(1500, 64));
        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response
            .headers()
            .get(axum::http::header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(content_type.starts_with("text/plain"));
    }
}
