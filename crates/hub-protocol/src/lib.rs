//! Wire protocol for the user-auth challenge handshake
//!
//! One JSON object per WebSocket frame, internally tagged by `type`.
//! The same `type` string is reused in both directions with different
//! payloads, so client and server messages are separate enums:
//!
//! - client → server: `token` (claimed public key), `challenge` (signature)
//! - server → client: `challenge` (payload to sign), `token` (credential),
//!   `error` (human-readable reason)
//!
//! Byte arrays travel as JSON arrays of numbers.

pub mod bytes;
pub mod credential;
pub mod envelope;
pub mod error;

/// Route the gateway serves the handshake socket on.
pub const USERAUTH_PATH: &str = "/ws/userauth";

pub use credential::Credential;
pub use envelope::{ClientMessage, ServerMessage};
pub use error::{ProtocolError, Result};
