//! Client side of the user authentication handshake
//!
//! `AuthClient` proves possession of an `Identity` to a gateway over its
//! WebSocket endpoint and returns the resulting credential. It can also fetch
//! a plain service credential from the gateway's REST endpoint.

pub mod client;
pub mod error;

pub use client::{AuthClient, DEFAULT_RESPONSE_TIMEOUT};
pub use error::{ClientError, Result};
