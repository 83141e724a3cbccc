//! Proof-of-possession authentication and credential minting
//!
//! Issues short-lived credentials to clients that prove control of an Ed25519
//! private key without the key ever leaving the client.
//!
//! Flow:
//! 1. Client presents its public key (`identity::PublicKey`)
//! 2. `challenge::ChallengeIssuer` generates a random payload and hands it to
//!    a caller-supplied verify callback, which returns the client's signature
//! 3. The signature is checked against the claimed key, then a
//!    `token::Token` bound to that key is minted
//! 4. `signing::SigningAuthority` composes the final credential from the
//!    token and a fresh time-bounded API signature

pub mod challenge;
pub mod constants;
pub mod error;
pub mod identity;
pub mod signing;
pub mod token;

pub use challenge::{ChallengeIssuer, generate_challenge};
pub use constants::*;
pub use error::{AuthError, Result};
pub use identity::{Identity, PublicKey};
pub use signing::SigningAuthority;
pub use token::{Token, TokenClaims, TokenSigner};
