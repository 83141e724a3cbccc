//! Challenge issuance and verification
//!
//! The issuer never talks to the network itself. `request_token` takes a
//! verify callback that receives the random payload and resolves with the
//! client's signature; the session layer plugs a WebSocket round trip in
//! there. The issuer bounds the callback with its deadline and checks the
//! returned signature against the claimed key before minting anything.

use std::future::Future;
use std::time::Duration;

use rand::RngExt;
use tracing::{debug, info, warn};

use crate::constants::CHALLENGE_LEN;
use crate::error::{AuthError, Result};
use crate::identity::PublicKey;
use crate::token::{Token, TokenSigner};

/// Generate an unpredictable challenge payload.
pub fn generate_challenge() -> Vec<u8> {
    let mut bytes = [0u8; CHALLENGE_LEN];
    rand::rng().fill(&mut bytes);
    bytes.to_vec()
}

/// Issues tokens to clients that prove possession of a private key.
#[derive(Debug, Clone)]
pub struct ChallengeIssuer {
    tokens: TokenSigner,
    deadline: Duration,
}

impl ChallengeIssuer {
    pub fn new(tokens: TokenSigner, deadline: Duration) -> Self {
        Self { tokens, deadline }
    }

    /// How long `verify` may take before the request fails.
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Run one challenge for `public_key` and mint a token on success.
    ///
    /// Errors:
    /// - `InvalidPublicKey` before any challenge is generated
    /// - `VerificationTimeout` if `verify` does not resolve within the deadline
    ///   (the callback future is dropped, releasing whatever it waits on)
    /// - `VerificationRejected` if the signature does not verify under `public_key`
    /// - whatever error `verify` itself resolves with (typically `Transport`)
    pub async fn request_token<F, Fut>(&self, public_key: &str, verify: F) -> Result<Token>
    where
        F: FnOnce(Vec<u8>) -> Fut,
        Fut: Future<Output = Result<Vec<u8>>>,
    {
        let public_key = PublicKey::parse(public_key)?;
        let challenge = generate_challenge();
        debug!(%public_key, deadline_ms = self.deadline.as_millis() as u64, "issuing challenge");

        let signature = match tokio::time::timeout(self.deadline, verify(challenge.clone())).await
        {
            Ok(result) => result?,
            Err(_) => {
                warn!(%public_key, "challenge response deadline elapsed");
                return Err(AuthError::VerificationTimeout);
            }
        };

        if let Err(e) = public_key.verify(&challenge, &signature) {
            warn!(%public_key, "challenge signature rejected");
            return Err(e);
        }

        let token = self.tokens.mint(&public_key)?;
        info!(%public_key, "challenge verified, token minted");
        Ok(token)
    }
}
