//! Ed25519 identities and public keys
//!
//! A public key's stable string form is URL-safe base64 (no padding) of its
//! 32 raw bytes. That string is what clients put in a token request and what
//! the user directory is keyed by.

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use common::Secret;
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::RngExt;
use zeroize::Zeroize;

use crate::constants::{PUBLIC_KEY_LEN, SIGNATURE_LEN};
use crate::error::{AuthError, Result};

/// A key pair able to sign arbitrary bytes. Never transmitted.
///
/// The private half is zeroized on drop by `ed25519-dalek`.
pub struct Identity {
    signing_key: SigningKey,
}

impl Identity {
    /// Generate a fresh identity from OS randomness.
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        rand::rng().fill(&mut seed);
        let identity = Self::from_seed(&seed);
        seed.zeroize();
        identity
    }

    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Restore an identity exported with [`Identity::to_secret_string`].
    pub fn from_secret_string(encoded: &str) -> Result<Self> {
        let mut bytes = URL_SAFE_NO_PAD
            .decode(encoded.trim())
            .map_err(|_| AuthError::InvalidIdentity("private key is not valid base64url".into()))?;
        let seed: Result<[u8; 32]> = bytes.as_slice().try_into().map_err(|_| {
            AuthError::InvalidIdentity(format!(
                "private key must be 32 bytes, got {}",
                bytes.len()
            ))
        });
        bytes.zeroize();
        let mut seed = seed?;
        let identity = Self::from_seed(&seed);
        seed.zeroize();
        Ok(identity)
    }

    /// Export the private seed so callers can persist it however they like.
    pub fn to_secret_string(&self) -> Secret<String> {
        Secret::new(URL_SAFE_NO_PAD.encode(self.signing_key.to_bytes()))
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing_key.verifying_key())
    }

    /// Sign `payload`, returning the 64-byte signature.
    pub fn sign(&self, payload: &[u8]) -> Vec<u8> {
        self.signing_key.sign(payload).to_bytes().to_vec()
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Identity").field(&self.public_key()).finish()
    }
}

/// The public half of an [`Identity`].
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    /// Parse the stable string encoding.
    pub fn parse(encoded: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|_| AuthError::InvalidPublicKey("not valid base64url".into()))?;
        let raw: [u8; PUBLIC_KEY_LEN] = bytes.as_slice().try_into().map_err(|_| {
            AuthError::InvalidPublicKey(format!(
                "expected {PUBLIC_KEY_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        VerifyingKey::from_bytes(&raw)
            .map(PublicKey)
            .map_err(|_| AuthError::InvalidPublicKey("not a valid ed25519 point".into()))
    }

    /// Check that `signature` is a valid signature of `payload` under this key.
    ///
    /// Uses strict verification so malleable and small-order signatures fail.
    pub fn verify(&self, payload: &[u8], signature: &[u8]) -> Result<()> {
        if signature.len() != SIGNATURE_LEN {
            return Err(AuthError::VerificationRejected);
        }
        let signature =
            Signature::from_slice(signature).map_err(|_| AuthError::VerificationRejected)?;
        self.0
            .verify_strict(payload, &signature)
            .map_err(|_| AuthError::VerificationRejected)
    }

    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_LEN] {
        self.0.to_bytes()
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&URL_SAFE_NO_PAD.encode(self.0.to_bytes()))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({self})")
    }
}

impl FromStr for PublicKey {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
