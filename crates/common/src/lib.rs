//! Shared types for the user-auth gateway workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
