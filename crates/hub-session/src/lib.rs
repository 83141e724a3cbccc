//! Per-connection session coordination for the challenge handshake
//!
//! A `SessionCoordinator` owns everything scoped to one socket: the at most
//! one outstanding challenge, the one-shot slot its response is delivered
//! through, and the in-flight token request. The `UserDirectory` is the only
//! state shared across connections.
//!
//! Session lifecycle:
//! 1. `token` request → challenge generated and relayed to the peer,
//!    state `AwaitingChallengeResponse`
//! 2. `challenge` response → signature handed to the waiting request
//! 3. Request completes (credential, timeout, or rejection) → back to `Idle`
//! 4. Socket closes → coordinator dropped, any pending wait cancelled

pub mod coordinator;
pub mod directory;

pub use coordinator::{
    MISSING_SIGNATURE, REQUEST_IN_PROGRESS, SessionContext, SessionCoordinator, SessionState,
};
pub use directory::{UserDirectory, UserRecord};
