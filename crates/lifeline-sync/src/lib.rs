//! Client-side synchronization for Lifeline.
//!
//! A [`Session`] keeps a local mirror of the signed-in user's record and
//! contact list in step with a [`lifeline_core::remote::Remote`]. Every write
//! follows the same pattern: apply the change to the mirror, issue the remote
//! call, and on failure reload the affected part of the mirror from the
//! remote. No snapshot is kept; the reload is the rollback.

mod auth;
mod config;
mod expiry;
mod mirror;
mod session;
mod state;

pub use auth::LocalAuth;
pub use config::SessionConfig;
pub use expiry::ExpiryTracker;
pub use mirror::Mirror;
pub use session::Session;
pub use state::{Action, State, reduce};
