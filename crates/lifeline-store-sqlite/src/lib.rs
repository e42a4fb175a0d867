//! SQLite backend for Lifeline.
//!
//! Implements [`lifeline_core::remote::Remote`] with the server-side
//! semantics the client expects: paired edges, mirrored ping flags, and
//! per-user change streams. Wraps [`tokio_rusqlite`] so all database access
//! runs on a dedicated thread without blocking the async runtime.

mod encode;
mod notify;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
