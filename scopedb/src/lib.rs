//! HTTP client for ScopeDB.
//!
//! [`Client`] submits statements and polls them until they reach a terminal status, and
//! builds [`cable`]s which batch records in the background and ingest them through a
//! transform statement.

mod macros;

pub mod cable;
pub mod client;
pub mod codec;
pub mod concurrency;
pub mod error;
pub mod metrics;
pub mod protocol;
pub mod result;
pub mod statement;
pub mod table;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod workers;

pub use client::Client;
pub use error::{ErrorKind, ScopeDbError, ScopeDbResult};
pub use scopedb_config::shared::{CableConfig, ClientConfig, PollConfig, ValidationError};
