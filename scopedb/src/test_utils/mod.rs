//! Helpers shared by the unit and integration tests of the client.
//!
//! - [`fixtures`] builds server responses for statements and ingestion.
//! - [`arrow`] builds small Arrow schemas and record batches.
//! - [`notify`] waits on notifications with a timeout so tests fail instead of hanging.
pub mod arrow;
pub mod fixtures;
pub mod notify;
