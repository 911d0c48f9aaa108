//! Configuration types shared by the ScopeDB client crates.
//!
//! Every type deserializes with serde defaults, so a partially specified document yields a
//! usable configuration. Call `validate()` before handing a configuration to the client.

pub mod shared;
