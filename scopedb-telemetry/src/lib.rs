//! Tracing setup shared by the ScopeDB binaries and test suites.

pub mod tracing;
