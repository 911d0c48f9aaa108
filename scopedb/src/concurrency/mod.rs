pub mod backoff;
pub mod signal;
