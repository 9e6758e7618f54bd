//! Common utilities shared by the scan loop and the broker client
//!
//! - Exponential backoff with caller-owned state

pub mod backoff;

pub use backoff::{BackoffPolicy, BackoffState};
