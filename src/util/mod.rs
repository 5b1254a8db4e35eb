//! Utility functions module
//!
//! Contains helpers for parsing size expressions and formatting byte
//! counts and microsecond timings for display.

pub mod units;

// Re-export commonly used functions
pub use units::{format_bytes, format_time, parse_size};
