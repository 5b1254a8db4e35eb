//! Data models module
//!
//! Contains the benchmark result record and its configuration, offline
//! and online sub-records.

pub mod result;

// Re-export commonly used types
pub use result::{BenchmarkResult, ConfigRecord, OfflineRecord, OnlineRecord};
