//! PIRBENCH - PIR offline/online benchmark harness
//!
//! Measures the one-time hint generation phase and the per-query phase of a
//! PIR client/server pair, separating server-attributed time and bytes from
//! client-attributed time and bytes.

use std::fmt;

pub mod bench;
pub mod cli;
pub mod config;
pub mod gateway;
pub mod models;
pub mod util;

// Common error types
#[derive(Debug)]
pub enum BenchError {
    /// Size expression does not match `<number>[.<fraction>]<unit>`
    InvalidFormat(String),
    /// Numeric part of a size expression could not be parsed
    InvalidNumber(String),
    /// Bad user input (PIR type name, row length, query count)
    InputError(String),
    /// Settings file could not be read, parsed or validated
    ConfigError(String),
    /// The driver rejected the test configuration or PIR variant
    ConfigurationError(String),
    /// A read returned a value that differs from the ground truth
    CorrectnessError(String),
    /// A gateway or client call failed
    GatewayError(String),
    /// The result record could not be serialized or written
    PersistError(String),
    /// I/O operation failed
    IoError(std::io::Error),
}

impl fmt::Display for BenchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BenchError::InvalidFormat(msg) => write!(f, "Invalid size format: {}", msg),
            BenchError::InvalidNumber(msg) => write!(f, "Invalid number: {}", msg),
            BenchError::InputError(msg) => write!(f, "Input error: {}", msg),
            BenchError::ConfigError(msg) => write!(f, "Settings error: {}", msg),
            BenchError::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
            BenchError::CorrectnessError(msg) => write!(f, "Correctness error: {}", msg),
            BenchError::GatewayError(msg) => write!(f, "Gateway error: {}", msg),
            BenchError::PersistError(msg) => write!(f, "Results persistence error: {}", msg),
            BenchError::IoError(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl BenchError {
    /// Prefix the message with the call or step that produced the error,
    /// keeping the error kind
    pub fn context(self, context: &str) -> Self {
        match self {
            BenchError::InvalidFormat(msg) => BenchError::InvalidFormat(format!("{}: {}", context, msg)),
            BenchError::InvalidNumber(msg) => BenchError::InvalidNumber(format!("{}: {}", context, msg)),
            BenchError::InputError(msg) => BenchError::InputError(format!("{}: {}", context, msg)),
            BenchError::ConfigError(msg) => BenchError::ConfigError(format!("{}: {}", context, msg)),
            BenchError::ConfigurationError(msg) => {
                BenchError::ConfigurationError(format!("{}: {}", context, msg))
            }
            BenchError::CorrectnessError(msg) => {
                BenchError::CorrectnessError(format!("{}: {}", context, msg))
            }
            BenchError::GatewayError(msg) => BenchError::GatewayError(format!("{}: {}", context, msg)),
            BenchError::PersistError(msg) => BenchError::PersistError(format!("{}: {}", context, msg)),
            BenchError::IoError(err) => BenchError::GatewayError(format!("{}: {}", context, err)),
        }
    }
}

impl std::error::Error for BenchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BenchError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for BenchError {
    fn from(err: std::io::Error) -> Self {
        BenchError::IoError(err)
    }
}

impl From<serde_json::Error> for BenchError {
    fn from(err: serde_json::Error) -> Self {
        BenchError::PersistError(format!("JSON serialization error: {}", err))
    }
}

impl From<toml::de::Error> for BenchError {
    fn from(err: toml::de::Error) -> Self {
        BenchError::ConfigError(format!("TOML parsing error: {}", err))
    }
}

/// Result type alias for harness operations
pub type Result<T> = std::result::Result<T, BenchError>;

/// Error handling utilities
pub mod error {
    use super::BenchError;

    /// Errors caused by what the user typed, reported together with usage
    pub fn is_input_error(error: &BenchError) -> bool {
        matches!(
            error,
            BenchError::InvalidFormat(_) | BenchError::InvalidNumber(_) | BenchError::InputError(_)
        )
    }

    /// Convert error to user-friendly message with guidance
    pub fn user_friendly_message(error: &BenchError) -> String {
        match error {
            BenchError::InvalidFormat(_) | BenchError::InvalidNumber(_) => format!(
                "{}. Use formats like 1GB, 500MB, 100KB, or raw bytes.",
                error
            ),
            BenchError::InputError(_) => format!("{}. Run with --help for usage.", error),
            BenchError::ConfigError(_) => {
                format!("{}. Check the settings file or pass --config.", error)
            }
            BenchError::ConfigurationError(_) => format!(
                "{}. The driver refused this configuration; no measurement was taken.",
                error
            ),
            BenchError::CorrectnessError(_) => format!(
                "{}. The benchmark is invalid and no result was recorded.",
                error
            ),
            BenchError::PersistError(_) => format!(
                "{}. The report above is still valid; check the output path.",
                error
            ),
            _ => error.to_string(),
        }
    }
}

// Common types and constants
pub const APP_NAME: &str = "pirbench";
pub const CONFIG_FILE: &str = "pirbench.toml";
/// Largest database accepted without `--force` (8 GiB, in-memory limit)
pub const MAX_IN_MEMORY_SIZE: u64 = 8 * 1024 * 1024 * 1024;
pub const DEFAULT_NUM_QUERIES: usize = 100;
/// Upper bound on online queries per run; samples are kept in memory
pub const MAX_NUM_QUERIES: usize = 10_000_000;
