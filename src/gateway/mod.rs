//! Contracts with the external PIR driver
//!
//! The harness never runs a PIR protocol itself. It configures the server,
//! resets and reads its metric counters, and fetches ground-truth rows
//! through [`MetricsGateway`]; it drives client initialization and reads
//! through [`PirReader`].
//!
//! Gateway counters are shared state mutated by the server side, so every
//! method takes `&self`. Implementations use interior mutability.

use std::time::Duration;
use crate::config::{PirType, TestConfig};
use crate::Result;

pub mod local;

pub use local::{LoopbackClient, LoopbackDriver};

/// Bytes of one database row
pub type Row = Vec<u8>;

/// Ground truth for one database row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowIndexVal {
    pub index: usize,
    pub key: u32,
    pub value: Row,
}

/// Server-side view used for configuration, metrics and ground truth
pub trait MetricsGateway {
    /// Fix the database shape for the run; called once before any phase
    fn configure(&self, config: &TestConfig) -> Result<()>;

    /// Zero the cumulative server-side timers and byte counters
    fn reset_metrics(&self) -> Result<()>;

    /// Server time spent on offline work since the last reset
    fn offline_timer(&self) -> Result<Duration>;

    /// Server time spent answering online queries since the last reset
    fn online_timer(&self) -> Result<Duration>;

    /// Offline bytes sent since the last reset
    fn offline_bytes(&self) -> Result<u64>;

    /// Online bytes exchanged since the last reset
    fn online_bytes(&self) -> Result<u64>;

    /// Fetch a row for correctness checks; never timed
    fn get_row(&self, index: usize) -> Result<RowIndexVal>;

    /// Current number of keys, used by the updatable client
    fn num_keys(&self) -> Result<usize>;
}

/// Client side of a PIR scheme
pub trait PirReader {
    /// Run the offline phase: fetch and process hints for `pir_type`
    fn init(&mut self, pir_type: PirType) -> Result<()>;

    /// Privately read the row at `index`
    fn read(&mut self, index: usize) -> Result<Row>;

    /// Privately read the row stored under `key` (updatable databases)
    fn read_key(&mut self, key: u32) -> Result<Row>;

    /// Persistent client storage, when the client can measure it
    fn storage_bytes(&self) -> Option<u64> {
        None
    }
}

/// Creates a fresh, uninitialized client for every offline trial
pub trait ClientFactory {
    type Client: PirReader;

    fn new_client(&mut self) -> Result<Self::Client>;
}

impl<C, F> ClientFactory for F
where
    C: PirReader,
    F: FnMut() -> Result<C>,
{
    type Client = C;

    fn new_client(&mut self) -> Result<C> {
        self()
    }
}
