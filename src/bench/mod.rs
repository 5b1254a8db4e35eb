//! Benchmark engine module
//!
//! Runs the offline phase (repeated client initialization) and the online
//! phase (repeated verified reads) against a [`MetricsGateway`], keeping
//! server-attributed time and bytes apart from client-attributed ones.
//!
//! Everything here is sequential. Each measurement window is preceded by a
//! metrics reset and no two windows overlap, because gateway counters are
//! not scoped per caller.

pub mod offline;
pub mod online;
pub mod stats;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use rand::rngs::SmallRng;
use tokio::sync::mpsc::UnboundedSender;
use tracing::info;
use crate::config::{PirType, TestConfig};
use crate::gateway::{ClientFactory, MetricsGateway};
use crate::models::{BenchmarkResult, ConfigRecord};
use crate::{BenchError, Result, MAX_NUM_QUERIES};

pub use offline::OfflineOutcome;

/// How many offline trials to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialCount {
    /// Exactly this many trials in a single batch
    Fixed(u64),
    /// Grow the batch until one batch takes at least `target` wall time
    Adaptive { target: Duration, max_trials: u64 },
}

impl Default for TrialCount {
    fn default() -> Self {
        TrialCount::Adaptive {
            target: Duration::from_secs(1),
            max_trials: 1_000_000,
        }
    }
}

impl TrialCount {
    /// Size of the first batch
    pub fn first_batch(&self) -> u64 {
        match *self {
            TrialCount::Fixed(n) => n.max(1),
            TrialCount::Adaptive { .. } => 1,
        }
    }

    /// Size of the next batch after a batch of `n` trials took `elapsed`,
    /// or `None` when that batch is the one to report
    pub fn next_batch(&self, n: u64, elapsed: Duration) -> Option<u64> {
        match *self {
            TrialCount::Fixed(_) => None,
            TrialCount::Adaptive { target, max_trials } => {
                if elapsed >= target || n >= max_trials {
                    return None;
                }
                let n = n as u128;
                let elapsed_ns = elapsed.as_nanos().max(1);
                let mut next = target.as_nanos() * n / elapsed_ns;
                next += next / 5;
                next = next.min(100 * n).max(n + 1).min(max_trials as u128);
                Some(next as u64)
            }
        }
    }
}

/// Which phase a progress update belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Offline,
    Online,
}

/// Progress update sent during benchmark execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub phase: Phase,
    /// Trials finished in the current batch or queries finished
    pub completed: u64,
    /// Trials in the current batch or total queries
    pub total: u64,
}

/// What to benchmark
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchmarkPlan {
    pub test_config: TestConfig,
    pub pir_type: PirType,
    pub num_queries: usize,
}

impl BenchmarkPlan {
    pub fn new(test_config: TestConfig, pir_type: PirType, num_queries: usize) -> Self {
        Self {
            test_config,
            pir_type,
            num_queries,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.num_queries == 0 {
            return Err(BenchError::InputError(
                "number of queries must be at least 1".to_string(),
            ));
        }
        if self.num_queries > MAX_NUM_QUERIES {
            return Err(BenchError::InputError(format!(
                "number of queries must be at most {} (got {})",
                MAX_NUM_QUERIES, self.num_queries
            )));
        }
        if self.test_config.num_rows == 0 || self.test_config.row_len == 0 {
            return Err(BenchError::InputError(format!(
                "database must have at least one row of at least one byte (got {} x {})",
                self.test_config.num_rows, self.test_config.row_len
            )));
        }
        Ok(())
    }
}

/// Drives both phases against one gateway
pub struct BenchmarkOrchestrator<'a, G: MetricsGateway + ?Sized> {
    gateway: &'a G,
    rng: SmallRng,
    trials: TrialCount,
    progress_tx: Option<UnboundedSender<ProgressUpdate>>,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a, G: MetricsGateway + ?Sized> BenchmarkOrchestrator<'a, G> {
    /// `rng` picks the online query indices; seed it for reproducible runs
    pub fn new(gateway: &'a G, rng: SmallRng) -> Self {
        Self {
            gateway,
            rng,
            trials: TrialCount::default(),
            progress_tx: None,
            cancel: None,
        }
    }

    pub fn with_trials(mut self, trials: TrialCount) -> Self {
        self.trials = trials;
        self
    }

    pub fn with_progress(mut self, progress_tx: UnboundedSender<ProgressUpdate>) -> Self {
        self.progress_tx = Some(progress_tx);
        self
    }

    /// Stop between trials and queries once `cancel` is set
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Configure the driver, then run the offline and online phases.
    /// Any failure aborts the run; no partial result is returned.
    pub fn run<F: ClientFactory>(
        &mut self,
        plan: &BenchmarkPlan,
        factory: &mut F,
    ) -> Result<BenchmarkResult> {
        plan.validate()?;
        let config = &plan.test_config;

        self.gateway.configure(config).map_err(|e| match e {
            BenchError::ConfigurationError(_) => e.context("Configure"),
            other => BenchError::ConfigurationError(format!("Configure: {}", other)),
        })?;

        info!(
            pir_type = %plan.pir_type,
            num_rows = config.num_rows,
            row_len = config.row_len,
            "Running offline phase (hint generation)"
        );
        let OfflineOutcome {
            record: offline,
            mut client,
            trials,
        } = self.run_offline(plan, factory)?;
        info!(trials, server_us = offline.server_time_us, client_us = offline.client_time_us, "Offline phase done");

        info!(queries = plan.num_queries, "Running online phase");
        let online = self.run_online(plan, &mut client)?;
        info!(avg_total_us = online.avg_total_us, "Online phase done");

        Ok(BenchmarkResult {
            config: ConfigRecord::new(config.num_rows, config.row_len, plan.pir_type),
            offline,
            online,
        })
    }

    fn check_cancelled(&self) -> Result<()> {
        match &self.cancel {
            Some(cancel) if cancel.load(Ordering::Relaxed) => {
                Err(BenchError::GatewayError("run cancelled".to_string()))
            }
            _ => Ok(()),
        }
    }

    fn report(&self, phase: Phase, completed: u64, total: u64) {
        if let Some(tx) = &self.progress_tx {
            // A closed receiver only means nobody is watching.
            let _ = tx.send(ProgressUpdate {
                phase,
                completed,
                total,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_trial_count_is_single_batch() {
        let trials = TrialCount::Fixed(5);
        assert_eq!(trials.first_batch(), 5);
        assert_eq!(trials.next_batch(5, Duration::ZERO), None);
        assert_eq!(TrialCount::Fixed(0).first_batch(), 1);
    }

    #[test]
    fn test_adaptive_trial_count_grows_until_target() {
        let trials = TrialCount::Adaptive {
            target: Duration::from_secs(1),
            max_trials: 1_000_000,
        };
        assert_eq!(trials.first_batch(), 1);
        // 1 trial in 1ms predicts 1000, +20%, capped at 100x
        assert_eq!(trials.next_batch(1, Duration::from_millis(1)), Some(100));
        // 100 trials in 500ms predicts 200, +20%
        assert_eq!(trials.next_batch(100, Duration::from_millis(500)), Some(240));
        // slow batch still grows by at least one
        assert_eq!(trials.next_batch(3, Duration::from_millis(999)), Some(4));
        assert_eq!(trials.next_batch(240, Duration::from_secs(1)), None);
        // zero elapsed time is treated as one nanosecond
        assert_eq!(trials.next_batch(2, Duration::ZERO), Some(200));
    }

    #[test]
    fn test_adaptive_trial_count_respects_max() {
        let trials = TrialCount::Adaptive {
            target: Duration::from_secs(10),
            max_trials: 50,
        };
        assert_eq!(trials.next_batch(1, Duration::from_micros(1)), Some(50));
        assert_eq!(trials.next_batch(50, Duration::from_millis(1)), None);
    }

    #[test]
    fn test_plan_validation() {
        let plan = BenchmarkPlan::new(TestConfig::new(10, 16), PirType::NonPrivate, 0);
        assert!(matches!(plan.validate(), Err(BenchError::InputError(_))));
        let plan = BenchmarkPlan::new(TestConfig::new(0, 16), PirType::NonPrivate, 1);
        assert!(plan.validate().is_err());
        let plan = BenchmarkPlan::new(TestConfig::new(10, 16), PirType::NonPrivate, 1);
        assert!(plan.validate().is_ok());
        let plan = BenchmarkPlan::new(
            TestConfig::new(10, 16),
            PirType::NonPrivate,
            MAX_NUM_QUERIES + 1,
        );
        assert!(matches!(plan.validate(), Err(BenchError::InputError(_))));
    }
}
