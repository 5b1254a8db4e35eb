//! Offline phase: repeated client initialization
//!
//! Trials run in batches. Within a batch the server counters are reset once
//! and read once at the end, so per-trial figures come from cumulative sums
//! divided by the trial count; independent timer noise cancels instead of
//! accumulating per-trial subtraction error.

use std::time::{Duration, Instant};
use tracing::debug;
use crate::bench::{stats, BenchmarkOrchestrator, BenchmarkPlan, Phase};
use crate::gateway::{ClientFactory, MetricsGateway, PirReader};
use crate::models::OfflineRecord;
use crate::{BenchError, Result};

/// Offline record plus the last initialized client, reused online
pub struct OfflineOutcome<C> {
    pub record: OfflineRecord,
    pub client: C,
    /// Trials in the reported batch
    pub trials: u64,
}

/// Raw cumulative measurements of one batch
struct OfflineBatch<C> {
    trials: u64,
    wall: Duration,
    server: Duration,
    bytes: u64,
    client_storage: Option<u64>,
    client: C,
}

impl<C> OfflineBatch<C> {
    fn into_outcome(self, plan: &BenchmarkPlan) -> OfflineOutcome<C> {
        let n = self.trials.max(1);
        let config = &plan.test_config;

        let storage_bytes = match self.client_storage {
            Some(total) if config.updatable => total / n,
            _ => stats::client_storage_estimate(config.num_rows, config.row_len),
        };

        let record = OfflineRecord {
            server_time_us: (self.server.as_micros() / n as u128) as i64,
            client_time_us: (self.wall.saturating_sub(self.server).as_micros() / n as u128) as i64,
            comm_bytes: self.bytes / n,
            storage_bytes,
        };

        OfflineOutcome {
            record,
            client: self.client,
            trials: self.trials,
        }
    }
}

impl<'a, G: MetricsGateway + ?Sized> BenchmarkOrchestrator<'a, G> {
    /// Run offline batches until the trial policy settles, then report
    /// per-trial averages of the final batch
    pub fn run_offline<F: ClientFactory>(
        &mut self,
        plan: &BenchmarkPlan,
        factory: &mut F,
    ) -> Result<OfflineOutcome<F::Client>> {
        let mut n = self.trials.first_batch();
        loop {
            let batch = self.run_offline_batch(plan, factory, n)?;
            debug!(
                trials = batch.trials,
                wall_us = batch.wall.as_micros() as u64,
                server_us = batch.server.as_micros() as u64,
                "offline batch finished"
            );

            match self.trials.next_batch(batch.trials, batch.wall) {
                Some(next) => n = next,
                None => return Ok(batch.into_outcome(plan)),
            }
        }
    }

    fn run_offline_batch<F: ClientFactory>(
        &mut self,
        plan: &BenchmarkPlan,
        factory: &mut F,
        trials: u64,
    ) -> Result<OfflineBatch<F::Client>> {
        self.gateway
            .reset_metrics()
            .map_err(|e| e.context("ResetMetrics"))?;

        let mut wall = Duration::ZERO;
        let mut client_storage: Option<u64> = None;
        let mut last_client = None;

        for trial in 0..trials {
            self.check_cancelled()?;
            let start = Instant::now();
            let mut client = factory
                .new_client()
                .map_err(|e| e.context("creating client"))?;
            client
                .init(plan.pir_type)
                .map_err(|e| e.context(&format!("client init (trial {})", trial)))?;
            wall += start.elapsed();

            if let Some(bytes) = client.storage_bytes() {
                client_storage = Some(client_storage.unwrap_or(0) + bytes);
            }
            last_client = Some(client);
            self.report(Phase::Offline, trial + 1, trials);
        }

        let server = self
            .gateway
            .offline_timer()
            .map_err(|e| e.context("GetOfflineTimer"))?;
        let bytes = self
            .gateway
            .offline_bytes()
            .map_err(|e| e.context("GetOfflineBytes"))?;

        let client = last_client.ok_or_else(|| {
            BenchError::GatewayError("offline batch ran no trials".to_string())
        })?;

        Ok(OfflineBatch {
            trials,
            wall,
            server,
            bytes,
            client_storage,
            client,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PirType, TestConfig};

    fn batch(client_storage: Option<u64>) -> OfflineBatch<()> {
        OfflineBatch {
            trials: 4,
            wall: Duration::from_micros(10_003),
            server: Duration::from_micros(6_001),
            bytes: 4_002,
            client_storage,
            client: (),
        }
    }

    fn plan(updatable: bool) -> BenchmarkPlan {
        BenchmarkPlan::new(
            TestConfig::new(1_000_000, 64).with_updatable(updatable),
            PirType::TreePir,
            1,
        )
    }

    #[test]
    fn test_batch_averages_use_cumulative_sums() {
        let outcome = batch(None).into_outcome(&plan(false));
        assert_eq!(outcome.trials, 4);
        assert_eq!(outcome.record.server_time_us, 1_500);
        // (10_003 - 6_001) / 4, not a sum of per-trial differences
        assert_eq!(outcome.record.client_time_us, 1_000);
        assert_eq!(outcome.record.comm_bytes, 1_000);
        assert_eq!(outcome.record.storage_bytes, 7_632_000);
    }

    #[test]
    fn test_client_time_never_negative() {
        let mut raw = batch(None);
        raw.server = Duration::from_micros(20_000);
        let outcome = raw.into_outcome(&plan(false));
        assert_eq!(outcome.record.client_time_us, 0);
    }

    #[test]
    fn test_updatable_storage_uses_client_measurement() {
        let outcome = batch(Some(4_000)).into_outcome(&plan(true));
        assert_eq!(outcome.record.storage_bytes, 1_000);

        // a static run ignores client-reported storage
        let outcome = batch(Some(4_000)).into_outcome(&plan(false));
        assert_eq!(outcome.record.storage_bytes, 7_632_000);

        // an updatable client that cannot measure falls back to the estimate
        let outcome = batch(None).into_outcome(&plan(true));
        assert_eq!(outcome.record.storage_bytes, 7_632_000);
    }
}
