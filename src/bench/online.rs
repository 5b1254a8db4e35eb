//! Online phase: verified, individually timed reads

use std::time::Instant;
use rand::Rng;
use tracing::debug;
use crate::bench::{BenchmarkOrchestrator, BenchmarkPlan, Phase};
use crate::gateway::{MetricsGateway, PirReader};
use crate::models::OnlineRecord;
use crate::{BenchError, Result};

impl<'a, G: MetricsGateway + ?Sized> BenchmarkOrchestrator<'a, G> {
    /// Run `plan.num_queries` sequential reads with an initialized client.
    ///
    /// Each query draws a uniform index, fetches the ground truth (untimed),
    /// resets the server metrics, then times exactly one client read. The
    /// first byte of the returned row is compared against the ground truth;
    /// a mismatch or any failed call aborts the whole phase.
    pub fn run_online<C: PirReader>(
        &mut self,
        plan: &BenchmarkPlan,
        client: &mut C,
    ) -> Result<OnlineRecord> {
        let config = &plan.test_config;
        let total = plan.num_queries;

        self.gateway
            .reset_metrics()
            .map_err(|e| e.context("ResetMetrics"))?;

        let mut wall_us = Vec::with_capacity(total);
        let mut server_us = Vec::with_capacity(total);
        let mut total_online_bytes = 0u64;

        for query in 0..total {
            self.check_cancelled()?;
            let range = if config.updatable {
                self.gateway.num_keys().map_err(|e| e.context("NumKeys"))?
            } else {
                config.num_rows
            };
            if range == 0 {
                return Err(BenchError::GatewayError(format!(
                    "query {}: database has no rows",
                    query
                )));
            }

            let index = self.rng.gen_range(0..range);
            let truth = self
                .gateway
                .get_row(index)
                .map_err(|e| e.context("GetRow"))?;

            self.gateway
                .reset_metrics()
                .map_err(|e| e.context("ResetMetrics"))?;

            let start = Instant::now();
            let row = if config.updatable {
                client.read_key(truth.key)
            } else {
                client.read(index)
            };
            let elapsed = start.elapsed();

            let row = row.map_err(|e| e.context(&format!("query {} failed", query)))?;
            if row.first() != truth.value.first() {
                return Err(BenchError::CorrectnessError(format!(
                    "query {} returned wrong value for row {}",
                    query, index
                )));
            }

            let server = self
                .gateway
                .online_timer()
                .map_err(|e| e.context("GetOnlineTimer"))?;
            let bytes = self
                .gateway
                .online_bytes()
                .map_err(|e| e.context("GetOnlineBytes"))?;

            debug!(
                query,
                index,
                wall_us = elapsed.as_micros() as u64,
                server_us = server.as_micros() as u64,
                bytes,
                "query verified"
            );
            wall_us.push(elapsed.as_micros() as i64);
            server_us.push(server.as_micros() as i64);
            total_online_bytes += bytes;

            self.report(Phase::Online, query as u64 + 1, total as u64);
        }

        Ok(OnlineRecord::from_samples(
            &wall_us,
            &server_us,
            total_online_bytes,
        ))
    }
}
