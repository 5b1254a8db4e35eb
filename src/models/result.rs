//! Benchmark result data models
//!
//! Contains the record produced by one benchmark run. Field names are
//! serialized verbatim (`Config.DbSize`, `Online.AvgTotalUs`, ...) and all
//! values stay in raw units: bytes and microseconds.

use std::fmt::Write as _;
use serde::{Deserialize, Serialize};
use crate::bench::stats;
use crate::config::PirType;
use crate::util::units::{format_bytes, format_time};

const RULE_WIDTH: usize = 80;

/// Complete benchmark result: configuration, offline phase, online phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BenchmarkResult {
    pub config: ConfigRecord,
    pub offline: OfflineRecord,
    pub online: OnlineRecord,
}

/// Database shape and PIR variant of the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConfigRecord {
    /// Database size in bytes (`num_rows * row_len`)
    pub db_size: u64,
    pub num_rows: usize,
    pub row_len: usize,
    /// `floor(sqrt(num_rows))`
    pub set_size: usize,
    #[serde(rename = "PIRType")]
    pub pir_type: PirType,
}

/// Per-trial averages of the offline (hint generation) phase
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OfflineRecord {
    /// Server-attributed hint generation time
    pub server_time_us: i64,
    /// Client init time: wall time minus server time
    pub client_time_us: i64,
    /// Hint bytes sent to the client
    pub comm_bytes: u64,
    /// Persistent client storage after initialization
    pub storage_bytes: u64,
}

/// Per-query statistics of the online phase
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OnlineRecord {
    pub avg_query_gen_us: i64,
    pub avg_server_time_us: i64,
    pub avg_total_us: i64,
    pub avg_online_bytes: u64,
    pub num_queries: usize,
    pub min_time_us: i64,
    pub max_time_us: i64,
    pub std_dev_us: f64,
}

impl ConfigRecord {
    pub fn new(num_rows: usize, row_len: usize, pir_type: PirType) -> Self {
        Self {
            db_size: num_rows as u64 * row_len as u64,
            num_rows,
            row_len,
            set_size: stats::set_size(num_rows),
            pir_type,
        }
    }
}

impl OnlineRecord {
    /// Build the record from parallel per-query samples.
    ///
    /// `wall_us` are client-observed wall times, `server_us` the
    /// server-attributed share of each query. The server average is capped
    /// at the wall average so query generation time never goes negative and
    /// `avg_query_gen_us == avg_total_us - avg_server_time_us` holds.
    pub fn from_samples(wall_us: &[i64], server_us: &[i64], total_online_bytes: u64) -> Self {
        let num_queries = wall_us.len();
        let avg_total_us = stats::mean(wall_us).max(0);
        let avg_server_time_us = stats::mean(server_us).clamp(0, avg_total_us);

        Self {
            avg_query_gen_us: avg_total_us - avg_server_time_us,
            avg_server_time_us,
            avg_total_us,
            avg_online_bytes: if num_queries == 0 {
                0
            } else {
                total_online_bytes / num_queries as u64
            },
            num_queries,
            min_time_us: stats::min(wall_us),
            max_time_us: stats::max(wall_us),
            std_dev_us: stats::stddev(wall_us),
        }
    }
}

impl BenchmarkResult {
    /// One-line summary used in logs
    pub fn summary(&self) -> String {
        format!(
            "{} - {} rows x {} B - hint {} - query {} - {} per query",
            self.config.pir_type,
            self.config.num_rows,
            self.config.row_len,
            format_time(self.offline.server_time_us),
            format_time(self.online.avg_total_us),
            format_bytes(self.online.avg_online_bytes),
        )
    }

    /// Human-readable console report
    pub fn render_report(&self) -> String {
        let rule = "=".repeat(RULE_WIDTH);
        let mut out = String::new();
        let config = &self.config;
        let offline = &self.offline;
        let online = &self.online;

        // Writing into a String cannot fail.
        let _ = writeln!(out, "\n{}", rule);
        let _ = writeln!(out, "{} Benchmark Report", config.pir_type);
        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out, "Database Configuration:");
        let _ = writeln!(
            out,
            "  Database Size:      {} ({} bytes)",
            format_bytes(config.db_size),
            config.db_size
        );
        let _ = writeln!(out, "  Number of Rows:     {}", config.num_rows);
        let _ = writeln!(out, "  Row Length:         {} bytes", config.row_len);
        let _ = writeln!(out, "  PIR Type:           {}", config.pir_type);
        let _ = writeln!(out, "  Set Size (√n):      {}", config.set_size);

        let _ = writeln!(out, "\n{}", rule);
        let _ = writeln!(out, "OFFLINE PHASE (One-time Setup)");
        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(
            out,
            "  Server Hint Time:         {:>20}",
            format_time(offline.server_time_us)
        );
        let _ = writeln!(
            out,
            "  Client Init Time:         {:>20}",
            format_time(offline.client_time_us)
        );
        let _ = writeln!(
            out,
            "  Total Offline Time:       {:>20}",
            format_time(offline.server_time_us + offline.client_time_us)
        );
        let _ = writeln!(out);
        let _ = writeln!(out, "  Communication Cost:");
        let _ = writeln!(
            out,
            "    Offline Bytes:          {:>20}",
            format_bytes(offline.comm_bytes)
        );
        let _ = writeln!(
            out,
            "    Client Storage:         {:>20}",
            format_bytes(offline.storage_bytes)
        );

        let _ = writeln!(out, "\n{}", rule);
        let _ = writeln!(
            out,
            "ONLINE PHASE (Per Query, averaged over {} queries)",
            online.num_queries
        );
        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(
            out,
            "  Query Generation:         {:>20}",
            format_time(online.avg_query_gen_us)
        );
        let _ = writeln!(
            out,
            "  Server Answer Time:       {:>20}",
            format_time(online.avg_server_time_us)
        );
        let _ = writeln!(
            out,
            "  Total Online Time:        {:>20}",
            format_time(online.avg_total_us)
        );
        let _ = writeln!(out);
        let _ = writeln!(out, "  Communication Cost:");
        let _ = writeln!(
            out,
            "    Per Query:              {:>20}",
            format_bytes(online.avg_online_bytes)
        );
        let _ = writeln!(out);
        let _ = writeln!(out, "  Statistics:");
        let _ = writeln!(
            out,
            "    Min Query Time:         {:>20}",
            format_time(online.min_time_us)
        );
        let _ = writeln!(
            out,
            "    Max Query Time:         {:>20}",
            format_time(online.max_time_us)
        );
        let _ = writeln!(
            out,
            "    Std Deviation:          {:>20}",
            format_time(online.std_dev_us as i64)
        );
        let _ = writeln!(out, "{}", rule);

        out
    }
}
