//! In-process loopback driver
//!
//! Serves a seeded random database from memory and answers reads by
//! returning the requested row in the clear. It is the non-private
//! baseline: no hints, one index up and one row down per query. Every other
//! PIR variant needs an external driver.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use tracing::debug;
use crate::config::{PirType, TestConfig};
use crate::gateway::{MetricsGateway, PirReader, Row, RowIndexVal};
use crate::{BenchError, Result};

/// Size of an index on the wire
const INDEX_BYTES: u64 = 8;
/// Size of a key on the wire
const KEY_BYTES: u64 = 4;

/// Keys are row indices; rows past `u32::MAX` have no key
fn row_key(index: usize) -> Result<u32> {
    u32::try_from(index).map_err(|_| {
        BenchError::GatewayError(format!("row index {} does not fit in a u32 key", index))
    })
}

struct Database {
    config: TestConfig,
    data: Vec<u8>,
}

impl Database {
    fn row(&self, index: usize) -> Result<&[u8]> {
        if index >= self.config.num_rows {
            return Err(BenchError::GatewayError(format!(
                "row index {} out of range (num_rows = {})",
                index, self.config.num_rows
            )));
        }
        let start = index * self.config.row_len;
        Ok(&self.data[start..start + self.config.row_len])
    }
}

/// Loopback server plus metric counters
pub struct LoopbackDriver {
    seed: u64,
    database: RwLock<Option<Database>>,
    offline_nanos: AtomicU64,
    online_nanos: AtomicU64,
    offline_bytes: AtomicU64,
    online_bytes: AtomicU64,
}

impl LoopbackDriver {
    /// Create an unconfigured driver whose database content derives from `seed`
    pub fn new(seed: u64) -> Arc<Self> {
        Arc::new(Self {
            seed,
            database: RwLock::new(None),
            offline_nanos: AtomicU64::new(0),
            online_nanos: AtomicU64::new(0),
            offline_bytes: AtomicU64::new(0),
            online_bytes: AtomicU64::new(0),
        })
    }

    /// New uninitialized client talking to this driver
    pub fn client(self: &Arc<Self>) -> LoopbackClient {
        LoopbackClient {
            driver: Arc::clone(self),
            pir_type: None,
        }
    }

    fn with_database<T>(&self, f: impl FnOnce(&Database) -> Result<T>) -> Result<T> {
        let guard = self
            .database
            .read()
            .map_err(|_| BenchError::GatewayError("database lock poisoned".to_string()))?;
        match guard.as_ref() {
            Some(database) => f(database),
            None => Err(BenchError::GatewayError(
                "driver has not been configured".to_string(),
            )),
        }
    }

    /// Server side of one online query
    fn answer(&self, index: usize, request_bytes: u64) -> Result<Row> {
        let start = Instant::now();
        let (row, measure) = self.with_database(|database| {
            Ok((database.row(index)?.to_vec(), database.config.measure_bandwidth))
        })?;
        self.online_nanos
            .fetch_add(start.elapsed().as_nanos() as u64, Ordering::Relaxed);

        if measure {
            self.online_bytes
                .fetch_add(request_bytes + row.len() as u64, Ordering::Relaxed);
        }
        Ok(row)
    }

    /// Server side of client initialization; the baseline sends no hint
    fn serve_hint(&self) -> Result<()> {
        let start = Instant::now();
        self.with_database(|_| Ok(()))?;
        self.offline_nanos
            .fetch_add(start.elapsed().as_nanos() as u64, Ordering::Relaxed);
        Ok(())
    }
}

impl MetricsGateway for LoopbackDriver {
    fn configure(&self, config: &TestConfig) -> Result<()> {
        if config.num_rows == 0 || config.row_len == 0 {
            return Err(BenchError::ConfigurationError(format!(
                "cannot serve a database of {} rows x {} bytes",
                config.num_rows, config.row_len
            )));
        }
        let size = config.num_rows.checked_mul(config.row_len).ok_or_else(|| {
            BenchError::ConfigurationError(format!(
                "database of {} rows x {} bytes does not fit in memory",
                config.num_rows, config.row_len
            ))
        })?;

        let mut data = vec![0u8; size];
        SmallRng::seed_from_u64(self.seed).fill(&mut data[..]);
        debug!(num_rows = config.num_rows, row_len = config.row_len, "loopback database ready");

        let mut guard = self
            .database
            .write()
            .map_err(|_| BenchError::GatewayError("database lock poisoned".to_string()))?;
        *guard = Some(Database {
            config: config.clone(),
            data,
        });
        Ok(())
    }

    fn reset_metrics(&self) -> Result<()> {
        self.offline_nanos.store(0, Ordering::Relaxed);
        self.online_nanos.store(0, Ordering::Relaxed);
        self.offline_bytes.store(0, Ordering::Relaxed);
        self.online_bytes.store(0, Ordering::Relaxed);
        Ok(())
    }

    fn offline_timer(&self) -> Result<Duration> {
        Ok(Duration::from_nanos(self.offline_nanos.load(Ordering::Relaxed)))
    }

    fn online_timer(&self) -> Result<Duration> {
        Ok(Duration::from_nanos(self.online_nanos.load(Ordering::Relaxed)))
    }

    fn offline_bytes(&self) -> Result<u64> {
        Ok(self.offline_bytes.load(Ordering::Relaxed))
    }

    fn online_bytes(&self) -> Result<u64> {
        Ok(self.online_bytes.load(Ordering::Relaxed))
    }

    fn get_row(&self, index: usize) -> Result<RowIndexVal> {
        self.with_database(|database| {
            Ok(RowIndexVal {
                index,
                key: row_key(index)?,
                value: database.row(index)?.to_vec(),
            })
        })
    }

    fn num_keys(&self) -> Result<usize> {
        self.with_database(|database| Ok(database.config.num_rows))
    }
}

/// Client for the loopback driver; supports `PirType::NonPrivate` only
pub struct LoopbackClient {
    driver: Arc<LoopbackDriver>,
    pir_type: Option<PirType>,
}

impl LoopbackClient {
    fn ensure_initialized(&self) -> Result<()> {
        if self.pir_type.is_none() {
            return Err(BenchError::GatewayError(
                "client read before init".to_string(),
            ));
        }
        Ok(())
    }
}

impl PirReader for LoopbackClient {
    fn init(&mut self, pir_type: PirType) -> Result<()> {
        if pir_type != PirType::NonPrivate {
            return Err(BenchError::ConfigurationError(format!(
                "{} requires an external PIR driver; the in-process driver only serves NonPrivate",
                pir_type
            )));
        }
        self.driver.serve_hint()?;
        self.pir_type = Some(pir_type);
        Ok(())
    }

    fn read(&mut self, index: usize) -> Result<Row> {
        self.ensure_initialized()?;
        self.driver.answer(index, INDEX_BYTES)
    }

    fn read_key(&mut self, key: u32) -> Result<Row> {
        self.ensure_initialized()?;
        // Keys are row indices in the loopback database.
        self.driver.answer(key as usize, KEY_BYTES)
    }

    fn storage_bytes(&self) -> Option<u64> {
        self.pir_type.map(|_| 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured(num_rows: usize, row_len: usize) -> Arc<LoopbackDriver> {
        let driver = LoopbackDriver::new(42);
        driver.configure(&TestConfig::new(num_rows, row_len)).unwrap();
        driver
    }

    #[test]
    fn test_configure_rejects_empty_shapes() {
        let driver = LoopbackDriver::new(1);
        assert!(matches!(
            driver.configure(&TestConfig::new(0, 16)),
            Err(BenchError::ConfigurationError(_))
        ));
        assert!(matches!(
            driver.configure(&TestConfig::new(16, 0)),
            Err(BenchError::ConfigurationError(_))
        ));
        assert!(matches!(
            driver.configure(&TestConfig::new(usize::MAX, 2)),
            Err(BenchError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_unconfigured_driver_fails_calls() {
        let driver = LoopbackDriver::new(1);
        assert!(matches!(driver.get_row(0), Err(BenchError::GatewayError(_))));
        assert!(driver.num_keys().is_err());
        let mut client = driver.client();
        assert!(client.init(PirType::NonPrivate).is_err());
    }

    #[test]
    fn test_database_is_deterministic_per_seed() {
        let a = configured(64, 16);
        let b = configured(64, 16);
        for index in [0, 17, 63] {
            assert_eq!(a.get_row(index).unwrap(), b.get_row(index).unwrap());
        }
        let row = a.get_row(5).unwrap();
        assert_eq!(row.index, 5);
        assert_eq!(row.key, 5);
        assert_eq!(row.value.len(), 16);
        assert!(a.get_row(64).is_err());
    }

    #[test]
    fn test_row_key_rejects_wide_indices() {
        assert_eq!(row_key(0).unwrap(), 0);
        assert_eq!(row_key(u32::MAX as usize).unwrap(), u32::MAX);
        #[cfg(target_pointer_width = "64")]
        assert!(matches!(
            row_key(u32::MAX as usize + 1),
            Err(BenchError::GatewayError(_))
        ));
    }

    #[test]
    fn test_client_reads_match_ground_truth() {
        let driver = configured(128, 32);
        let mut client = driver.client();
        assert!(client.read(0).is_err());
        client.init(PirType::NonPrivate).unwrap();

        for index in [0, 1, 64, 127] {
            assert_eq!(client.read(index).unwrap(), driver.get_row(index).unwrap().value);
        }
        assert_eq!(client.read_key(9).unwrap(), driver.get_row(9).unwrap().value);
        assert!(client.read(128).is_err());
        assert_eq!(client.storage_bytes(), Some(0));
    }

    #[test]
    fn test_client_rejects_private_variants() {
        let driver = configured(16, 16);
        for pir_type in [PirType::TreePir, PirType::Matrix, PirType::Punc, PirType::Dpf] {
            let mut client = driver.client();
            assert!(matches!(
                client.init(pir_type),
                Err(BenchError::ConfigurationError(_))
            ));
        }
    }

    #[test]
    fn test_metrics_count_and_reset() {
        let driver = configured(32, 16);
        let mut client = driver.client();
        client.init(PirType::NonPrivate).unwrap();
        driver.reset_metrics().unwrap();

        client.read(3).unwrap();
        client.read_key(4).unwrap();
        assert_eq!(driver.online_bytes().unwrap(), (8 + 16) + (4 + 16));
        assert_eq!(driver.offline_bytes().unwrap(), 0);

        driver.reset_metrics().unwrap();
        assert_eq!(driver.online_bytes().unwrap(), 0);
        assert_eq!(driver.online_timer().unwrap(), Duration::ZERO);
        assert_eq!(driver.offline_timer().unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_bandwidth_accounting_can_be_disabled() {
        let driver = LoopbackDriver::new(3);
        driver
            .configure(&TestConfig::new(8, 8).with_measure_bandwidth(false))
            .unwrap();
        let mut client = driver.client();
        client.init(PirType::NonPrivate).unwrap();
        client.read(1).unwrap();
        assert_eq!(driver.online_bytes().unwrap(), 0);
        assert_eq!(driver.num_keys().unwrap(), 8);
    }
}
