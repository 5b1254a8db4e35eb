//! Configuration management module
//!
//! Holds the PIR variant enumeration, the test configuration handed to the
//! driver, database shape derivation, and the optional settings file that
//! supplies defaults for the command line.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::{BenchError, Result, APP_NAME, CONFIG_FILE, DEFAULT_NUM_QUERIES, MAX_NUM_QUERIES};

pub mod persistence;

const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * MIB;

/// PIR protocol variants understood by the external driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PirType {
    #[serde(rename = "TreePIR")]
    TreePir,
    NonPrivate,
    Matrix,
    Punc,
    #[serde(rename = "DPF")]
    Dpf,
}

impl PirType {
    /// All variants, in the order they are listed to users
    pub const ALL: [PirType; 5] = [
        PirType::TreePir,
        PirType::NonPrivate,
        PirType::Matrix,
        PirType::Punc,
        PirType::Dpf,
    ];

    /// Name used on the command line, in reports and in persisted results
    pub fn name(&self) -> &'static str {
        match self {
            PirType::TreePir => "TreePIR",
            PirType::NonPrivate => "NonPrivate",
            PirType::Matrix => "Matrix",
            PirType::Punc => "Punc",
            PirType::Dpf => "DPF",
        }
    }
}

impl fmt::Display for PirType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PirType {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        PirType::ALL
            .into_iter()
            .find(|pir_type| pir_type.name() == s)
            .ok_or_else(|| {
                BenchError::InputError(format!(
                    "Invalid PIR type '{}'. Valid options: TreePIR, NonPrivate, Matrix, Punc, DPF",
                    s
                ))
            })
    }
}

/// Configuration handed to the driver before any phase runs.
/// The harness builds it; only the driver interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestConfig {
    pub num_rows: usize,
    pub row_len: usize,
    pub updatable: bool,
    pub measure_bandwidth: bool,
}

impl TestConfig {
    /// Static database with bandwidth accounting enabled
    pub fn new(num_rows: usize, row_len: usize) -> Self {
        Self {
            num_rows,
            row_len,
            updatable: false,
            measure_bandwidth: true,
        }
    }

    pub fn with_updatable(mut self, updatable: bool) -> Self {
        self.updatable = updatable;
        self
    }

    pub fn with_measure_bandwidth(mut self, measure: bool) -> Self {
        self.measure_bandwidth = measure;
        self
    }

    /// Database size in bytes
    pub fn db_size(&self) -> u64 {
        self.num_rows as u64 * self.row_len as u64
    }
}

/// Row length picked for a target database size when none is given
pub fn default_row_len(db_size: u64) -> usize {
    match db_size {
        s if s < 10 * MIB => 16,
        s if s < 100 * MIB => 32,
        s if s < GIB => 64,
        _ => 256,
    }
}

/// Derive `(num_rows, row_len)` for a target database size.
///
/// A positive override is used verbatim as the row length. The row count
/// truncates so the database never exceeds the target, but is at least 1.
pub fn calculate_parameters(db_size: u64, row_len_override: usize) -> (usize, usize) {
    let row_len = if row_len_override > 0 {
        row_len_override
    } else {
        default_row_len(db_size)
    };

    let num_rows = (db_size / row_len as u64).max(1) as usize;
    (num_rows, row_len)
}

/// Reject an explicit row length that leaves no whole row in the target size
pub fn validate_row_len_override(db_size: u64, row_len_override: usize) -> Result<()> {
    if row_len_override > 0 && db_size / (row_len_override as u64) == 0 {
        return Err(BenchError::InputError(format!(
            "row length {} produces zero rows for a {} byte database",
            row_len_override, db_size
        )));
    }
    Ok(())
}

/// Defaults for the command line, read from `pirbench.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessSettings {
    /// Number of online queries
    pub queries: usize,
    /// PIR variant name
    pub pir_type: String,
    /// Target wall time for one adaptive offline batch (humantime)
    pub offline_benchtime: String,
    /// Upper bound on offline trials per batch
    pub max_offline_trials: u64,
    /// Seed for the query index generator; random when absent
    pub seed: Option<u64>,
    /// Deadline for the whole run (humantime); none when absent
    pub timeout: Option<String>,
    /// Ask the driver to count bytes on the wire
    pub measure_bandwidth: bool,
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self {
            queries: DEFAULT_NUM_QUERIES,
            pir_type: PirType::NonPrivate.name().to_string(),
            offline_benchtime: "1s".to_string(),
            max_offline_trials: 1_000_000,
            seed: None,
            timeout: None,
            measure_bandwidth: true,
        }
    }
}

impl HarnessSettings {
    /// Load settings from the standard location.
    /// Returns defaults if the file doesn't exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load settings from an explicit path; the file must exist
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            BenchError::ConfigError(format!(
                "Failed to read settings file {}: {}",
                path.display(),
                e
            ))
        })?;

        let settings: Self = toml::from_str(&content).map_err(|e| {
            BenchError::ConfigError(format!(
                "Failed to parse settings file {}: {}",
                path.display(),
                e
            ))
        })?;

        settings.validate()?;
        Ok(settings)
    }

    /// Get the standard settings file path
    /// Uses $CONFIG_HOME/pirbench/pirbench.toml
    pub fn config_file_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            BenchError::ConfigError("Unable to determine config directory".to_string())
        })?;

        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn validate(&self) -> Result<()> {
        if self.queries == 0 {
            return Err(BenchError::ConfigError(
                "queries must be greater than 0".to_string(),
            ));
        }

        if self.queries > MAX_NUM_QUERIES {
            return Err(BenchError::ConfigError(format!(
                "queries must be at most {}",
                MAX_NUM_QUERIES
            )));
        }

        if self.max_offline_trials == 0 {
            return Err(BenchError::ConfigError(
                "max_offline_trials must be greater than 0".to_string(),
            ));
        }

        self.pir_type()
            .map_err(|e| BenchError::ConfigError(e.to_string()))?;
        self.offline_benchtime()?;
        self.timeout()?;
        Ok(())
    }

    pub fn pir_type(&self) -> Result<PirType> {
        self.pir_type.parse()
    }

    pub fn offline_benchtime(&self) -> Result<Duration> {
        parse_setting_duration("offline_benchtime", &self.offline_benchtime)
    }

    pub fn timeout(&self) -> Result<Option<Duration>> {
        self.timeout
            .as_deref()
            .map(|value| parse_setting_duration("timeout", value))
            .transpose()
    }
}

fn parse_setting_duration(field: &str, value: &str) -> Result<Duration> {
    humantime::parse_duration(value)
        .map_err(|e| BenchError::ConfigError(format!("{} '{}': {}", field, value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_pir_type_names_round_trip() {
        for pir_type in PirType::ALL {
            assert_eq!(pir_type.name().parse::<PirType>().unwrap(), pir_type);
            assert_eq!(pir_type.to_string(), pir_type.name());
        }
        assert!(matches!(
            "treepir".parse::<PirType>(),
            Err(BenchError::InputError(_))
        ));
        assert!("SealPIR".parse::<PirType>().is_err());
    }

    #[test]
    fn test_pir_type_serde_uses_display_names() {
        assert_eq!(serde_json::to_string(&PirType::TreePir).unwrap(), "\"TreePIR\"");
        assert_eq!(serde_json::to_string(&PirType::Dpf).unwrap(), "\"DPF\"");
        let parsed: PirType = serde_json::from_str("\"NonPrivate\"").unwrap();
        assert_eq!(parsed, PirType::NonPrivate);
    }

    #[test]
    fn test_calculate_parameters_heuristic() {
        let one_gib = 1u64 << 30;
        assert_eq!(calculate_parameters(one_gib, 0), ((one_gib / 64) as usize, 64));
        let (num_rows, row_len) = calculate_parameters(1 << 30, 0);
        assert_eq!(row_len, 64);
        assert_eq!(num_rows, (1usize << 30) / 64);

        assert_eq!(calculate_parameters(5 * MIB, 0).1, 16);
        assert_eq!(calculate_parameters(10 * MIB - 1, 0).1, 16);
        assert_eq!(calculate_parameters(10 * MIB, 0).1, 32);
        assert_eq!(calculate_parameters(100 * MIB, 0).1, 64);
        assert_eq!(calculate_parameters(GIB - 1, 0).1, 64);
        assert_eq!(calculate_parameters(4 * GIB, 0), ((4 * GIB / 256) as usize, 256));
    }

    #[test]
    fn test_calculate_parameters_truncates() {
        let (num_rows, row_len) = calculate_parameters(1000, 0);
        assert_eq!(row_len, 16);
        assert_eq!(num_rows, 62);
        assert!(num_rows as u64 * row_len as u64 <= 1000);
    }

    #[test]
    fn test_calculate_parameters_override_and_minimum_rows() {
        assert_eq!(calculate_parameters(1 << 20, 100), ((1 << 20) / 100, 100));
        assert_eq!(calculate_parameters(10, 100), (1, 100));
        assert_eq!(calculate_parameters(0, 0), (1, 16));
        assert_eq!(calculate_parameters(3, 0), (1, 16));
    }

    #[test]
    fn test_validate_row_len_override() {
        assert!(validate_row_len_override(10, 0).is_ok());
        assert!(validate_row_len_override(100, 100).is_ok());
        assert!(matches!(
            validate_row_len_override(99, 100),
            Err(BenchError::InputError(_))
        ));
    }

    #[test]
    fn test_test_config_builder() {
        let config = TestConfig::new(1000, 32).with_updatable(true);
        assert!(config.updatable);
        assert!(config.measure_bandwidth);
        assert_eq!(config.db_size(), 32_000);
        assert!(!config.with_measure_bandwidth(false).measure_bandwidth);
    }

    #[test]
    fn test_settings_defaults_are_valid() {
        let settings = HarnessSettings::default();
        settings.validate().unwrap();
        assert_eq!(settings.queries, DEFAULT_NUM_QUERIES);
        assert_eq!(settings.pir_type().unwrap(), PirType::NonPrivate);
        assert_eq!(settings.offline_benchtime().unwrap(), Duration::from_secs(1));
        assert_eq!(settings.timeout().unwrap(), None);
    }

    #[test]
    fn test_settings_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE);
        fs::write(
            &path,
            "queries = 25\npir_type = \"TreePIR\"\noffline_benchtime = \"250ms\"\nseed = 7\ntimeout = \"2m\"\n",
        )
        .unwrap();

        let settings = HarnessSettings::load_from(&path).unwrap();
        assert_eq!(settings.queries, 25);
        assert_eq!(settings.pir_type().unwrap(), PirType::TreePir);
        assert_eq!(settings.offline_benchtime().unwrap(), Duration::from_millis(250));
        assert_eq!(settings.seed, Some(7));
        assert_eq!(settings.timeout().unwrap(), Some(Duration::from_secs(120)));
        assert_eq!(settings.max_offline_trials, 1_000_000);
    }

    #[test]
    fn test_settings_validation_errors() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE);

        fs::write(&path, "queries = 0\n").unwrap();
        assert!(matches!(
            HarnessSettings::load_from(&path),
            Err(BenchError::ConfigError(_))
        ));

        fs::write(&path, format!("queries = {}\n", MAX_NUM_QUERIES + 1)).unwrap();
        assert!(matches!(
            HarnessSettings::load_from(&path),
            Err(BenchError::ConfigError(_))
        ));

        fs::write(&path, "pir_type = \"Bogus\"\n").unwrap();
        assert!(matches!(
            HarnessSettings::load_from(&path),
            Err(BenchError::ConfigError(_))
        ));

        fs::write(&path, "offline_benchtime = \"soon\"\n").unwrap();
        assert!(matches!(
            HarnessSettings::load_from(&path),
            Err(BenchError::ConfigError(_))
        ));

        fs::write(&path, "queries = \"many\"\n").unwrap();
        assert!(matches!(
            HarnessSettings::load_from(&path),
            Err(BenchError::ConfigError(_))
        ));

        assert!(HarnessSettings::load_from(&temp_dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_config_file_path() {
        if let Ok(path) = HarnessSettings::config_file_path() {
            assert!(path.to_string_lossy().contains("pirbench.toml"));
        }
    }
}
