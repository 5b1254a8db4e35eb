//! Results persistence module
//!
//! Writes a single benchmark result as an indented JSON snapshot,
//! replacing whatever the target file held before.

use std::fs;
use std::path::Path;
use tracing::info;
use crate::models::result::BenchmarkResult;
use crate::{BenchError, Result};

/// Serialize `result` as pretty JSON and write it to `path`
pub fn save_result_json(result: &BenchmarkResult, path: &Path) -> Result<()> {
    let content = serde_json::to_string_pretty(result).map_err(|e| {
        BenchError::PersistError(format!("Failed to serialize results: {}", e))
    })?;

    fs::write(path, content).map_err(|e| {
        BenchError::PersistError(format!(
            "Failed to write results file {}: {}",
            path.display(),
            e
        ))
    })?;

    info!(path = %path.display(), "Results saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PirType;
    use crate::models::{ConfigRecord, OfflineRecord, OnlineRecord};
    use tempfile::TempDir;

    fn load_result_json(path: &Path) -> Result<BenchmarkResult> {
        let content = fs::read_to_string(path).map_err(|e| {
            BenchError::PersistError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    fn create_test_result() -> BenchmarkResult {
        BenchmarkResult {
            config: ConfigRecord::new(4096, 16, PirType::NonPrivate),
            offline: OfflineRecord {
                server_time_us: 12,
                client_time_us: 34,
                comm_bytes: 0,
                storage_bytes: 7_000,
            },
            online: OnlineRecord::from_samples(&[5, 7, 9], &[1, 1, 1], 72),
        }
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("result.json");
        let result = create_test_result();

        save_result_json(&result, &path).unwrap();
        assert_eq!(load_result_json(&path).unwrap(), result);
    }

    #[test]
    fn test_file_is_indented_with_stable_names() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("result.json");
        save_result_json(&create_test_result(), &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("{\n  \"Config\": {\n    \"DbSize\": 65536,"));
        assert!(content.contains("\"PIRType\": \"NonPrivate\""));
        assert!(content.contains("\"AvgOnlineBytes\": 24"));
    }

    #[test]
    fn test_save_overwrites_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("result.json");
        fs::write(&path, "x".repeat(10_000)).unwrap();

        save_result_json(&create_test_result(), &path).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(!content.contains("xxx"));
        assert!(load_result_json(&path).is_ok());
    }

    #[test]
    fn test_unwritable_path_is_persist_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing-dir").join("result.json");
        assert!(matches!(
            save_result_json(&create_test_result(), &path),
            Err(BenchError::PersistError(_))
        ));
        assert!(matches!(
            load_result_json(&path),
            Err(BenchError::PersistError(_))
        ));
    }
}
