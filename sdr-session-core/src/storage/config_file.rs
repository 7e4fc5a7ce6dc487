use std::fs;
use std::path::Path;

use crate::models::config::RadioConfiguration;
use crate::models::error::SdrError;

/// Write a radio configuration as pretty-printed JSON.
pub fn write_config(config: &RadioConfiguration, path: &Path) -> Result<(), SdrError> {
    let json = serde_json::to_string_pretty(config)
        .map_err(|e| SdrError::Storage(format!("failed to serialize config: {}", e)))?;
    fs::write(path, json)
        .map_err(|e| SdrError::Storage(format!("failed to write {}: {}", path.display(), e)))?;
    Ok(())
}

/// Read and validate a radio configuration from JSON. Missing fields take
/// their defaults.
pub fn read_config(path: &Path) -> Result<RadioConfiguration, SdrError> {
    let json = fs::read_to_string(path)
        .map_err(|e| SdrError::Storage(format!("failed to read {}: {}", path.display(), e)))?;
    let config: RadioConfiguration = serde_json::from_str(&json)
        .map_err(|e| SdrError::Storage(format!("failed to parse config: {}", e)))?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_file_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("sdr_session_test_{}_{}", std::process::id(), name))
    }

    #[test]
    fn write_then_read() {
        let path = temp_file_path("radio.json");
        let config = RadioConfiguration {
            frequency_hz: 1_090e6,
            sample_rate_hz: 2e6,
            amp_enable: true,
            ..Default::default()
        };

        write_config(&config, &path).unwrap();
        assert_eq!(read_config(&path).unwrap(), config);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_file_is_storage_error() {
        let path = temp_file_path("does_not_exist.json");
        assert!(matches!(read_config(&path), Err(SdrError::Storage(_))));
    }

    #[test]
    fn rejects_invalid_values() {
        let path = temp_file_path("negative.json");
        fs::write(&path, r#"{ "sample_rate_hz": -1.0 }"#).unwrap();
        assert!(matches!(read_config(&path), Err(SdrError::Config { .. })));
        fs::remove_file(&path).ok();
    }
}
