//! Scheduler configuration structures.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Concurrency ceiling reflecting remote-service fairness limits.
///
/// A small policy value, never derived from host parallelism.
pub const DEFAULT_CEILING: usize = 6;

/// Logging policy consumed by the failure-observation path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogPolicy {
    /// Destination file for persisted failures.
    pub destination: PathBuf,
    /// Whether item failures are logged. Unwrapped failures bypass this.
    pub log_errors: bool,
}

impl Default for LogPolicy {
    fn default() -> Self {
        Self {
            destination: PathBuf::from("transfer-errors.log"),
            log_errors: true,
        }
    }
}

/// Per-direction pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSettings {
    /// Maximum concurrently running workers for this direction.
    pub ceiling: usize,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            ceiling: DEFAULT_CEILING,
        }
    }
}

/// Root scheduler configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Download pool settings.
    #[serde(default)]
    pub download: PoolSettings,
    /// Upload pool settings.
    #[serde(default)]
    pub upload: PoolSettings,
    /// Logging policy shared by both directions.
    #[serde(default)]
    pub log: LogPolicy,
}

impl PoolSettings {
    /// Validate settings values.
    ///
    /// # Errors
    ///
    /// Returns a message when the ceiling is zero.
    pub fn validate(&self) -> Result<(), String> {
        if self.ceiling == 0 {
            return Err("ceiling must be greater than 0".into());
        }
        Ok(())
    }
}

impl SchedulerConfig {
    /// Validate both directions.
    ///
    /// # Errors
    ///
    /// Returns a message naming the invalid direction.
    pub fn validate(&self) -> Result<(), String> {
        self.download
            .validate()
            .map_err(|e| format!("download pool invalid: {e}"))?;
        self.upload
            .validate()
            .map_err(|e| format!("upload pool invalid: {e}"))?;
        Ok(())
    }

    /// Parse scheduler configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a message on parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = SchedulerConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.download.ceiling, DEFAULT_CEILING);
        assert_eq!(cfg.upload.ceiling, DEFAULT_CEILING);
        assert!(cfg.log.log_errors);
    }

    #[test]
    fn test_zero_ceiling_rejected() {
        let cfg = SchedulerConfig {
            upload: PoolSettings { ceiling: 0 },
            ..SchedulerConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.contains("upload pool invalid"));
    }

    #[test]
    fn test_from_json_str() {
        let cfg = SchedulerConfig::from_json_str(
            r#"{
                "download": { "ceiling": 4 },
                "upload": { "ceiling": 2 },
                "log": { "destination": "/tmp/sync.log", "log_errors": false }
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.download.ceiling, 4);
        assert_eq!(cfg.upload.ceiling, 2);
        assert!(!cfg.log.log_errors);
    }

    #[test]
    fn test_from_json_str_rejects_invalid() {
        let err = SchedulerConfig::from_json_str(r#"{ "download": { "ceiling": 0 } }"#).unwrap_err();
        assert!(err.contains("download pool invalid"));
    }
}
