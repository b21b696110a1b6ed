//! Component configuration
//!
//! Every field has a default, so an empty file (or no file) yields the
//! reference behavior: policies at path `/`, four concurrent detaches,
//! propagation polled once a second for up to a minute.

use anyhow::{Context, Result, bail};
use iamkit::RetryConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

// ============================================================================
// Policy Config
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// IAM path new policies are created under
    pub path: String,
    /// Upper bound on concurrent detach calls during removal
    pub detach_jobs: usize,
    pub propagation: PropagationConfig,
    pub retry: RetrySettings,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            detach_jobs: 4,
            propagation: PropagationConfig::default(),
            retry: RetrySettings::default(),
        }
    }
}

impl PolicyConfig {
    /// Load and validate a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let config = Self::from_toml_str(&content)
            .with_context(|| format!("Invalid config in {}", path.display()))?;
        log::debug!("Loaded policy config from {}", path.display());
        Ok(config)
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse policy config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.path.starts_with('/') || !self.path.ends_with('/') {
            bail!("path must begin and end with '/': {}", self.path);
        }
        if self.detach_jobs == 0 {
            bail!("detach_jobs must be at least 1");
        }
        self.propagation.validate()?;
        self.retry.validate()
    }
}

// ============================================================================
// Propagation
// ============================================================================

/// How deploy waits for a new policy to become attachable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropagationMode {
    /// Poll until the policy is consistently visible
    #[default]
    Poll,
    /// Sleep a fixed delay
    Fixed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropagationConfig {
    pub mode: PropagationMode,
    pub poll_interval_ms: u64,
    pub timeout_secs: u64,
    /// Consecutive successful reads required before the policy counts as visible
    pub required_confirmations: u32,
    /// Extra sleep after polling succeeds
    pub settle_delay_ms: u64,
    pub fixed_delay_secs: u64,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            mode: PropagationMode::Poll,
            poll_interval_ms: 1000,
            timeout_secs: 60,
            required_confirmations: 3,
            settle_delay_ms: 0,
            fixed_delay_secs: 15,
        }
    }
}

impl PropagationConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn fixed_delay(&self) -> Duration {
        Duration::from_secs(self.fixed_delay_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.mode == PropagationMode::Poll {
            if self.poll_interval_ms == 0 {
                bail!("propagation.poll_interval_ms must be greater than 0");
            }
            if self.required_confirmations == 0 {
                bail!("propagation.required_confirmations must be at least 1");
            }
        }
        Ok(())
    }
}

// ============================================================================
// Retry
// ============================================================================

/// Adapter retry settings, in file-friendly units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub backoff_factor: f64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 500,
            backoff_factor: 2.0,
            max_delay_ms: 20_000,
        }
    }
}

impl RetrySettings {
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            backoff_factor: self.backoff_factor,
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            bail!("retry.max_attempts must be at least 1");
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            bail!("retry.backoff_factor must be a finite number >= 1.0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = PolicyConfig::from_toml_str("").unwrap();
        assert_eq!(config, PolicyConfig::default());
        assert_eq!(config.path, "/");
        assert_eq!(config.detach_jobs, 4);
        assert_eq!(config.propagation.mode, PropagationMode::Poll);
        assert_eq!(config.propagation.timeout(), Duration::from_secs(60));
        assert_eq!(config.propagation.required_confirmations, 3);
        assert_eq!(config.propagation.fixed_delay(), Duration::from_secs(15));
    }

    #[test]
    fn test_partial_config() {
        let config = PolicyConfig::from_toml_str(
            r#"
            path = "/service/"
            detach_jobs = 8

            [propagation]
            mode = "fixed"
            fixed_delay_secs = 10

            [retry]
            max_attempts = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.path, "/service/");
        assert_eq!(config.detach_jobs, 8);
        assert_eq!(config.propagation.mode, PropagationMode::Fixed);
        assert_eq!(config.propagation.fixed_delay(), Duration::from_secs(10));
        assert_eq!(config.propagation.poll_interval_ms, 1000);
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.retry.base_delay_ms, 500);
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        for content in [
            "detach_jobs = 0",
            "[propagation]\npoll_interval_ms = 0",
            "[propagation]\nrequired_confirmations = 0",
            "[retry]\nmax_attempts = 0",
        ] {
            assert!(
                PolicyConfig::from_toml_str(content).is_err(),
                "accepted: {content}"
            );
        }
    }

    #[test]
    fn test_validate_path_shape() {
        assert!(PolicyConfig::from_toml_str(r#"path = "service""#).is_err());
        assert!(PolicyConfig::from_toml_str(r#"path = "/service""#).is_err());
        assert!(PolicyConfig::from_toml_str(r#"path = "/a/b/""#).is_ok());
    }

    #[test]
    fn test_fixed_mode_ignores_poll_settings() {
        let config = PolicyConfig::from_toml_str(
            "[propagation]\nmode = \"fixed\"\npoll_interval_ms = 0\nrequired_confirmations = 0",
        );
        assert!(config.is_ok());
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        let err = PolicyConfig::from_toml_str("[propagation]\nmode = \"eventually\"").unwrap_err();
        assert!(format!("{err:#}").contains("parse"));
    }

    #[test]
    fn test_retry_conversion() {
        let retry = RetrySettings {
            max_attempts: 3,
            base_delay_ms: 10,
            backoff_factor: 1.5,
            max_delay_ms: 100,
        }
        .to_retry_config();

        assert_eq!(retry.max_attempts, 3);
        assert_eq!(retry.base_delay, Duration::from_millis(10));
        assert_eq!(retry.max_delay, Duration::from_millis(100));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "detach_jobs = 2").unwrap();

        let config = PolicyConfig::load(file.path()).unwrap();
        assert_eq!(config.detach_jobs, 2);
    }

    #[test]
    fn test_load_missing_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");

        let err = PolicyConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("missing.toml"));
    }
}
