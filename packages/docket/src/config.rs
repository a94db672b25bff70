//! Pipeline configuration.
//!
//! Defaults are usable as-is; [`PipelineConfig::from_env`] overrides them from
//! `DOCKET_*` environment variables (and a `.env` file, if present).

use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::pipeline::retry::RetryPolicy;
use crate::pipeline::verify::DEFAULT_SIMILARITY_THRESHOLD;
use crate::storage::StorageConfig;

/// Configuration shared by the batch runner and the citation verifier.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum items in flight
    pub concurrency: usize,

    /// Minimum quote similarity for a verified citation
    pub similarity_threshold: f64,

    /// Re-hash stored bytes before skipping an already-ingested source
    pub verify_on_skip: bool,

    pub retry: RetryPolicy,

    pub storage: StorageConfig,

    /// Metadata database; `None` keeps metadata in memory
    pub database_url: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            verify_on_skip: false,
            retry: RetryPolicy::default(),
            storage: StorageConfig::default(),
            database_url: None,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables.
    ///
    /// | variable                      | field                  |
    /// |-------------------------------|------------------------|
    /// | `DOCKET_CONCURRENCY`          | `concurrency`          |
    /// | `DOCKET_SIMILARITY_THRESHOLD` | `similarity_threshold` |
    /// | `DOCKET_VERIFY_ON_SKIP`       | `verify_on_skip`       |
    /// | `DOCKET_MAX_ATTEMPTS`         | `retry.max_attempts`   |
    /// | `DOCKET_BASE_DELAY_MS`        | `retry.base_delay`     |
    /// | `DOCKET_MAX_DELAY_MS`         | `retry.max_delay`      |
    /// | `DOCKET_STORAGE_DIR`          | `storage` (filesystem) |
    /// | `DATABASE_URL`                | `database_url`         |
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        let _ = dotenv();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let concurrency = parse_var(&lookup, "DOCKET_CONCURRENCY")?.unwrap_or(defaults.concurrency);
        let similarity_threshold = parse_var(&lookup, "DOCKET_SIMILARITY_THRESHOLD")?
            .unwrap_or(defaults.similarity_threshold);
        let verify_on_skip =
            parse_var(&lookup, "DOCKET_VERIFY_ON_SKIP")?.unwrap_or(defaults.verify_on_skip);

        let mut retry = defaults.retry;
        if let Some(max_attempts) = parse_var(&lookup, "DOCKET_MAX_ATTEMPTS")? {
            retry.max_attempts = max_attempts;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "DOCKET_BASE_DELAY_MS")? {
            retry.base_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "DOCKET_MAX_DELAY_MS")? {
            retry.max_delay = Duration::from_millis(ms);
        }

        let storage = match lookup("DOCKET_STORAGE_DIR") {
            Some(dir) if !dir.trim().is_empty() => StorageConfig::Filesystem {
                root: PathBuf::from(dir),
            },
            _ => defaults.storage,
        };

        let config = Self {
            concurrency,
            similarity_threshold,
            verify_on_skip,
            retry,
            storage,
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(invalid("DOCKET_CONCURRENCY", "0", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(invalid(
                "DOCKET_SIMILARITY_THRESHOLD",
                &self.similarity_threshold.to_string(),
                "must be between 0 and 1",
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(invalid("DOCKET_MAX_ATTEMPTS", "0", "must be at least 1"));
        }
        Ok(())
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn with_verify_on_skip(mut self, enabled: bool) -> Self {
        self.verify_on_skip = enabled;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }
}

fn invalid(name: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        name,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_var<T, F>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| invalid(name, &raw, &e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.similarity_threshold, 0.90);
        assert!(!config.verify_on_skip);
        assert_eq!(config.retry.max_attempts, 3);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = PipelineConfig::from_lookup(lookup(&[
            ("DOCKET_CONCURRENCY", "8"),
            ("DOCKET_SIMILARITY_THRESHOLD", "0.85"),
            ("DOCKET_VERIFY_ON_SKIP", "true"),
            ("DOCKET_MAX_ATTEMPTS", "5"),
            ("DOCKET_BASE_DELAY_MS", "10"),
            ("DOCKET_STORAGE_DIR", "/var/lib/docket"),
            ("DATABASE_URL", "sqlite://docket.db"),
        ]))
        .unwrap();

        assert_eq!(config.concurrency, 8);
        assert_eq!(config.similarity_threshold, 0.85);
        assert!(config.verify_on_skip);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay, Duration::from_millis(10));
        assert_eq!(
            config.storage,
            StorageConfig::Filesystem {
                root: PathBuf::from("/var/lib/docket")
            }
        );
        assert_eq!(config.database_url.as_deref(), Some("sqlite://docket.db"));
    }

    #[test]
    fn test_rejects_bad_values() {
        for (name, value) in [
            ("DOCKET_CONCURRENCY", "0"),
            ("DOCKET_CONCURRENCY", "many"),
            ("DOCKET_SIMILARITY_THRESHOLD", "1.5"),
            ("DOCKET_MAX_ATTEMPTS", "0"),
            ("DOCKET_VERIFY_ON_SKIP", "maybe"),
        ] {
            let err = PipelineConfig::from_lookup(lookup(&[(name, value)])).unwrap_err();
            assert!(err.to_string().contains(name), "{err}");
        }
    }
}
