//! Server Configuration
//!
//! [`GhdashConfig`] is assembled in three layers: built-in defaults, an
//! optional TOML file named by `GHDASH_CONFIG`, then `GHDASH_*` environment
//! overrides. The result is checked with [`GhdashConfig::validate`] before
//! anything is started.
//!
//! ```toml
//! port = 8080
//! workflow_ttl_minutes = 30
//! transport = "http"
//! ```

use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ghdash_core::{CacheDomain, ConfigError};
use ghdash_github::{FetchSettings, RetryPolicy};
use ghdash_storage::{
    RefreshPoolConfig, StalenessPolicy, DEFAULT_REFRESH_QUEUE_CAPACITY,
    DEFAULT_REFRESH_TIMEOUT_SECS, DEFAULT_REFRESH_WORKERS,
};
use serde::Deserialize;

use crate::constants::{
    CONFIG_PATH_ENV, DEFAULT_CACHE_MAX_SIZE_MB, DEFAULT_CACHE_PATH,
    DEFAULT_CODE_ACTIVITY_TTL_MINUTES, DEFAULT_CONTRIBUTOR_SERIES_TTL_MINUTES,
    DEFAULT_CORS_MAX_AGE_SECS, DEFAULT_DEV_STATS_TTL_MINUTES, DEFAULT_HOST,
    DEFAULT_LIFECYCLE_TTL_MINUTES, DEFAULT_PORT, DEFAULT_WORKFLOW_TTL_MINUTES,
};

// ============================================================================
// TRANSPORT SELECTION
// ============================================================================

/// Which upstream transport the fetchers use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Shell out to the authenticated `gh` CLI
    #[default]
    Gh,
    /// Call the REST API directly, optionally with `GITHUB_TOKEN`
    Http,
}

impl FromStr for TransportKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gh" => Ok(TransportKind::Gh),
            "http" => Ok(TransportKind::Http),
            other => Err(ConfigError::InvalidValue {
                field: "transport".to_string(),
                value: other.to_string(),
                reason: "expected gh or http".to_string(),
            }),
        }
    }
}

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GhdashConfig {
    pub host: String,
    pub port: u16,

    pub cache_path: PathBuf,
    pub cache_max_size_mb: usize,

    pub workflow_ttl_minutes: u64,
    pub dev_stats_ttl_minutes: u64,
    pub contributor_series_ttl_minutes: u64,
    pub code_activity_ttl_minutes: u64,
    pub lifecycle_ttl_minutes: u64,

    pub workflow_max_runs: usize,
    pub review_sample_limit: usize,
    pub max_retries: u32,
    pub retry_delay_secs: u64,

    pub refresh_workers: usize,
    pub refresh_queue_capacity: usize,
    /// Zero disables the per-refresh timeout.
    pub refresh_timeout_secs: u64,
    pub warm_on_startup: bool,

    pub transport: TransportKind,
    /// Only ever read from `GITHUB_TOKEN`.
    #[serde(skip)]
    pub github_token: Option<String>,

    /// Allowed browser origins; empty allows any.
    pub cors_origins: Vec<String>,
    pub cors_max_age_secs: u64,
}

impl Default for GhdashConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            cache_path: PathBuf::from(DEFAULT_CACHE_PATH),
            cache_max_size_mb: DEFAULT_CACHE_MAX_SIZE_MB,
            workflow_ttl_minutes: DEFAULT_WORKFLOW_TTL_MINUTES,
            dev_stats_ttl_minutes: DEFAULT_DEV_STATS_TTL_MINUTES,
            contributor_series_ttl_minutes: DEFAULT_CONTRIBUTOR_SERIES_TTL_MINUTES,
            code_activity_ttl_minutes: DEFAULT_CODE_ACTIVITY_TTL_MINUTES,
            lifecycle_ttl_minutes: DEFAULT_LIFECYCLE_TTL_MINUTES,
            workflow_max_runs: ghdash_github::DEFAULT_WORKFLOW_MAX_RUNS,
            review_sample_limit: ghdash_github::DEFAULT_REVIEW_SAMPLE_LIMIT,
            max_retries: ghdash_github::retry::DEFAULT_MAX_RETRIES,
            retry_delay_secs: ghdash_github::retry::DEFAULT_RETRY_DELAY.as_secs(),
            refresh_workers: DEFAULT_REFRESH_WORKERS,
            refresh_queue_capacity: DEFAULT_REFRESH_QUEUE_CAPACITY,
            refresh_timeout_secs: DEFAULT_REFRESH_TIMEOUT_SECS,
            warm_on_startup: true,
            transport: TransportKind::default(),
            github_token: None,
            cors_origins: Vec::new(),
            cors_max_age_secs: DEFAULT_CORS_MAX_AGE_SECS,
        }
    }
}

impl fmt::Debug for GhdashConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GhdashConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("cache_path", &self.cache_path)
            .field("cache_max_size_mb", &self.cache_max_size_mb)
            .field("ttls_minutes", &[
                self.workflow_ttl_minutes,
                self.dev_stats_ttl_minutes,
                self.contributor_series_ttl_minutes,
                self.code_activity_ttl_minutes,
                self.lifecycle_ttl_minutes,
            ])
            .field("workflow_max_runs", &self.workflow_max_runs)
            .field("review_sample_limit", &self.review_sample_limit)
            .field("max_retries", &self.max_retries)
            .field("retry_delay_secs", &self.retry_delay_secs)
            .field("refresh_workers", &self.refresh_workers)
            .field("refresh_queue_capacity", &self.refresh_queue_capacity)
            .field("refresh_timeout_secs", &self.refresh_timeout_secs)
            .field("warm_on_startup", &self.warm_on_startup)
            .field("transport", &self.transport)
            .field("github_token", &self.github_token.as_ref().map(|_| "[redacted]"))
            .field("cors_origins", &self.cors_origins)
            .finish()
    }
}

/// Parse an override, naming the variable on failure.
fn parse_var<T: FromStr>(var: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        field: var.to_string(),
        value: raw.to_string(),
        reason: "could not be parsed".to_string(),
    })
}

fn parse_flag(var: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            field: var.to_string(),
            value: raw.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}

impl GhdashConfig {
    /// Defaults, then the file named by `GHDASH_CONFIG` if set, then the
    /// process environment. Validated.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(path.trim())?,
            _ => Self::default(),
        };
        config.apply_overrides(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML file. Keys absent from the file keep their defaults;
    /// unknown keys are rejected.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })
    }

    /// Apply `GHDASH_*` (and `GITHUB_TOKEN`) overrides from `lookup`.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("GHDASH_HOST") {
            self.host = v.trim().to_string();
        }
        if let Some(v) = get("GHDASH_PORT") {
            self.port = parse_var("GHDASH_PORT", &v)?;
        }
        if let Some(v) = get("GHDASH_CACHE_PATH") {
            self.cache_path = PathBuf::from(v.trim());
        }
        if let Some(v) = get("GHDASH_CACHE_MAX_MB") {
            self.cache_max_size_mb = parse_var("GHDASH_CACHE_MAX_MB", &v)?;
        }

        let ttls: [(&str, &mut u64); 5] = [
            ("GHDASH_WORKFLOW_TTL_MINUTES", &mut self.workflow_ttl_minutes),
            ("GHDASH_DEV_STATS_TTL_MINUTES", &mut self.dev_stats_ttl_minutes),
            (
                "GHDASH_CONTRIBUTOR_SERIES_TTL_MINUTES",
                &mut self.contributor_series_ttl_minutes,
            ),
            (
                "GHDASH_CODE_ACTIVITY_TTL_MINUTES",
                &mut self.code_activity_ttl_minutes,
            ),
            ("GHDASH_LIFECYCLE_TTL_MINUTES", &mut self.lifecycle_ttl_minutes),
        ];
        for (var, slot) in ttls {
            if let Some(v) = get(var) {
                *slot = parse_var(var, &v)?;
            }
        }

        if let Some(v) = get("GHDASH_WORKFLOW_MAX_RUNS") {
            self.workflow_max_runs = parse_var("GHDASH_WORKFLOW_MAX_RUNS", &v)?;
        }
        if let Some(v) = get("GHDASH_REVIEW_SAMPLE_LIMIT") {
            self.review_sample_limit = parse_var("GHDASH_REVIEW_SAMPLE_LIMIT", &v)?;
        }
        if let Some(v) = get("GHDASH_MAX_RETRIES") {
            self.max_retries = parse_var("GHDASH_MAX_RETRIES", &v)?;
        }
        if let Some(v) = get("GHDASH_RETRY_DELAY_SECS") {
            self.retry_delay_secs = parse_var("GHDASH_RETRY_DELAY_SECS", &v)?;
        }
        if let Some(v) = get("GHDASH_REFRESH_WORKERS") {
            self.refresh_workers = parse_var("GHDASH_REFRESH_WORKERS", &v)?;
        }
        if let Some(v) = get("GHDASH_REFRESH_QUEUE") {
            self.refresh_queue_capacity = parse_var("GHDASH_REFRESH_QUEUE", &v)?;
        }
        if let Some(v) = get("GHDASH_REFRESH_TIMEOUT_SECS") {
            self.refresh_timeout_secs = parse_var("GHDASH_REFRESH_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("GHDASH_WARM_ON_STARTUP") {
            self.warm_on_startup = parse_flag("GHDASH_WARM_ON_STARTUP", &v)?;
        }
        if let Some(v) = get("GHDASH_TRANSPORT") {
            self.transport = v.parse()?;
        }
        if let Some(v) = get("GITHUB_TOKEN") {
            self.github_token = Some(v.trim().to_string());
        }
        if let Some(v) = get("GHDASH_CORS_ORIGINS") {
            self.cors_origins = v
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
        Ok(())
    }

    /// Reject settings the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn positive(field: &str, value: u64) -> Result<(), ConfigError> {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: value.to_string(),
                    reason: "must be greater than zero".to_string(),
                });
            }
            Ok(())
        }

        positive("workflow_ttl_minutes", self.workflow_ttl_minutes)?;
        positive("dev_stats_ttl_minutes", self.dev_stats_ttl_minutes)?;
        positive(
            "contributor_series_ttl_minutes",
            self.contributor_series_ttl_minutes,
        )?;
        positive("code_activity_ttl_minutes", self.code_activity_ttl_minutes)?;
        positive("lifecycle_ttl_minutes", self.lifecycle_ttl_minutes)?;
        positive("refresh_workers", self.refresh_workers as u64)?;
        positive("refresh_queue_capacity", self.refresh_queue_capacity as u64)?;
        positive("cache_max_size_mb", self.cache_max_size_mb as u64)?;
        positive("max_retries", u64::from(self.max_retries))?;
        positive("workflow_max_runs", self.workflow_max_runs as u64)?;
        positive("review_sample_limit", self.review_sample_limit as u64)?;

        if self.host.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "host".to_string(),
                value: String::new(),
                reason: "must not be empty".to_string(),
            });
        }
        self.bind_addr().map(|_| ())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse().map_err(|e| ConfigError::InvalidValue {
            field: "host".to_string(),
            value: addr,
            reason: format!("not a socket address: {}", e),
        })
    }

    pub fn ttl(&self, domain: CacheDomain) -> Duration {
        let minutes = match domain {
            CacheDomain::Workflow => self.workflow_ttl_minutes,
            CacheDomain::DevStats => self.dev_stats_ttl_minutes,
            CacheDomain::ContributorSeries => self.contributor_series_ttl_minutes,
            CacheDomain::CodeActivity => self.code_activity_ttl_minutes,
            CacheDomain::Lifecycle => self.lifecycle_ttl_minutes,
        };
        Duration::from_secs(minutes * 60)
    }

    pub fn staleness(&self) -> StalenessPolicy {
        CacheDomain::ALL
            .into_iter()
            .fold(StalenessPolicy::new(), |policy, domain| {
                policy.with_ttl(domain, self.ttl(domain))
            })
    }

    pub fn refresh_pool(&self) -> RefreshPoolConfig {
        let timeout = (self.refresh_timeout_secs > 0)
            .then(|| Duration::from_secs(self.refresh_timeout_secs));
        RefreshPoolConfig::default()
            .with_workers(self.refresh_workers)
            .with_queue_capacity(self.refresh_queue_capacity)
            .with_refresh_timeout(timeout)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_secs(self.retry_delay_secs))
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            workflow_max_runs: self.workflow_max_runs,
            review_sample_limit: self.review_sample_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    struct EnvVarGuard {
        key: &'static str,
        original: Option<String>,
    }

    impl EnvVarGuard {
        fn set(key: &'static str, value: Option<&str>) -> Self {
            let original = std::env::var(key).ok();
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
            Self { key, original }
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            match self.original.as_deref() {
                Some(v) => std::env::set_var(self.key, v),
                None => std::env::remove_var(self.key),
            }
        }
    }

    fn overrides(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = GhdashConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 5050);
        assert_eq!(config.cache_path, PathBuf::from("./data/cache"));
        assert_eq!(config.cache_max_size_mb, 512);
        assert_eq!(config.workflow_ttl_minutes, 60);
        assert_eq!(config.dev_stats_ttl_minutes, 240);
        assert_eq!(config.contributor_series_ttl_minutes, 1440);
        assert_eq!(config.code_activity_ttl_minutes, 1440);
        assert_eq!(config.lifecycle_ttl_minutes, 120);
        assert_eq!(config.workflow_max_runs, 1000);
        assert_eq!(config.review_sample_limit, 250);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay_secs, 2);
        assert_eq!(config.refresh_workers, 4);
        assert_eq!(config.refresh_queue_capacity, 64);
        assert_eq!(config.refresh_timeout_secs, 300);
        assert!(config.warm_on_startup);
        assert_eq!(config.transport, TransportKind::Gh);
        assert_eq!(config.github_token, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_keeps_defaults_for_missing_keys() -> Result<(), ConfigError> {
        let config = GhdashConfig::from_toml(
            r#"
            port = 8080
            workflow_ttl_minutes = 30
            transport = "http"
            "#,
        )?;
        assert_eq!(config.port, 8080);
        assert_eq!(config.workflow_ttl_minutes, 30);
        assert_eq!(config.transport, TransportKind::Http);
        assert_eq!(config.lifecycle_ttl_minutes, 120);
        Ok(())
    }

    #[test]
    fn test_toml_rejects_unknown_keys() {
        let err = GhdashConfig::from_toml("workflow_ttl = 30").expect_err("unknown key");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_toml_cannot_carry_token() {
        assert!(GhdashConfig::from_toml(r#"github_token = "ghp_x""#).is_err());
    }

    #[test]
    fn test_env_overrides() -> Result<(), ConfigError> {
        let mut config = GhdashConfig::default();
        config.apply_overrides(overrides(&[
            ("GHDASH_PORT", "9000"),
            ("GHDASH_LIFECYCLE_TTL_MINUTES", "15"),
            ("GHDASH_REFRESH_QUEUE", "8"),
            ("GHDASH_WARM_ON_STARTUP", "false"),
            ("GHDASH_TRANSPORT", "HTTP"),
            ("GITHUB_TOKEN", "ghp_secret"),
            ("GHDASH_CORS_ORIGINS", "http://localhost:3000, ,https://dash.example"),
            ("GHDASH_HOST", ""),
        ]))?;

        assert_eq!(config.port, 9000);
        assert_eq!(config.lifecycle_ttl_minutes, 15);
        assert_eq!(config.refresh_queue_capacity, 8);
        assert!(!config.warm_on_startup);
        assert_eq!(config.transport, TransportKind::Http);
        assert_eq!(config.github_token.as_deref(), Some("ghp_secret"));
        assert_eq!(
            config.cors_origins,
            vec!["http://localhost:3000", "https://dash.example"]
        );
        assert_eq!(config.host, "127.0.0.1");
        Ok(())
    }

    #[test]
    fn test_bad_override_names_variable() {
        let mut config = GhdashConfig::default();
        let err = config
            .apply_overrides(overrides(&[("GHDASH_REFRESH_WORKERS", "many")]))
            .expect_err("should fail");
        assert!(err.to_string().contains("GHDASH_REFRESH_WORKERS"));

        let err = config
            .apply_overrides(overrides(&[("GHDASH_TRANSPORT", "grpc")]))
            .expect_err("should fail");
        assert!(err.to_string().contains("transport"));
    }

    #[test]
    fn test_validate_rejects_zeroes() {
        let cases: [fn(&mut GhdashConfig); 4] = [
            |c| c.workflow_ttl_minutes = 0,
            |c| c.code_activity_ttl_minutes = 0,
            |c| c.refresh_workers = 0,
            |c| c.refresh_queue_capacity = 0,
        ];
        for mutate in cases {
            let mut config = GhdashConfig::default();
            mutate(&mut config);
            assert!(config.validate().is_err());
        }
    }

    #[test]
    fn test_validate_rejects_bad_host() {
        let config = GhdashConfig {
            host: "not a host".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_derived_settings() {
        let config = GhdashConfig {
            workflow_ttl_minutes: 5,
            refresh_timeout_secs: 0,
            max_retries: 4,
            retry_delay_secs: 1,
            ..Default::default()
        };

        let staleness = config.staleness();
        assert_eq!(staleness.ttl(CacheDomain::Workflow), Duration::from_secs(300));
        assert_eq!(staleness.ttl(CacheDomain::DevStats), Duration::from_secs(240 * 60));

        assert_eq!(config.refresh_pool().refresh_timeout, None);
        assert_eq!(
            config.retry_policy(),
            RetryPolicy::new(4, Duration::from_secs(1))
        );
        assert_eq!(config.fetch_settings().review_sample_limit, 250);
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = GhdashConfig {
            github_token: Some("ghp_secret".to_string()),
            ..Default::default()
        };
        let debug = format!("{:?}", config);
        assert!(!debug.contains("ghp_secret"));
        assert!(debug.contains("[redacted]"));
    }

    #[test]
    fn test_load_reads_file_from_env() -> Result<(), Box<dyn std::error::Error>> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "port = 6060\nrefresh_workers = 2")?;
        let path = file.path().to_string_lossy().to_string();

        let _config_guard = EnvVarGuard::set(CONFIG_PATH_ENV, Some(&path));
        let _workers_guard = EnvVarGuard::set("GHDASH_REFRESH_WORKERS", Some("3"));

        let config = GhdashConfig::load()?;
        assert_eq!(config.port, 6060);
        assert_eq!(config.refresh_workers, 3);
        Ok(())
    }
}
