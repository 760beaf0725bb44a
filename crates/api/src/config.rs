use std::str::FromStr;
use std::time::Duration;

use procman_db::RetentionPolicy;

/// Error raised when an environment variable holds an unusable value.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has an invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `5000`).
    pub port: u16,
    /// Public base URL used to build `Location` headers.
    pub base_url: String,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Upper bound on waiting for in-flight jobs at shutdown (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// SQLite connection URL (default: `sqlite://procman.db`).
    pub database_url: String,
    /// Pretty-print JSON response bodies (default: `false`).
    pub pretty_print: bool,
    /// Delete terminal jobs last updated more than this many hours ago.
    pub job_retention_max_age_hours: Option<u64>,
    /// Keep at most this many terminal jobs.
    pub job_retention_max_count: Option<usize>,
    /// How often the retention task runs (default: `3600`).
    pub job_retention_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let port = 5000;
        Self {
            host: "0.0.0.0".into(),
            port,
            base_url: format!("http://localhost:{port}"),
            cors_origins: vec!["http://localhost:5173".into()],
            request_timeout_secs: 30,
            shutdown_timeout_secs: 30,
            database_url: "sqlite://procman.db".into(),
            pretty_print: false,
            job_retention_max_age_hours: None,
            job_retention_max_count: None,
            job_retention_interval_secs: 3600,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default                  |
    /// |-------------------------------|--------------------------|
    /// | `HOST`                        | `0.0.0.0`                |
    /// | `PORT`                        | `5000`                   |
    /// | `BASE_URL`                    | `http://localhost:{PORT}`|
    /// | `CORS_ORIGINS`                | `http://localhost:5173`  |
    /// | `REQUEST_TIMEOUT_SECS`        | `30`                     |
    /// | `SHUTDOWN_TIMEOUT_SECS`       | `30`                     |
    /// | `DATABASE_URL`                | `sqlite://procman.db`    |
    /// | `PRETTY_PRINT`                | `false`                  |
    /// | `JOB_RETENTION_MAX_AGE_HOURS` | unset                    |
    /// | `JOB_RETENTION_MAX_COUNT`     | unset                    |
    /// | `JOB_RETENTION_INTERVAL_SECS` | `3600`                   |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let host = lookup("HOST").unwrap_or(defaults.host);
        let port = parse_var(&lookup, "PORT")?.unwrap_or(defaults.port);

        let base_url = lookup("BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| format!("http://localhost:{port}"));

        let cors_origins = match lookup("CORS_ORIGINS") {
            Some(raw) => raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => defaults.cors_origins,
        };

        let pretty_print = match lookup("PRETTY_PRINT") {
            Some(raw) => parse_bool("PRETTY_PRINT", &raw)?,
            None => defaults.pretty_print,
        };

        Ok(Self {
            host,
            port,
            base_url,
            cors_origins,
            request_timeout_secs: parse_var(&lookup, "REQUEST_TIMEOUT_SECS")?
                .unwrap_or(defaults.request_timeout_secs),
            shutdown_timeout_secs: parse_var(&lookup, "SHUTDOWN_TIMEOUT_SECS")?
                .unwrap_or(defaults.shutdown_timeout_secs),
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            pretty_print,
            job_retention_max_age_hours: parse_var(&lookup, "JOB_RETENTION_MAX_AGE_HOURS")?,
            job_retention_max_count: parse_var(&lookup, "JOB_RETENTION_MAX_COUNT")?,
            job_retention_interval_secs: parse_var(&lookup, "JOB_RETENTION_INTERVAL_SECS")?
                .unwrap_or(defaults.job_retention_interval_secs),
        })
    }

    /// Retention thresholds for finished jobs. Unbounded when neither limit
    /// is configured.
    pub fn retention_policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            max_age: self
                .job_retention_max_age_hours
                .map(|hours| Duration::from_secs(hours.saturating_mul(3600))),
            max_count: self.job_retention_max_count,
        }
    }

    pub fn retention_interval(&self) -> Duration {
        Duration::from_secs(self.job_retention_interval_secs.max(1))
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

fn parse_var<F, T>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(value) = lookup(var) else {
        return Ok(None);
    };
    value
        .trim()
        .parse()
        .map(Some)
        .map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value,
        })
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value: value.to_string(),
            reason: "expected a boolean".into(),
        }),
    }
}
