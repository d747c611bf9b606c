//! Environment-driven configuration (`BODEGA_` prefix).

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use bodega_oracle::UnreachablePolicy;

/// Startup configuration for the service.
#[derive(Debug, Clone)]
pub struct Config {
    /// Storage location for build trees (`BODEGA_BUILDS_ROOT`).
    pub builds_root: PathBuf,
    /// HTTP listen port (`BODEGA_HTTP_PORT`).
    pub http_port: u16,
    /// Retention sweep cadence (`BODEGA_SWEEP_INTERVAL_SECONDS`).
    pub sweep_interval: Duration,
    /// Minimum build age before GC eligibility
    /// (`BODEGA_GRACE_PERIOD_SECONDS`).
    pub grace_period: Duration,
    /// Tag Oracle URL (`BODEGA_ORACLE_URL`). Unset disables retention
    /// sweeps.
    pub oracle_url: Option<String>,
    /// Oracle request timeout (`BODEGA_ORACLE_TIMEOUT_SECONDS`).
    pub oracle_timeout_secs: u64,
    /// Fail-safe policy when the oracle is unreachable
    /// (`BODEGA_ORACLE_UNREACHABLE_POLICY`, `keep` or `delete`).
    pub oracle_unreachable_policy: UnreachablePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            builds_root: PathBuf::from("builds"),
            http_port: 8080,
            sweep_interval: Duration::from_secs(60),
            grace_period: Duration::from_secs(3600),
            oracle_url: None,
            oracle_timeout_secs: 10,
            oracle_unreachable_policy: UnreachablePolicy::Keep,
        }
    }
}

/// A configuration variable that could not be parsed.
#[derive(Error, Debug)]
#[error("invalid value for {var}: {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub reason: String,
}

impl Config {
    /// Read configuration from the environment, falling back to the
    /// defaults above for unset variables. Malformed values fail
    /// startup rather than being silently replaced.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            builds_root: std::env::var("BODEGA_BUILDS_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.builds_root),
            http_port: parse_var("BODEGA_HTTP_PORT", defaults.http_port)?,
            sweep_interval: Duration::from_secs(parse_var(
                "BODEGA_SWEEP_INTERVAL_SECONDS",
                defaults.sweep_interval.as_secs(),
            )?),
            grace_period: Duration::from_secs(parse_var(
                "BODEGA_GRACE_PERIOD_SECONDS",
                defaults.grace_period.as_secs(),
            )?),
            oracle_url: std::env::var("BODEGA_ORACLE_URL").ok().filter(|s| !s.is_empty()),
            oracle_timeout_secs: parse_var(
                "BODEGA_ORACLE_TIMEOUT_SECONDS",
                defaults.oracle_timeout_secs,
            )?,
            oracle_unreachable_policy: parse_var(
                "BODEGA_ORACLE_UNREACHABLE_POLICY",
                defaults.oracle_unreachable_policy,
            )?,
        })
    }
}

fn parse_var<T>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(var) {
        Ok(raw) => raw.parse().map_err(|e: T::Err| ConfigError {
            var,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}
