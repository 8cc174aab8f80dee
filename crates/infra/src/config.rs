//! Process configuration read from the environment.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::projections::RangePolicy;
use crate::submitter::DEFAULT_RETENTION;

pub const ROLES_URL: &str = "TRACECHAIN_ROLES_URL";
pub const CONFIRMATION_TIMEOUT_SECS: &str = "TRACECHAIN_CONFIRMATION_TIMEOUT_SECS";
pub const RANGE_POLICY: &str = "TRACECHAIN_RANGE_POLICY";
pub const BIND_ADDR: &str = "TRACECHAIN_BIND_ADDR";
pub const JOURNAL_RETENTION: &str = "TRACECHAIN_JOURNAL_RETENTION";
pub const MAX_SUBMITTERS: &str = "TRACECHAIN_MAX_SUBMITTERS";

const DEFAULT_ROLES_URL: &str = "http://localhost:4000";
const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 120;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_MAX_SUBMITTERS: usize = 256;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceConfig {
    /// Base URL of the roles directory service.
    pub roles_url: String,
    /// Upper bound on waiting for a submitted transaction to be mined.
    pub confirmation_timeout: Duration,
    pub range_policy: RangePolicy,
    pub bind_addr: SocketAddr,
    /// Resolved submissions each account's journal keeps.
    pub journal_retention: usize,
    /// Idle per-account submitters kept before eviction starts.
    pub max_submitters: usize,
}

impl TraceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let roles_url = get(ROLES_URL).unwrap_or_else(|| {
            tracing::warn!("{ROLES_URL} not set; using dev default {DEFAULT_ROLES_URL}");
            DEFAULT_ROLES_URL.to_string()
        });

        let positive = |key: &'static str, default: u64| -> Result<u64, ConfigError> {
            let Some(raw) = get(key) else {
                return Ok(default);
            };
            let value = raw.parse::<u64>().map_err(|e| ConfigError::InvalidValue {
                key,
                value: raw.clone(),
                reason: e.to_string(),
            })?;
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    key,
                    value: raw,
                    reason: "must be positive".to_string(),
                });
            }
            Ok(value)
        };

        let confirmation_timeout =
            Duration::from_secs(positive(CONFIRMATION_TIMEOUT_SECS, DEFAULT_CONFIRMATION_TIMEOUT_SECS)?);
        let journal_retention = positive(JOURNAL_RETENTION, DEFAULT_RETENTION as u64)? as usize;
        let max_submitters = positive(MAX_SUBMITTERS, DEFAULT_MAX_SUBMITTERS as u64)? as usize;

        let range_policy = match get(RANGE_POLICY) {
            Some(raw) => raw.parse::<RangePolicy>().map_err(|reason| ConfigError::InvalidValue {
                key: RANGE_POLICY,
                value: raw.clone(),
                reason,
            })?,
            None => RangePolicy::default(),
        };

        let bind_addr = get(BIND_ADDR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_addr
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue {
                key: BIND_ADDR,
                value: bind_addr.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            roles_url,
            confirmation_timeout,
            range_policy,
            bind_addr,
            journal_retention,
            max_submitters,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<TraceConfig, ConfigError> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        TraceConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.roles_url, DEFAULT_ROLES_URL);
        assert_eq!(cfg.confirmation_timeout, Duration::from_secs(120));
        assert_eq!(cfg.range_policy, RangePolicy::Conservative);
        assert_eq!(cfg.bind_addr.port(), 8080);
        assert_eq!(cfg.journal_retention, DEFAULT_RETENTION);
        assert_eq!(cfg.max_submitters, 256);
    }

    #[test]
    fn reads_every_key() {
        let cfg = config(&[
            (ROLES_URL, "http://roles.internal:9000"),
            (CONFIRMATION_TIMEOUT_SECS, "30"),
            (RANGE_POLICY, "inclusive"),
            (BIND_ADDR, "127.0.0.1:3000"),
            (JOURNAL_RETENTION, "64"),
            (MAX_SUBMITTERS, "8"),
        ])
        .unwrap();
        assert_eq!(cfg.roles_url, "http://roles.internal:9000");
        assert_eq!(cfg.confirmation_timeout, Duration::from_secs(30));
        assert_eq!(cfg.range_policy, RangePolicy::Inclusive);
        assert_eq!(cfg.bind_addr.to_string(), "127.0.0.1:3000");
        assert_eq!(cfg.journal_retention, 64);
        assert_eq!(cfg.max_submitters, 8);
    }

    #[test]
    fn rejects_bad_values() {
        let err = config(&[(CONFIRMATION_TIMEOUT_SECS, "soon")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: CONFIRMATION_TIMEOUT_SECS, .. }));

        assert!(config(&[(CONFIRMATION_TIMEOUT_SECS, "0")]).is_err());
        assert!(config(&[(RANGE_POLICY, "optimistic")]).is_err());
        assert!(config(&[(BIND_ADDR, "localhost")]).is_err());
        assert!(config(&[(MAX_SUBMITTERS, "0")]).is_err());
        assert!(config(&[(JOURNAL_RETENTION, "-1")]).is_err());
    }

    #[test]
    fn blank_values_count_as_unset() {
        let cfg = config(&[(RANGE_POLICY, "  ")]).unwrap();
        assert_eq!(cfg.range_policy, RangePolicy::Conservative);
    }
}
