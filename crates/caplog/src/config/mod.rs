// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Sink configuration.
//!
//! Configuration sources are applied in the following order (later sources
//! override earlier):
//!
//! 1. **Defaults** - hard-coded defaults in [`Config::default`]
//! 2. **Resolved map** - whatever the host application's configuration layer
//!    produced (file discovery and parsing are external; see
//!    [`ConfigSource`])
//! 3. **Environment variables** - `CAPLOG_*` overrides (highest priority,
//!    see [`env::EnvSource`])
//!
//! All optional fields have documented defaults so a minimal map such as
//! `{"database": "myapp"}` is a complete configuration.

pub mod env;

use std::path::PathBuf;

use serde::Deserialize;
use serde_json::Value;

use crate::error::Error;
use crate::severity::Severity;

/// Default capped-collection size: 128 MiB.
pub const DEFAULT_CAPSIZE_BYTES: u64 = 128 * 1024 * 1024;

/// Capped-collection size used in production-like environments: 256 MiB.
pub const PRODUCTION_CAPSIZE_BYTES: u64 = 256 * 1024 * 1024;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 27017;

/// Sink configuration with named optional fields and documented defaults.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Primary store host. Default: `localhost`.
    pub host: String,
    /// Store port. Default: `27017`.
    pub port: u16,
    /// Database holding the capped log collection. Default: `logs`.
    pub database: String,
    /// Deployment environment name; names the default collection
    /// (`<env>_log`) and decides strictness. Default: `development`.
    pub environment: String,
    /// Explicit collection name override. Default: derived from
    /// `environment`.
    pub collection_name: Option<String>,
    /// Explicit capped-collection byte size. Default: 128 MiB, or 256 MiB in
    /// production-like environments.
    pub capsize_bytes: Option<u64>,
    /// Replica-set name; presence enables reconnect-retry on inserts.
    pub replica_set: Option<String>,
    /// Secondary hosts (`host:port`) for replicated deployments.
    pub slaves: Vec<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Use the store's acknowledged write concern. Default: `false`.
    pub safe_insert: bool,
    /// Suppress the file pass-through entirely. Default: `false`.
    pub disable_file_logging: bool,
    /// Name stored in every record's `application_name` field.
    /// Default: `Application`.
    pub application_name: String,
    /// Whether the host process emits ANSI-colorized log lines. When set,
    /// escape sequences are stripped from stored copies. Passed explicitly
    /// instead of introspecting another library's global state.
    /// Default: `false`.
    pub colorized: bool,
    /// Minimum severity recorded into the store. Default: `debug`.
    pub threshold: Severity,
    /// Target for the file pass-through and the fallback logger. Default:
    /// none (fallback writes to stderr).
    pub log_file_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            database: "logs".to_string(),
            environment: "development".to_string(),
            collection_name: None,
            capsize_bytes: None,
            replica_set: None,
            slaves: Vec::new(),
            username: None,
            password: None,
            safe_insert: false,
            disable_file_logging: false,
            application_name: "Application".to_string(),
            colorized: false,
            threshold: Severity::default(),
            log_file_path: None,
        }
    }
}

impl Config {
    /// Builds a configuration from a resolved map, on top of defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the value is not map-shaped or a field
    /// has an incompatible type.
    pub fn from_value(value: Value) -> Result<Self, Error> {
        serde_json::from_value(value).map_err(|e| Error::Config(e.to_string()))
    }

    /// Name of the capped collection: the explicit override, or `<env>_log`.
    #[must_use]
    pub fn capped_collection_name(&self) -> String {
        self.collection_name
            .clone()
            .unwrap_or_else(|| format!("{}_log", self.environment))
    }

    /// Effective capped-collection size in bytes.
    #[must_use]
    pub fn capsize(&self) -> u64 {
        self.capsize_bytes.unwrap_or(if self.production_like() {
            PRODUCTION_CAPSIZE_BYTES
        } else {
            DEFAULT_CAPSIZE_BYTES
        })
    }

    /// Production-like environments get the larger default capsize and treat
    /// construction failures as fatal instead of falling back to file
    /// logging.
    #[must_use]
    pub fn production_like(&self) -> bool {
        matches!(self.environment.as_str(), "production" | "staging")
    }

    /// Whether inserts run under the replica reconnect-retry policy.
    #[must_use]
    pub fn replica_mode(&self) -> bool {
        self.replica_set.is_some() || !self.slaves.is_empty()
    }

    /// Primary plus secondary hosts, as `host:port` strings.
    #[must_use]
    pub fn hosts(&self) -> Vec<String> {
        let mut hosts = vec![format!("{}:{}", self.host, self.port)];
        hosts.extend(self.slaves.iter().cloned());
        hosts
    }
}

/// Configuration-source capability consumed by the sink.
///
/// File discovery, precedence between files, and variable substitution all
/// live in the host application; the sink only consumes the resolved result.
pub trait ConfigSource {
    /// Produces a complete configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the source cannot produce a valid
    /// configuration.
    fn resolve(&self) -> Result<Config, Error>;
}

/// Any pre-parsed JSON-shaped map resolves directly.
impl ConfigSource for Value {
    fn resolve(&self) -> Result<Config, Error> {
        Config::from_value(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 27017);
        assert_eq!(config.capsize(), DEFAULT_CAPSIZE_BYTES);
        assert_eq!(config.capped_collection_name(), "development_log");
        assert_eq!(config.threshold, Severity::Debug);
        assert!(!config.safe_insert);
        assert!(!config.replica_mode());
    }

    #[test]
    fn test_production_capsize_default() {
        let config = Config {
            environment: "production".to_string(),
            ..Config::default()
        };
        assert_eq!(config.capsize(), PRODUCTION_CAPSIZE_BYTES);
        assert!(config.production_like());
    }

    #[test]
    fn test_explicit_capsize_wins() {
        let config = Config {
            environment: "production".to_string(),
            capsize_bytes: Some(1024),
            ..Config::default()
        };
        assert_eq!(config.capsize(), 1024);
    }

    #[test]
    fn test_from_value_minimal_map() {
        let config = Config::from_value(json!({"database": "myapp"})).unwrap();
        assert_eq!(config.database, "myapp");
        assert_eq!(config.host, "localhost");
    }

    #[test]
    fn test_from_value_full_map() {
        let config = Config::from_value(json!({
            "host": "db.internal",
            "port": 27018,
            "database": "myapp",
            "environment": "staging",
            "replica_set": "rs0",
            "slaves": ["db2.internal:27017"],
            "username": "logger",
            "password": "hunter2",
            "safe_insert": true,
            "threshold": "warn",
            "application_name": "MyApp"
        }))
        .unwrap();
        assert_eq!(config.port, 27018);
        assert_eq!(config.threshold, Severity::Warn);
        assert!(config.replica_mode());
        assert_eq!(
            config.hosts(),
            vec!["db.internal:27018".to_string(), "db2.internal:27017".to_string()]
        );
        assert_eq!(config.capped_collection_name(), "staging_log");
    }

    #[test]
    fn test_from_value_rejects_non_map() {
        assert!(Config::from_value(json!("not a map")).is_err());
    }

    #[test]
    fn test_collection_name_override() {
        let config = Config {
            collection_name: Some("audit_log".to_string()),
            ..Config::default()
        };
        assert_eq!(config.capped_collection_name(), "audit_log");
    }
}
