// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Environment-variable configuration source.
//!
//! Variables use the `CAPLOG_` prefix (`CAPLOG_HOST`, `CAPLOG_PORT`, ...)
//! and take priority over any resolved file configuration. Invalid values
//! are logged and ignored rather than failing resolution, so a typo in one
//! variable never takes logging down with it.

use std::str::FromStr;

use tracing::error;

use crate::config::{Config, ConfigSource};
use crate::error::Error;
use crate::severity::Severity;

const DEFAULT_PREFIX: &str = "CAPLOG";

/// Reads `<PREFIX>_*` variables and merges them over a base configuration.
#[derive(Clone, Debug)]
pub struct EnvSource {
    prefix: String,
    base: Config,
}

impl Default for EnvSource {
    fn default() -> Self {
        EnvSource::new(Config::default())
    }
}

impl EnvSource {
    /// Source layering environment overrides on top of `base`.
    #[must_use]
    pub fn new(base: Config) -> Self {
        EnvSource {
            prefix: DEFAULT_PREFIX.to_string(),
            base,
        }
    }

    /// Overrides the `CAPLOG` variable prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    fn var(&self, name: &str) -> Option<String> {
        std::env::var(format!("{}_{}", self.prefix, name))
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parsed_var<T: FromStr>(&self, name: &str) -> Option<T>
    where
        T::Err: std::fmt::Display,
    {
        let raw = self.var(name)?;
        match raw.parse() {
            Ok(value) => Some(value),
            Err(e) => {
                error!("Ignoring invalid {}_{}='{}': {}", self.prefix, name, raw, e);
                None
            }
        }
    }

    fn bool_var(&self, name: &str) -> Option<bool> {
        let raw = self.var(name)?;
        match raw.to_lowercase().as_str() {
            "1" | "true" | "yes" => Some(true),
            "0" | "false" | "no" => Some(false),
            _ => {
                error!("Ignoring invalid {}_{}='{}': expected a boolean", self.prefix, name, raw);
                None
            }
        }
    }

    fn apply(&self, config: &mut Config) {
        if let Some(host) = self.var("HOST") {
            config.host = host;
        }
        if let Some(port) = self.parsed_var("PORT") {
            config.port = port;
        }
        if let Some(database) = self.var("DATABASE") {
            config.database = database;
        }
        if let Some(environment) = self.var("ENVIRONMENT") {
            config.environment = environment;
        }
        if let Some(name) = self.var("COLLECTION_NAME") {
            config.collection_name = Some(name);
        }
        if let Some(capsize) = self.parsed_var("CAPSIZE_BYTES") {
            config.capsize_bytes = Some(capsize);
        }
        if let Some(replica_set) = self.var("REPLICA_SET") {
            config.replica_set = Some(replica_set);
        }
        if let Some(slaves) = self.var("SLAVES") {
            config.slaves = slaves.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Some(username) = self.var("USERNAME") {
            config.username = Some(username);
        }
        if let Some(password) = self.var("PASSWORD") {
            config.password = Some(password);
        }
        if let Some(safe) = self.bool_var("SAFE_INSERT") {
            config.safe_insert = safe;
        }
        if let Some(disable) = self.bool_var("DISABLE_FILE_LOGGING") {
            config.disable_file_logging = disable;
        }
        if let Some(name) = self.var("APPLICATION_NAME") {
            config.application_name = name;
        }
        if let Some(colorized) = self.bool_var("COLORIZED") {
            config.colorized = colorized;
        }
        if let Some(threshold) = self.parsed_var::<Severity>("THRESHOLD") {
            config.threshold = threshold;
        }
        if let Some(path) = self.var("LOG_FILE_PATH") {
            config.log_file_path = Some(path.into());
        }
    }
}

impl ConfigSource for EnvSource {
    fn resolve(&self) -> Result<Config, Error> {
        let mut config = self.base.clone();
        self.apply(&mut config);
        Ok(config)
    }
}
