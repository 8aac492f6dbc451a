// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Severity levels for stored log records.
//!
//! The sink supports six severities, ordered from least to most severe:
//! `debug < info < warn < error < fatal < unknown`. A record accepts a
//! message only if the sink's configured threshold is at or below the
//! message severity.
//!
//! # Parsing
//!
//! Severities parse from strings case-insensitively, and deserialize
//! leniently from config sources: an invalid value logs an error and falls
//! back to the default (`Debug`, i.e. record everything) rather than failing
//! sink construction.
//!
//! # `log` crate integration
//!
//! [`Severity`] converts to and from [`log::Level`] so the sink can serve as
//! a drop-in `log::Log` implementation. `Fatal` and `Unknown` have no `log`
//! equivalent and map to [`log::Level::Error`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use tracing::error;

/// Severity of a single log message, ordered by importance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Severity {
    /// Lower priority information useful for debugging.
    ///
    /// This is the **default** threshold: every message is recorded.
    #[default]
    Debug,
    /// Useful information about normal operations.
    Info,
    /// Hazardous situations that may lead to errors.
    Warn,
    /// Errors that were handled but indicate a real problem.
    Error,
    /// Very serious errors that prevent normal operation.
    Fatal,
    /// Messages with no classified severity.
    Unknown,
}

impl Severity {
    /// All severities in ascending order. Every committed record carries one
    /// message sequence per entry here.
    pub const ALL: [Severity; 6] = [
        Severity::Debug,
        Severity::Info,
        Severity::Warn,
        Severity::Error,
        Severity::Fatal,
        Severity::Unknown,
    ];

    /// Lowercase name used as the key inside a record's `messages` mapping.
    #[must_use]
    pub fn as_key(self) -> &'static str {
        match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
            Severity::Unknown => "unknown",
        }
    }

    /// Uppercase label used for file pass-through lines.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
            Severity::Unknown => "UNKNOWN",
        }
    }

    /// Whether a message at `message_severity` passes a threshold of `self`.
    #[must_use]
    pub fn allows(self, message_severity: Severity) -> bool {
        message_severity >= self
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(Severity::Debug),
            "info" => Ok(Severity::Info),
            "warn" | "warning" => Ok(Severity::Warn),
            "error" => Ok(Severity::Error),
            "fatal" => Ok(Severity::Fatal),
            "unknown" => Ok(Severity::Unknown),
            _ => Err(format!(
                "Invalid severity: '{s}'. Valid severities are: debug, info, warn, error, fatal, unknown",
            )),
        }
    }
}

impl From<log::Level> for Severity {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Trace | log::Level::Debug => Severity::Debug,
            log::Level::Info => Severity::Info,
            log::Level::Warn => Severity::Warn,
            log::Level::Error => Severity::Error,
        }
    }
}

impl From<Severity> for log::Level {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Debug => log::Level::Debug,
            Severity::Info => log::Level::Info,
            Severity::Warn => log::Level::Warn,
            Severity::Error | Severity::Fatal | Severity::Unknown => log::Level::Error,
        }
    }
}

impl Serialize for Severity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_key())
    }
}

/// Lenient deserialization for config sources: invalid or non-string input
/// logs an error and falls back to the default threshold so the sink can
/// still be constructed.
impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;

        if let Value::String(s) = value {
            match Severity::from_str(&s) {
                Ok(severity) => Ok(severity),
                Err(e) => {
                    error!("{}", e);
                    Ok(Severity::default())
                }
            }
        } else {
            error!("Expected a string for severity, got {:?}", value);
            Ok(Severity::default())
        }
    }
}
