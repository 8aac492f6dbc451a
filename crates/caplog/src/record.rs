// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Structured per-request log records.
//!
//! One [`LogRecord`] exists per scoped unit of work. It accumulates
//! severity-tagged messages and caller metadata while the work runs, is
//! finalized with the measured runtime at exit, committed, and discarded.
//! Records are never reused.
//!
//! # Reserved fields
//!
//! `messages`, `request_time`, `runtime` and `application_name` are owned by
//! the record itself. The metadata API rejects them atomically: a merge that
//! names any reserved key fails without modifying the record.
//!
//! # Stored document
//!
//! The committed document carries metadata pairs at the top level next to
//! the reserved fields:
//!
//! ```json
//! {
//!   "request_id": "abc",
//!   "messages": {"info": ["hello"]},
//!   "request_time": 1735689600123,
//!   "runtime": 42,
//!   "application_name": "App"
//! }
//! ```
//!
//! In memory every severity has a message sequence from creation; empty
//! sequences are omitted from the committed document.

use std::collections::BTreeMap;
use std::sync::OnceLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use regex::Regex;
use serde_json::Value;

use crate::config::Config;
use crate::error::Error;
use crate::severity::Severity;
use crate::store::Document;

/// Record fields that cannot be set through the metadata API.
pub const RESERVED_KEYS: [&str; 4] = ["messages", "request_time", "runtime", "application_name"];

/// ANSI SGR escape sequences (colors and text attributes).
fn ansi_pattern() -> &'static Regex {
    static ANSI: OnceLock<Regex> = OnceLock::new();
    #[allow(clippy::expect_used)]
    ANSI.get_or_init(|| Regex::new("\u{1b}\\[[0-9;]*m").expect("valid pattern"))
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// One structured record for one scoped unit of work.
#[derive(Clone, Debug)]
pub struct LogRecord {
    request_time: u64,
    runtime_ms: Option<u64>,
    application_name: String,
    messages: BTreeMap<Severity, Vec<String>>,
    metadata: Document,
}

impl LogRecord {
    fn new(application_name: &str) -> Self {
        LogRecord {
            request_time: epoch_millis(),
            runtime_ms: None,
            application_name: application_name.to_string(),
            messages: Severity::ALL
                .iter()
                .map(|severity| (*severity, Vec::new()))
                .collect(),
            metadata: Document::new(),
        }
    }

    /// Merges caller metadata into the record's top-level fields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReservedKey`] if any key collides with a reserved
    /// field name; in that case no field is modified.
    pub fn merge_metadata(&mut self, metadata: Document) -> Result<(), Error> {
        if let Some(key) = metadata.keys().find(|k| RESERVED_KEYS.contains(&k.as_str())) {
            return Err(Error::ReservedKey(key.clone()));
        }
        for (key, value) in metadata {
            self.metadata.insert(key, value);
        }
        Ok(())
    }

    fn append(&mut self, severity: Severity, text: String) {
        // Every severity is present from construction.
        if let Some(sequence) = self.messages.get_mut(&severity) {
            sequence.push(text);
        }
    }

    fn set_runtime(&mut self, elapsed: Duration) {
        self.runtime_ms = Some(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX));
    }

    #[must_use]
    pub fn runtime_ms(&self) -> Option<u64> {
        self.runtime_ms
    }

    /// Messages recorded at `severity`, in insertion order.
    #[must_use]
    pub fn messages(&self, severity: Severity) -> &[String] {
        self.messages
            .get(&severity)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    #[must_use]
    pub fn metadata(&self) -> &Document {
        &self.metadata
    }

    /// Renders the storable document. Unfinalized records report a runtime
    /// of zero; empty message sequences are omitted.
    #[must_use]
    pub fn to_document(&self) -> Document {
        let mut document = self.metadata.clone();

        let mut messages = Document::new();
        for (severity, sequence) in &self.messages {
            if !sequence.is_empty() {
                messages.insert(
                    severity.as_key().to_string(),
                    Value::Array(sequence.iter().cloned().map(Value::String).collect()),
                );
            }
        }
        document.insert("messages".to_string(), Value::Object(messages));
        document.insert("request_time".to_string(), Value::from(self.request_time));
        document.insert(
            "runtime".to_string(),
            Value::from(self.runtime_ms.unwrap_or(0)),
        );
        document.insert(
            "application_name".to_string(),
            Value::String(self.application_name.clone()),
        );
        document
    }
}

/// Builds and mutates records according to the sink's configuration.
#[derive(Clone, Debug)]
pub struct RecordBuilder {
    threshold: Severity,
    colorized: bool,
    application_name: String,
}

impl RecordBuilder {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        RecordBuilder {
            threshold: config.threshold,
            colorized: config.colorized,
            application_name: config.application_name.clone(),
        }
    }

    /// Starts a record for a new scoped unit of work.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReservedKey`] on metadata collision with a reserved
    /// field; no record is produced in that case.
    pub fn begin(&self, metadata: Document) -> Result<LogRecord, Error> {
        let mut record = LogRecord::new(&self.application_name);
        record.merge_metadata(metadata)?;
        Ok(record)
    }

    /// Appends `message` to the matching severity sequence if the threshold
    /// permits and the message is non-empty; otherwise a no-op.
    ///
    /// Always returns the original message unaltered so the sink stays a
    /// transparent drop-in for a generic logger. When colorized output is
    /// configured, ANSI escapes are stripped from the stored copy only.
    pub fn record<'a>(
        &self,
        record: &mut LogRecord,
        severity: Severity,
        message: &'a str,
    ) -> &'a str {
        if self.threshold.allows(severity) && !message.is_empty() {
            let stored = if self.colorized {
                ansi_pattern().replace_all(message, "").into_owned()
            } else {
                message.to_string()
            };
            record.append(severity, stored);
        }
        message
    }

    /// Sets the record's runtime from the elapsed wall time of the wrapped
    /// unit of work.
    pub fn finalize(&self, record: &mut LogRecord, elapsed: Duration) {
        record.set_runtime(elapsed);
    }

    #[must_use]
    pub fn threshold(&self) -> Severity {
        self.threshold
    }
}
