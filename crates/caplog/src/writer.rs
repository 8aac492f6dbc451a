// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Committing records with failure fallback.
//!
//! ```text
//!   to_document
//!        │
//!        v
//!   ┌──────────┐   connection failure,    ┌───────────────────┐
//!   │  insert  │ ───── replica mode ────> │ reconnect + retry │ (bounded)
//!   └────┬─────┘                          └───────────────────┘
//!        │ any failure
//!        v
//!   ┌──────────┐
//!   │ flatten  │  (stringify compound values, retry exactly once)
//!   └────┬─────┘
//!        │ second failure
//!        v
//!     swallowed (traced, record dropped)
//! ```
//!
//! Logging must never crash the host application: `commit` returns nothing
//! and the final failure mode is a `tracing` diagnostic, not an error.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, error};

use crate::config::Config;
use crate::error::Error;
use crate::record::LogRecord;
use crate::store::{Collection, Connector, Document};

/// Bound on connection-failure retries in replica-set mode.
#[derive(Clone, Debug)]
pub enum RetryPolicy {
    /// Retry immediately up to the given number of attempts.
    Immediate(u32),
    /// Retry up to the given number of attempts, pausing between them.
    FixedDelay(u32, Duration),
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::Immediate(3)
    }
}

impl RetryPolicy {
    fn attempts(&self) -> u32 {
        match self {
            RetryPolicy::Immediate(attempts) | RetryPolicy::FixedDelay(attempts, _) => {
                (*attempts).max(1)
            }
        }
    }

    fn pause(&self) {
        if let RetryPolicy::FixedDelay(_, delay) = self {
            std::thread::sleep(*delay);
        }
    }
}

/// Commits records, downgrading and finally dropping them on failure.
pub struct RetryingWriter {
    collection: RwLock<Arc<dyn Collection>>,
    connector: Arc<dyn Connector>,
    config: Config,
    policy: RetryPolicy,
}

impl RetryingWriter {
    #[must_use]
    pub fn new(
        collection: Arc<dyn Collection>,
        connector: Arc<dyn Connector>,
        config: Config,
    ) -> Self {
        RetryingWriter {
            collection: RwLock::new(collection),
            connector,
            config,
            policy: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Commits a finalized record. Runs to completion or to an accepted,
    /// swallowed failure; it is never partially applied and never panics.
    pub fn commit(&self, record: &LogRecord) {
        let document = record.to_document();
        let Err(first) = self.insert(&document) else {
            return;
        };

        // Downgrade pass: force every value into a representable shape and
        // try exactly once more.
        debug!("Insert failed ({first}); flattening record and retrying once");
        let flattened = flatten_document(&document);
        if let Err(second) = self.insert(&flattened) {
            error!("Dropping log record after flatten retry: {second}");
        }
    }

    /// One insert, wrapped in the replica reconnect-retry policy when a
    /// replica set is configured.
    fn insert(&self, document: &Document) -> Result<(), Error> {
        if !self.config.replica_mode() {
            return self.current_collection().insert(document, self.config.safe_insert);
        }

        let attempts = self.policy.attempts();
        let mut last = None;
        for attempt in 0..attempts {
            match self.current_collection().insert(document, self.config.safe_insert) {
                Ok(()) => return Ok(()),
                Err(err) if err.is_connection() && attempt + 1 < attempts => {
                    debug!("Connection failure on insert (attempt {}): {err}", attempt + 1);
                    self.policy.pause();
                    self.reconnect();
                    last = Some(err);
                }
                Err(err) => return Err(err),
            }
        }
        Err(last.unwrap_or_else(|| Error::Connection("retries exhausted".to_string())))
    }

    /// Delegates topology re-resolution to the connector and swaps in a
    /// fresh collection handle. A failed reconnect keeps the old handle so
    /// the next attempt still has something to try.
    fn reconnect(&self) {
        match self.connector.reconnect(&self.config) {
            Ok(database) => {
                let collection = database.collection(&self.config.capped_collection_name());
                #[allow(clippy::expect_used)]
                let mut current = self.collection.write().expect("lock poisoned");
                *current = collection;
            }
            Err(err) => debug!("Reconnect failed: {err}"),
        }
    }

    fn current_collection(&self) -> Arc<dyn Collection> {
        #[allow(clippy::expect_used)]
        let collection = self.collection.read().expect("lock poisoned");
        Arc::clone(&collection)
    }
}

/// Converts every metadata value and message entry to its string
/// representation so a record that failed serialization can be retried.
fn flatten_document(document: &Document) -> Document {
    document
        .iter()
        .map(|(key, value)| {
            let flattened = if key == "messages" {
                flatten_messages(value)
            } else {
                flatten_value(value)
            };
            (key.clone(), flattened)
        })
        .collect()
}

/// Keeps the severity -> sequence structure but forces each entry into a
/// string.
fn flatten_messages(messages: &Value) -> Value {
    match messages {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(severity, sequence)| {
                    let flattened = match sequence {
                        Value::Array(entries) => Value::Array(
                            entries.iter().map(stringify_entry).collect(),
                        ),
                        other => flatten_value(other),
                    };
                    (severity.clone(), flattened)
                })
                .collect(),
        ),
        other => flatten_value(other),
    }
}

fn stringify_entry(entry: &Value) -> Value {
    match entry {
        Value::String(_) => entry.clone(),
        other => Value::String(other.to_string()),
    }
}

fn flatten_value(value: &Value) -> Value {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => value.clone(),
        compound => Value::String(compound.to_string()),
    }
}
