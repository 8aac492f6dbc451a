// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Centralized logging sink backed by a capped document-store collection.
//!
//! `caplog` replaces a per-instance text-file logger with a fixed-size
//! rotating store inside a document database, so logs from many application
//! instances land in one queryable place. Each scoped unit of work (usually
//! one request) produces one structured record: severity-tagged message
//! sequences, the measured runtime, and arbitrary caller metadata.
//!
//! # Architecture
//!
//! ```text
//!   ConfigSource ──> Config
//!                      │
//!                      v
//!   Connector ──> LogSink ──> RecordBuilder (build/accumulate/finalize)
//!                      │
//!                      ├──> RetryingWriter ──> Collection (capped, FIFO)
//!                      │        (flatten retry, replica reconnect)
//!                      └──> FileLogger (pass-through / fallback)
//! ```
//!
//! The document-store driver, configuration-file discovery, and terminal
//! color detection are consumed capabilities: they enter through the
//! [`store::Connector`] / [`config::ConfigSource`] traits and plain
//! [`Config`] fields. An in-process backend ([`store::memory`]) ships for
//! tests and offline use.
//!
//! Inserts block on network I/O; there is no asynchronous or cancellable
//! path. Callers accept blocking writes as the cost of durability.

pub mod collection;
pub mod config;
pub mod error;
pub mod fallback;
pub mod record;
pub mod severity;
pub mod sink;
pub mod store;
pub mod writer;

pub use config::{Config, ConfigSource};
pub use error::Error;
pub use severity::Severity;
pub use sink::{LogSink, RecordScope};
