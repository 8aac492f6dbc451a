// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy for the sink.
//!
//! Commit-path failures fall into three classes with distinct handling:
//!
//! - [`Error::Connection`]: retried under the replica reconnect policy
//! - [`Error::Serialization`]: triggers exactly one flatten-and-retry
//! - everything else: swallowed after the flatten retry (logging must never
//!   crash the host application)
//!
//! [`Error::ReservedKey`] is the only synchronous user-input error; it is
//! always returned to the caller and never swallowed.

use std::fmt::Write;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum Error {
    /// Caller tried to set one of the reserved record fields through the
    /// metadata API.
    #[error("'{0}' is a reserved record field and cannot be set as metadata")]
    ReservedKey(String),

    /// The store connection dropped or could not be established.
    #[error("store connection failure: {0}")]
    Connection(String),

    /// The record could not be serialized into a storable document.
    #[error("record serialization failure: {0}")]
    Serialization(String),

    /// Any other store-side failure.
    #[error("store operation failed: {0}")]
    Store(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(self, Error::Connection(_))
    }

    #[must_use]
    pub fn is_serialization(&self) -> bool {
        matches!(self, Error::Serialization(_))
    }
}

/// Renders an error followed by its source chain, one cause per line.
///
/// Used to build the trace text stored alongside a failed scoped unit of
/// work, so the committed record shows the full cause chain and not just the
/// outermost message.
pub fn source_chain<E: std::error::Error>(err: &E) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        // Failing to write to a String is not possible, but the trait
        // signature forces handling it.
        let _ = write!(out, "\ncaused by: {cause}");
        source = cause.source();
    }
    out
}
