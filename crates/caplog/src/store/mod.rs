// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Document-store driver capability consumed by the sink.
//!
//! The sink never talks to a database directly; it goes through these traits
//! so the network driver, its connection handshake, and authentication stay
//! external collaborators. An in-process implementation lives in
//! [`memory`] and backs the test suites.
//!
//! Handles are constructed once at sink creation and shared read-mostly
//! across threads; [`Collection::insert`] may block on network I/O.

pub mod memory;

use std::sync::Arc;

use crate::config::Config;
use crate::error::Error;

/// A stored document: arbitrary top-level key/value pairs.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// One collection handle. Inserts into a capped collection FIFO-evict the
/// oldest documents once the collection is full; that behavior belongs to
/// the store and is not reimplemented here.
pub trait Collection: Send + Sync {
    /// Inserts one document. `safe` requests the store's acknowledged write
    /// concern.
    ///
    /// # Errors
    ///
    /// [`Error::Connection`] for transport failures, [`Error::Serialization`]
    /// when the document cannot be represented, [`Error::Store`] otherwise.
    fn insert(&self, document: &Document, safe: bool) -> Result<(), Error>;
}

/// One database handle.
pub trait Database: Send + Sync {
    fn list_collection_names(&self) -> Result<Vec<String>, Error>;

    /// Creates a capped collection with a fixed maximum byte size.
    fn create_capped_collection(&self, name: &str, size_bytes: u64) -> Result<(), Error>;

    fn drop_collection(&self, name: &str) -> Result<(), Error>;

    /// Returns a handle for `name`. Cheap; does not touch the network.
    fn collection(&self, name: &str) -> Arc<dyn Collection>;

    /// Runs credential authentication. Returns whether the store accepted
    /// the credentials.
    fn authenticate(&self, username: &str, password: &str) -> Result<bool, Error>;
}

/// Connection factory with replica awareness.
pub trait Connector: Send + Sync {
    /// Connects to the hosts named by `config` and returns a database
    /// handle for `config.database`.
    fn connect(&self, config: &Config) -> Result<Arc<dyn Database>, Error>;

    /// Re-resolves replica topology after a connection failure and returns a
    /// fresh handle. Drivers without replica support can keep the default,
    /// which simply connects again.
    fn reconnect(&self, config: &Config) -> Result<Arc<dyn Database>, Error> {
        self.connect(config)
    }
}
