// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-process store backend.
//!
//! Implements the driver capability against process memory: capped
//! collections are byte-budgeted FIFO queues, and failures can be staged per
//! call so the retry paths are testable without a real deployment. Also
//! usable as an offline backend during local development.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::Config;
use crate::error::Error;
use crate::store::{Collection, Connector, Database, Document};

/// Kind of failure staged for upcoming inserts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InjectedFailure {
    Connection,
    Serialization,
    Other,
}

impl InjectedFailure {
    fn to_error(self) -> Error {
        match self {
            InjectedFailure::Connection => Error::Connection("injected".to_string()),
            InjectedFailure::Serialization => Error::Serialization("injected".to_string()),
            InjectedFailure::Other => Error::Store("injected".to_string()),
        }
    }
}

struct CappedData {
    size_bytes: u64,
    used_bytes: u64,
    documents: VecDeque<(u64, Document)>,
}

impl CappedData {
    fn new(size_bytes: u64) -> Self {
        CappedData {
            size_bytes,
            used_bytes: 0,
            documents: VecDeque::new(),
        }
    }

    fn push(&mut self, bytes: u64, document: Document) {
        self.documents.push_back((bytes, document));
        self.used_bytes += bytes;
        // FIFO eviction once over budget; the newest document always stays.
        while self.used_bytes > self.size_bytes && self.documents.len() > 1 {
            if let Some((evicted, _)) = self.documents.pop_front() {
                self.used_bytes -= evicted;
            }
        }
    }
}

/// Shared state behind every handle returned by a [`MemoryConnector`].
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, CappedData>>,
    credentials: Mutex<Option<(String, String)>>,
    staged_insert_failures: Mutex<Option<(InjectedFailure, u32)>>,
    reject_compound_values: AtomicBool,
    staged_connect_failures: AtomicU32,
    creates: AtomicU32,
    drops: AtomicU32,
    reconnects: AtomicU32,
}

impl MemoryStore {
    fn lock_collections(&self) -> MutexGuard<'_, HashMap<String, CappedData>> {
        #[allow(clippy::expect_used)]
        self.collections.lock().expect("lock poisoned")
    }

    /// Credentials the store will accept from `authenticate`.
    pub fn set_credentials(&self, username: &str, password: &str) {
        #[allow(clippy::expect_used)]
        let mut credentials = self.credentials.lock().expect("lock poisoned");
        *credentials = Some((username.to_string(), password.to_string()));
    }

    /// Fails the next `count` inserts with the given failure kind.
    pub fn fail_next_inserts(&self, failure: InjectedFailure, count: u32) {
        #[allow(clippy::expect_used)]
        let mut staged = self.staged_insert_failures.lock().expect("lock poisoned");
        *staged = Some((failure, count));
    }

    /// When set, inserts reject documents whose metadata values are arrays
    /// or maps, mimicking drivers that cannot represent compound values.
    pub fn reject_compound_values(&self, reject: bool) {
        self.reject_compound_values.store(reject, Ordering::SeqCst);
    }

    /// Fails the next `count` connection attempts.
    pub fn fail_next_connects(&self, count: u32) {
        self.staged_connect_failures.store(count, Ordering::SeqCst);
    }

    /// Committed documents of `name`, oldest first.
    #[must_use]
    pub fn documents(&self, name: &str) -> Vec<Document> {
        self.lock_collections()
            .get(name)
            .map(|data| data.documents.iter().map(|(_, d)| d.clone()).collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn collection_names(&self) -> Vec<String> {
        self.lock_collections().keys().cloned().collect()
    }

    /// Configured byte size of `name`, if the collection exists.
    #[must_use]
    pub fn capsize_of(&self, name: &str) -> Option<u64> {
        self.lock_collections().get(name).map(|data| data.size_bytes)
    }

    /// How many collections have been created so far.
    #[must_use]
    pub fn create_count(&self) -> u32 {
        self.creates.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn drop_count(&self) -> u32 {
        self.drops.load(Ordering::SeqCst)
    }

    /// How many replica reconnects the connector has served.
    #[must_use]
    pub fn reconnect_count(&self) -> u32 {
        self.reconnects.load(Ordering::SeqCst)
    }

    fn take_staged_insert_failure(&self) -> Option<InjectedFailure> {
        #[allow(clippy::expect_used)]
        let mut staged = self.staged_insert_failures.lock().expect("lock poisoned");
        match staged.take() {
            Some((failure, count)) if count > 1 => {
                *staged = Some((failure, count - 1));
                Some(failure)
            }
            Some((failure, 1)) => Some(failure),
            _ => None,
        }
    }
}

/// Connector handing out handles onto one shared [`MemoryStore`].
#[derive(Clone, Default)]
pub struct MemoryConnector {
    store: Arc<MemoryStore>,
}

impl MemoryConnector {
    #[must_use]
    pub fn new() -> Self {
        MemoryConnector::default()
    }

    /// The shared state, for staging failures and inspecting commits.
    #[must_use]
    pub fn store(&self) -> Arc<MemoryStore> {
        Arc::clone(&self.store)
    }
}

impl Connector for MemoryConnector {
    fn connect(&self, _config: &Config) -> Result<Arc<dyn Database>, Error> {
        let staged = self.store.staged_connect_failures.load(Ordering::SeqCst);
        if staged > 0 {
            self.store
                .staged_connect_failures
                .store(staged - 1, Ordering::SeqCst);
            return Err(Error::Connection("injected connect failure".to_string()));
        }
        Ok(Arc::new(MemoryDatabase {
            store: Arc::clone(&self.store),
        }))
    }

    fn reconnect(&self, config: &Config) -> Result<Arc<dyn Database>, Error> {
        self.store.reconnects.fetch_add(1, Ordering::SeqCst);
        self.connect(config)
    }
}

pub struct MemoryDatabase {
    store: Arc<MemoryStore>,
}

impl Database for MemoryDatabase {
    fn list_collection_names(&self) -> Result<Vec<String>, Error> {
        Ok(self.store.collection_names())
    }

    fn create_capped_collection(&self, name: &str, size_bytes: u64) -> Result<(), Error> {
        let mut collections = self.store.lock_collections();
        if collections.contains_key(name) {
            return Err(Error::Store(format!("collection '{name}' already exists")));
        }
        collections.insert(name.to_string(), CappedData::new(size_bytes));
        self.store.creates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn drop_collection(&self, name: &str) -> Result<(), Error> {
        self.store.lock_collections().remove(name);
        self.store.drops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn collection(&self, name: &str) -> Arc<dyn Collection> {
        Arc::new(MemoryCollection {
            name: name.to_string(),
            store: Arc::clone(&self.store),
        })
    }

    fn authenticate(&self, username: &str, password: &str) -> Result<bool, Error> {
        #[allow(clippy::expect_used)]
        let credentials = self.store.credentials.lock().expect("lock poisoned");
        Ok(credentials
            .as_ref()
            .is_some_and(|(u, p)| u == username && p == password))
    }
}

pub struct MemoryCollection {
    name: String,
    store: Arc<MemoryStore>,
}

impl Collection for MemoryCollection {
    fn insert(&self, document: &Document, _safe: bool) -> Result<(), Error> {
        if let Some(failure) = self.store.take_staged_insert_failure() {
            return Err(failure.to_error());
        }

        if self.store.reject_compound_values.load(Ordering::SeqCst) {
            for (key, value) in document {
                if key != "messages" && (value.is_array() || value.is_object()) {
                    return Err(Error::Serialization(format!(
                        "compound value under '{key}' cannot be represented"
                    )));
                }
            }
        }

        let bytes = serde_json::to_string(document)
            .map_err(|e| Error::Serialization(e.to_string()))?
            .len() as u64;

        let mut collections = self.store.lock_collections();
        let data = collections
            .get_mut(&self.name)
            .ok_or_else(|| Error::Store(format!("collection '{}' does not exist", self.name)))?;
        data.push(bytes, document.clone());
        Ok(())
    }
}
