// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The sink facade.
//!
//! # Modes
//!
//! Construction picks one of two modes:
//!
//! - **Store mode**: connect, optionally authenticate, provision the capped
//!   collection; records commit to the document store.
//! - **Fallback mode**: construction failed in a non-production-like
//!   environment; a warning is issued and messages go to a plain buffered
//!   file logger instead. Production-like environments treat the failure as
//!   fatal and propagate it.
//!
//! # Record lifecycle
//!
//! One record exists per scoped unit of work and per thread. The record is
//! created by [`LogSink::begin_scope`], mutated through [`LogSink::add`] and
//! [`LogSink::add_metadata`], and finalized+committed when the returned
//! [`RecordScope`] drops. `Drop` runs on every exit path, so early returns,
//! `?` propagation, and panics all still commit the record.
//!
//! ```no_run
//! use caplog::store::memory::MemoryConnector;
//! use caplog::{Config, LogSink, Severity};
//! use std::sync::Arc;
//!
//! # fn run() -> Result<(), caplog::Error> {
//! let sink = LogSink::connect(Config::default(), Arc::new(MemoryConnector::new()))?;
//! let result: Result<(), caplog::Error> = sink.scoped(|| {
//!     sink.add_metadata([("request_id".to_string(), "abc".into())].into_iter().collect())?;
//!     sink.add(Severity::Info, "handling request");
//!     Ok(())
//! });
//! # let _ = result;
//! # Ok(())
//! # }
//! ```

use std::cell::RefCell;
use std::sync::Arc;
use std::time::Instant;

use tracing::{error, warn};

use crate::collection::CappedCollectionManager;
use crate::config::Config;
use crate::error::{source_chain, Error};
use crate::fallback::FileLogger;
use crate::record::{LogRecord, RecordBuilder};
use crate::severity::Severity;
use crate::store::{Connector, Document};
use crate::writer::RetryingWriter;

thread_local! {
    /// The current record of this thread's scoped unit of work. Threads
    /// never share a record.
    static CURRENT: RefCell<Option<LogRecord>> = const { RefCell::new(None) };
}

enum Mode {
    Store {
        writer: RetryingWriter,
        manager: CappedCollectionManager,
        authenticated: bool,
    },
    Fallback,
}

/// Leveled-logging facade over the record, writer, and collection
/// collaborators.
pub struct LogSink {
    config: Config,
    builder: RecordBuilder,
    mode: Mode,
    file: Option<FileLogger>,
}

impl std::fmt::Debug for LogSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSink")
            .field("config", &self.config)
            .field("builder", &self.builder)
            .field(
                "mode",
                match &self.mode {
                    Mode::Store { .. } => &"Store",
                    Mode::Fallback => &"Fallback",
                },
            )
            .field("file", &self.file.is_some())
            .finish()
    }
}

impl LogSink {
    /// Connects to the store and provisions the capped collection.
    ///
    /// # Errors
    ///
    /// In production-like environments any construction failure propagates.
    /// Elsewhere the failure downgrades to fallback mode with a warning and
    /// this still returns `Ok`.
    pub fn connect(config: Config, connector: Arc<dyn Connector>) -> Result<Self, Error> {
        let builder = RecordBuilder::new(&config);
        match Self::store_mode(&config, connector) {
            Ok(mode) => {
                let file = if config.disable_file_logging {
                    None
                } else {
                    Some(Self::open_file(&config))
                };
                Ok(LogSink {
                    config,
                    builder,
                    mode,
                    file,
                })
            }
            Err(err) if config.production_like() => Err(err),
            Err(err) => {
                warn!("Store connection failed, falling back to file logging: {err}");
                // The fallback logger is the only output left, so the
                // disable flag does not apply to it.
                let file = Some(Self::open_file(&config));
                Ok(LogSink {
                    config,
                    builder,
                    mode: Mode::Fallback,
                    file,
                })
            }
        }
    }

    fn store_mode(config: &Config, connector: Arc<dyn Connector>) -> Result<Mode, Error> {
        let database = connector.connect(config)?;

        let authenticated = match (&config.username, &config.password) {
            (Some(username), Some(password)) => database.authenticate(username, password)?,
            _ => false,
        };

        let name = config.capped_collection_name();
        let manager = CappedCollectionManager::new(Arc::clone(&database));
        manager.check_or_create(&name, config.capsize())?;

        let collection = database.collection(&name);
        let writer = RetryingWriter::new(collection, connector, config.clone());
        Ok(Mode::Store {
            writer,
            manager,
            authenticated,
        })
    }

    fn open_file(config: &Config) -> FileLogger {
        match &config.log_file_path {
            Some(path) => FileLogger::open(path).unwrap_or_else(|e| {
                warn!("Cannot open log file {}: {e}; using stderr", path.display());
                FileLogger::stderr()
            }),
            None => FileLogger::stderr(),
        }
    }

    /// Augments the current record with caller metadata.
    ///
    /// # Errors
    ///
    /// [`Error::ReservedKey`] on collision with a reserved record field (the
    /// record is left unchanged), or [`Error::Store`] when no scoped unit of
    /// work is active on this thread.
    pub fn add_metadata(&self, metadata: Document) -> Result<(), Error> {
        CURRENT.with(|cell| {
            let mut current = cell.borrow_mut();
            match current.as_mut() {
                Some(record) => record.merge_metadata(metadata),
                None => Err(Error::Store(
                    "no active log record; add_metadata requires a scoped unit of work".to_string(),
                )),
            }
        })
    }

    /// Appends a message to the current record (threshold permitting) and
    /// forwards it to the file pass-through. Always returns the original
    /// message unaltered.
    ///
    /// Outside a scoped unit of work only the pass-through runs, so the sink
    /// keeps working as a plain logger.
    pub fn add<'a>(&self, severity: Severity, message: &'a str) -> &'a str {
        CURRENT.with(|cell| {
            if let Some(record) = cell.borrow_mut().as_mut() {
                self.builder.record(record, severity, message);
            }
        });
        if self.builder.threshold().allows(severity) {
            if let Some(file) = &self.file {
                file.write(severity, message);
            }
        }
        message
    }

    pub fn debug<'a>(&self, message: &'a str) -> &'a str {
        self.add(Severity::Debug, message)
    }

    pub fn info<'a>(&self, message: &'a str) -> &'a str {
        self.add(Severity::Info, message)
    }

    pub fn warn<'a>(&self, message: &'a str) -> &'a str {
        self.add(Severity::Warn, message)
    }

    pub fn error<'a>(&self, message: &'a str) -> &'a str {
        self.add(Severity::Error, message)
    }

    pub fn fatal<'a>(&self, message: &'a str) -> &'a str {
        self.add(Severity::Fatal, message)
    }

    /// Begins a scoped unit of work: creates this thread's record and
    /// returns a guard that finalizes and commits it on drop.
    ///
    /// Scopes do not nest; beginning a new scope while one is active
    /// replaces the current record with a warning.
    ///
    /// # Errors
    ///
    /// [`Error::ReservedKey`] if `metadata` collides with a reserved record
    /// field; no record is created in that case.
    pub fn begin_scope(&self, metadata: Document) -> Result<RecordScope<'_>, Error> {
        let record = self.builder.begin(metadata)?;
        CURRENT.with(|cell| {
            let mut current = cell.borrow_mut();
            if current.is_some() {
                warn!("Beginning a log scope while one is active; replacing the current record");
            }
            *current = Some(record);
        });
        Ok(RecordScope {
            sink: self,
            started: Instant::now(),
        })
    }

    /// Runs `work` inside a scoped unit of work.
    ///
    /// The record is finalized and committed on every exit path. A failing
    /// `work` is logged at error severity (message plus source chain) before
    /// its error is handed back to the caller; logging never swallows the
    /// caller's error.
    pub fn scoped<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: std::error::Error,
    {
        let scope = match self.begin_scope(Document::new()) {
            Ok(scope) => scope,
            // Unreachable with empty metadata, but the work must still run.
            Err(err) => {
                error!("Could not begin log scope: {err}");
                return work();
            }
        };
        let result = work();
        if let Err(err) = &result {
            self.add(Severity::Error, &source_chain(err));
        }
        drop(scope);
        result
    }

    /// Whether the store connection completed credential authentication.
    #[must_use]
    pub fn authenticated(&self) -> bool {
        matches!(
            self.mode,
            Mode::Store {
                authenticated: true,
                ..
            }
        )
    }

    /// Whether construction fell back to plain file logging.
    #[must_use]
    pub fn in_fallback_mode(&self) -> bool {
        matches!(self.mode, Mode::Fallback)
    }

    /// Drops and recreates the capped collection with the sink's own name
    /// and size.
    ///
    /// # Errors
    ///
    /// [`Error::Connection`] in fallback mode; store failures otherwise.
    pub fn reset_collection(&self) -> Result<(), Error> {
        match &self.mode {
            Mode::Store { manager, .. } => manager.reset(
                &self.config.capped_collection_name(),
                self.config.capsize(),
            ),
            Mode::Fallback => Err(Error::Connection(
                "store unavailable in fallback mode".to_string(),
            )),
        }
    }

    /// Flushes the buffered file pass-through.
    pub fn flush(&self) {
        if let Some(file) = &self.file {
            file.flush();
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn commit(&self, record: &LogRecord) {
        if let Mode::Store { writer, .. } = &self.mode {
            writer.commit(record);
        }
        // Fallback mode: messages already reached the file line by line;
        // the structured record has no store to go to.
    }
}

impl log::Log for LogSink {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.builder.threshold().allows(Severity::from(metadata.level()))
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            self.add(Severity::from(record.level()), &record.args().to_string());
        }
    }

    fn flush(&self) {
        LogSink::flush(self);
    }
}

/// Guard for one scoped unit of work. Dropping it finalizes the thread's
/// record with the elapsed runtime and commits it.
pub struct RecordScope<'a> {
    sink: &'a LogSink,
    started: Instant,
}

impl Drop for RecordScope<'_> {
    fn drop(&mut self) {
        let record = CURRENT.with(|cell| cell.borrow_mut().take());
        if let Some(mut record) = record {
            self.sink
                .builder
                .finalize(&mut record, self.started.elapsed());
            self.sink.commit(&record);
        }
    }
}
