// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Plain buffered file logger.
//!
//! Serves two roles: the pass-through target for `add` when store mode is
//! active, and the whole sink when construction fell back after a connect
//! failure. Lines use the `LEVEL | message` shape. Write errors are traced
//! and swallowed; a broken log file must never take the host down.
//!
//! The mutex here is the only internal lock in the crate; the store-write
//! path never takes it.

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use tracing::warn;

use crate::error::Error;
use crate::severity::Severity;

pub struct FileLogger {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
}

impl FileLogger {
    /// Opens (or creates) `path` for appending.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when the file cannot be opened.
    pub fn open(path: &Path) -> Result<Self, Error> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(FileLogger {
            writer: Mutex::new(BufWriter::new(Box::new(file))),
        })
    }

    /// Logger writing to stderr; used when no log file is configured.
    #[must_use]
    pub fn stderr() -> Self {
        FileLogger {
            writer: Mutex::new(BufWriter::new(Box::new(std::io::stderr()))),
        }
    }

    pub fn write(&self, severity: Severity, message: &str) {
        #[allow(clippy::expect_used)]
        let mut writer = self.writer.lock().expect("lock poisoned");
        if let Err(e) = writeln!(writer, "{} | {message}", severity.label()) {
            warn!("File pass-through write failed: {e}");
        }
    }

    pub fn flush(&self) {
        #[allow(clippy::expect_used)]
        let mut writer = self.writer.lock().expect("lock poisoned");
        if let Err(e) = writer.flush() {
            warn!("File pass-through flush failed: {e}");
        }
    }
}
