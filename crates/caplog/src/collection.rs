// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Provisioning of the capped log collection.
//!
//! The size of a capped collection is fixed at creation; changing the
//! configured capsize requires an explicit [`CappedCollectionManager::reset`].
//! Normal rotation happens through the store's own FIFO eviction and needs
//! no involvement from this module.

use std::sync::Arc;

use tracing::debug;

use crate::error::Error;
use crate::store::Database;

pub struct CappedCollectionManager {
    database: Arc<dyn Database>,
}

impl CappedCollectionManager {
    #[must_use]
    pub fn new(database: Arc<dyn Database>) -> Self {
        CappedCollectionManager { database }
    }

    /// Idempotent provisioning: creates the capped collection only if it
    /// does not exist yet.
    ///
    /// # Errors
    ///
    /// Propagates store failures from listing or creation.
    pub fn check_or_create(&self, name: &str, size_bytes: u64) -> Result<(), Error> {
        let names = self.database.list_collection_names()?;
        if names.iter().any(|n| n == name) {
            return Ok(());
        }
        debug!("Creating capped collection '{name}' ({size_bytes} bytes)");
        self.database.create_capped_collection(name, size_bytes)
    }

    /// Drops and recreates the collection with the given size. Used for
    /// manual rotation outside normal FIFO eviction, and for applying a
    /// changed capsize.
    ///
    /// # Errors
    ///
    /// Propagates store failures; a failed drop leaves the old collection in
    /// place.
    pub fn reset(&self, name: &str, size_bytes: u64) -> Result<(), Error> {
        debug!("Resetting capped collection '{name}' ({size_bytes} bytes)");
        self.database.drop_collection(name)?;
        self.database.create_capped_collection(name, size_bytes)
    }
}
