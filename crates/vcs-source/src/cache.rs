// Copyright 2026 Oxide Computer Company

//! In-memory cache of a source's version list.

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, info};
use vcs_version::PairedVersion;

/// The last known version list of a source.
///
/// Population is serialized by a dedicated lock, separate from the mirror
/// lock: concurrent callers that find the cache cold wait for the first one
/// to finish instead of each listing the upstream. Once the cache is in
/// sync, readers only take a brief read lock to clone the snapshot handle.
#[derive(Debug, Default)]
pub struct VersionCache {
    populate: Mutex<()>,
    entry: RwLock<CacheEntry>,
}

#[derive(Debug, Default)]
struct CacheEntry {
    versions: Arc<[PairedVersion]>,
    in_sync: bool,
}

impl VersionCache {
    /// Creates an empty, out-of-sync cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached list if a full listing has completed.
    pub fn get(&self) -> Option<Arc<[PairedVersion]>> {
        let entry = self.entry.read();
        entry.in_sync.then(|| Arc::clone(&entry.versions))
    }

    /// Returns true if a full listing has completed.
    pub fn is_in_sync(&self) -> bool {
        self.entry.read().in_sync
    }

    /// Returns the cached list, populating it with `list` first if needed.
    ///
    /// `list` runs at most once per call, and only while the population lock
    /// is held, so concurrent callers on a cold cache run it once between
    /// them. If `list` fails nothing is stored and the cache stays out of
    /// sync.
    pub fn get_or_populate<E>(
        &self,
        list: impl FnOnce() -> Result<Vec<PairedVersion>, E>,
    ) -> Result<Arc<[PairedVersion]>, E> {
        if let Some(versions) = self.get() {
            debug!(count = versions.len(), "version cache hit");
            return Ok(versions);
        }

        let _populating = self.populate.lock();
        // Another caller may have populated the cache while we waited.
        if let Some(versions) = self.get() {
            debug!(count = versions.len(), "version cache populated concurrently");
            return Ok(versions);
        }

        let versions = list()?;
        Ok(self.store(versions, true))
    }

    /// Replaces the cached list.
    ///
    /// `in_sync` should only be true if `versions` is the result of a full,
    /// successful listing.
    pub fn store(
        &self,
        versions: Vec<PairedVersion>,
        in_sync: bool,
    ) -> Arc<[PairedVersion]> {
        let versions: Arc<[PairedVersion]> = versions.into();
        info!(count = versions.len(), in_sync, "storing version list");
        let mut entry = self.entry.write();
        entry.versions = Arc::clone(&versions);
        entry.in_sync = in_sync;
        versions
    }

    /// Marks the cache out of sync so the next listing goes upstream again.
    ///
    /// The previous list is kept but no longer returned by [`get`](Self::get).
    pub fn invalidate(&self) {
        let _populating = self.populate.lock();
        self.entry.write().in_sync = false;
    }
}
