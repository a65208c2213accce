// Copyright 2026 Oxide Computer Company

//! Exporting a version's tree out of a mirror.

use crate::{SourceError, copy_dir, rename_with_fallback, source::SourceCore};
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use std::io;
use tracing::{debug, info, warn};

/// Exports by switching the mirror's working copy to `checkout_ref` and
/// copying the whole working copy into `to`.
///
/// Used by backends that cannot populate a separate directory directly. The
/// copy includes the VCS metadata directory. `sync` runs first if the mirror
/// has not been synced; both closures run under the mirror write lock and
/// must not take it again.
pub(crate) fn export_by_copy(
    core: &SourceCore,
    checkout_ref: &str,
    to: &Utf8Path,
    sync: impl FnOnce() -> Result<(), SourceError>,
    switch: impl FnOnce(&str) -> Result<(), SourceError>,
) -> Result<(), SourceError> {
    let _guard = core.mirror.write();
    if !core.mirror.is_synced() {
        sync()?;
        core.mirror.mark_synced();
    }

    switch(checkout_ref)?;
    info!(
        version = checkout_ref,
        from = %core.mirror.path(),
        %to,
        "exporting working copy"
    );
    copy_dir(core.mirror.path(), to).map_err(|error| SourceError::CopyDir {
        from: core.mirror.path().to_owned(),
        to: to.to_owned(),
        error,
    })
}

/// Moves a git index aside for the duration of an export.
///
/// `git read-tree` overwrites the index of the repository it runs in, so
/// export stashes the real index first. The original is put back by
/// [`restore`](Self::restore), or on drop if the export bails out early. If
/// the repository had no index, the temporary one is removed instead.
#[derive(Debug)]
pub(crate) struct IndexBackup {
    index: Utf8PathBuf,
    backup: Utf8PathBuf,
    had_index: bool,
    restored: bool,
}

impl IndexBackup {
    /// Name of the stashed index inside the git directory.
    pub(crate) const BACKUP_NAME: &'static str = "origindex";

    /// Moves `<git_dir>/index` aside.
    pub(crate) fn take(git_dir: &Utf8Path) -> Result<Self, SourceError> {
        let index = git_dir.join("index");
        let backup = git_dir.join(Self::BACKUP_NAME);

        // An interrupted export can leave the real index stashed; put it
        // back before stashing again.
        if !index.exists() && backup.exists() {
            warn!(%backup, "restoring index left behind by an interrupted export");
            rename(&backup, &index)?;
        }

        let had_index = index.exists();
        if had_index {
            debug!(%index, %backup, "stashing git index");
            rename(&index, &backup)?;
        }
        Ok(IndexBackup { index, backup, had_index, restored: false })
    }

    /// Puts the original index back.
    pub(crate) fn restore(mut self) -> Result<(), SourceError> {
        self.restore_inner()
    }

    fn restore_inner(&mut self) -> Result<(), SourceError> {
        self.restored = true;
        if self.had_index {
            debug!(index = %self.index, "restoring git index");
            rename(&self.backup, &self.index)
        } else {
            match fs::remove_file(&self.index) {
                Ok(()) => Ok(()),
                Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(error) => {
                    Err(SourceError::Io { path: self.index.clone(), error })
                }
            }
        }
    }
}

impl Drop for IndexBackup {
    fn drop(&mut self) {
        if !self.restored {
            if let Err(error) = self.restore_inner() {
                warn!(%error, index = %self.index, "failed to restore git index");
            }
        }
    }
}

fn rename(from: &Utf8Path, to: &Utf8Path) -> Result<(), SourceError> {
    rename_with_fallback(from, to).map_err(|error| SourceError::Rename {
        from: from.to_owned(),
        to: to.to_owned(),
        error,
    })
}
