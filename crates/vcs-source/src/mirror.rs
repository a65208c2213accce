// Copyright 2026 Oxide Computer Company

//! The long-lived local clone backing a source.

use crate::{CommandOutput, ProcessError, Runner, Vcs, VcsCommand};
use camino::{Utf8Path, Utf8PathBuf};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::atomic::{AtomicBool, Ordering};

/// A local clone of a source's upstream repository.
///
/// Every direct interaction with the working copy or its metadata goes
/// through the mirror's read/write lock: the write lock for anything that
/// changes on-disk state (clone, sync, export, update) and the read lock for
/// inspection. The lock guards no data of its own; it serializes access to
/// the directory at [`path`](Self::path).
#[derive(Debug)]
pub struct LocalMirror {
    path: Utf8PathBuf,
    remote: String,
    vcs: Vcs,
    lock: RwLock<()>,
    synced: AtomicBool,
}

impl LocalMirror {
    /// Creates a handle for a mirror of `remote` at `path`.
    ///
    /// Nothing is created on disk until a backend needs the mirror.
    pub fn new(vcs: Vcs, remote: impl Into<String>, path: impl Into<Utf8PathBuf>) -> Self {
        LocalMirror {
            path: path.into(),
            remote: remote.into(),
            vcs,
            lock: RwLock::new(()),
            synced: AtomicBool::new(false),
        }
    }

    /// Returns the root of the working copy.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Returns the upstream location.
    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// Returns the VCS driving this mirror.
    pub fn vcs(&self) -> &Vcs {
        &self.vcs
    }

    /// Returns the VCS metadata directory inside the working copy.
    pub fn metadata_dir(&self) -> Utf8PathBuf {
        self.path.join(self.vcs.name().metadata_dir())
    }

    /// Returns true if the working copy has been created.
    pub fn exists(&self) -> bool {
        self.metadata_dir().is_dir()
    }

    /// Returns true once the mirror's refs are known to be current with
    /// upstream.
    pub fn is_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }

    /// Records that a full sync with upstream has completed.
    ///
    /// There is no way to clear the flag: staleness is decided by whoever
    /// owns the mirror, typically by creating a new handle.
    pub fn mark_synced(&self) {
        self.synced.store(true, Ordering::Release);
    }

    /// Takes the lock for inspecting the working copy.
    pub fn read(&self) -> RwLockReadGuard<'_, ()> {
        self.lock.read()
    }

    /// Takes the lock for changing the working copy.
    pub fn write(&self) -> RwLockWriteGuard<'_, ()> {
        self.lock.write()
    }

    /// Builds a command for this mirror's VCS, run from the working copy.
    pub fn command<I, S>(&self, args: I) -> VcsCommand
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        VcsCommand::new(self.vcs.binary())
            .args(args)
            .current_dir(self.path.clone())
    }

    /// Runs this mirror's VCS with `args` from the working copy.
    ///
    /// The caller is responsible for holding the appropriate lock.
    pub fn run<I, S>(
        &self,
        runner: &dyn Runner,
        args: I,
    ) -> Result<CommandOutput, ProcessError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        runner.run(&self.command(args))
    }
}
