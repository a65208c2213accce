// Copyright 2026 Oxide Computer Company

//! Filesystem helpers for mirrors and exports.

use crate::{AtomicWriteError, FsError};
use atomicwrites::{AtomicFile, OverwriteBehavior};
use camino::Utf8Path;
use fs_err as fs;
use std::io::{self, Write};
use tracing::debug;
use walkdir::WalkDir;

/// Renames `from` to `to`, falling back to copy and delete if the two paths
/// are on different filesystems.
///
/// Files are copied through an atomic write so `to` is never observed
/// half-written; directories are copied recursively with [`copy_dir`].
pub fn rename_with_fallback(from: &Utf8Path, to: &Utf8Path) -> Result<(), FsError> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
            debug!(%from, %to, "rename crosses devices, copying instead");
            move_by_copy(from, to)
        }
        Err(err) => Err(err.into()),
    }
}

fn move_by_copy(from: &Utf8Path, to: &Utf8Path) -> Result<(), FsError> {
    let meta = fs::symlink_metadata(from)?;
    if meta.is_dir() {
        copy_dir(from, to)?;
        fs::remove_dir_all(from)?;
    } else {
        let contents = fs::read(from)?;
        AtomicFile::new(to, OverwriteBehavior::AllowOverwrite)
            .write(|f| f.write_all(&contents))
            .map_err(|error| match error {
                atomicwrites::Error::Internal(e) => AtomicWriteError::Rename(e),
                atomicwrites::Error::User(e) => AtomicWriteError::Write(e),
            })?;
        fs::set_permissions(to, meta.permissions())?;
        fs::remove_file(from)?;
    }
    Ok(())
}

/// Recursively copies the contents of `from` into `to`.
///
/// `to` is created if it does not exist. Existing files are overwritten.
/// Symbolic links are recreated as links on Unix and copied as files
/// elsewhere. Nothing is excluded: VCS metadata directories are copied too.
pub fn copy_dir(from: &Utf8Path, to: &Utf8Path) -> Result<(), FsError> {
    fs::create_dir_all(to)?;
    for entry in WalkDir::new(from).min_depth(1) {
        let entry = entry?;
        let Ok(rel) = entry.path().strip_prefix(from) else {
            continue;
        };
        let rel = Utf8Path::from_path(rel)
            .ok_or_else(|| FsError::NonUtf8Path(entry.path().to_owned()))?;
        let target = to.join(rel);

        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), target.as_std_path())?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(from: &std::path::Path, to: &std::path::Path) -> io::Result<()> {
    let link = fs::read_link(from)?;
    fs::os::unix::fs::symlink(link, to)
}

#[cfg(not(unix))]
fn copy_symlink(from: &std::path::Path, to: &std::path::Path) -> io::Result<()> {
    fs::copy(from, to).map(|_| ())
}

/// Removes every directory named `vendor` below `root`.
///
/// `root` itself is never removed, and symbolic links named `vendor` are
/// left alone. Export does not call this; it is for callers that want a
/// tree without nested dependency directories.
pub fn strip_vendor(root: &Utf8Path) -> Result<(), FsError> {
    let mut vendor_dirs = Vec::new();
    let mut walker = WalkDir::new(root).min_depth(1).into_iter();
    while let Some(entry) = walker.next() {
        let entry = entry?;
        if entry.file_type().is_dir() && entry.file_name() == "vendor" {
            vendor_dirs.push(entry.into_path());
            walker.skip_current_dir();
        }
    }

    for dir in vendor_dirs {
        debug!(dir = %dir.display(), "removing vendor directory");
        fs::remove_dir_all(dir)?;
    }
    Ok(())
}
