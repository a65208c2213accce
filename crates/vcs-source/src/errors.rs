// Copyright 2026 Oxide Computer Company

//! Error types for VCS sources.

use crate::VcsName;
use camino::Utf8PathBuf;
use std::{ffi::OsString, io};
use thiserror::Error;

// ---- Configuration errors ----

/// An error from reading a VCS binary path from the environment.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VcsEnvError {
    /// The environment variable is set but is not valid UTF-8.
    #[error(
        "${var} environment variable is not valid \
         UTF-8: {value:?}"
    )]
    NonUtf8 {
        /// The environment variable name.
        var: &'static str,
        /// The non-UTF-8 value.
        value: OsString,
    },
}

/// An error that occurs while detecting the VCS of an existing mirror.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VcsDetectError {
    /// The provided mirror path does not exist.
    #[error(
        "{path} does not exist \
         (expected a working copy with .git, .bzr or .hg)"
    )]
    PathNotFound {
        /// The path that was provided.
        path: Utf8PathBuf,
    },

    /// The provided mirror path is not a directory.
    #[error(
        "{path} is not a directory \
         (expected a working copy with .git, .bzr or .hg)"
    )]
    NotADirectory {
        /// The path that was provided.
        path: Utf8PathBuf,
    },

    /// An I/O error occurred while probing the mirror path.
    #[error("I/O error while checking for VCS at {path}")]
    Io {
        /// The path being checked when the error occurred.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// No VCS metadata directory was found.
    #[error("no VCS found at {path} (expected .git, .bzr or .hg)")]
    NotFound {
        /// The path that was searched.
        path: Utf8PathBuf,
    },

    /// A VCS environment variable is not valid UTF-8.
    #[error(transparent)]
    Env(#[from] VcsEnvError),
}

/// An error that occurs while parsing a gopkg.in import path.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum GopkgInPathError {
    /// The path is not under `gopkg.in/`.
    #[error("{0:?} is not a gopkg.in import path")]
    NotGopkgIn(String),

    /// The package element does not end in `.v<major>`.
    #[error("gopkg.in path {0:?} has no .v<major> suffix")]
    MissingMajor(String),

    /// The path has the wrong number of elements.
    #[error(
        "gopkg.in path {0:?} must be gopkg.in/pkg.vN or gopkg.in/user/pkg.vN"
    )]
    InvalidShape(String),
}

// ---- Process errors ----

/// An error from running an external VCS command.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProcessError {
    /// Failed to spawn the process.
    #[error("failed to run `{command}`{}", display_dir(.dir))]
    SpawnFailed {
        /// The command line that was attempted.
        command: String,
        /// The working directory, if one was set.
        dir: Option<Utf8PathBuf>,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The process ran and exited unsuccessfully.
    #[error("`{command}` failed ({exit_status}): {output}")]
    Failed {
        /// The command line that was run.
        command: String,
        /// A human-readable description of the exit status (e.g.,
        /// "exit status: 128" or "signal: 9").
        exit_status: String,
        /// The combined stdout and stderr output, trimmed.
        output: String,
    },
}

fn display_dir(dir: &Option<Utf8PathBuf>) -> String {
    match dir {
        Some(dir) => format!(" in {dir}"),
        None => String::new(),
    }
}

// ---- Source errors ----

/// Errors returned by [`Source`](crate::Source) operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SourceError {
    /// A VCS command failed.
    #[error("VCS command failed")]
    Process(#[from] ProcessError),

    /// Communicating with the upstream repository failed.
    #[error("{message} ({remote})")]
    Remote {
        /// The upstream that could not be reached.
        remote: String,
        /// What was being attempted.
        message: &'static str,
        /// The failed command.
        #[source]
        error: ProcessError,
    },

    /// Manipulating the local mirror failed.
    #[error("{message} ({path})")]
    Local {
        /// The mirror path.
        path: Utf8PathBuf,
        /// What was being attempted.
        message: &'static str,
        /// The failed command.
        #[source]
        error: ProcessError,
    },

    /// A VCS command produced output that could not be parsed.
    #[error("unexpected output from `{command}`: {reason}: {line:?}")]
    MalformedOutput {
        /// The command whose output was being parsed.
        command: &'static str,
        /// Why the line was rejected.
        reason: &'static str,
        /// The offending line.
        line: String,
    },

    /// The upstream exposes no versions at all.
    #[error("no versions available for {remote}")]
    NoVersions {
        /// The upstream that was listed.
        remote: String,
    },

    /// Failed to create a directory.
    #[error("failed to create directory {path}")]
    CreateDir {
        /// The directory path.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        error: io::Error,
    },

    /// Failed to move a file or directory.
    #[error("failed to rename {from} to {to}")]
    Rename {
        /// The source path.
        from: Utf8PathBuf,
        /// The destination path.
        to: Utf8PathBuf,
        /// The underlying error.
        #[source]
        error: FsError,
    },

    /// Failed to copy a directory tree.
    #[error("failed to copy {from} to {to}")]
    CopyDir {
        /// The source directory.
        from: Utf8PathBuf,
        /// The destination directory.
        to: Utf8PathBuf,
        /// The underlying error.
        #[source]
        error: FsError,
    },

    /// Some other filesystem operation failed.
    #[error("I/O error at {path}")]
    Io {
        /// The path involved.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        error: io::Error,
    },

    /// The mirror path holds a working copy of a different VCS.
    #[error("{path} is a {found} working copy, expected {expected}")]
    MirrorVcsMismatch {
        /// The mirror path.
        path: Utf8PathBuf,
        /// The VCS the source is configured for.
        expected: VcsName,
        /// The VCS found at the mirror path.
        found: VcsName,
    },

    /// The mirror path could not be inspected.
    #[error("failed to inspect mirror path")]
    Detect(#[from] VcsDetectError),

    /// A VCS environment variable is not valid UTF-8.
    #[error(transparent)]
    Env(#[from] VcsEnvError),
}

/// A low-level filesystem error from the copy and rename helpers.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FsError {
    /// An I/O operation failed.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// Walking a directory tree failed.
    #[error(transparent)]
    Walk(#[from] walkdir::Error),

    /// A path in the tree is not valid UTF-8.
    #[error("path is not valid UTF-8: {0:?}")]
    NonUtf8Path(std::path::PathBuf),

    /// Writing a file atomically failed.
    #[error("atomic write failed")]
    AtomicWrite(#[from] AtomicWriteError),
}

/// An error that occurred during an atomic file write.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AtomicWriteError {
    /// Writing contents to the temporary file failed.
    #[error("writing file contents failed")]
    Write(#[source] io::Error),

    /// The atomic write infrastructure failed (e.g., creating the
    /// temporary file, or renaming it into place).
    #[error("atomic create or rename failed")]
    Rename(#[source] io::Error),
}

impl SourceError {
    /// Returns the underlying process error, if the failure came from
    /// running a command.
    pub fn process_error(&self) -> Option<&ProcessError> {
        match self {
            SourceError::Process(error)
            | SourceError::Remote { error, .. }
            | SourceError::Local { error, .. } => Some(error),
            SourceError::MalformedOutput { .. }
            | SourceError::NoVersions { .. }
            | SourceError::CreateDir { .. }
            | SourceError::Rename { .. }
            | SourceError::CopyDir { .. }
            | SourceError::Io { .. }
            | SourceError::MirrorVcsMismatch { .. }
            | SourceError::Detect(_)
            | SourceError::Env(_) => None,
        }
    }
}

/// Shorthand used by backends when a listing line cannot be parsed.
pub(crate) fn malformed(
    command: &'static str,
    reason: &'static str,
    line: &str,
) -> SourceError {
    SourceError::MalformedOutput {
        command,
        reason,
        line: line.to_owned(),
    }
}
