// Copyright 2026 Oxide Computer Company

//! VCS families and the binaries used to drive them.

use crate::{VcsDetectError, VcsEnvError};
use camino::Utf8Path;
use fs_err as fs;
use std::{fmt, io};

/// Reads a VCS binary path from an environment variable, falling back
/// to `default` if the variable is unset or empty.
///
/// The value is trimmed of leading and trailing whitespace.
///
/// Returns an error if the variable is set but is not valid UTF-8.
fn read_vcs_env(
    var: &'static str,
    default: &str,
) -> Result<String, VcsEnvError> {
    match std::env::var(var) {
        Ok(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Ok(default.to_string())
            } else {
                Ok(trimmed.to_string())
            }
        }
        Err(std::env::VarError::NotPresent) => Ok(default.to_string()),
        Err(std::env::VarError::NotUnicode(value)) => {
            Err(VcsEnvError::NonUtf8 { var, value })
        }
    }
}

/// The name of a version control system family.
///
/// Used in error messages, log fields, and for identifying which backend
/// drives a mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum VcsName {
    /// Git, and other distributed VCSes that speak its CLI.
    Git,
    /// Bazaar (bzr), a centralized-with-branches VCS.
    Bzr,
    /// Mercurial (hg).
    Hg,
}

impl VcsName {
    /// Returns the name of the metadata directory at the root of a working
    /// copy (e.g. `.git`).
    pub fn metadata_dir(self) -> &'static str {
        match self {
            VcsName::Git => ".git",
            VcsName::Bzr => ".bzr",
            VcsName::Hg => ".hg",
        }
    }
}

impl fmt::Display for VcsName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VcsName::Git => write!(f, "git"),
            VcsName::Bzr => write!(f, "bzr"),
            VcsName::Hg => write!(f, "hg"),
        }
    }
}

/// A VCS family together with the binary used to invoke it.
///
/// Use [`Vcs::git()`], [`Vcs::bzr()`], [`Vcs::hg()`], [`Vcs::for_name()`]
/// or [`Vcs::detect()`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vcs {
    name: VcsName,
    binary: String,
}

impl Vcs {
    /// Creates a Git VCS using the `$GIT` environment variable or
    /// `"git"`.
    ///
    /// Returns an error if the `$GIT` environment variable is set
    /// but is not valid UTF-8.
    pub fn git() -> Result<Self, VcsEnvError> {
        let binary = read_vcs_env("GIT", "git")?;
        Ok(Vcs { name: VcsName::Git, binary })
    }

    /// Creates a Bazaar VCS using the `$BZR` environment variable or
    /// `"bzr"`.
    ///
    /// Returns an error if the `$BZR` environment variable is set
    /// but is not valid UTF-8.
    pub fn bzr() -> Result<Self, VcsEnvError> {
        let binary = read_vcs_env("BZR", "bzr")?;
        Ok(Vcs { name: VcsName::Bzr, binary })
    }

    /// Creates a Mercurial VCS using the `$HG` environment variable or
    /// `"hg"`.
    ///
    /// Returns an error if the `$HG` environment variable is set
    /// but is not valid UTF-8.
    pub fn hg() -> Result<Self, VcsEnvError> {
        let binary = read_vcs_env("HG", "hg")?;
        Ok(Vcs { name: VcsName::Hg, binary })
    }

    /// Creates the VCS for `name`, reading its binary from the environment.
    pub fn for_name(name: VcsName) -> Result<Self, VcsEnvError> {
        match name {
            VcsName::Git => Self::git(),
            VcsName::Bzr => Self::bzr(),
            VcsName::Hg => Self::hg(),
        }
    }

    /// Creates a VCS with an explicit binary, ignoring the environment.
    pub fn with_binary(name: VcsName, binary: impl Into<String>) -> Self {
        Vcs { name, binary: binary.into() }
    }

    /// Detects which VCS manages an existing working copy.
    ///
    /// `path` must be the root of the working copy. Detection checks for
    /// `.git`, then `.bzr`, then `.hg`, and returns an error if none is
    /// present.
    pub fn detect(path: &Utf8Path) -> Result<Self, VcsDetectError> {
        // Use metadata() to distinguish "not a directory" from I/O
        // errors (e.g., permission denied).
        match fs::metadata(path) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(VcsDetectError::NotADirectory {
                    path: path.to_owned(),
                });
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(VcsDetectError::PathNotFound {
                    path: path.to_owned(),
                });
            }
            Err(err) => {
                return Err(VcsDetectError::Io {
                    path: path.to_owned(),
                    source: err,
                });
            }
        }

        for name in [VcsName::Git, VcsName::Bzr, VcsName::Hg] {
            let meta_path = path.join(name.metadata_dir());
            match meta_path.try_exists() {
                Ok(true) => return Ok(Self::for_name(name)?),
                Ok(false) => {}
                Err(source) => {
                    return Err(VcsDetectError::Io { path: meta_path, source });
                }
            }
        }

        Err(VcsDetectError::NotFound { path: path.to_owned() })
    }

    /// Returns the path to the VCS binary.
    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Returns the name of the VCS.
    pub fn name(&self) -> VcsName {
        self.name
    }
}
