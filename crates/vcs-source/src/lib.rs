// Copyright 2026 Oxide Computer Company

//! Version listing and export for VCS-backed dependency sources.
//!
//! A *source* is a remote repository under git, Bazaar or Mercurial, backed
//! by a long-lived local mirror. A [`Source`] answers two questions for the
//! rest of a dependency manager:
//!
//! * which versions exist ([`Source::list_versions`]): every tag and branch,
//!   each paired with the revision it currently points at, with exactly one
//!   default branch where the VCS has a notion of one;
//! * what a version contains ([`Source::export_version_to`]): the tree at
//!   that version, written into an arbitrary directory.
//!
//! Version lists are cached per source after the first successful listing.
//! Sources are safe to share between threads; concurrent first callers list
//! the upstream once between them.
//!
//! # Usage
//!
//! ```no_run
//! use camino::Utf8Path;
//! use vcs_source::{SourceConfig, SourceKind};
//!
//! let source = SourceConfig::new(
//!     SourceKind::Git,
//!     "https://github.com/example/project",
//!     "/var/cache/sources/project",
//! )
//! .build()?;
//!
//! let versions = source.list_versions()?;
//! let default = versions
//!     .iter()
//!     .find(|v| v.version().is_default())
//!     .expect("upstream has a default branch");
//!
//! // Export by revision so a moving branch cannot change what is written.
//! source.export_version_to(default, Utf8Path::new("/tmp/project"))?;
//! # Ok::<(), vcs_source::SourceError>(())
//! ```
//!
//! # gopkg.in
//!
//! [`SourceConfig::gopkg_in`] maps an import path such as `gopkg.in/yaml.v2`
//! to its GitHub upstream and restricts listing to versions with the major
//! version encoded in the path.
//!
//! # VCS binaries
//!
//! The `git`, `bzr` and `hg` binaries are found on `PATH` unless `$GIT`,
//! `$BZR` or `$HG` respectively name another one.

#![deny(missing_docs)]

mod bzr;
mod cache;
mod errors;
mod existence;
mod export;
mod filtered;
mod fs;
mod git;
mod hg;
mod mirror;
mod runner;
mod source;
mod vcs;

pub use bzr::{BZR_DEFAULT_BRANCH, BzrSource};
pub use cache::VersionCache;
pub use errors::{
    AtomicWriteError, FsError, GopkgInPathError, ProcessError, SourceError,
    VcsDetectError, VcsEnvError,
};
pub use existence::{Existence, ExistenceFlags};
pub use filtered::{GopkgInPath, GopkgInSource};
pub use fs::{copy_dir, rename_with_fallback, strip_vendor};
pub use git::GitSource;
pub use hg::HgSource;
pub use mirror::LocalMirror;
pub use runner::{CommandOutput, Runner, SystemRunner, VcsCommand, merge_env_lists};
pub use source::{Source, SourceConfig, SourceKind};
pub use vcs::{Vcs, VcsName};
