// Copyright 2026 Oxide Computer Company

//! The source capability and backend selection.

use crate::{
    BzrSource, Existence, ExistenceFlags, GitSource, GopkgInPath,
    GopkgInPathError, GopkgInSource, HgSource, LocalMirror, Runner,
    SourceError, SystemRunner, Vcs, VcsCommand, VcsDetectError, VcsName,
    VersionCache,
};
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use std::{fmt, sync::Arc};
use tracing::info;
use vcs_version::{Checkout, PairedVersion};

/// A remote repository whose versions can be listed and exported.
///
/// Implemented once per VCS family, plus the gopkg.in decorator over git.
/// All methods take `&self` and may be called concurrently; each
/// implementation serializes access to its mirror internally.
pub trait Source: fmt::Debug + Send + Sync {
    /// Returns which backend this source uses.
    fn kind(&self) -> SourceKind;

    /// Returns the local mirror backing this source.
    fn mirror(&self) -> &LocalMirror;

    /// Returns what is known about where this source exists.
    fn existence(&self) -> &ExistenceFlags;

    /// Lists every version of the source, paired with its revision.
    ///
    /// The first successful call populates a cache; later calls return the
    /// same list without running any VCS command. Fails rather than
    /// returning an empty list if no versions can be found.
    fn list_versions(&self) -> Result<Arc<[PairedVersion]>, SourceError>;

    /// Writes the tree at `version` into `to`, creating `to` if needed.
    ///
    /// The mirror's checked-out state is not observably changed for git
    /// sources; other backends switch the mirror's working copy.
    fn export_version_to(
        &self,
        version: &dyn Checkout,
        to: &Utf8Path,
    ) -> Result<(), SourceError>;

    /// Brings the mirror up to date with upstream, creating it if needed.
    fn update(&self) -> Result<(), SourceError>;
}

/// The backend a source is driven by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum SourceKind {
    /// A git repository.
    Git,
    /// A git repository filtered by the gopkg.in major-version convention.
    GopkgIn {
        /// The major version encoded in the import path.
        major: u64,
    },
    /// A Bazaar branch.
    Bzr,
    /// A Mercurial repository.
    Hg,
}

impl SourceKind {
    /// Returns the VCS family used by this kind.
    pub fn vcs_name(self) -> VcsName {
        match self {
            SourceKind::Git | SourceKind::GopkgIn { .. } => VcsName::Git,
            SourceKind::Bzr => VcsName::Bzr,
            SourceKind::Hg => VcsName::Hg,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::GopkgIn { major } => write!(f, "git (gopkg.in v{major})"),
            other => write!(f, "{}", other.vcs_name()),
        }
    }
}

/// Describes a source to construct.
///
/// # Examples
///
/// ```no_run
/// use vcs_source::{SourceConfig, SourceKind};
///
/// let source = SourceConfig::new(
///     SourceKind::Git,
///     "https://github.com/example/project",
///     "/var/cache/sources/github.com/example/project",
/// )
/// .build()?;
///
/// for version in source.list_versions()?.iter() {
///     println!("{} {}", version, version.revision());
/// }
/// # Ok::<(), vcs_source::SourceError>(())
/// ```
#[derive(Clone, Debug)]
pub struct SourceConfig {
    kind: SourceKind,
    remote: String,
    mirror_path: Utf8PathBuf,
    binary: Option<String>,
    runner: Arc<dyn Runner>,
}

impl SourceConfig {
    /// Creates a configuration for `remote`, mirrored at `mirror_path`.
    ///
    /// By default commands are run with [`SystemRunner`] and the VCS binary
    /// is taken from `$GIT`, `$BZR` or `$HG`.
    pub fn new(
        kind: SourceKind,
        remote: impl Into<String>,
        mirror_path: impl Into<Utf8PathBuf>,
    ) -> Self {
        SourceConfig {
            kind,
            remote: remote.into(),
            mirror_path: mirror_path.into(),
            binary: None,
            runner: Arc::new(SystemRunner),
        }
    }

    /// Creates a configuration from a gopkg.in import path such as
    /// `gopkg.in/yaml.v2`.
    pub fn gopkg_in(
        import_path: &str,
        mirror_path: impl Into<Utf8PathBuf>,
    ) -> Result<Self, GopkgInPathError> {
        let path = GopkgInPath::parse(import_path)?;
        Ok(Self::new(
            SourceKind::GopkgIn { major: path.major() },
            path.upstream(),
            mirror_path,
        ))
    }

    /// Uses `runner` to execute VCS commands.
    pub fn with_runner(mut self, runner: Arc<dyn Runner>) -> Self {
        self.runner = runner;
        self
    }

    /// Uses `binary` for the VCS instead of reading the environment.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = Some(binary.into());
        self
    }

    /// Returns the configured kind.
    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// Returns the configured upstream.
    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// Constructs the source.
    ///
    /// Returns an error if the VCS binary environment variable is not valid
    /// UTF-8. Nothing is run and nothing is created on disk.
    pub fn build(self) -> Result<Box<dyn Source>, SourceError> {
        let kind = self.kind;
        let core = self.into_core()?;
        Ok(match kind {
            SourceKind::Git => Box::new(GitSource::new(core)),
            SourceKind::GopkgIn { major } => {
                Box::new(GopkgInSource::new(GitSource::new(core), major))
            }
            SourceKind::Bzr => Box::new(BzrSource::new(core)),
            SourceKind::Hg => Box::new(HgSource::new(core)),
        })
    }

    fn into_core(self) -> Result<SourceCore, SourceError> {
        let name = self.kind.vcs_name();
        let vcs = match self.binary {
            Some(binary) => Vcs::with_binary(name, binary),
            None => Vcs::for_name(name)?,
        };
        Ok(SourceCore {
            mirror: LocalMirror::new(vcs, self.remote, self.mirror_path),
            cache: VersionCache::new(),
            existence: ExistenceFlags::new(),
            runner: self.runner,
        })
    }
}

/// State shared by every backend: the mirror, the version cache, the
/// existence flags, and the command runner.
#[derive(Debug)]
pub(crate) struct SourceCore {
    pub(crate) mirror: LocalMirror,
    pub(crate) cache: VersionCache,
    pub(crate) existence: ExistenceFlags,
    pub(crate) runner: Arc<dyn Runner>,
}

impl SourceCore {
    /// Builds a command that runs outside the mirror (clone, ls-remote).
    pub(crate) fn upstream_command<I, S>(&self, args: I) -> VcsCommand
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        VcsCommand::new(self.mirror.vcs().binary()).args(args)
    }

    /// Creates the mirror with `clone` if it does not exist yet.
    ///
    /// `clone` runs under the mirror write lock and must not take it again.
    /// Returns true if the mirror was created by this call, in which case it
    /// is also marked synced. Fails without cloning if the mirror path
    /// already holds a working copy of another VCS.
    pub(crate) fn ensure_exists(
        &self,
        clone: impl FnOnce() -> Result<(), SourceError>,
    ) -> Result<bool, SourceError> {
        if self.mirror.exists() {
            self.existence.record_found(Existence::IN_CACHE);
            return Ok(false);
        }

        let _guard = self.mirror.write();
        if self.mirror.exists() {
            self.existence.record_found(Existence::IN_CACHE);
            return Ok(false);
        }

        match Vcs::detect(self.mirror.path()) {
            Ok(found) => {
                return Err(SourceError::MirrorVcsMismatch {
                    path: self.mirror.path().to_owned(),
                    expected: self.mirror.vcs().name(),
                    found: found.name(),
                });
            }
            Err(
                VcsDetectError::PathNotFound { .. } | VcsDetectError::NotFound { .. },
            ) => {}
            Err(error) => return Err(error.into()),
        }

        if let Some(parent) = self.mirror.path().parent() {
            fs::create_dir_all(parent).map_err(|error| {
                SourceError::CreateDir { path: parent.to_owned(), error }
            })?;
        }

        info!(
            remote = self.mirror.remote(),
            path = %self.mirror.path(),
            vcs = %self.mirror.vcs().name(),
            "creating local mirror"
        );
        clone()?;
        self.mirror.mark_synced();
        self.existence.record_found(Existence::UPSTREAM | Existence::IN_CACHE);
        Ok(true)
    }

    pub(crate) fn remote_error(
        &self,
        message: &'static str,
        error: crate::ProcessError,
    ) -> SourceError {
        SourceError::Remote {
            remote: self.mirror.remote().to_owned(),
            message,
            error,
        }
    }

    pub(crate) fn local_error(
        &self,
        message: &'static str,
        error: crate::ProcessError,
    ) -> SourceError {
        SourceError::Local {
            path: self.mirror.path().to_owned(),
            message,
            error,
        }
    }
}
