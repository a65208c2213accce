// Copyright 2026 Oxide Computer Company

//! The gopkg.in decorator over the git backend.

use crate::{
    ExistenceFlags, GitSource, GopkgInPathError, LocalMirror, Source,
    SourceError, SourceKind,
};
use camino::Utf8Path;
use std::sync::Arc;
use tracing::debug;
use vcs_version::{Checkout, PairedVersion, Version, parse_semver};

/// A git source restricted to one major version, following the gopkg.in
/// convention.
///
/// Listing keeps semver tags with the configured major and branches whose
/// names parse as semver with that major. The highest such branch is the
/// default. Everything else, including plain tags and the upstream default
/// branch, is dropped. Export and update go straight to the git source.
#[derive(Debug)]
pub struct GopkgInSource {
    git: GitSource,
    major: u64,
}

impl GopkgInSource {
    pub(crate) fn new(git: GitSource, major: u64) -> Self {
        GopkgInSource { git, major }
    }

    /// Returns the major version this source is restricted to.
    pub fn major(&self) -> u64 {
        self.major
    }
}

impl Source for GopkgInSource {
    fn kind(&self) -> SourceKind {
        SourceKind::GopkgIn { major: self.major }
    }

    fn mirror(&self) -> &LocalMirror {
        self.git.mirror()
    }

    fn existence(&self) -> &ExistenceFlags {
        self.git.existence()
    }

    // The cache lives in the wrapped source's core but is only ever filled
    // through this path, so it holds the filtered list.
    fn list_versions(&self) -> Result<Arc<[PairedVersion]>, SourceError> {
        self.git.cache().get_or_populate(|| {
            let all = self.git.list_uncached()?;
            let total = all.len();
            let kept = filter_major(all, self.major);
            debug!(major = self.major, total, kept = kept.len(), "filtered versions");
            if kept.is_empty() {
                return Err(SourceError::NoVersions {
                    remote: self.git.mirror().remote().to_owned(),
                });
            }
            Ok(kept)
        })
    }

    fn export_version_to(
        &self,
        version: &dyn Checkout,
        to: &Utf8Path,
    ) -> Result<(), SourceError> {
        self.git.export_version_to(version, to)
    }

    fn update(&self) -> Result<(), SourceError> {
        self.git.update()
    }
}

/// Keeps the versions that belong to `major`, marking the highest matching
/// branch as the only default.
///
/// Among branches with equal versions the first one listed wins.
pub(crate) fn filter_major(
    versions: Vec<PairedVersion>,
    major: u64,
) -> Vec<PairedVersion> {
    let mut kept = Vec::with_capacity(versions.len());
    let mut best: Option<(usize, semver::Version)> = None;

    for pv in versions {
        let (version, rev) = pv.into_parts();
        match version {
            Version::Semver { name, version } => {
                if version.major == major {
                    kept.push(Version::Semver { name, version }.pair(rev));
                }
            }
            Version::Branch { name, .. } => {
                let Some(sv) = parse_semver(&name) else { continue };
                if sv.major != major {
                    continue;
                }
                if best.as_ref().is_none_or(|(_, b)| *b < sv) {
                    best = Some((kept.len(), sv));
                }
                kept.push(Version::branch(name).pair(rev));
            }
            Version::Plain { .. } | Version::DefaultBranch { .. } => {}
        }
    }

    if let Some((idx, _)) = best {
        let pv = &kept[idx];
        kept[idx] = Version::Branch {
            name: pv.version().name().to_owned(),
            is_default: true,
        }
        .pair(pv.revision().clone());
    }
    kept
}

/// A parsed `gopkg.in` import path.
///
/// `gopkg.in/pkg.vN` maps to `github.com/go-pkg/pkg` and
/// `gopkg.in/user/pkg.vN` to `github.com/user/pkg`. Any subpackage path
/// after the versioned element is ignored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GopkgInPath {
    user: Option<String>,
    package: String,
    major: u64,
}

impl GopkgInPath {
    /// Parses an import path such as `gopkg.in/yaml.v2` or
    /// `gopkg.in/user/pkg.v3/subpkg`.
    pub fn parse(path: &str) -> Result<Self, GopkgInPathError> {
        let rest = path
            .strip_prefix("gopkg.in/")
            .ok_or_else(|| GopkgInPathError::NotGopkgIn(path.to_owned()))?;
        let elems: Vec<&str> = rest.split('/').collect();
        if elems.iter().take(2).any(|e| e.is_empty()) {
            return Err(GopkgInPathError::InvalidShape(path.to_owned()));
        }

        let (user, versioned) = match elems.as_slice() {
            [first, ..] if first.contains(".v") => (None, *first),
            [user, second, ..] if second.contains(".v") => {
                (Some((*user).to_owned()), *second)
            }
            [_] | [_, _, ..] => {
                return Err(GopkgInPathError::MissingMajor(path.to_owned()));
            }
            [] => return Err(GopkgInPathError::InvalidShape(path.to_owned())),
        };

        let versioned = versioned.strip_suffix(".git").unwrap_or(versioned);
        let (package, version) = versioned
            .rsplit_once(".v")
            .ok_or_else(|| GopkgInPathError::MissingMajor(path.to_owned()))?;
        let digits = version
            .find(|c: char| !c.is_ascii_digit())
            .map_or(version, |end| &version[..end]);
        let major = digits
            .parse()
            .map_err(|_| GopkgInPathError::MissingMajor(path.to_owned()))?;
        if package.is_empty() {
            return Err(GopkgInPathError::InvalidShape(path.to_owned()));
        }

        Ok(GopkgInPath { user, package: package.to_owned(), major })
    }

    /// Returns the major version encoded in the path.
    pub fn major(&self) -> u64 {
        self.major
    }

    /// Returns the package name without its version suffix.
    pub fn package(&self) -> &str {
        &self.package
    }

    /// Returns the GitHub user, if the path names one.
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Returns the upstream git URL.
    pub fn upstream(&self) -> String {
        match &self.user {
            Some(user) => format!("https://github.com/{user}/{}", self.package),
            None => format!("https://github.com/go-{0}/{0}", self.package),
        }
    }
}
