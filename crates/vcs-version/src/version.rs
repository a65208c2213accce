// Copyright 2026 Oxide Computer Company

//! Version types and pairing.

use crate::Revision;
use std::fmt;

/// A resolvable version of a source: a tag, a branch, or a default branch.
///
/// A `Version` on its own names a point in history that may move (branches)
/// or that the VCS maps to a revision (tags). Binding it to the revision it
/// resolved to at listing time produces a [`PairedVersion`], which is what
/// sources actually return.
///
/// # Examples
///
/// ```
/// use vcs_version::Version;
///
/// // Tags that look like semantic versions become `Semver`.
/// let v = Version::tag("v1.2.0");
/// assert_eq!(v.semver().unwrap().major, 1);
/// assert_eq!(v.name(), "v1.2.0");
///
/// // Anything else is a plain tag.
/// assert!(matches!(Version::tag("release-candidate"), Version::Plain { .. }));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Version {
    /// A tag with no semantic meaning.
    Plain {
        /// The tag name.
        name: String,
    },

    /// A tag that parses as a semantic version.
    Semver {
        /// The tag name exactly as the VCS reports it (e.g. `v1.2.0`).
        name: String,
        /// The parsed semantic version.
        version: semver::Version,
    },

    /// A named, mutable branch.
    Branch {
        /// The branch name.
        name: String,
        /// Whether the backend considers this branch checked out by default.
        is_default: bool,
    },

    /// The default branch of a backend whose default pointer has no stable
    /// name of its own (e.g. bzr's `(default)` or Mercurial's `@`).
    DefaultBranch {
        /// The textual representation the VCS uses for it.
        name: String,
    },
}

impl Version {
    /// Creates a tag version, parsing it as a semantic version if possible.
    ///
    /// Parsing is lenient: a leading `v` is accepted, and partial versions
    /// such as `1` or `1.2` are padded with zeroes. Tags that do not parse
    /// become [`Version::Plain`].
    pub fn tag(name: impl Into<String>) -> Self {
        let name = name.into();
        match parse_semver(&name) {
            Some(version) => Version::Semver { name, version },
            None => Version::Plain { name },
        }
    }

    /// Creates a plain tag version without attempting semver parsing.
    pub fn plain(name: impl Into<String>) -> Self {
        Version::Plain { name: name.into() }
    }

    /// Creates a non-default branch version.
    pub fn branch(name: impl Into<String>) -> Self {
        Version::Branch { name: name.into(), is_default: false }
    }

    /// Creates a default-branch version.
    pub fn default_branch(name: impl Into<String>) -> Self {
        Version::DefaultBranch { name: name.into() }
    }

    /// Returns the name of the version: the tag or branch name.
    pub fn name(&self) -> &str {
        match self {
            Version::Plain { name }
            | Version::Semver { name, .. }
            | Version::Branch { name, .. }
            | Version::DefaultBranch { name } => name,
        }
    }

    /// Returns the parsed semantic version, if this is a semver tag.
    pub fn semver(&self) -> Option<&semver::Version> {
        match self {
            Version::Semver { version, .. } => Some(version),
            Version::Plain { .. }
            | Version::Branch { .. }
            | Version::DefaultBranch { .. } => None,
        }
    }

    /// Returns true if this is a branch or a default branch.
    pub fn is_branch(&self) -> bool {
        match self {
            Version::Branch { .. } | Version::DefaultBranch { .. } => true,
            Version::Plain { .. } | Version::Semver { .. } => false,
        }
    }

    /// Returns true if this version is what the backend checks out by
    /// default.
    pub fn is_default(&self) -> bool {
        match self {
            Version::Branch { is_default, .. } => *is_default,
            Version::DefaultBranch { .. } => true,
            Version::Plain { .. } | Version::Semver { .. } => false,
        }
    }

    /// Binds this version to the revision it currently resolves to.
    pub fn pair(self, revision: Revision) -> PairedVersion {
        PairedVersion { version: self, revision }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A [`Version`] bound to exactly one [`Revision`].
///
/// The revision is fixed at construction. To associate a version with a
/// different revision, pair it again.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PairedVersion {
    version: Version,
    revision: Revision,
}

impl PairedVersion {
    /// Returns the unpaired version.
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Returns the revision this version was paired with.
    pub fn revision(&self) -> &Revision {
        &self.revision
    }

    /// Discards the revision, returning the bare version.
    pub fn unpair(self) -> Version {
        self.version
    }

    /// Splits into the bare version and its revision.
    pub fn into_parts(self) -> (Version, Revision) {
        (self.version, self.revision)
    }
}

impl fmt::Display for PairedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.version.fmt(f)
    }
}

/// Something that names a point in history a VCS can check out.
///
/// A bare [`Version`] is checked out by name, a [`PairedVersion`] by its
/// revision, and a [`Revision`] by itself.
pub trait Checkout {
    /// Returns the ref to pass to the VCS.
    fn checkout_ref(&self) -> &str;
}

impl Checkout for Version {
    fn checkout_ref(&self) -> &str {
        self.name()
    }
}

impl Checkout for PairedVersion {
    fn checkout_ref(&self) -> &str {
        self.revision.as_str()
    }
}

impl Checkout for Revision {
    fn checkout_ref(&self) -> &str {
        self.as_str()
    }
}

/// Parses a tag or branch name as a semantic version.
///
/// Accepts an optional leading `v` and pads partial versions (`1`, `1.2`)
/// with zeroes, keeping any pre-release or build suffix. Returns `None` if
/// the result is still not a valid semantic version.
///
/// ```
/// use vcs_version::parse_semver;
///
/// assert_eq!(parse_semver("v2.3").unwrap(), semver::Version::new(2, 3, 0));
/// assert_eq!(parse_semver("1").unwrap(), semver::Version::new(1, 0, 0));
/// assert!(parse_semver("master").is_none());
/// ```
pub fn parse_semver(input: &str) -> Option<semver::Version> {
    let s = input.strip_prefix('v').unwrap_or(input);
    let core_len = s.find(|c| c == '-' || c == '+').unwrap_or(s.len());
    let (core, suffix) = s.split_at(core_len);
    let normalized = match core.split('.').count() {
        1 => format!("{core}.0.0{suffix}"),
        2 => format!("{core}.0{suffix}"),
        _ => s.to_owned(),
    };
    semver::Version::parse(&normalized).ok()
}
