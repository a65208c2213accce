// Copyright 2026 Oxide Computer Company

//! Revision identifiers.

use crate::RevisionParseError;
use std::{fmt, str::FromStr};

/// An immutable identifier for one commit or changeset, as assigned by the
/// backing VCS.
///
/// Revisions are opaque: a git revision is a 40-character hex hash, a bzr
/// revision is a revision-id such as `jane@example.com-20240101-abcdef`, and
/// a Mercurial revision is a 40-character changeset node. Equality is
/// byte-exact.
///
/// # Invariants
///
/// - The revision is non-empty.
/// - The revision contains no whitespace.
///
/// # Examples
///
/// ```
/// use vcs_version::Revision;
///
/// let rev: Revision =
///     "0123456789abcdef0123456789abcdef01234567".parse().unwrap();
/// assert_eq!(rev.as_str(), "0123456789abcdef0123456789abcdef01234567");
/// assert!(!rev.is_null());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Revision(String);

impl Revision {
    /// Creates a new revision from its textual form.
    ///
    /// Returns an error if the input is empty or contains whitespace. The
    /// input is not trimmed.
    pub fn new(rev: impl Into<String>) -> Result<Self, RevisionParseError> {
        let rev = rev.into();
        if rev.is_empty() {
            return Err(RevisionParseError::Empty);
        }
        if rev.chars().any(char::is_whitespace) {
            return Err(RevisionParseError::ContainsWhitespace(rev));
        }
        Ok(Revision(rev))
    }

    /// Returns the textual form of the revision.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if this is the null revision (all zeroes).
    ///
    /// Mercurial uses the null revision to mark a tag that has been
    /// scheduled for deletion.
    pub fn is_null(&self) -> bool {
        self.0.bytes().all(|b| b == b'0')
    }
}

impl FromStr for Revision {
    type Err = RevisionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Revision::new(s)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
