// Copyright 2026 Oxide Computer Company

//! Version and revision types for VCS-backed dependency sources.
//!
//! A source repository exposes several kinds of *versions*: tags (either
//! plain or shaped like semantic versions), branches, and, for some VCSes, a
//! default branch with no stable name of its own. Each of these resolves to a
//! *revision*, an immutable commit or changeset identifier. Listing a source
//! produces [`PairedVersion`]s: versions bound to the revision they resolved
//! to at listing time.
//!
//! # Examples
//!
//! ```
//! use vcs_version::{Checkout, Revision, Version};
//!
//! let rev: Revision =
//!     "a1b2c3d4e5f6a1b2c3d4e5f6a1b2c3d4e5f6a1b2".parse().unwrap();
//! let paired = Version::tag("v1.4.0").pair(rev.clone());
//!
//! assert_eq!(paired.version().semver().unwrap().minor, 4);
//! assert_eq!(paired.revision(), &rev);
//!
//! // A paired version is checked out by its revision, so later movement of
//! // the tag does not change what gets exported.
//! assert_eq!(paired.checkout_ref(), rev.as_str());
//!
//! // Unpairing recovers the bare version.
//! assert_eq!(paired.unpair(), Version::tag("v1.4.0"));
//! ```
//!
//! # Related crates
//!
//! For listing and exporting versions of a remote repository, see
//! `vcs-source`.

#![deny(missing_docs)]

mod errors;
mod revision;
mod version;

pub use errors::RevisionParseError;
pub use revision::Revision;
pub use version::{Checkout, PairedVersion, Version, parse_semver};
