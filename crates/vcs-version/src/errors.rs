// Copyright 2026 Oxide Computer Company

//! Error types for version and revision parsing.

use thiserror::Error;

/// An error that occurs while constructing a [`Revision`](crate::Revision).
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum RevisionParseError {
    /// The revision string was empty.
    #[error("revision is empty")]
    Empty,

    /// The revision string contained whitespace.
    #[error("revision {0:?} contains whitespace")]
    ContainsWhitespace(String),
}
