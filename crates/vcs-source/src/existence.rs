// Copyright 2026 Oxide Computer Company

//! Opportunistically recorded knowledge about where a source exists.

use std::{
    fmt,
    ops::BitOr,
    sync::atomic::{AtomicU8, Ordering},
};

/// A set of places a source can exist.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Existence(u8);

impl Existence {
    /// No locations.
    pub const NONE: Existence = Existence(0);
    /// The upstream repository.
    pub const UPSTREAM: Existence = Existence(1 << 0);
    /// The local mirror.
    pub const IN_CACHE: Existence = Existence(1 << 1);

    /// Returns true if every location in `other` is also in `self`.
    pub fn contains(self, other: Existence) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns true if no location is set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Existence {
    type Output = Existence;

    fn bitor(self, rhs: Existence) -> Existence {
        Existence(self.0 | rhs.0)
    }
}

impl fmt::Display for Existence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            (Existence::UPSTREAM, "upstream"),
            (Existence::IN_CACHE, "cache"),
        ]
        .into_iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, name)| name)
        .collect();
        if names.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&names.join("|"))
        }
    }
}

/// Per-source record of which locations have been checked and which were
/// found to exist.
///
/// Bits are only ever added: nothing in this crate clears them.
#[derive(Debug, Default)]
pub struct ExistenceFlags {
    searched: AtomicU8,
    found: AtomicU8,
}

impl ExistenceFlags {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `locations` were checked and found to exist.
    pub fn record_found(&self, locations: Existence) {
        self.searched.fetch_or(locations.0, Ordering::AcqRel);
        self.found.fetch_or(locations.0, Ordering::AcqRel);
    }

    /// Records that `locations` were checked and found missing.
    pub fn record_missing(&self, locations: Existence) {
        self.searched.fetch_or(locations.0, Ordering::AcqRel);
    }

    /// Returns the locations that have been checked.
    pub fn searched(&self) -> Existence {
        Existence(self.searched.load(Ordering::Acquire))
    }

    /// Returns the locations known to exist.
    pub fn found(&self) -> Existence {
        Existence(self.found.load(Ordering::Acquire))
    }
}
