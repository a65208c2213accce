// Copyright 2026 Oxide Computer Company

//! The Mercurial backend.

use crate::{
    Existence, ExistenceFlags, LocalMirror, Source, SourceError, SourceKind,
    errors::malformed, export::export_by_copy, source::SourceCore,
};
use camino::Utf8Path;
use std::sync::Arc;
use tracing::{debug, info};
use vcs_version::{Checkout, PairedVersion, Revision, Version};

const TAGS: &str = "hg tags";
const BRANCHES: &str = "hg branches";

/// The bookmark that, when present, names the default branch.
const MAGIC_BOOKMARK: &str = "@";
/// The branch that is default when there is no `@` bookmark.
const DEFAULT_BRANCH: &str = "default";

/// A Mercurial repository.
///
/// Listing combines tags, bookmarks and named branches. Bookmarks are
/// listed as branches; the `@` bookmark, if present, is the default branch
/// instead of the `default` named branch.
#[derive(Debug)]
pub struct HgSource {
    core: SourceCore,
}

impl HgSource {
    pub(crate) fn new(core: SourceCore) -> Self {
        HgSource { core }
    }

    fn ensure_exists(&self) -> Result<bool, SourceError> {
        self.core.ensure_exists(|| {
            let clone = self
                .core
                .upstream_command(["clone", self.core.mirror.remote()])
                .arg(self.core.mirror.path().as_str());
            self.core
                .runner
                .run(&clone)
                .map(drop)
                .map_err(|error| self.core.remote_error("unable to clone repository", error))
        })
    }

    /// Pulls and updates. The caller must hold the mirror write lock.
    fn sync_locked(&self) -> Result<(), SourceError> {
        info!(remote = self.core.mirror.remote(), "pulling from upstream");
        for args in [["pull"], ["update"]] {
            self.core
                .mirror
                .run(&*self.core.runner, args)
                .map_err(|error| {
                    self.core.local_error("unable to update checked out version", error)
                })?;
        }
        self.core.mirror.mark_synced();
        self.core.existence.record_found(Existence::UPSTREAM);
        Ok(())
    }

    fn list_uncached(&self) -> Result<Vec<PairedVersion>, SourceError> {
        if !self.ensure_exists()? && !self.core.mirror.is_synced() {
            let _guard = self.core.mirror.write();
            if !self.core.mirror.is_synced() {
                self.sync_locked()?;
            }
        }

        let _guard = self.core.mirror.read();
        let runner = &*self.core.runner;
        let tags = self.core.mirror.run(runner, ["tags", "--debug", "--verbose"])?;
        let bookmarks = self.core.mirror.run(runner, ["bookmarks", "--debug"])?;
        let branches = self.core.mirror.run(runner, ["branches", "-c", "--debug"])?;

        let mut versions = parse_hg_tags(&tags.stdout_str())?;
        let (marks, magic_at) = parse_hg_bookmarks(&bookmarks.stdout_str());
        versions.extend(marks);
        versions.extend(parse_hg_branches(&branches.stdout_str(), magic_at)?);
        if versions.is_empty() {
            return Err(SourceError::NoVersions {
                remote: self.core.mirror.remote().to_owned(),
            });
        }
        debug!(count = versions.len(), magic_at, "listed hg versions");
        Ok(versions)
    }
}

impl Source for HgSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Hg
    }

    fn mirror(&self) -> &LocalMirror {
        &self.core.mirror
    }

    fn existence(&self) -> &ExistenceFlags {
        &self.core.existence
    }

    fn list_versions(&self) -> Result<Arc<[PairedVersion]>, SourceError> {
        self.core.cache.get_or_populate(|| self.list_uncached())
    }

    fn export_version_to(
        &self,
        version: &dyn Checkout,
        to: &Utf8Path,
    ) -> Result<(), SourceError> {
        self.ensure_exists()?;
        export_by_copy(
            &self.core,
            version.checkout_ref(),
            to,
            || self.sync_locked(),
            |rev| {
                self.core
                    .mirror
                    .run(&*self.core.runner, ["update", "-r", rev])
                    .map(drop)
                    .map_err(|error| {
                        self.core.local_error("unable to update checked out version", error)
                    })
            },
        )
    }

    fn update(&self) -> Result<(), SourceError> {
        if self.ensure_exists()? {
            return Ok(());
        }
        let _guard = self.core.mirror.write();
        self.sync_locked()
    }
}

/// Splits `<name>   <revno>:<node>` into the name and the node.
fn name_and_node(line: &str) -> Option<(&str, &str)> {
    let (left, node) = line.split_once(':')?;
    let (name, _revno) = left.trim_end().rsplit_once(' ')?;
    Some((name.trim_end(), node.trim()))
}

/// Parses `hg tags --debug --verbose`.
///
/// Local tags, tags whose node is the null revision (pending deletion), and
/// the `tip` pseudo-tag are skipped.
pub(crate) fn parse_hg_tags(output: &str) -> Result<Vec<PairedVersion>, SourceError> {
    let mut versions = Vec::new();
    for line in output.trim().lines() {
        if line.ends_with(" local") {
            continue;
        }
        let (name, node) = name_and_node(line)
            .ok_or_else(|| malformed(TAGS, "expected `<tag> <rev>:<node>`", line))?;
        if name == "tip" {
            continue;
        }
        let rev = Revision::new(node).map_err(|_| malformed(TAGS, "invalid node", line))?;
        if rev.is_null() {
            continue;
        }
        versions.push(Version::tag(name).pair(rev));
    }
    Ok(versions)
}

/// Parses `hg bookmarks --debug`, returning the bookmarks as branches and
/// whether the `@` bookmark was present.
///
/// Lines that do not have exactly one `:` are skipped.
pub(crate) fn parse_hg_bookmarks(output: &str) -> (Vec<PairedVersion>, bool) {
    let output = output.trim();
    let mut magic_at = false;
    if output == "no bookmarks set" {
        return (Vec::new(), magic_at);
    }

    let mut versions = Vec::new();
    for line in output.lines() {
        let line = line.trim_start_matches(|c: char| c == ' ' || c == '*');
        if line.split(':').count() != 2 {
            continue;
        }
        let Some((name, node)) = name_and_node(line) else { continue };
        let Ok(rev) = Revision::new(node) else { continue };
        let version = if name == MAGIC_BOOKMARK {
            magic_at = true;
            Version::default_branch(name)
        } else {
            Version::branch(name)
        };
        versions.push(version.pair(rev));
    }
    (versions, magic_at)
}

/// Parses `hg branches -c --debug`.
///
/// The `default` branch is the default branch unless the `@` bookmark was
/// seen.
pub(crate) fn parse_hg_branches(
    output: &str,
    magic_at: bool,
) -> Result<Vec<PairedVersion>, SourceError> {
    let mut versions = Vec::new();
    for line in output.trim().lines() {
        let line = line.trim_end();
        let line = line.strip_suffix(" (inactive)").unwrap_or(line);
        let line = line.strip_suffix(" (closed)").unwrap_or(line);
        let (name, node) = name_and_node(line).ok_or_else(|| {
            malformed(BRANCHES, "expected `<branch> <rev>:<node>`", line)
        })?;
        let rev =
            Revision::new(node).map_err(|_| malformed(BRANCHES, "invalid node", line))?;
        let version = if !magic_at && name == DEFAULT_BRANCH {
            Version::default_branch(name)
        } else {
            Version::branch(name)
        };
        versions.push(version.pair(rev));
    }
    Ok(versions)
}
