// Copyright 2026 Oxide Computer Company

//! The Bazaar backend.

use crate::{
    Existence, ExistenceFlags, LocalMirror, Source, SourceError, SourceKind,
    errors::malformed, export::export_by_copy, source::SourceCore,
};
use camino::Utf8Path;
use std::sync::Arc;
use tracing::{debug, info};
use vcs_version::{Checkout, PairedVersion, Revision, Version};

const TAGS: &str = "bzr tags";
const VERSION_INFO: &str = "bzr version-info";
const NULL_REVISION: &str = "null:";

/// Name given to the branch tip, which Bazaar does not name itself.
pub const BZR_DEFAULT_BRANCH: &str = "(default)";

/// A Bazaar branch.
///
/// Bazaar has one branch per location, so listing yields its tags plus the
/// branch tip as the default branch.
#[derive(Debug)]
pub struct BzrSource {
    core: SourceCore,
}

impl BzrSource {
    pub(crate) fn new(core: SourceCore) -> Self {
        BzrSource { core }
    }

    fn ensure_exists(&self) -> Result<bool, SourceError> {
        self.core.ensure_exists(|| {
            let branch = self
                .core
                .upstream_command(["branch", self.core.mirror.remote()])
                .arg(self.core.mirror.path().as_str());
            self.core
                .runner
                .run(&branch)
                .map(drop)
                .map_err(|error| self.core.remote_error("unable to branch repository", error))
        })
    }

    /// Pulls from upstream and updates the working tree. The caller must
    /// hold the mirror write lock.
    fn sync_locked(&self) -> Result<(), SourceError> {
        info!(remote = self.core.mirror.remote(), "pulling from upstream");
        for args in [["pull"], ["update"]] {
            self.core
                .mirror
                .run(&*self.core.runner, args)
                .map_err(|error| self.core.remote_error("unable to update repository", error))?;
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

        let (tags, tip) = {
            let _guard = self.core.mirror.read();
            let runner = &*self.core.runner;
            let tags = self.core.mirror.run(runner, ["tags", "--show-ids", "-v"])?;
            let tip = self.core.mirror.run(
                runner,
                [
                    "version-info",
                    "--custom",
                    "--template={revision_id}",
                    "--revision=branch:.",
                ],
            )?;
            (tags, tip)
        };

        let mut versions = parse_bzr_tags(&tags.stdout_str())?;
        let tip_id = tip.stdout_str();
        let tip_id = tip_id.trim();
        // A branch with no commits reports the null revision as its tip.
        if tip_id != NULL_REVISION {
            let tip_rev = Revision::new(tip_id).map_err(|_| {
                malformed(VERSION_INFO, "invalid branch tip revision", tip_id)
            })?;
            versions.push(Version::default_branch(BZR_DEFAULT_BRANCH).pair(tip_rev));
        }
        if versions.is_empty() {
            return Err(SourceError::NoVersions {
                remote: self.core.mirror.remote().to_owned(),
            });
        }
        debug!(count = versions.len(), "listed bzr versions");
        Ok(versions)
    }
}

impl Source for BzrSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Bzr
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

/// Parses `bzr tags --show-ids -v`: one `<tag> <revision-id>` per line.
pub(crate) fn parse_bzr_tags(output: &str) -> Result<Vec<PairedVersion>, SourceError> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let (name, rev) = line
                .split_once(' ')
                .ok_or_else(|| malformed(TAGS, "expected `<tag> <revision>`", line))?;
            let rev = Revision::new(rev.trim())
                .map_err(|_| malformed(TAGS, "invalid revision", line))?;
            Ok(Version::tag(name).pair(rev))
        })
        .collect()
}
