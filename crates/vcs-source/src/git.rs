// Copyright 2026 Oxide Computer Company

//! The git backend.

use crate::{
    CommandOutput, Existence, ExistenceFlags, LocalMirror, ProcessError,
    Source, SourceError, SourceKind, VcsCommand, VersionCache, errors::malformed,
    export::IndexBackup, source::SourceCore,
};
use camino::Utf8Path;
use fs_err as fs;
use std::{collections::HashMap, path::MAIN_SEPARATOR_STR, sync::Arc};
use tracing::{debug, info, warn};
use vcs_version::{Checkout, PairedVersion, Revision, Version};

/// Environment applied to every git invocation so that a missing credential
/// fails the command instead of blocking on a prompt.
const GIT_ENV: [&str; 2] = ["GIT_ASKPASS=", "GIT_TERMINAL_PROMPT=0"];

const LS_REMOTE: &str = "git ls-remote";
const SHOW_REF: &str = "git show-ref";

/// A git repository.
///
/// Versions are listed with `git ls-remote`, falling back to the refs of the
/// local mirror when the upstream cannot be reached. Exports populate the
/// destination from the mirror's object store without touching its
/// checked-out files.
#[derive(Debug)]
pub struct GitSource {
    core: SourceCore,
}

impl GitSource {
    pub(crate) fn new(core: SourceCore) -> Self {
        GitSource { core }
    }

    pub(crate) fn cache(&self) -> &VersionCache {
        &self.core.cache
    }

    fn git_local<I, S>(&self, args: I) -> VcsCommand
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.core.mirror.command(args).env_overrides(GIT_ENV)
    }

    fn run_local<I, S>(&self, args: I) -> Result<CommandOutput, ProcessError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.core.runner.run(&self.git_local(args))
    }

    /// Clones the mirror if needed. Returns true if it was cloned (and thus
    /// already synced) by this call.
    fn ensure_exists(&self) -> Result<bool, SourceError> {
        self.core.ensure_exists(|| {
            let clone = self
                .core
                .upstream_command(["clone", self.core.mirror.remote()])
                .arg(self.core.mirror.path().as_str())
                .env_overrides(GIT_ENV);
            self.core.runner.run(&clone).map_err(|error| {
                self.core.remote_error("unable to clone repository", error)
            })?;
            self.sync_locked()
        })
    }

    /// Fetches every branch and tag from upstream.
    ///
    /// The caller must hold the mirror write lock. Local branches are forced
    /// to match upstream so that listing from the mirror sees what upstream
    /// has.
    fn sync_locked(&self) -> Result<(), SourceError> {
        info!(remote = self.core.mirror.remote(), "fetching from upstream");
        self.run_local([
            "fetch",
            "--tags",
            "--update-head-ok",
            "origin",
            "+refs/heads/*:refs/heads/*",
        ])
        .map_err(|error| {
            self.core.remote_error("unable to fetch from upstream", error)
        })?;
        self.core.mirror.mark_synced();
        self.core.existence.record_found(Existence::UPSTREAM);
        Ok(())
    }

    /// Syncs the mirror, creating it first if needed.
    fn sync(&self) -> Result<(), SourceError> {
        if self.ensure_exists()? {
            return Ok(());
        }
        let _guard = self.core.mirror.write();
        self.sync_locked()
    }

    /// Lists versions without consulting the cache.
    pub(crate) fn list_uncached(&self) -> Result<Vec<PairedVersion>, SourceError> {
        let ls_remote = self
            .core
            .upstream_command(["ls-remote", self.core.mirror.remote()])
            .env_overrides(GIT_ENV);

        let (command, output) = match self.core.runner.run(&ls_remote) {
            Ok(output) if !output.stdout_str().trim().is_empty() => {
                (LS_REMOTE, output)
            }
            Ok(_) => {
                warn!(
                    remote = self.core.mirror.remote(),
                    "ls-remote listed nothing, using local mirror"
                );
                (SHOW_REF, self.list_local()?)
            }
            Err(error) => {
                warn!(
                    remote = self.core.mirror.remote(),
                    %error,
                    "ls-remote failed, using local mirror"
                );
                (SHOW_REF, self.list_local()?)
            }
        };
        self.core.existence.record_found(Existence::UPSTREAM);

        let versions = parse_ref_listing(command, &output.stdout_str())?;
        if versions.is_empty() {
            return Err(SourceError::NoVersions {
                remote: self.core.mirror.remote().to_owned(),
            });
        }
        debug!(count = versions.len(), command, "listed git refs");
        Ok(versions)
    }

    /// Lists the mirror's refs after bringing it up to date.
    ///
    /// An existing mirror is always fetched again, even if it was synced
    /// earlier, so an unreachable upstream fails here instead of serving
    /// stale refs.
    fn list_local(&self) -> Result<CommandOutput, SourceError> {
        if !self.ensure_exists()? {
            let _guard = self.core.mirror.write();
            self.sync_locked()?;
        }
        self.core.existence.record_found(Existence::UPSTREAM | Existence::IN_CACHE);

        let _guard = self.core.mirror.read();
        let no_versions = || SourceError::NoVersions {
            remote: self.core.mirror.remote().to_owned(),
        };
        match self.run_local(["show-ref", "--head", "--dereference"]) {
            Ok(output) if output.stdout_str().trim().is_empty() => Err(no_versions()),
            Ok(output) => Ok(output),
            // show-ref exits nonzero when there are no refs at all.
            Err(ProcessError::Failed { output, .. }) if output.is_empty() => {
                Err(no_versions())
            }
            Err(error) => Err(error.into()),
        }
    }

    fn checkout_into(&self, checkout_ref: &str, prefix: &str) -> Result<(), SourceError> {
        let _guard = self.core.mirror.write();
        let backup = IndexBackup::take(&self.core.mirror.metadata_dir())?;

        self.run_local(["read-tree", checkout_ref])
            .map_err(|error| self.core.local_error("unable to read tree", error))?;
        self.core
            .runner
            .run(
                &self
                    .git_local(["checkout-index", "-a"])
                    .arg(format!("--prefix={prefix}")),
            )
            .map_err(|error| self.core.local_error("unable to check out files", error))?;

        backup.restore()
    }
}

impl Source for GitSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Git
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
        fs::create_dir_all(to)
            .map_err(|error| SourceError::CreateDir { path: to.to_owned(), error })?;
        // checkout-index resolves a relative prefix against the mirror, so
        // hand it an absolute one.
        let to = to
            .canonicalize_utf8()
            .map_err(|error| SourceError::Io { path: to.to_owned(), error })?;
        let prefix = format!(
            "{}{MAIN_SEPARATOR_STR}",
            to.as_str().trim_end_matches(MAIN_SEPARATOR_STR)
        );

        let checkout_ref = version.checkout_ref();
        info!(version = checkout_ref, %to, "exporting git tree");
        match self.checkout_into(checkout_ref, &prefix) {
            Err(error) if !self.core.mirror.is_synced() => {
                warn!(
                    version = checkout_ref,
                    %error,
                    "export from unsynced mirror failed, syncing and retrying"
                );
                self.sync()?;
                self.checkout_into(checkout_ref, &prefix)
            }
            result => result,
        }
    }

    fn update(&self) -> Result<(), SourceError> {
        self.sync()
    }
}

/// Parses `git ls-remote` or `git show-ref --head --dereference` output.
///
/// Each line is a 40-character revision, a separator, and a ref name. The
/// first line names HEAD; branches pointing at the same revision are marked
/// default. If several branches match HEAD and one of them is `master`, only
/// `master` stays default. A peeled `^{}` entry replaces the plain entry for
/// the same tag, since it names the commit rather than the tag object.
pub(crate) fn parse_ref_listing(
    command: &'static str,
    output: &str,
) -> Result<Vec<PairedVersion>, SourceError> {
    let mut lines = output.trim().lines().map(str::trim_end);
    let Some(first) = lines.next() else {
        return Ok(Vec::new());
    };

    let first_rev = revision_field(command, first)?;
    let (head, first) = if first.get(41..) == Some("HEAD") {
        (Some(first_rev), None)
    } else {
        (None, Some(first))
    };

    let mut versions: Vec<PairedVersion> = Vec::new();
    let mut tags: HashMap<String, usize> = HashMap::new();
    let mut defaults = 0;
    let mut master_is_default = false;

    for line in first.into_iter().chain(lines) {
        if line.get(46..51) == Some("heads") {
            let Some(name) = line.get(52..) else { continue };
            let rev = revision_field(command, line)?;
            let is_default = head.as_ref() == Some(&rev);
            if is_default {
                defaults += 1;
                master_is_default |= name == "master";
            }
            versions.push(
                Version::Branch { name: name.to_owned(), is_default }.pair(rev),
            );
        } else if line.get(46..50) == Some("tags") {
            let Some(raw) = line.get(51..) else { continue };
            let rev = revision_field(command, line)?;
            match raw.strip_suffix("^{}") {
                Some(name) => {
                    let version = Version::tag(name).pair(rev);
                    match tags.get(name) {
                        Some(&idx) => versions[idx] = version,
                        None => {
                            tags.insert(name.to_owned(), versions.len());
                            versions.push(version);
                        }
                    }
                }
                None => {
                    if tags.contains_key(raw) {
                        continue;
                    }
                    tags.insert(raw.to_owned(), versions.len());
                    versions.push(Version::tag(raw).pair(rev));
                }
            }
        }
    }

    if defaults > 1 && master_is_default {
        for pv in &mut versions {
            let demote = matches!(
                pv.version(),
                Version::Branch { name, is_default: true } if name != "master"
            );
            if demote {
                *pv = Version::branch(pv.version().name())
                    .pair(pv.revision().clone());
            }
        }
    }
    Ok(versions)
}

fn revision_field(command: &'static str, line: &str) -> Result<Revision, SourceError> {
    let field = line
        .get(..40)
        .ok_or_else(|| malformed(command, "line too short for a revision", line))?;
    Revision::new(field)
        .map_err(|_| malformed(command, "invalid revision", line))
}
