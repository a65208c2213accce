// Copyright 2026 Oxide Computer Company

//! Source behavior driven by a scripted runner, covering backends whose
//! binaries may not be installed and timing-dependent paths.

use crate::helpers::{ScriptedRunner, init_logging};
use anyhow::Result;
use camino_tempfile::Utf8TempDir;
use std::{fs, sync::Arc, thread, time::Duration};
use vcs_source::{
    Existence, Source, SourceConfig, SourceError, SourceKind, VcsDetectError,
    VcsName,
};
use vcs_version::Version;

const R1: &str = "1111111111111111111111111111111111111111";
const R2: &str = "2222222222222222222222222222222222222222";
const R3: &str = "3333333333333333333333333333333333333333";
const R4: &str = "4444444444444444444444444444444444444444";
const R5: &str = "5555555555555555555555555555555555555555";
const R6: &str = "6666666666666666666666666666666666666666";

fn source(
    kind: SourceKind,
    runner: &Arc<ScriptedRunner>,
    temp: &Utf8TempDir,
) -> Result<Box<dyn Source>> {
    let binary = kind.vcs_name().to_string();
    Ok(SourceConfig::new(kind, "https://example.com/repo", temp.path().join("mirror"))
        .with_binary(binary)
        .with_runner(Arc::clone(runner) as Arc<dyn vcs_source::Runner>)
        .build()?)
}

fn ls_remote() -> String {
    format!(
        "{R1}\tHEAD\n\
         {R1}\trefs/heads/master\n\
         {R2}\trefs/heads/v2.3\n\
         {R3}\trefs/heads/notasemver\n\
         {R4}\trefs/heads/v1.0\n\
         {R5}\trefs/tags/v1.2.0\n\
         {R6}\trefs/tags/v2.0.0\n\
         {R1}\trefs/tags/v2.1.0\n"
    )
}

// ---------------------------------------------------------------------------
// Caching
// ---------------------------------------------------------------------------

#[test]
fn test_list_versions_cached() -> Result<()> {
    init_logging();
    let temp = Utf8TempDir::with_prefix("vcs-source-scripted-")?;
    let runner = Arc::new(ScriptedRunner::new().on(&["ls-remote"], ls_remote()));
    let source = source(SourceKind::Git, &runner, &temp)?;

    let first = source.list_versions()?;
    let second = source.list_versions()?;
    assert_eq!(first, second);
    assert_eq!(runner.calls().len(), 1, "second listing must not run anything");
    assert!(!source.mirror().exists(), "listing upstream needs no mirror");
    assert!(source.existence().found().contains(Existence::UPSTREAM));

    let ls = runner.find("ls-remote").expect("ls-remote ran");
    assert!(ls.get_env_overrides().iter().any(|e| e == "GIT_TERMINAL_PROMPT=0"));
    assert!(ls.get_env_overrides().iter().any(|e| e == "GIT_ASKPASS="));
    Ok(())
}

#[test]
fn test_concurrent_first_listing_runs_once() -> Result<()> {
    init_logging();
    let temp = Utf8TempDir::with_prefix("vcs-source-scripted-")?;
    let runner = Arc::new(
        ScriptedRunner::new()
            .on(&["ls-remote"], ls_remote())
            .with_delay(Duration::from_millis(50)),
    );
    let source: Arc<dyn Source> = Arc::from(source(SourceKind::Git, &runner, &temp)?);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let source = Arc::clone(&source);
            thread::spawn(move || source.list_versions())
        })
        .collect();
    let results = handles
        .into_iter()
        .map(|h| h.join().expect("thread panicked"))
        .collect::<Result<Vec<_>, _>>()?;

    assert_eq!(runner.count("ls-remote"), 1);
    for r in &results {
        assert!(Arc::ptr_eq(r, &results[0]), "every caller sees one snapshot");
    }
    Ok(())
}

#[test]
fn test_failed_listing_is_not_cached() -> Result<()> {
    init_logging();
    let temp = Utf8TempDir::with_prefix("vcs-source-scripted-")?;
    let runner = Arc::new(
        ScriptedRunner::new()
            .fail(&["ls-remote"], "fatal: unable to access")
            .fail(&["clone"], "fatal: unable to access"),
    );
    let source = source(SourceKind::Git, &runner, &temp)?;

    let err = source.list_versions().unwrap_err();
    assert!(
        matches!(err, SourceError::Remote { message: "unable to clone repository", .. }),
        "{err:?}"
    );
    source.list_versions().unwrap_err();
    assert_eq!(runner.count("ls-remote"), 2, "failures are retried on the next call");
    Ok(())
}

// ---------------------------------------------------------------------------
// Git listing fallback
// ---------------------------------------------------------------------------

#[test]
fn test_ls_remote_failure_falls_back_to_mirror() -> Result<()> {
    init_logging();
    let temp = Utf8TempDir::with_prefix("vcs-source-scripted-")?;
    let show_ref = format!(
        "{R1} HEAD\n{R1} refs/heads/master\n{R2} refs/tags/v1.0.0\n{R3} refs/tags/v1.0.0^{{}}\n"
    );
    let runner = Arc::new(
        ScriptedRunner::new()
            .fail(&["ls-remote"], "fatal: could not read Username")
            .on(&["clone"], "")
            .on(&["fetch"], "")
            .on(&["show-ref"], show_ref),
    );
    let source = source(SourceKind::Git, &runner, &temp)?;

    let versions = source.list_versions()?;
    assert_eq!(versions.len(), 2);
    assert_eq!(
        versions[0].version(),
        &Version::Branch { name: "master".to_owned(), is_default: true }
    );
    assert_eq!(versions[1].revision().as_str(), R3);

    assert!(source.mirror().exists());
    assert!(source.mirror().is_synced());
    assert_eq!(
        source.existence().found(),
        Existence::UPSTREAM | Existence::IN_CACHE
    );

    let fetch = runner.find("fetch").expect("fetch ran after clone");
    assert_eq!(
        fetch.get_args(),
        ["fetch", "--tags", "--update-head-ok", "origin", "+refs/heads/*:refs/heads/*"]
    );
    assert_eq!(fetch.dir(), Some(source.mirror().path()));
    assert!(fetch.get_env_overrides().iter().any(|e| e == "GIT_TERMINAL_PROMPT=0"));
    Ok(())
}

#[test]
fn test_empty_everywhere_is_no_versions() -> Result<()> {
    init_logging();
    let temp = Utf8TempDir::with_prefix("vcs-source-scripted-")?;
    let runner = Arc::new(
        ScriptedRunner::new()
            .on(&["ls-remote"], "")
            .on(&["clone"], "")
            .on(&["fetch"], "")
            .fail(&["show-ref"], ""),
    );
    let source = source(SourceKind::Git, &runner, &temp)?;

    let err = source.list_versions().unwrap_err();
    assert!(matches!(err, SourceError::NoVersions { .. }), "{err:?}");
    assert_eq!(runner.count("show-ref"), 1, "fallback is attempted exactly once");
    Ok(())
}

#[test]
fn test_fallback_fetches_synced_mirror_again() -> Result<()> {
    init_logging();
    let temp = Utf8TempDir::with_prefix("vcs-source-scripted-")?;
    let runner = Arc::new(
        ScriptedRunner::new()
            .fail(&["ls-remote"], "fatal: unable to access")
            .on(&["clone"], "")
            .on(&["fetch"], "")
            .on(&["show-ref"], format!("{R1} HEAD\n{R1} refs/heads/master\n")),
    );
    let source = source(SourceKind::Git, &runner, &temp)?;

    source.update()?;
    assert!(source.mirror().is_synced());
    assert_eq!(runner.count("fetch"), 1);

    source.list_versions()?;
    assert_eq!(runner.count("fetch"), 2, "fallback syncs even a synced mirror");
    assert_eq!(runner.count("clone"), 1);
    Ok(())
}

#[test]
fn test_fallback_fails_when_fetch_fails() -> Result<()> {
    init_logging();
    let temp = Utf8TempDir::with_prefix("vcs-source-scripted-")?;
    fs::create_dir_all(temp.path().join("mirror/.git"))?;
    let runner = Arc::new(
        ScriptedRunner::new()
            .fail(&["ls-remote"], "fatal: unable to access")
            .fail(&["fetch"], "fatal: unable to access")
            .on(&["show-ref"], format!("{R1} HEAD\n{R1} refs/heads/master\n")),
    );
    let source = source(SourceKind::Git, &runner, &temp)?;

    let err = source.list_versions().unwrap_err();
    assert!(
        matches!(err, SourceError::Remote { message: "unable to fetch from upstream", .. }),
        "{err:?}"
    );
    assert_eq!(runner.count("show-ref"), 0, "stale local refs are not listed");
    Ok(())
}

// ---------------------------------------------------------------------------
// Mirror creation
// ---------------------------------------------------------------------------

#[test]
fn test_mirror_of_another_vcs_is_rejected() -> Result<()> {
    init_logging();
    let temp = Utf8TempDir::with_prefix("vcs-source-scripted-")?;
    fs::create_dir_all(temp.path().join("mirror/.git"))?;
    let runner = Arc::new(ScriptedRunner::new().on(&["clone"], ""));
    let source = source(SourceKind::Hg, &runner, &temp)?;

    let err = source.update().unwrap_err();
    assert!(
        matches!(
            err,
            SourceError::MirrorVcsMismatch {
                expected: VcsName::Hg,
                found: VcsName::Git,
                ..
            }
        ),
        "{err:?}"
    );
    assert!(runner.calls().is_empty(), "nothing is cloned over the working copy");
    Ok(())
}

#[test]
fn test_mirror_path_that_is_a_file_is_rejected() -> Result<()> {
    init_logging();
    let temp = Utf8TempDir::with_prefix("vcs-source-scripted-")?;
    fs::write(temp.path().join("mirror"), "not a directory")?;
    let runner = Arc::new(ScriptedRunner::new().on(&["clone"], ""));
    let source = source(SourceKind::Git, &runner, &temp)?;

    let err = source.update().unwrap_err();
    assert!(
        matches!(err, SourceError::Detect(VcsDetectError::NotADirectory { .. })),
        "{err:?}"
    );
    assert!(runner.calls().is_empty());
    Ok(())
}

// ---------------------------------------------------------------------------
// gopkg.in
// ---------------------------------------------------------------------------

#[test]
fn test_gopkg_in_filters_by_major() -> Result<()> {
    init_logging();
    let temp = Utf8TempDir::with_prefix("vcs-source-scripted-")?;
    let runner = Arc::new(ScriptedRunner::new().on(&["ls-remote"], ls_remote()));
    let source = source(SourceKind::GopkgIn { major: 2 }, &runner, &temp)?;

    let versions = source.list_versions()?;
    let names: Vec<_> = versions.iter().map(|v| v.version().name()).collect();
    assert_eq!(names, ["v2.3", "v2.0.0", "v2.1.0"]);

    let defaults: Vec<_> =
        versions.iter().filter(|v| v.version().is_default()).collect();
    assert_eq!(defaults.len(), 1);
    assert_eq!(defaults[0].version().name(), "v2.3");
    assert_eq!(defaults[0].revision().as_str(), R2);

    source.list_versions()?;
    assert_eq!(runner.count("ls-remote"), 1, "filtered list is cached");
    Ok(())
}

// ---------------------------------------------------------------------------
// Mercurial
// ---------------------------------------------------------------------------

fn hg_runner() -> ScriptedRunner {
    ScriptedRunner::new()
        .on(&["clone"], "")
        .on(
            &["tags"],
            format!(
                "tip                                9:{R1}\n\
                 v1.0.0                             8:{R2}\n\
                 mine                               7:{R3} local\n"
            ),
        )
        .on(
            &["bookmarks"],
            format!(
                " * @                         9:{R1}\n   \
                 feature                   6:{R4}\n"
            ),
        )
        .on(
            &["branches"],
            format!(
                "default                        9:{R1}\n\
                 stable                         5:{R5} (inactive)\n"
            ),
        )
}

#[test]
fn test_hg_magic_bookmark_is_default() -> Result<()> {
    init_logging();
    let temp = Utf8TempDir::with_prefix("vcs-source-scripted-")?;
    let runner = Arc::new(hg_runner());
    let source = source(SourceKind::Hg, &runner, &temp)?;

    let versions = source.list_versions()?;
    let expected = [
        Version::tag("v1.0.0"),
        Version::default_branch("@"),
        Version::branch("feature"),
        Version::branch("default"),
        Version::branch("stable"),
    ];
    let actual: Vec<_> = versions.iter().map(|v| v.version().clone()).collect();
    assert_eq!(actual, expected);
    assert_eq!(versions.iter().filter(|v| v.version().is_default()).count(), 1);

    assert_eq!(runner.count("clone"), 1);
    assert_eq!(runner.count("pull"), 0, "a fresh clone needs no pull");
    source.list_versions()?;
    assert_eq!(runner.count("tags"), 1);
    Ok(())
}

#[test]
fn test_hg_existing_mirror_is_synced_first() -> Result<()> {
    init_logging();
    let temp = Utf8TempDir::with_prefix("vcs-source-scripted-")?;
    fs::create_dir_all(temp.path().join("mirror/.hg"))?;
    let runner = Arc::new(
        ScriptedRunner::new()
            .on(&["pull"], "")
            .on(&["update"], "")
            .on(&["tags"], "")
            .on(&["bookmarks"], "no bookmarks set\n")
            .on(&["branches"], format!("default                        9:{R1}\n")),
    );
    let source = source(SourceKind::Hg, &runner, &temp)?;

    let versions = source.list_versions()?;
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].version(), &Version::default_branch("default"));
    assert_eq!(runner.count("clone"), 0);
    assert_eq!(runner.count("pull"), 1);
    assert_eq!(runner.count("update"), 1);
    assert!(source.mirror().is_synced());
    assert!(source.existence().found().contains(Existence::IN_CACHE));
    Ok(())
}

#[test]
fn test_hg_nothing_listed_is_no_versions() -> Result<()> {
    init_logging();
    let temp = Utf8TempDir::with_prefix("vcs-source-scripted-")?;
    fs::create_dir_all(temp.path().join("mirror/.hg"))?;
    let null = "0".repeat(40);
    let runner = Arc::new(
        ScriptedRunner::new()
            .on(&["pull"], "")
            .on(&["update"], "")
            .on(&["tags"], format!("tip                               -1:{null}\n"))
            .on(&["bookmarks"], "no bookmarks set\n")
            .on(&["branches"], ""),
    );
    let source = source(SourceKind::Hg, &runner, &temp)?;

    let err = source.list_versions().unwrap_err();
    assert!(matches!(err, SourceError::NoVersions { .. }), "{err:?}");
    source.list_versions().unwrap_err();
    assert_eq!(runner.count("tags"), 2, "an empty listing is not cached");
    Ok(())
}

#[test]
fn test_hg_update_failure_is_local() -> Result<()> {
    init_logging();
    let temp = Utf8TempDir::with_prefix("vcs-source-scripted-")?;
    fs::create_dir_all(temp.path().join("mirror/.hg"))?;
    let runner = Arc::new(
        ScriptedRunner::new()
            .on(&["pull"], "")
            .fail(&["update"], "abort: uncommitted changes"),
    );
    let source = source(SourceKind::Hg, &runner, &temp)?;

    let err = source.update().unwrap_err();
    assert!(matches!(err, SourceError::Local { .. }), "{err:?}");
    let output = err.process_error().map(ToString::to_string).unwrap_or_default();
    assert!(output.contains("uncommitted changes"), "{output}");
    assert!(!source.mirror().is_synced());
    Ok(())
}

#[test]
fn test_hg_export_copies_working_copy() -> Result<()> {
    init_logging();
    let temp = Utf8TempDir::with_prefix("vcs-source-scripted-")?;
    let mirror = temp.path().join("mirror");
    fs::create_dir_all(mirror.join(".hg"))?;
    fs::write(mirror.join("README"), "hello")?;
    let runner = Arc::new(
        ScriptedRunner::new()
            .on(&["pull"], "")
            .on(&["update"], ""),
    );
    let source = source(SourceKind::Hg, &runner, &temp)?;

    let dest = temp.path().join("out");
    source.export_version_to(&Version::branch("stable"), &dest)?;
    assert_eq!(fs::read_to_string(dest.join("README"))?, "hello");
    assert!(dest.join(".hg").is_dir(), "metadata is copied too");

    let switch = runner
        .calls()
        .into_iter()
        .find(|c| c.get_args().len() == 3 && c.get_args()[0] == "update")
        .expect("switched the working copy");
    assert_eq!(switch.get_args(), ["update", "-r", "stable"]);
    assert_eq!(runner.count("pull"), 1, "unsynced mirror is synced first");
    Ok(())
}

// ---------------------------------------------------------------------------
// Bazaar
// ---------------------------------------------------------------------------

#[test]
fn test_bzr_tags_and_default_branch() -> Result<()> {
    init_logging();
    let temp = Utf8TempDir::with_prefix("vcs-source-scripted-")?;
    let runner = Arc::new(
        ScriptedRunner::new()
            .on(&["branch"], "")
            .on(
                &["tags"],
                "v1.0.0               jdoe@example.com-20160101000000-aaaa\n\
                 beta                 jdoe@example.com-20160102000000-bbbb\n",
            )
            .on(&["version-info"], "jdoe@example.com-20160103000000-cccc\n"),
    );
    let source = source(SourceKind::Bzr, &runner, &temp)?;

    let versions = source.list_versions()?;
    assert_eq!(versions.len(), 3);
    assert!(versions[0].version().semver().is_some());
    assert_eq!(versions[1].version(), &Version::plain("beta"));
    assert_eq!(versions[2].version(), &Version::default_branch("(default)"));
    assert_eq!(
        versions[2].revision().as_str(),
        "jdoe@example.com-20160103000000-cccc"
    );

    let branch = runner.find("branch").expect("mirror was branched");
    assert_eq!(
        branch.get_args(),
        ["branch", "https://example.com/repo", source.mirror().path().as_str()]
    );
    assert!(source.mirror().exists());
    Ok(())
}

#[test]
fn test_bzr_branch_without_commits_has_no_tip() -> Result<()> {
    init_logging();
    let temp = Utf8TempDir::with_prefix("vcs-source-scripted-")?;
    let runner = Arc::new(
        ScriptedRunner::new()
            .on(&["branch"], "")
            .on(&["tags"], "v0.1.0               jdoe@example.com-20160101000000-aaaa\n")
            .on(&["version-info"], "null:\n"),
    );
    let source = source(SourceKind::Bzr, &runner, &temp)?;

    let versions = source.list_versions()?;
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].version().name(), "v0.1.0");
    assert!(versions.iter().all(|v| v.revision().as_str() != "null:"));
    Ok(())
}

#[test]
fn test_bzr_empty_branch_is_no_versions() -> Result<()> {
    init_logging();
    let temp = Utf8TempDir::with_prefix("vcs-source-scripted-")?;
    let runner = Arc::new(
        ScriptedRunner::new()
            .on(&["branch"], "")
            .on(&["tags"], "")
            .on(&["version-info"], "null:\n"),
    );
    let source = source(SourceKind::Bzr, &runner, &temp)?;

    let err = source.list_versions().unwrap_err();
    assert!(matches!(err, SourceError::NoVersions { .. }), "{err:?}");
    Ok(())
}

#[test]
fn test_bzr_update_failure_is_remote() -> Result<()> {
    init_logging();
    let temp = Utf8TempDir::with_prefix("vcs-source-scripted-")?;
    fs::create_dir_all(temp.path().join("mirror/.bzr"))?;
    let runner = Arc::new(
        ScriptedRunner::new().fail(&["pull"], "bzr: ERROR: Connection error"),
    );
    let source = source(SourceKind::Bzr, &runner, &temp)?;

    let err = source.update().unwrap_err();
    assert!(
        matches!(&err, SourceError::Remote { remote, .. } if remote == "https://example.com/repo"),
        "{err:?}"
    );
    assert_eq!(runner.count("update"), 0, "update is not attempted after pull fails");
    Ok(())
}
