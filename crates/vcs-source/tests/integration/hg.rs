// Copyright 2026 Oxide Computer Company

//! Mercurial sources against real repositories.
//!
//! These tests skip themselves if `hg` is not installed or `SKIP_HG_TESTS`
//! is set.

use crate::helpers::{init_logging, write_file};
use anyhow::Result;
use camino::Utf8Path;
use camino_tempfile::Utf8TempDir;
use std::{fs, process::Command};
use vcs_source::{SourceConfig, SourceKind};
use vcs_version::Version;

/// Returns a `Command` for hg, respecting the `$HG` environment variable.
fn hg_command() -> Command {
    let bin = std::env::var("HG").unwrap_or_else(|_| "hg".to_string());
    let mut cmd = Command::new(bin);
    cmd.env("HGPLAIN", "1");
    cmd
}

/// Returns true if hg tests should run.
fn hg_available() -> bool {
    if std::env::var("SKIP_HG_TESTS").is_ok() {
        return false;
    }
    match hg_command().arg("--version").output() {
        Ok(o) if o.status.success() => true,
        _ => {
            eprintln!("hg not available, skipping (set SKIP_HG_TESTS=1 to silence)");
            false
        }
    }
}

fn hg(dir: &Utf8Path, args: &[&str]) -> Result<String> {
    let output = hg_command()
        .args(["--config", "ui.username=Test User <test@example.com>"])
        .args(args)
        .current_dir(dir)
        .output()?;
    anyhow::ensure!(
        output.status.success(),
        "hg {} failed: {}",
        args.join(" "),
        String::from_utf8_lossy(&output.stderr)
    );
    Ok(String::from_utf8(output.stdout)?.trim().to_string())
}

#[test]
fn test_hg_list_and_export() -> Result<()> {
    init_logging();
    if !hg_available() {
        return Ok(());
    }

    let temp = Utf8TempDir::with_prefix("vcs-source-hg-")?;
    let upstream = temp.path().join("upstream");
    fs::create_dir_all(&upstream)?;
    hg(&upstream, &["init"])?;

    write_file(upstream.join("file.txt"), "one")?;
    hg(&upstream, &["add", "file.txt"])?;
    hg(&upstream, &["commit", "-m", "first"])?;
    hg(&upstream, &["tag", "v1.0.0"])?;
    write_file(upstream.join("file.txt"), "two")?;
    hg(&upstream, &["commit", "-m", "second"])?;
    hg(&upstream, &["bookmark", "@"])?;

    let source = SourceConfig::new(
        SourceKind::Hg,
        upstream.as_str(),
        temp.path().join("cache/upstream"),
    )
    .build()?;

    let versions = source.list_versions()?;
    let names: Vec<_> = versions.iter().map(|v| v.version().name()).collect();
    assert!(!names.contains(&"tip"), "{names:?}");

    let tag = versions
        .iter()
        .find(|v| v.version().name() == "v1.0.0")
        .expect("tag listed");
    assert!(tag.version().semver().is_some());

    let defaults: Vec<_> =
        versions.iter().filter(|v| v.version().is_default()).collect();
    assert_eq!(defaults.len(), 1, "{versions:?}");
    assert_eq!(defaults[0].version(), &Version::default_branch("@"));
    assert!(
        versions.iter().any(|v| v.version() == &Version::branch("default")),
        "the default named branch is demoted by @: {versions:?}"
    );

    let dest = temp.path().join("export");
    source.export_version_to(tag, &dest)?;
    assert_eq!(fs::read_to_string(dest.join("file.txt"))?, "one");
    assert!(dest.join(".hg").is_dir());
    Ok(())
}
