// Copyright 2026 Oxide Computer Company

//! Running external VCS commands.

use crate::ProcessError;
use camino::{Utf8Path, Utf8PathBuf};
use std::{borrow::Cow, fmt, process::Command};
use tracing::{debug, warn};

/// A fully described invocation of a VCS binary.
///
/// Constructed by the backends and handed to a [`Runner`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VcsCommand {
    program: String,
    args: Vec<String>,
    dir: Option<Utf8PathBuf>,
    env_overrides: Vec<String>,
}

impl VcsCommand {
    /// Creates a command for `program` with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        VcsCommand {
            program: program.into(),
            args: Vec::new(),
            dir: None,
            env_overrides: Vec::new(),
        }
    }

    /// Appends an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the working directory.
    pub fn current_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    /// Adds `KEY=value` overrides to be merged into the ambient
    /// environment (see [`merge_env_lists`]).
    pub fn env_overrides<I, S>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.env_overrides.extend(overrides.into_iter().map(Into::into));
        self
    }

    /// Returns the program to run.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Returns the arguments.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Returns the working directory, if set.
    pub fn dir(&self) -> Option<&Utf8Path> {
        self.dir.as_deref()
    }

    /// Returns the environment overrides.
    pub fn get_env_overrides(&self) -> &[String] {
        &self.env_overrides
    }
}

impl fmt::Display for VcsCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// The captured output of a successful command.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Standard output.
    pub stdout: Vec<u8>,
    /// Standard error.
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    /// Creates output with the given stdout and empty stderr.
    pub fn from_stdout(stdout: impl Into<Vec<u8>>) -> Self {
        CommandOutput { stdout: stdout.into(), stderr: Vec::new() }
    }

    /// Returns stdout decoded lossily as UTF-8.
    pub fn stdout_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stdout)
    }

    /// Returns stdout followed by stderr, decoded lossily and trimmed.
    pub fn combined(&self) -> String {
        combine(&self.stdout, &self.stderr)
    }
}

fn combine(stdout: &[u8], stderr: &[u8]) -> String {
    let mut out = String::from_utf8_lossy(stdout).into_owned();
    out.push_str(&String::from_utf8_lossy(stderr));
    out.trim().to_owned()
}

/// Runs VCS commands on behalf of a source.
///
/// The default implementation, [`SystemRunner`], spawns real processes.
/// Alternative implementations can record or script invocations.
///
/// Implementations run the command synchronously and must not retry; retry
/// policy belongs to the caller.
pub trait Runner: fmt::Debug + Send + Sync {
    /// Runs `command` to completion.
    ///
    /// Returns the captured output if the command exited successfully, or a
    /// [`ProcessError`] carrying the combined output otherwise.
    fn run(&self, command: &VcsCommand) -> Result<CommandOutput, ProcessError>;
}

/// A [`Runner`] that spawns child processes with [`std::process::Command`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemRunner;

impl Runner for SystemRunner {
    fn run(&self, command: &VcsCommand) -> Result<CommandOutput, ProcessError> {
        debug!(command = %command, dir = ?command.dir(), "running VCS command");

        let mut cmd = Command::new(command.program());
        cmd.args(command.get_args());
        if let Some(dir) = command.dir() {
            cmd.current_dir(dir);
        }
        if !command.get_env_overrides().is_empty() {
            // The merged list is the ambient environment with the overrides
            // applied, so setting every entry leaves the child with exactly
            // the merged environment. Entries that are not valid UTF-8 are
            // left out of the merge and inherited untouched.
            let ambient = std::env::vars_os()
                .filter_map(|(k, v)| {
                    let (k, v) = (k.into_string().ok()?, v.into_string().ok()?);
                    Some(format!("{k}={v}"))
                })
                .collect();
            let overrides: Vec<&str> =
                command.get_env_overrides().iter().map(String::as_str).collect();
            for kv in merge_env_lists(&overrides, ambient) {
                if let Some((k, v)) = kv.split_once('=') {
                    cmd.env(k, v);
                }
            }
        }

        let output =
            cmd.output().map_err(|source| ProcessError::SpawnFailed {
                command: command.to_string(),
                dir: command.dir().map(ToOwned::to_owned),
                source,
            })?;

        if output.status.success() {
            Ok(CommandOutput { stdout: output.stdout, stderr: output.stderr })
        } else {
            let error = ProcessError::Failed {
                command: command.to_string(),
                exit_status: output.status.to_string(),
                output: combine(&output.stdout, &output.stderr),
            };
            warn!(%error, "VCS command failed");
            Err(error)
        }
    }
}

/// Merges `KEY=value` overrides into an ambient environment list.
///
/// For each override, the first ambient entry that starts with the
/// override's `KEY=` prefix is replaced; if there is none, the override is
/// appended. Order is otherwise preserved. This is a pure transform: the
/// process environment is not touched.
///
/// ```
/// use vcs_source::merge_env_lists;
///
/// let ambient = vec!["PATH=/bin".to_owned(), "GIT_ASKPASS=/usr/bin/ssh-askpass".to_owned()];
/// let merged = merge_env_lists(&["GIT_ASKPASS=", "GIT_TERMINAL_PROMPT=0"], ambient);
/// assert_eq!(merged, ["PATH=/bin", "GIT_ASKPASS=", "GIT_TERMINAL_PROMPT=0"]);
/// ```
pub fn merge_env_lists(overrides: &[&str], mut ambient: Vec<String>) -> Vec<String> {
    'next: for kv in overrides {
        let key = match kv.find('=') {
            Some(idx) => &kv[..=idx],
            None => kv,
        };
        for existing in ambient.iter_mut() {
            if existing.starts_with(key) {
                *existing = (*kv).to_owned();
                continue 'next;
            }
        }
        ambient.push((*kv).to_owned());
    }
    ambient
}
