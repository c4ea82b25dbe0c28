//! Common utilities shared by the build phases.
//!
//! ## Features
//!
//! - **External tool seam** - [`ToolRunner`] abstracts process execution so the
//!   pipeline can run against xcodebuild, a dry-run logger, or a test double
//! - **Consistent error handling** - Failed commands surface exit status and
//!   both output streams
//! - **Bundle-safe copying** - Directory copies preserve the symlinks inside
//!   macOS framework bundles

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use crate::types::BuildError;

/// A fully-formed external tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: String,
    args: Vec<String>,
    description: String,
}

impl Invocation {
    /// Creates an invocation with no arguments.
    ///
    /// `description` is used in log lines and error messages.
    pub fn new(program: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy().into_owned())
    }

    /// Wraps the invocation as `arch -<arch> <program> <args...>`.
    pub fn pinned_to_arch(self, arch: &str) -> Self {
        let mut args = Vec::with_capacity(self.args.len() + 2);
        args.push(format!("-{}", arch));
        args.push(self.program);
        args.extend(self.args);
        Self {
            program: "arch".to_string(),
            args,
            description: self.description,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the value following `flag`, e.g. `value_of("-sdk")`.
    pub fn value_of(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    /// Returns the value of a `KEY=value` build setting override.
    pub fn setting(&self, key: &str) -> Option<&str> {
        self.args.iter().find_map(|a| {
            a.strip_prefix(key)
                .and_then(|rest| rest.strip_prefix('='))
        })
    }

    /// Shell-style rendering for logs.
    pub fn command_line(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|a| {
                if a.is_empty() || a.contains(char::is_whitespace) {
                    format!("'{}'", a)
                } else {
                    a.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

/// Executes external tool invocations.
///
/// Implementations block until the tool exits and map a non-zero exit to
/// [`BuildError::Tool`].
pub trait ToolRunner {
    fn run(&mut self, invocation: &Invocation) -> Result<(), BuildError>;
}

/// Runs invocations as child processes.
#[derive(Debug, Default)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&mut self, invocation: &Invocation) -> Result<(), BuildError> {
        debug!("Running: {}", invocation.command_line());
        run_command(invocation.to_command(), invocation.description())
    }
}

/// Logs invocations instead of running them.
#[derive(Debug, Default)]
pub struct DryRunRunner {
    recorded: Vec<Invocation>,
}

impl DryRunRunner {
    pub fn recorded(&self) -> &[Invocation] {
        &self.recorded
    }
}

impl ToolRunner for DryRunRunner {
    fn run(&mut self, invocation: &Invocation) -> Result<(), BuildError> {
        info!("[dry-run] {}", invocation.command_line());
        self.recorded.push(invocation.clone());
        Ok(())
    }
}

/// Runs an external command with consistent error handling.
///
/// Captures both stdout and stderr on failure and returns them in a
/// [`BuildError::Tool`].
pub fn run_command(mut cmd: Command, description: &str) -> Result<(), BuildError> {
    let output = cmd.output().map_err(|e| BuildError::ToolSpawn {
        description: description.to_string(),
        source: e,
    })?;

    if !output.status.success() {
        return Err(BuildError::Tool {
            description: description.to_string(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(())
}

/// Removes whatever is at `path` (file, symlink or directory tree), if anything.
pub fn remove_if_exists(path: &Path) -> Result<(), BuildError> {
    match fs::symlink_metadata(path) {
        Ok(metadata) if metadata.is_dir() => {
            fs::remove_dir_all(path).map_err(BuildError::fs("remove directory", path))
        }
        Ok(_) => fs::remove_file(path).map_err(BuildError::fs("remove file", path)),
        Err(_) => Ok(()),
    }
}

/// Copies a file or directory to `dest`, removing whatever is at `dest`
/// first.
pub fn copy_replacing(src: &Path, dest: &Path) -> Result<(), BuildError> {
    remove_if_exists(dest)?;
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(BuildError::fs("create directory", parent))?;
    }

    let metadata = fs::symlink_metadata(src).map_err(BuildError::fs("read", src))?;
    if metadata.is_dir() {
        copy_dir_recursive(src, dest)
    } else if metadata.file_type().is_symlink() {
        copy_symlink(src, dest)
    } else {
        fs::copy(src, dest).map_err(BuildError::fs("copy", src))?;
        Ok(())
    }
}

/// Recursively copies a directory, recreating symlinks rather than following
/// them.
pub fn copy_dir_recursive(src: &Path, dest: &Path) -> Result<(), BuildError> {
    fs::create_dir_all(dest).map_err(BuildError::fs("create directory", dest))?;

    for entry in fs::read_dir(src).map_err(BuildError::fs("read directory", src))? {
        let entry = entry.map_err(BuildError::fs("read entry in", src))?;
        let path = entry.path();
        let dest_path = dest.join(entry.file_name());
        let file_type = entry.file_type().map_err(BuildError::fs("stat", &path))?;

        if file_type.is_symlink() {
            copy_symlink(&path, &dest_path)?;
        } else if file_type.is_dir() {
            copy_dir_recursive(&path, &dest_path)?;
        } else {
            fs::copy(&path, &dest_path).map_err(BuildError::fs("copy", &path))?;
        }
    }

    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dest: &Path) -> Result<(), BuildError> {
    let target = fs::read_link(src).map_err(BuildError::fs("read link", src))?;
    std::os::unix::fs::symlink(&target, dest).map_err(BuildError::fs("create link", dest))?;
    Ok(())
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dest: &Path) -> Result<(), BuildError> {
    if src.is_dir() {
        copy_dir_recursive(src, dest)
    } else {
        fs::copy(src, dest).map_err(BuildError::fs("copy", src))?;
        Ok(())
    }
}

/// Drops repeated paths, keeping first occurrence order.
pub fn dedup_paths(paths: &mut Vec<PathBuf>) {
    let mut seen = HashSet::new();
    paths.retain(|p| seen.insert(p.clone()));
}
