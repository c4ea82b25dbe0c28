//! Configuration file support for xcrome.
//!
//! This module provides support for `xcrome.toml` configuration files so that
//! build options don't have to be repeated on every invocation.
//!
//! ## Configuration File Location
//!
//! The configuration file is searched for in the following order:
//! 1. Current working directory (`./xcrome.toml`)
//! 2. Parent directories (up to the repository root or filesystem root)
//!
//! Relative paths in the file are resolved against the directory containing it.
//!
//! ## Example Configuration
//!
//! ```toml
//! [build]
//! configuration = "Release"
//! catalyst = true
//! skip_catalyst = ["Pods-WidgetExtension"]
//!
//! [paths]
//! snapshot = "Pods/xcrome-project.json"
//! output_dir = "Frameworks"
//!
//! [hooks]
//! post_compile = "./scripts/upload-frameworks.sh"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use xcrome_sdk::{BuildScope, StagingMode};

/// The default configuration file name.
pub const CONFIG_FILE_NAME: &str = "xcrome.toml";

/// Root configuration structure for `xcrome.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct XcromeConfig {
    /// Build options.
    pub build: BuildSection,

    /// Input and output locations.
    pub paths: PathsSection,

    /// Shell commands run before and after the build.
    pub hooks: HooksSection,
}

/// `[build]`: every key is optional; unset keys fall back to the CLI
/// defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSection {
    /// Build configuration name (default: "Debug").
    pub configuration: Option<String>,

    /// Also build iOS targets for Mac Catalyst.
    pub catalyst: Option<bool>,

    /// Umbrella target labels never built for Mac Catalyst.
    pub skip_catalyst: Vec<String>,

    pub bitcode: Option<bool>,

    /// Generate and relocate dSYMs (default: true).
    pub dsym: Option<bool>,

    /// Run xcodebuild under `arch -x86_64`.
    pub x86_64: Option<bool>,

    /// Delete the build directory before building.
    pub clean: Option<bool>,

    pub scope: Option<BuildScope>,

    pub mode: Option<StagingMode>,
}

/// `[paths]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsSection {
    /// Project snapshot exported by the package manager.
    pub snapshot: Option<PathBuf>,

    /// Transient build root (default: `build/` next to the sandbox).
    pub build_dir: Option<PathBuf>,

    /// Staging destination (default: `Rome/` next to the sandbox).
    pub output_dir: Option<PathBuf>,

    /// dSYM destination (default: `dSYM/` next to the sandbox).
    pub dsym_dir: Option<PathBuf>,
}

/// `[hooks]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HooksSection {
    pub pre_compile: Option<String>,
    pub post_compile: Option<String>,
}

impl XcromeConfig {
    /// Loads configuration from the specified file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: XcromeConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    /// Attempts to find and load configuration from the current directory
    /// or any parent directory.
    ///
    /// # Returns
    ///
    /// * `Ok(Some((config, path)))` - Found and loaded configuration with its path
    /// * `Ok(None)` - No configuration file found
    /// * `Err` - If a config file was found but couldn't be parsed
    pub fn discover() -> Result<Option<(Self, PathBuf)>> {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;
        Self::discover_from(&cwd)
    }

    /// Attempts to find and load configuration starting from the specified directory.
    pub fn discover_from(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);

            if config_path.is_file() {
                let config = Self::load_from_file(&config_path)?;
                return Ok(Some((config, config_path)));
            }

            // Stop at repository root or filesystem root
            if current.join(".git").exists() || !current.pop() {
                break;
            }
        }

        Ok(None)
    }

    /// Generates a starter configuration file as a formatted TOML string.
    ///
    /// Every option is present, commented out, at its default value.
    pub fn generate_starter_toml() -> String {
        r#"# xcrome configuration file
# CLI flags override these settings when provided.

[build]
# Build configuration passed to xcodebuild (default: Debug)
configuration = "Debug"

# Also build iOS targets for Mac Catalyst (default: false)
# catalyst = true

# Umbrella targets that never get a Mac Catalyst build
# skip_catalyst = ["Pods-WidgetExtension"]

# Append BITCODE_GENERATION_MODE=bitcode (default: false)
# bitcode = false

# Generate dSYMs and relocate them to dsym_dir (default: true)
# dsym = true

# Run xcodebuild under `arch -x86_64` (default: false)
# x86_64 = false

# Delete the build directory before building (default: false)
# clean = false

# "per-target" builds one scheme per umbrella target,
# "all-targets" builds the whole project once per SDK (default: per-target)
# scope = "per-target"

# "xcframework" assembles one archive per module,
# "frameworks" stages the merged per-SDK bundles (default: xcframework)
# mode = "xcframework"

[paths]
# Project snapshot exported by the package manager
snapshot = "Pods/xcrome-project.json"

# Defaults are build/, Rome/ and dSYM/ next to the Pods directory
# build_dir = "build"
# output_dir = "Rome"
# dsym_dir = "dSYM"

[hooks]
# Shell commands run with `sh -c`. XCROME_PROJECT_PATH and
# XCROME_SANDBOX_ROOT are set in their environment.
# pre_compile = "echo building $XCROME_PROJECT_PATH"
# post_compile = "./scripts/upload-frameworks.sh"
"#
        .to_string()
    }
}

/// Configuration resolver that merges config file values with CLI arguments.
///
/// CLI arguments always take precedence over config file values.
#[derive(Debug, Default)]
pub struct ConfigResolver {
    /// Loaded configuration, if any.
    pub config: Option<XcromeConfig>,

    /// Path to the loaded config file, if any.
    pub config_path: Option<PathBuf>,
}

impl ConfigResolver {
    /// Creates a new resolver by discovering and loading configuration.
    pub fn new() -> Result<Self> {
        match XcromeConfig::discover()? {
            Some((config, path)) => Ok(Self {
                config: Some(config),
                config_path: Some(path),
            }),
            None => Ok(Self::default()),
        }
    }

    /// Directory relative config paths resolve against.
    fn base_dir(&self) -> Option<&Path> {
        self.config_path.as_deref().and_then(Path::parent)
    }

    /// Resolves a CLI value, using config as fallback.
    ///
    /// The resolved value prefers CLI over config over default.
    pub fn resolve<T, F>(&self, cli_value: Option<T>, config_getter: F, default: T) -> T
    where
        F: FnOnce(&XcromeConfig) -> Option<T>,
    {
        cli_value
            .or_else(|| self.config.as_ref().and_then(config_getter))
            .unwrap_or(default)
    }

    /// Resolves a path option. Config paths are made relative to the config
    /// file; CLI paths are used as given.
    pub fn resolve_path<F>(&self, cli_value: Option<PathBuf>, config_getter: F) -> Option<PathBuf>
    where
        F: FnOnce(&PathsSection) -> Option<&PathBuf>,
    {
        if cli_value.is_some() {
            return cli_value;
        }
        let path = self.config.as_ref().and_then(|c| config_getter(&c.paths))?;
        match self.base_dir() {
            Some(base) if path.is_relative() => Some(base.join(path)),
            _ => Some(path.clone()),
        }
    }

    /// Catalyst exclusions from both sources, CLI entries first.
    pub fn skip_catalyst(&self, cli_values: Vec<String>) -> Vec<String> {
        let mut labels = cli_values;
        if let Some(config) = &self.config {
            for label in &config.build.skip_catalyst {
                if !labels.contains(label) {
                    labels.push(label.clone());
                }
            }
        }
        labels
    }

    pub fn hooks(&self) -> HooksSection {
        self.config
            .as_ref()
            .map(|c| c.hooks.clone())
            .unwrap_or_default()
    }

    /// Directory hook commands run in.
    pub fn hook_dir(&self) -> Option<PathBuf> {
        self.base_dir().map(Path::to_path_buf)
    }
}
