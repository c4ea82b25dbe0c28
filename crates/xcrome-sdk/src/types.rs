//! Core types for xcrome-sdk.
//!
//! This module defines the fundamental types used throughout the SDK:
//!
//! - [`BuildError`] - Error types for every build phase
//! - [`Platform`] / [`Sdk`] / [`SdkKind`] - The platform and SDK vocabulary
//! - [`BuildOptions`] / [`BuildScope`] / [`StagingMode`] - Run configuration
//! - [`BuildLayout`] - Where build products, archives and debug symbols live
//! - [`BuildReport`] / [`SkippedModule`] - Output from a run

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::project::{ModuleDescriptor, Project};

/// Error returned by caller-supplied lifecycle hooks.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Error types for xcrome-sdk operations.
///
/// Every variant is fatal for the run. Expected absences (a module that was
/// not produced for some SDK) are not errors; they are recorded in the
/// [`BuildReport`] instead.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// Invalid or missing configuration, such as an unknown platform name or
    /// an unreadable project snapshot.
    #[error("configuration error: {0}")]
    Config(String),

    /// An external tool (xcodebuild, arch) exited with a non-zero status.
    ///
    /// Both output streams are captured so the caller can surface them.
    #[error(
        "{description} failed.\n\nExit status: {}\n\nStdout:\n{stdout}\n\nStderr:\n{stderr}",
        .code.map(|c| c.to_string()).unwrap_or_else(|| "terminated by signal".to_string())
    )]
    Tool {
        description: String,
        /// Exit code, `None` when the process was killed by a signal.
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    /// An external tool could not be started at all.
    #[error("Failed to start {description}.\n\nError: {source}\n\nEnsure the tool is installed and available on PATH.")]
    ToolSpawn {
        description: String,
        #[source]
        source: std::io::Error,
    },

    /// The build phase finished but produced no build directory.
    #[error(
        "The build directory was not found in the expected location: {0}\n\n\
         xcodebuild reported success but wrote no products. Check the project's SYMROOT settings."
    )]
    MissingBuildRoot(PathBuf),

    /// A lifecycle hook returned an error.
    #[error("{stage} hook failed: {source}")]
    Hook {
        stage: &'static str,
        #[source]
        source: HookError,
    },

    /// A filesystem operation on a known path failed.
    #[error("Failed to {action} {}: {source}", path.display())]
    Filesystem {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An I/O error without path context.
    #[error("I/O error: {0}. Check file paths and permissions")]
    Io(#[from] std::io::Error),

    /// The project snapshot or a report could not be (de)serialized.
    #[error("serialization error: {0}. Check JSON validity")]
    Serialization(#[from] serde_json::Error),
}

impl BuildError {
    /// Returns a closure that wraps an [`std::io::Error`] with the action and
    /// path that produced it, for use with `map_err`.
    pub(crate) fn fs(action: &'static str, path: &Path) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.to_path_buf();
        move |source| BuildError::Filesystem {
            action,
            path,
            source,
        }
    }
}

/// Platform of a build target.
///
/// The snapshot names are the ones CocoaPods uses: `ios`, `osx`, `tvos`,
/// `watchos`. `macos` is accepted as an alias for `osx`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Platform {
    /// iPhone and iPad.
    Ios,
    /// macOS desktop.
    Osx,
    /// Apple TV.
    Tvos,
    /// Apple Watch.
    Watchos,
}

impl Platform {
    /// All known platforms.
    pub const ALL: [Platform; 4] = [
        Platform::Ios,
        Platform::Osx,
        Platform::Tvos,
        Platform::Watchos,
    ];

    /// Returns the snapshot name of the platform.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Ios => "ios",
            Platform::Osx => "osx",
            Platform::Tvos => "tvos",
            Platform::Watchos => "watchos",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ios" => Ok(Platform::Ios),
            "osx" | "macos" => Ok(Platform::Osx),
            "tvos" => Ok(Platform::Tvos),
            "watchos" => Ok(Platform::Watchos),
            _ => Err(BuildError::Config(format!(
                "Platform '{}' has no destination configured.\n\n\
                 Supported platforms: ios, osx, tvos, watchos",
                s
            ))),
        }
    }
}

impl TryFrom<String> for Platform {
    type Error = BuildError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Platform> for String {
    fn from(platform: Platform) -> Self {
        platform.as_str().to_string()
    }
}

/// Broad category of an SDK, which decides how xcodebuild is addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdkKind {
    /// Physical device SDK (`iphoneos`, `appletvos`, `watchos`).
    Device,
    /// Simulator SDK.
    Simulator,
    /// The macOS SDK for desktop targets.
    Desktop,
    /// Mac Catalyst: an iOS target built for macOS. Needs `-destination`.
    CrossCompile,
}

/// One buildable SDK variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sdk {
    MacCatalyst,
    IphoneSimulator,
    IphoneOs,
    MacOsx,
    AppleTvSimulator,
    AppleTvOs,
    WatchSimulator,
    WatchOs,
}

impl Sdk {
    /// The SDK identifier passed to `xcodebuild -sdk`, also used as the
    /// suffix of the products directory.
    pub fn as_str(&self) -> &'static str {
        match self {
            Sdk::MacCatalyst => "maccatalyst",
            Sdk::IphoneSimulator => "iphonesimulator",
            Sdk::IphoneOs => "iphoneos",
            Sdk::MacOsx => "macosx",
            Sdk::AppleTvSimulator => "appletvsimulator",
            Sdk::AppleTvOs => "appletvos",
            Sdk::WatchSimulator => "watchsimulator",
            Sdk::WatchOs => "watchos",
        }
    }

    /// Generic destination string for `xcodebuild -destination`.
    pub fn destination(&self) -> &'static str {
        match self {
            Sdk::MacCatalyst => "generic/platform=macOS,variant=Mac Catalyst",
            Sdk::IphoneSimulator => "generic/platform=iOS Simulator",
            Sdk::IphoneOs => "generic/platform=iOS",
            Sdk::MacOsx => "generic/platform=macOS",
            Sdk::AppleTvSimulator => "generic/platform=tvOS Simulator",
            Sdk::AppleTvOs => "generic/platform=tvOS",
            Sdk::WatchSimulator => "generic/platform=watchOS Simulator",
            Sdk::WatchOs => "generic/platform=watchOS",
        }
    }

    pub fn kind(&self) -> SdkKind {
        match self {
            Sdk::MacCatalyst => SdkKind::CrossCompile,
            Sdk::IphoneSimulator | Sdk::AppleTvSimulator | Sdk::WatchSimulator => {
                SdkKind::Simulator
            }
            Sdk::IphoneOs | Sdk::AppleTvOs | Sdk::WatchOs => SdkKind::Device,
            Sdk::MacOsx => SdkKind::Desktop,
        }
    }

    pub fn is_cross_compile(&self) -> bool {
        self.kind() == SdkKind::CrossCompile
    }

    /// Name of the directory xcodebuild writes products to for this SDK.
    ///
    /// macOS products carry no SDK suffix: `Debug/` rather than `Debug-macosx/`.
    pub fn products_dir_name(&self, configuration: &str) -> String {
        match self.kind() {
            SdkKind::Desktop => configuration.to_string(),
            _ => format!("{}-{}", configuration, self.as_str()),
        }
    }
}

impl fmt::Display for Sdk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the build driver addresses the Xcode project.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildScope {
    /// One `-scheme <target label>` invocation per target and SDK.
    #[default]
    PerTarget,
    /// One `-alltargets` invocation per SDK.
    ///
    /// Mac Catalyst always falls back to per-target builds.
    AllTargets,
}

/// What ends up in the destination directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StagingMode {
    /// One `.xcframework` per module, assembled from every SDK variant.
    #[default]
    Xcframework,
    /// Merged per-SDK `.framework` bundles, device builds copied last.
    Frameworks,
}

/// Options for one build run.
///
/// # Example
///
/// ```
/// use xcrome_sdk::BuildOptions;
///
/// let options = BuildOptions {
///     configuration: "Release".to_string(),
///     build_ios_catalyst: true,
///     skipping_umbrella_targets_for_catalyst: vec!["Pods-Widget".to_string()],
///     ..BuildOptions::default()
/// };
/// assert!(options.dsym);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    /// Build configuration passed to every xcodebuild invocation.
    pub configuration: String,
    /// Append `BITCODE_GENERATION_MODE=bitcode`.
    pub enable_bitcode: bool,
    /// Generate dSYMs and relocate them after staging.
    pub dsym: bool,
    /// Build iOS targets for Mac Catalyst as well.
    pub build_ios_catalyst: bool,
    /// Target labels that never get a Mac Catalyst build.
    pub skipping_umbrella_targets_for_catalyst: Vec<String>,
    /// Run xcodebuild under `arch -x86_64`.
    pub run_in_x86_64: bool,
    /// Delete the build root before building instead of reusing it.
    pub clean_build_root: bool,
    /// Per-target schemes or all targets at once.
    pub scope: BuildScope,
    /// Assemble xcframeworks or stage raw frameworks.
    pub mode: StagingMode,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            configuration: "Debug".to_string(),
            enable_bitcode: false,
            dsym: true,
            build_ios_catalyst: false,
            skipping_umbrella_targets_for_catalyst: Vec::new(),
            run_in_x86_64: false,
            clean_build_root: false,
            scope: BuildScope::PerTarget,
            mode: StagingMode::Xcframework,
        }
    }
}

/// Filesystem locations owned by a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildLayout {
    /// Transient root passed to xcodebuild as `SYMROOT`.
    pub build_root: PathBuf,
    /// Final destination, cleared before staging.
    pub destination: PathBuf,
    /// Root for relocated debug symbols.
    pub dsym_destination: PathBuf,
}

impl BuildLayout {
    /// Derives the default layout next to the project's sandbox root:
    /// `build/`, `Rome/` and `dSYM/`.
    pub fn for_project(project: &Project) -> Self {
        let sandbox = project.sandbox_root();
        let parent = sandbox
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        Self {
            build_root: parent.join("build"),
            destination: parent.join("Rome"),
            dsym_destination: parent.join("dSYM"),
        }
    }

    /// `{build_root}/{configuration}-{sdk}`
    pub fn products_dir(&self, configuration: &str, sdk: Sdk) -> PathBuf {
        self.build_root.join(sdk.products_dir_name(configuration))
    }

    /// `{build_root}/{configuration}-{sdk}/{package}/{module}.framework`
    pub fn module_framework(
        &self,
        configuration: &str,
        sdk: Sdk,
        module: &ModuleDescriptor,
    ) -> PathBuf {
        self.products_dir(configuration, sdk)
            .join(&module.package)
            .join(format!("{}.framework", module.module))
    }

    /// `{build_root}/{configuration}-{sdk}/{module}.framework`
    pub fn merged_framework(&self, configuration: &str, sdk: Sdk, module_name: &str) -> PathBuf {
        self.products_dir(configuration, sdk)
            .join(format!("{}.framework", module_name))
    }

    /// Scratch directory the archive assembler writes xcframeworks to before
    /// they are staged.
    pub fn xcframework_dir(&self) -> PathBuf {
        self.build_root.join("xcframeworks")
    }
}

/// A module whose archive was not assembled because some SDK variant is
/// missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedModule {
    /// Platforms the module is built for.
    pub platforms: Vec<Platform>,
    pub package: String,
    pub module: String,
    /// Every expected variant path that did not exist.
    pub missing: Vec<PathBuf>,
}

/// Result of a build run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReport {
    /// Archives or merged bundles handed to staging.
    pub archives: Vec<PathBuf>,
    /// Modules whose archive was skipped.
    pub skipped: Vec<SkippedModule>,
    /// Paths written into the destination directory.
    pub staged: Vec<PathBuf>,
    /// Relocated dSYM bundles.
    pub debug_symbols: Vec<PathBuf>,
    /// Number of external tool invocations issued.
    pub invocations: usize,
    /// Whether this was a dry run.
    pub dry_run: bool,
}
