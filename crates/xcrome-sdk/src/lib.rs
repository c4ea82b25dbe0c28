//! # xcrome-sdk
//!
//! Prebuilt xcframeworks for CocoaPods dependencies.
//!
//! `xcrome-sdk` compiles every umbrella target of a CocoaPods project for each
//! SDK its platform supports, packages each module into an `.xcframework`,
//! and stages the archives together with vendored binaries and resources in
//! one directory. Debug symbols are collected alongside.
//!
//! ## Quick Start
//!
//! 1. Export a project snapshot (see [`project`] for the format).
//!
//! 2. Build:
//!
//! ```no_run
//! use xcrome_sdk::{BuildOptions, FrameworkBuilder, Project};
//!
//! let project = Project::load("xcrome-project.json".as_ref())?;
//! let report = FrameworkBuilder::new(project, BuildOptions::default()).build()?;
//! for archive in &report.archives {
//!     println!("{}", archive.display());
//! }
//! # Ok::<(), xcrome_sdk::BuildError>(())
//! ```
//!
//! ## Architecture
//!
//! - **Project**: An immutable snapshot of the umbrella targets to build
//! - **Builders**: SDK resolution, xcodebuild, merging, assembly and staging
//! - **Types**: Options, layout, errors and the run report
//!
//! ## Platform Matrix
//!
//! | Platform | SDK variants, in merge order |
//! |----------|------------------------------|
//! | `ios` | `maccatalyst` (opt-in), `iphonesimulator`, `iphoneos` |
//! | `osx` | `macosx` |
//! | `tvos` | `appletvsimulator`, `appletvos` |
//! | `watchos` | `watchsimulator`, `watchos` |

pub mod builders;
pub mod project;
pub mod types;

pub use builders::{FrameworkBuilder, Hooks, SdkMatrix, ToolRunner};
pub use project::{BuildTarget, ModuleDescriptor, Project};
pub use types::{
    BuildError, BuildLayout, BuildOptions, BuildReport, BuildScope, HookError, Platform, Sdk,
    SdkKind, SkippedModule, StagingMode,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
