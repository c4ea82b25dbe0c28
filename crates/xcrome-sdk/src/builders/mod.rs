//! Build automation for CocoaPods umbrella targets.
//!
//! This module turns a [`Project`](crate::Project) snapshot into prebuilt
//! `.xcframework` archives staged in a single directory.
//!
//! ## Overview
//!
//! A run moves through these phases:
//!
//! 1. **SDK resolution** - Each platform maps to an ordered list of SDK variants
//! 2. **Compilation** - `xcodebuild` runs per SDK, either per scheme or for all targets
//! 3. **Merging** - Module bundles are hoisted to `{cfg}-{sdk}/{module}.framework`
//! 4. **Assembly** - `xcodebuild -create-xcframework` combines the variants of each module
//! 5. **Staging** - Archives, vendored binaries and resources are copied to the destination
//! 6. **dSYM relocation** - Debug symbols are collected per SDK
//!
//! ## Phases
//!
//! | Module | Entry point |
//! |--------|-------------|
//! | `matrix` | [`SdkMatrix`] |
//! | `xcodebuild` | [`BuildDriver`], [`BuildStrategy`] |
//! | `merge` | [`merge_frameworks`] |
//! | `xcframework` | [`ArchiveAssembler`] |
//! | `staging` | [`stage`] |
//! | `dsym` | [`relocate_debug_symbols`] |
//! | `hooks` | [`Hooks`] |
//!
//! [`FrameworkBuilder`] runs all of them in order.
//!
//! ## Builder Options
//!
//! - **`dry_run(bool)`** - Log xcodebuild invocations without running them
//! - **`output_dir(path)`** - Staging destination (default: `Rome/` next to `Pods/`)
//! - **`build_dir(path)`** - Transient build root (default: `build/`)
//! - **`dsym_dir(path)`** - Debug symbol destination (default: `dSYM/`)
//! - **`runner(impl ToolRunner)`** - Replace the process runner
//!
//! ## Example
//!
//! ```no_run
//! use xcrome_sdk::builders::{FrameworkBuilder, Hooks};
//! use xcrome_sdk::{BuildOptions, Project};
//!
//! let project = Project::load("xcrome-project.json".as_ref())?;
//! let options = BuildOptions {
//!     configuration: "Release".to_string(),
//!     build_ios_catalyst: true,
//!     ..BuildOptions::default()
//! };
//!
//! let hooks = Hooks::new().post_compile(|project| {
//!     println!("staged frameworks for {}", project.project_path().display());
//!     Ok(())
//! });
//!
//! let report = FrameworkBuilder::new(project, options).hooks(hooks).build()?;
//! for skipped in &report.skipped {
//!     println!("skipped {}", skipped.module);
//! }
//! # Ok::<(), xcrome_sdk::BuildError>(())
//! ```

pub mod common;
pub mod dsym;
pub mod framework;
pub mod hooks;
pub mod matrix;
pub mod merge;
pub mod staging;
pub mod xcframework;
pub mod xcodebuild;

pub use common::{DryRunRunner, Invocation, SystemRunner, ToolRunner};
pub use dsym::relocate_debug_symbols;
pub use framework::FrameworkBuilder;
pub use hooks::{Hook, Hooks};
pub use matrix::SdkMatrix;
pub use merge::merge_frameworks;
pub use staging::{StagingManifest, stage};
pub use xcframework::{ArchiveAssembler, ArchiveRequest, AssemblyOutcome, collect_requests};
pub use xcodebuild::{BuildDriver, BuildStep, BuildStrategy};
