//! End-to-end build pipeline.
//!
//! [`FrameworkBuilder`] drives a run through its phases in a fixed order:
//!
//! 1. `pre_compile` hook
//! 2. Optional clean of the build root
//! 3. xcodebuild for every platform, SDK and target, merging module bundles
//!    after each step
//! 4. Build root check
//! 5. XCFramework assembly (or merged bundle collection in frameworks mode)
//! 6. Staging into the destination
//! 7. Debug symbol relocation
//! 8. `post_compile` hook
//!
//! Any error aborts the run where it happens. A failed build step therefore
//! leaves the destination untouched.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::{debug, info};

use super::common::{DryRunRunner, SystemRunner, ToolRunner, remove_if_exists};
use super::dsym::relocate_debug_symbols;
use super::hooks::Hooks;
use super::matrix::SdkMatrix;
use super::merge::merge_frameworks;
use super::staging::{StagingManifest, stage};
use super::xcframework::{ArchiveAssembler, AssemblyOutcome, collect_requests};
use super::xcodebuild::{BuildDriver, BuildStep};
use crate::project::Project;
use crate::types::{BuildError, BuildLayout, BuildOptions, BuildReport, Platform, StagingMode};

/// Builds every umbrella target of a project into xcframeworks.
///
/// # Example
///
/// ```no_run
/// use xcrome_sdk::{BuildOptions, FrameworkBuilder, Project};
///
/// let project = Project::load("Pods/xcrome-project.json".as_ref())?;
/// let report = FrameworkBuilder::new(project, BuildOptions::default())
///     .output_dir("Frameworks")
///     .build()?;
/// println!("{} archive(s)", report.archives.len());
/// # Ok::<(), xcrome_sdk::BuildError>(())
/// ```
pub struct FrameworkBuilder {
    project: Project,
    options: BuildOptions,
    layout: BuildLayout,
    hooks: Hooks,
    runner: Option<Box<dyn ToolRunner>>,
    dry_run: bool,
}

impl FrameworkBuilder {
    /// Creates a builder using the default layout next to the sandbox root.
    pub fn new(project: Project, options: BuildOptions) -> Self {
        let layout = BuildLayout::for_project(&project);
        Self {
            project,
            options,
            layout,
            hooks: Hooks::default(),
            runner: None,
            dry_run: false,
        }
    }

    pub fn layout(mut self, layout: BuildLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Overrides the transient build root (`SYMROOT`).
    pub fn build_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.layout.build_root = dir.into();
        self
    }

    /// Overrides the staging destination.
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.layout.destination = dir.into();
        self
    }

    pub fn dsym_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.layout.dsym_destination = dir.into();
        self
    }

    pub fn hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Replaces the process runner. Defaults to [`SystemRunner`].
    pub fn runner(mut self, runner: impl ToolRunner + 'static) -> Self {
        self.runner = Some(Box::new(runner));
        self
    }

    /// Logs every external invocation instead of running it.
    ///
    /// Nothing on disk is touched and hooks are not run.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    pub fn build_layout(&self) -> &BuildLayout {
        &self.layout
    }

    /// Every build step of a run, in execution order.
    pub fn plan(&self) -> Vec<BuildStep> {
        let matrix = SdkMatrix::new(&self.options);
        let driver = BuildDriver::new(
            self.project.project_path(),
            &self.layout.build_root,
            &self.options,
        );

        let mut steps = Vec::new();
        for platform in self.project.platforms() {
            for sdk in matrix.for_platform(platform) {
                let targets: Vec<_> = self
                    .project
                    .buildable_targets(platform)
                    .filter(|t| matrix.includes(sdk, t.label()))
                    .collect();
                steps.extend(driver.plan(sdk, &targets));
            }
        }
        steps
    }

    /// Runs the whole pipeline.
    pub fn build(mut self) -> Result<BuildReport, BuildError> {
        let mut runner: Box<dyn ToolRunner> = if self.dry_run {
            Box::new(DryRunRunner::default())
        } else {
            self.runner.take().unwrap_or_else(|| Box::new(SystemRunner))
        };
        self.run_with(runner.as_mut())
    }

    fn run_with(&self, runner: &mut dyn ToolRunner) -> Result<BuildReport, BuildError> {
        let mut report = BuildReport {
            dry_run: self.dry_run,
            ..BuildReport::default()
        };
        let configuration = self.options.configuration.as_str();

        if !self.dry_run {
            self.hooks.run_pre(&self.project)?;
            if self.options.clean_build_root {
                info!("[*] Cleaning {}", self.layout.build_root.display());
                remove_if_exists(&self.layout.build_root)?;
            }
        }

        let steps = self.plan();
        let driver = BuildDriver::new(
            self.project.project_path(),
            &self.layout.build_root,
            &self.options,
        );
        for step in &steps {
            driver.run_step(runner, step)?;
            report.invocations += 1;
            if !self.dry_run {
                self.merge_step(step, configuration)?;
            }
        }

        if !self.dry_run && !steps.is_empty() && !self.layout.build_root.is_dir() {
            return Err(BuildError::MissingBuildRoot(self.layout.build_root.clone()));
        }

        match self.options.mode {
            StagingMode::Xcframework => self.assemble(runner, &mut report)?,
            StagingMode::Frameworks => report.archives = self.merged_bundles()?,
        }

        if self.dry_run {
            info!(
                "[dry-run] {} invocation(s); staging, dSYM relocation and hooks skipped",
                report.invocations
            );
            return Ok(report);
        }

        let manifest = StagingManifest::from_project(&self.project, report.archives.clone());
        report.staged = stage(&self.layout.destination, &manifest)?;

        if self.options.dsym {
            report.debug_symbols = relocate_debug_symbols(&self.layout, configuration)?;
        }

        self.hooks.run_post(&self.project)?;
        Ok(report)
    }

    fn merge_step(&self, step: &BuildStep, configuration: &str) -> Result<(), BuildError> {
        for label in &step.targets {
            let Some(target) = self.project.target(label) else {
                continue;
            };
            merge_frameworks(&self.layout, target, &[step.sdk], configuration)?;
        }
        Ok(())
    }

    fn assemble(
        &self,
        runner: &mut dyn ToolRunner,
        report: &mut BuildReport,
    ) -> Result<(), BuildError> {
        let matrix = SdkMatrix::new(&self.options);
        let assembler = ArchiveAssembler::new(
            &self.layout,
            &self.options.configuration,
            self.options.dsym,
        );

        for request in collect_requests(&self.project, &matrix) {
            if self.dry_run {
                runner.run(&assembler.invocation(&request))?;
                report.invocations += 1;
                report.archives.push(assembler.output_path(&request));
                continue;
            }
            match assembler.assemble(runner, &request)? {
                AssemblyOutcome::Assembled(path) => {
                    report.invocations += 1;
                    report.archives.push(path);
                }
                AssemblyOutcome::Skipped(skipped) => report.skipped.push(skipped),
            }
        }
        Ok(())
    }

    /// Merged bundles for frameworks mode, SDK by SDK in merge order so each
    /// platform's device bundles come last.
    ///
    /// Bundles are staged flat, so a module merged for two platforms would
    /// overwrite one platform with the other. That is a configuration error.
    fn merged_bundles(&self) -> Result<Vec<PathBuf>, BuildError> {
        let matrix = SdkMatrix::new(&self.options);
        let configuration = self.options.configuration.as_str();
        let mut bundles = Vec::new();
        let mut owners: BTreeMap<String, Platform> = BTreeMap::new();

        for platform in self.project.platforms() {
            for sdk in matrix.for_platform(platform) {
                for target in self.project.buildable_targets(platform) {
                    if !matrix.includes(sdk, target.label()) {
                        continue;
                    }
                    for module in target.modules() {
                        let path = self
                            .layout
                            .merged_framework(configuration, sdk, &module.module);
                        if !self.dry_run && !path.is_dir() {
                            debug!("No merged bundle at {}", path.display());
                            continue;
                        }
                        let owner = *owners.entry(module.module.clone()).or_insert(platform);
                        if owner != platform {
                            return Err(BuildError::Config(format!(
                                "{}.framework is built for both {} and {}, but frameworks mode \
                                 stages bundles flat. Use the xcframework mode to package it.",
                                module.module, owner, platform
                            )));
                        }
                        if !bundles.contains(&path) {
                            bundles.push(path);
                        }
                    }
                }
            }
        }
        Ok(bundles)
    }
}

impl std::fmt::Debug for FrameworkBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameworkBuilder")
            .field("project", &self.project.project_path())
            .field("options", &self.options)
            .field("layout", &self.layout)
            .field("hooks", &self.hooks)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}
