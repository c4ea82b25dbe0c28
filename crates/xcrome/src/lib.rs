//! # xcrome
//!
//! Command-line tool for building CocoaPods dependencies into prebuilt
//! XCFrameworks.
//!
//! ## Overview
//!
//! `xcrome` is the CLI front end of [`xcrome_sdk`]. It handles:
//!
//! - **Building** - Runs xcodebuild for every umbrella target and SDK
//! - **Packaging** - Assembles one `.xcframework` per module and stages it
//! - **Planning** - Shows the SDK matrix and xcodebuild invocations without running them
//!
//! ## Quick Start
//!
//! ```bash
//! # Write a starter config
//! xcrome init
//!
//! # Build everything in the snapshot
//! xcrome build --project Pods/xcrome-project.json
//!
//! # Release build with Mac Catalyst, except for one extension
//! xcrome build --configuration Release --catalyst --skip-catalyst Pods-WidgetExtension
//!
//! # Preview the invocations
//! xcrome plan --catalyst
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `build` | Build, assemble and stage frameworks |
//! | `plan` | Print the SDK matrix and xcodebuild invocations |
//! | `init` | Write a starter `xcrome.toml` |
//!
//! ## Output Layout
//!
//! By default everything is written next to the `Pods/` directory:
//!
//! ```text
//! build/      # xcodebuild SYMROOT, reused between runs
//! Rome/       # staged xcframeworks, vendored binaries, resources
//! dSYM/       # debug symbols per SDK
//! ```
//!
//! ## CLI Flags
//!
//! Global flags available on all commands:
//!
//! - **`--dry-run`** - Log xcodebuild invocations without running them
//! - **`--verbose` / `-v`** - Debug-level logging (overridden by `RUST_LOG`)
//!
//! ## Modules
//!
//! - [`config`] - Configuration file support for `xcrome.toml`

#![cfg_attr(docsrs, feature(doc_cfg))]

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command as ProcessCommand;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use xcrome_sdk::{
    BuildOptions, BuildReport, BuildScope, FrameworkBuilder, HookError, Hooks, Project, SdkMatrix,
    StagingMode,
};

pub mod config;

use config::{CONFIG_FILE_NAME, ConfigResolver, XcromeConfig};

/// Builds CocoaPods umbrella targets into XCFrameworks.
#[derive(Parser, Debug)]
#[command(name = "xcrome", author, version, about = "Prebuilt XCFrameworks for CocoaPods dependencies", long_about = None)]
struct Cli {
    /// Print what would be done without actually doing it
    #[arg(long, global = true)]
    dry_run: bool,

    /// Print verbose output including all commands
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build, assemble and stage frameworks for every umbrella target.
    Build {
        #[command(flatten)]
        args: BuildArgs,
        #[arg(long, help = "Write a JSON run summary to this path")]
        summary: Option<PathBuf>,
    },
    /// Print the SDK matrix and the xcodebuild invocations a build would run.
    Plan {
        #[command(flatten)]
        args: BuildArgs,
    },
    /// Write a commented starter config file.
    Init {
        #[arg(long, default_value = CONFIG_FILE_NAME)]
        output: PathBuf,
    },
}

/// Options shared by `build` and `plan`. Unset options fall back to
/// `xcrome.toml`, then to the defaults.
#[derive(Args, Debug, Default)]
struct BuildArgs {
    #[arg(long, help = "Project snapshot JSON (default: paths.snapshot from xcrome.toml)")]
    project: Option<PathBuf>,
    #[arg(long, help = "Build configuration (default: Debug)")]
    configuration: Option<String>,
    #[arg(long, overrides_with = "no_catalyst", help = "Also build iOS targets for Mac Catalyst")]
    catalyst: bool,
    #[arg(long, overrides_with = "catalyst", help = "Do not build for Mac Catalyst")]
    no_catalyst: bool,
    #[arg(long = "skip-catalyst", value_name = "LABEL", help = "Umbrella target never built for Mac Catalyst")]
    skip_catalyst: Vec<String>,
    #[arg(long, overrides_with = "no_bitcode", help = "Append BITCODE_GENERATION_MODE=bitcode")]
    bitcode: bool,
    #[arg(long, overrides_with = "bitcode")]
    no_bitcode: bool,
    #[arg(long, overrides_with = "no_dsym", help = "Generate and relocate dSYMs (default)")]
    dsym: bool,
    #[arg(long, overrides_with = "dsym", help = "Skip dSYM generation and relocation")]
    no_dsym: bool,
    #[arg(long = "x86-64", overrides_with = "no_x86_64", help = "Run xcodebuild under `arch -x86_64`")]
    x86_64: bool,
    #[arg(long = "no-x86-64", overrides_with = "x86_64")]
    no_x86_64: bool,
    #[arg(long, overrides_with = "no_clean", help = "Delete the build directory before building")]
    clean: bool,
    #[arg(long, overrides_with = "clean", help = "Reuse the build directory (default)")]
    no_clean: bool,
    #[arg(long, value_enum)]
    scope: Option<ScopeArg>,
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,
    #[arg(long, help = "Staging destination (default: Rome/ next to Pods/)")]
    output_dir: Option<PathBuf>,
    #[arg(long, help = "xcodebuild SYMROOT (default: build/ next to Pods/)")]
    build_dir: Option<PathBuf>,
    #[arg(long, help = "dSYM destination (default: dSYM/ next to Pods/)")]
    dsym_dir: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
#[clap(rename_all = "kebab-case")]
enum ScopeArg {
    /// One `-scheme` invocation per umbrella target
    PerTarget,
    /// One `-alltargets` invocation per SDK
    AllTargets,
}

impl From<ScopeArg> for BuildScope {
    fn from(arg: ScopeArg) -> Self {
        match arg {
            ScopeArg::PerTarget => BuildScope::PerTarget,
            ScopeArg::AllTargets => BuildScope::AllTargets,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
#[clap(rename_all = "lowercase")]
enum ModeArg {
    /// One .xcframework per module
    Xcframework,
    /// Merged per-SDK .framework bundles
    Frameworks,
}

impl From<ModeArg> for StagingMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Xcframework => StagingMode::Xcframework,
            ModeArg::Frameworks => StagingMode::Frameworks,
        }
    }
}

/// Everything `build` and `plan` need, with CLI, config and defaults merged.
#[derive(Debug)]
struct ResolvedBuild {
    snapshot: PathBuf,
    options: BuildOptions,
    build_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    dsym_dir: Option<PathBuf>,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Build { args, summary } => {
            let resolver = ConfigResolver::new()?;
            if let Some(path) = &resolver.config_path {
                info!("Using config {:?}", path);
            }
            let resolved = resolve_build(&resolver, args)?;
            let project = Project::load(&resolved.snapshot)
                .with_context(|| format!("loading project snapshot {:?}", resolved.snapshot))?;

            let hooks = shell_hooks(&resolver);
            let builder = FrameworkBuilder::new(project, resolved.options.clone());
            let builder = configure_builder(builder, &resolved)
                .hooks(hooks)
                .dry_run(cli.dry_run);

            let report = builder.build()?;
            print_report(&report);

            if let Some(path) = summary {
                write_summary(&path, &report)?;
                println!("Wrote run summary to {:?}", path);
            }
            Ok(())
        }
        Command::Plan { args } => {
            let resolver = ConfigResolver::new()?;
            let resolved = resolve_build(&resolver, args)?;
            let project = Project::load(&resolved.snapshot)
                .with_context(|| format!("loading project snapshot {:?}", resolved.snapshot))?;
            print_plan(&project, &resolved)
        }
        Command::Init { output } => {
            if output.exists() {
                bail!(
                    "{:?} already exists; remove it first or pass --output to write elsewhere",
                    output
                );
            }
            if cli.dry_run {
                println!("[dry-run] Would write starter config to {:?}", output);
                return Ok(());
            }
            ensure_parent_dir(&output)?;
            fs::write(&output, XcromeConfig::generate_starter_toml())
                .with_context(|| format!("writing config {:?}", output))?;
            println!("Wrote starter config to {:?}", output);
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // A second init (e.g. from tests) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .without_time()
        .try_init();
}

fn resolve_build(resolver: &ConfigResolver, args: BuildArgs) -> Result<ResolvedBuild> {
    let snapshot = resolver.resolve_path(args.project, |p| p.snapshot.as_ref()).context(
        "No project snapshot given. Pass --project <snapshot.json> or set `snapshot` under [paths] in xcrome.toml",
    )?;

    let options = BuildOptions {
        configuration: resolver.resolve(
            args.configuration,
            |c| c.build.configuration.clone(),
            "Debug".to_string(),
        ),
        enable_bitcode: resolver.resolve(
            switch(args.bitcode, args.no_bitcode),
            |c| c.build.bitcode,
            false,
        ),
        dsym: resolver.resolve(switch(args.dsym, args.no_dsym), |c| c.build.dsym, true),
        build_ios_catalyst: resolver.resolve(
            switch(args.catalyst, args.no_catalyst),
            |c| c.build.catalyst,
            false,
        ),
        skipping_umbrella_targets_for_catalyst: resolver.skip_catalyst(args.skip_catalyst),
        run_in_x86_64: resolver.resolve(
            switch(args.x86_64, args.no_x86_64),
            |c| c.build.x86_64,
            false,
        ),
        clean_build_root: resolver.resolve(
            switch(args.clean, args.no_clean),
            |c| c.build.clean,
            false,
        ),
        scope: resolver.resolve(args.scope.map(Into::into), |c| c.build.scope, BuildScope::default()),
        mode: resolver.resolve(args.mode.map(Into::into), |c| c.build.mode, StagingMode::default()),
    };

    Ok(ResolvedBuild {
        snapshot,
        options,
        build_dir: resolver.resolve_path(args.build_dir, |p| p.build_dir.as_ref()),
        output_dir: resolver.resolve_path(args.output_dir, |p| p.output_dir.as_ref()),
        dsym_dir: resolver.resolve_path(args.dsym_dir, |p| p.dsym_dir.as_ref()),
    })
}

/// A `--flag`/`--no-flag` pair; `None` when neither was given.
fn switch(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

fn configure_builder(mut builder: FrameworkBuilder, resolved: &ResolvedBuild) -> FrameworkBuilder {
    if let Some(dir) = &resolved.build_dir {
        builder = builder.build_dir(dir);
    }
    if let Some(dir) = &resolved.output_dir {
        builder = builder.output_dir(dir);
    }
    if let Some(dir) = &resolved.dsym_dir {
        builder = builder.dsym_dir(dir);
    }
    builder
}

/// Maps `[hooks]` shell commands onto lifecycle hooks.
fn shell_hooks(resolver: &ConfigResolver) -> Hooks {
    let section = resolver.hooks();
    let dir = resolver.hook_dir();
    let mut hooks = Hooks::new();

    if let Some(command) = section.pre_compile {
        let dir = dir.clone();
        hooks = hooks.pre_compile(move |project| {
            run_shell_hook("pre_compile", &command, dir.as_deref(), project)
        });
    }
    if let Some(command) = section.post_compile {
        hooks = hooks.post_compile(move |project| {
            run_shell_hook("post_compile", &command, dir.as_deref(), project)
        });
    }
    hooks
}

fn run_shell_hook(
    stage: &str,
    command: &str,
    dir: Option<&Path>,
    project: &Project,
) -> std::result::Result<(), HookError> {
    info!("Running {} hook: {}", stage, command);
    let mut cmd = ProcessCommand::new("sh");
    cmd.arg("-c")
        .arg(command)
        .env("XCROME_PROJECT_PATH", project.project_path())
        .env("XCROME_SANDBOX_ROOT", project.sandbox_root());
    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }

    let status = cmd
        .status()
        .map_err(|e| format!("failed to start `sh -c {}`: {}", command, e))?;
    if !status.success() {
        return Err(format!("`{}` exited with {}", command, status).into());
    }
    Ok(())
}

fn print_plan(project: &Project, resolved: &ResolvedBuild) -> Result<()> {
    let matrix = SdkMatrix::new(&resolved.options);

    println!("Project: {:?}", project.project_path());
    println!("Configuration: {}", resolved.options.configuration);
    println!();
    println!("SDK matrix:");
    for target in project.targets() {
        if !target.is_buildable() {
            println!("  {} ({}): vendored artifacts only", target.label(), target.platform());
            continue;
        }
        let sdks: Vec<_> = matrix
            .for_target(target)
            .iter()
            .map(|sdk| sdk.as_str())
            .collect();
        println!("  {} ({}): {}", target.label(), target.platform(), sdks.join(", "));
    }

    let builder = configure_builder(
        FrameworkBuilder::new(project.clone(), resolved.options.clone()),
        resolved,
    );
    let steps = builder.plan();
    println!();
    println!("xcodebuild invocations ({}):", steps.len());
    for step in &steps {
        println!("  {}", step.invocation.command_line());
    }
    if steps.is_empty() {
        warn!("Nothing to build: no umbrella target has modules");
    }
    Ok(())
}

fn print_report(report: &BuildReport) {
    let prefix = if report.dry_run { "[dry-run] " } else { "" };
    println!(
        "{}{} xcodebuild invocation(s), {} archive(s)",
        prefix,
        report.invocations,
        report.archives.len()
    );
    for archive in &report.archives {
        println!("  {}", archive.display());
    }
    if !report.skipped.is_empty() {
        println!("Skipped {} module(s):", report.skipped.len());
        for skipped in &report.skipped {
            let platforms: Vec<_> = skipped.platforms.iter().map(|p| p.as_str()).collect();
            println!(
                "  {} ({}/{})",
                skipped.module,
                platforms.join(","),
                skipped.package
            );
            for missing in &skipped.missing {
                println!("    missing {}", missing.display());
            }
        }
    }
    if !report.dry_run {
        println!("Staged {} item(s)", report.staged.len());
        if !report.debug_symbols.is_empty() {
            println!("Relocated {} dSYM bundle(s)", report.debug_symbols.len());
        }
    }
}

fn write_summary(path: &Path, report: &BuildReport) -> Result<()> {
    ensure_parent_dir(path)?;
    let json = serde_json::to_string_pretty(report).context("serializing run summary")?;
    fs::write(path, json).with_context(|| format!("writing summary {:?}", path))?;
    Ok(())
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).with_context(|| format!("creating directory {:?}", parent))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use xcrome_sdk::{BuildTarget, Platform};

    fn resolver(config: Option<XcromeConfig>, path: Option<&str>) -> ConfigResolver {
        ConfigResolver {
            config,
            config_path: path.map(PathBuf::from),
        }
    }

    #[test]
    fn test_cli_parses_build_flags() {
        let cli = Cli::try_parse_from([
            "xcrome",
            "--dry-run",
            "build",
            "--project",
            "snap.json",
            "--catalyst",
            "--skip-catalyst",
            "Pods-Widget",
            "--skip-catalyst",
            "Pods-Clip",
            "--x86-64",
            "--scope",
            "all-targets",
            "--mode",
            "frameworks",
        ])
        .unwrap();

        assert!(cli.dry_run);
        match cli.command {
            Command::Build { args, summary } => {
                assert_eq!(args.project, Some(PathBuf::from("snap.json")));
                assert!(args.catalyst);
                assert!(args.x86_64);
                assert_eq!(args.skip_catalyst, vec!["Pods-Widget", "Pods-Clip"]);
                assert_eq!(args.scope, Some(ScopeArg::AllTargets));
                assert_eq!(args.mode, Some(ModeArg::Frameworks));
                assert!(summary.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_resolve_build_defaults() {
        let args = BuildArgs {
            project: Some(PathBuf::from("snap.json")),
            ..BuildArgs::default()
        };
        let resolved = resolve_build(&resolver(None, None), args).unwrap();
        assert_eq!(resolved.snapshot, PathBuf::from("snap.json"));
        assert_eq!(resolved.options, BuildOptions::default());
        assert!(resolved.output_dir.is_none());
    }

    #[test]
    fn test_resolve_build_requires_snapshot() {
        let err = resolve_build(&resolver(None, None), BuildArgs::default()).unwrap_err();
        assert!(err.to_string().contains("--project"));
    }

    #[test]
    fn test_cli_overrides_config() {
        let mut config = XcromeConfig::default();
        config.build.configuration = Some("Release".to_string());
        config.build.dsym = Some(true);
        config.build.catalyst = Some(false);
        config.paths.snapshot = Some(PathBuf::from("Pods/snap.json"));
        config.paths.output_dir = Some(PathBuf::from("Frameworks"));

        let args = BuildArgs {
            configuration: Some("Beta".to_string()),
            no_dsym: true,
            catalyst: true,
            ..BuildArgs::default()
        };
        let resolved = resolve_build(&resolver(Some(config), Some("/w/xcrome.toml")), args).unwrap();

        assert_eq!(resolved.snapshot, PathBuf::from("/w/Pods/snap.json"));
        assert_eq!(resolved.output_dir, Some(PathBuf::from("/w/Frameworks")));
        assert_eq!(resolved.options.configuration, "Beta");
        assert!(!resolved.options.dsym);
        assert!(resolved.options.build_ios_catalyst);
    }

    #[test]
    fn test_negating_flags_override_config() {
        let mut config = XcromeConfig::default();
        config.build.catalyst = Some(true);
        config.build.dsym = Some(false);
        config.build.clean = Some(true);
        config.paths.snapshot = Some(PathBuf::from("snap.json"));

        let cli = Cli::try_parse_from(["xcrome", "build", "--no-catalyst", "--dsym", "--no-clean"])
            .unwrap();
        let Command::Build { args, .. } = cli.command else {
            panic!("expected build command");
        };
        let resolved = resolve_build(&resolver(Some(config), Some("/w/xcrome.toml")), args).unwrap();

        assert!(!resolved.options.build_ios_catalyst);
        assert!(resolved.options.dsym);
        assert!(!resolved.options.clean_build_root);
    }

    #[test]
    fn test_last_of_flag_pair_wins() {
        let cli = Cli::try_parse_from([
            "xcrome",
            "plan",
            "--catalyst",
            "--no-catalyst",
            "--no-x86-64",
            "--x86-64",
        ])
        .unwrap();
        let Command::Plan { args } = cli.command else {
            panic!("expected plan command");
        };

        assert_eq!(switch(args.catalyst, args.no_catalyst), Some(false));
        assert_eq!(switch(args.x86_64, args.no_x86_64), Some(true));
        assert_eq!(switch(args.bitcode, args.no_bitcode), None);
    }

    #[test]
    fn test_scope_and_mode_conversion() {
        assert_eq!(BuildScope::from(ScopeArg::AllTargets), BuildScope::AllTargets);
        assert_eq!(StagingMode::from(ModeArg::Frameworks), StagingMode::Frameworks);
    }

    #[cfg(unix)]
    #[test]
    fn test_shell_hook_sees_project_env() {
        let temp_dir = TempDir::new().unwrap();
        let project = Project::new(
            temp_dir.path().join("Pods/Pods.xcodeproj"),
            temp_dir.path().join("Pods"),
            vec![BuildTarget::new("Pods-App", Platform::Ios)],
        );
        let out = temp_dir.path().join("env.txt");
        let command = format!("echo \"$XCROME_SANDBOX_ROOT\" > {}", out.display());

        run_shell_hook("post_compile", &command, Some(temp_dir.path()), &project).unwrap();

        let written = fs::read_to_string(&out).unwrap();
        assert_eq!(written.trim(), temp_dir.path().join("Pods").to_string_lossy());
    }

    #[cfg(unix)]
    #[test]
    fn test_shell_hook_failure() {
        let project = Project::new("P.xcodeproj", "Pods", Vec::new());
        let err = run_shell_hook("pre_compile", "exit 4", None, &project).unwrap_err();
        assert!(err.to_string().contains("exit 4"));
    }

    #[test]
    fn test_write_summary() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out/summary.json");
        let report = BuildReport {
            archives: vec![PathBuf::from("/b/A.xcframework")],
            invocations: 3,
            ..BuildReport::default()
        };

        write_summary(&path, &report).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["invocations"], 3);
        assert_eq!(value["archives"][0], "/b/A.xcframework");
    }
}
