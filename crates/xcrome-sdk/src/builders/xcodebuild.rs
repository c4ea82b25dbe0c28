//! xcodebuild invocation.
//!
//! The driver turns (scope, SDK) pairs into [`Invocation`]s and runs them
//! through a [`ToolRunner`]. Whether the project is built with `-alltargets`
//! or one `-scheme` per target is decided in a single place,
//! [`BuildStrategy::select`].

use std::path::Path;

use tracing::info;

use super::common::{Invocation, ToolRunner};
use crate::project::BuildTarget;
use crate::types::{BuildError, BuildOptions, BuildScope, Sdk, SdkKind};

const XCODEBUILD: &str = "xcodebuild";

/// How one SDK pass addresses the project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStrategy {
    /// One `-alltargets` invocation.
    AllTargets,
    /// One `-scheme <label>` invocation per target.
    PerScheme,
}

impl BuildStrategy {
    /// Picks the strategy for `sdk`.
    ///
    /// xcodebuild rejects `-alltargets` together with a Mac Catalyst
    /// destination, so Catalyst always builds per scheme.
    pub fn select(scope: BuildScope, sdk: Sdk) -> Self {
        match (scope, sdk.kind()) {
            (_, SdkKind::CrossCompile) => BuildStrategy::PerScheme,
            (BuildScope::AllTargets, _) => BuildStrategy::AllTargets,
            (BuildScope::PerTarget, _) => BuildStrategy::PerScheme,
        }
    }
}

/// One planned xcodebuild call and the targets whose products it produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStep {
    pub sdk: Sdk,
    pub invocation: Invocation,
    pub targets: Vec<String>,
}

/// Builds xcodebuild invocations for one project.
#[derive(Debug)]
pub struct BuildDriver<'a> {
    project_path: &'a Path,
    build_root: &'a Path,
    options: &'a BuildOptions,
}

impl<'a> BuildDriver<'a> {
    pub fn new(project_path: &'a Path, build_root: &'a Path, options: &'a BuildOptions) -> Self {
        Self {
            project_path,
            build_root,
            options,
        }
    }

    /// `xcodebuild -project P -alltargets ...`
    pub fn all_targets_invocation(&self, sdk: Sdk) -> Invocation {
        let base = Invocation::new(
            XCODEBUILD,
            format!("xcodebuild (all targets, {})", sdk.destination()),
        )
        .arg("-project")
        .path_arg(self.project_path)
        .arg("-alltargets");
        self.finish(base, sdk)
    }

    /// `xcodebuild -project P -scheme <label> ...`
    pub fn scheme_invocation(&self, label: &str, sdk: Sdk) -> Invocation {
        let base = Invocation::new(
            XCODEBUILD,
            format!("xcodebuild ({}, {})", label, sdk.destination()),
        )
        .arg("-project")
        .path_arg(self.project_path)
        .args(["-scheme", label]);
        self.finish(base, sdk)
    }

    fn finish(&self, invocation: Invocation, sdk: Sdk) -> Invocation {
        let mut invocation = invocation.args(["-configuration", &self.options.configuration]);

        invocation = match sdk.kind() {
            SdkKind::CrossCompile => invocation.args(["-destination", sdk.destination()]),
            _ => invocation.args(["-sdk", sdk.as_str()]),
        };

        invocation = invocation.arg(format!("SYMROOT={}", self.build_root.display()));

        if self.options.dsym {
            invocation = invocation.args([
                "DEBUG_INFORMATION_FORMAT=dwarf-with-dsym",
                "ONLY_ACTIVE_ARCH=NO",
            ]);
        }
        if self.options.enable_bitcode {
            invocation = invocation.arg("BITCODE_GENERATION_MODE=bitcode");
        }
        if sdk.is_cross_compile() {
            // Local Catalyst builds are unsigned.
            invocation = invocation.arg("CODE_SIGN_IDENTITY=-");
        }

        if self.options.run_in_x86_64 {
            invocation.pinned_to_arch("x86_64")
        } else {
            invocation
        }
    }

    /// Plans the invocations needed to build `targets` for `sdk`.
    pub fn plan(&self, sdk: Sdk, targets: &[&BuildTarget]) -> Vec<BuildStep> {
        if targets.is_empty() {
            return Vec::new();
        }
        match BuildStrategy::select(self.options.scope, sdk) {
            BuildStrategy::AllTargets => vec![BuildStep {
                sdk,
                invocation: self.all_targets_invocation(sdk),
                targets: targets.iter().map(|t| t.label().to_string()).collect(),
            }],
            BuildStrategy::PerScheme => targets
                .iter()
                .map(|t| BuildStep {
                    sdk,
                    invocation: self.scheme_invocation(t.label(), sdk),
                    targets: vec![t.label().to_string()],
                })
                .collect(),
        }
    }

    /// Runs one planned step. Any failure aborts the run.
    pub fn run_step(&self, runner: &mut dyn ToolRunner, step: &BuildStep) -> Result<(), BuildError> {
        info!(
            "[*] Building {} for sdk {} and destination {}",
            step.targets.join(", "),
            step.sdk,
            step.sdk.destination()
        );
        runner.run(&step.invocation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Platform;
    use std::path::PathBuf;

    fn options() -> BuildOptions {
        BuildOptions {
            dsym: false,
            ..BuildOptions::default()
        }
    }

    #[test]
    fn test_strategy_selection() {
        use BuildStrategy::*;
        assert_eq!(BuildStrategy::select(BuildScope::AllTargets, Sdk::IphoneOs), AllTargets);
        assert_eq!(BuildStrategy::select(BuildScope::PerTarget, Sdk::IphoneOs), PerScheme);
        assert_eq!(
            BuildStrategy::select(BuildScope::AllTargets, Sdk::MacCatalyst),
            PerScheme
        );
    }

    #[test]
    fn test_scheme_invocation_uses_sdk() {
        let options = options();
        let project = PathBuf::from("/w/Pods/Pods.xcodeproj");
        let build_root = PathBuf::from("/w/build");
        let driver = BuildDriver::new(&project, &build_root, &options);

        let invocation = driver.scheme_invocation("Pods-App", Sdk::IphoneSimulator);
        assert_eq!(invocation.program(), "xcodebuild");
        assert_eq!(invocation.value_of("-project"), Some("/w/Pods/Pods.xcodeproj"));
        assert_eq!(invocation.value_of("-scheme"), Some("Pods-App"));
        assert_eq!(invocation.value_of("-configuration"), Some("Debug"));
        assert_eq!(invocation.value_of("-sdk"), Some("iphonesimulator"));
        assert_eq!(invocation.value_of("-destination"), None);
        assert_eq!(invocation.setting("SYMROOT"), Some("/w/build"));
        assert_eq!(invocation.setting("CODE_SIGN_IDENTITY"), None);
        assert_eq!(invocation.setting("BITCODE_GENERATION_MODE"), None);
    }

    #[test]
    fn test_catalyst_uses_destination_and_unsigned_identity() {
        let options = options();
        let project = PathBuf::from("P.xcodeproj");
        let build_root = PathBuf::from("build");
        let driver = BuildDriver::new(&project, &build_root, &options);

        let invocation = driver.scheme_invocation("Pods-App", Sdk::MacCatalyst);
        assert_eq!(
            invocation.value_of("-destination"),
            Some("generic/platform=macOS,variant=Mac Catalyst")
        );
        assert_eq!(invocation.value_of("-sdk"), None);
        assert_eq!(invocation.setting("CODE_SIGN_IDENTITY"), Some("-"));
    }

    #[test]
    fn test_flags_append_settings() {
        let options = BuildOptions {
            enable_bitcode: true,
            dsym: true,
            configuration: "Release".to_string(),
            ..BuildOptions::default()
        };
        let project = PathBuf::from("P.xcodeproj");
        let build_root = PathBuf::from("build");
        let driver = BuildDriver::new(&project, &build_root, &options);

        let invocation = driver.all_targets_invocation(Sdk::IphoneOs);
        assert!(invocation.arguments().iter().any(|a| a == "-alltargets"));
        assert_eq!(invocation.value_of("-configuration"), Some("Release"));
        assert_eq!(invocation.setting("BITCODE_GENERATION_MODE"), Some("bitcode"));
        assert_eq!(
            invocation.setting("DEBUG_INFORMATION_FORMAT"),
            Some("dwarf-with-dsym")
        );
        assert_eq!(invocation.setting("ONLY_ACTIVE_ARCH"), Some("NO"));
    }

    #[test]
    fn test_x86_64_wrapper_preserves_arguments() {
        let plain = options();
        let pinned = BuildOptions {
            run_in_x86_64: true,
            ..options()
        };
        let project = PathBuf::from("P.xcodeproj");
        let build_root = PathBuf::from("build");

        let expected = BuildDriver::new(&project, &build_root, &plain)
            .scheme_invocation("Pods-App", Sdk::IphoneOs);
        let invocation = BuildDriver::new(&project, &build_root, &pinned)
            .scheme_invocation("Pods-App", Sdk::IphoneOs);

        assert_eq!(invocation.program(), "arch");
        assert_eq!(invocation.arguments()[0], "-x86_64");
        assert_eq!(invocation.arguments()[1], "xcodebuild");
        assert_eq!(&invocation.arguments()[2..], expected.arguments());
    }

    #[test]
    fn test_plan_all_targets_falls_back_for_catalyst() {
        let options = BuildOptions {
            scope: BuildScope::AllTargets,
            ..options()
        };
        let project = PathBuf::from("P.xcodeproj");
        let build_root = PathBuf::from("build");
        let driver = BuildDriver::new(&project, &build_root, &options);
        let app = BuildTarget::new("Pods-App", Platform::Ios).module("A", "A");
        let ext = BuildTarget::new("Pods-Ext", Platform::Ios).module("B", "B");
        let targets = [&app, &ext];

        let device = driver.plan(Sdk::IphoneOs, &targets);
        assert_eq!(device.len(), 1);
        assert_eq!(device[0].targets, vec!["Pods-App", "Pods-Ext"]);

        let catalyst = driver.plan(Sdk::MacCatalyst, &targets);
        assert_eq!(catalyst.len(), 2);
        assert_eq!(catalyst[0].invocation.value_of("-scheme"), Some("Pods-App"));
        assert_eq!(catalyst[1].invocation.value_of("-scheme"), Some("Pods-Ext"));
    }

    #[test]
    fn test_plan_empty_targets() {
        let options = options();
        let project = PathBuf::from("P.xcodeproj");
        let build_root = PathBuf::from("build");
        let driver = BuildDriver::new(&project, &build_root, &options);
        assert!(driver.plan(Sdk::IphoneOs, &[]).is_empty());
    }
}
