//! XCFramework assembly.
//!
//! One archive per (package, module), combining that module's framework
//! from every SDK variant of every platform it is built for. A module that
//! is missing from any expected variant is skipped rather than packaged
//! partially.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::common::{Invocation, ToolRunner, remove_if_exists};
use super::matrix::SdkMatrix;
use crate::project::{ModuleDescriptor, Project};
use crate::types::{BuildError, BuildLayout, Platform, Sdk, SkippedModule};

/// A module to package, with the SDK variants it is expected to exist for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveRequest {
    /// Platforms carrying the module, in snapshot order.
    pub platforms: Vec<Platform>,
    pub module: ModuleDescriptor,
    /// Expected variants, platform by platform in merge order.
    pub sdks: Vec<Sdk>,
}

/// Collects one request per (package, module), in snapshot order.
///
/// A module shared by several targets, including targets of different
/// platforms, is requested once so its archive holds every variant. Mac
/// Catalyst is expected when the matrix builds it for at least one target
/// carrying the module.
pub fn collect_requests(project: &Project, matrix: &SdkMatrix) -> Vec<ArchiveRequest> {
    let mut requests: Vec<(ArchiveRequest, BTreeSet<Sdk>)> = Vec::new();

    for platform in project.platforms() {
        for target in project.buildable_targets(platform) {
            let target_sdks = matrix.for_target(target);
            for module in target.modules() {
                let index = match requests.iter().position(|(r, _)| &r.module == module) {
                    Some(index) => index,
                    None => {
                        requests.push((
                            ArchiveRequest {
                                platforms: Vec::new(),
                                module: module.clone(),
                                sdks: Vec::new(),
                            },
                            BTreeSet::new(),
                        ));
                        requests.len() - 1
                    }
                };
                let (request, sdks) = &mut requests[index];
                if !request.platforms.contains(&platform) {
                    request.platforms.push(platform);
                }
                sdks.extend(target_sdks.iter().copied());
            }
        }
    }

    requests
        .into_iter()
        .map(|(mut request, sdks)| {
            request.sdks = request
                .platforms
                .iter()
                .flat_map(|&platform| matrix.for_platform(platform))
                .filter(|sdk| sdks.contains(sdk))
                .collect();
            request
        })
        .collect()
}

fn platform_list(platforms: &[Platform]) -> String {
    platforms
        .iter()
        .map(Platform::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result of assembling one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssemblyOutcome {
    Assembled(PathBuf),
    Skipped(SkippedModule),
}

/// Creates `.xcframework` archives with `xcodebuild -create-xcframework`.
#[derive(Debug)]
pub struct ArchiveAssembler<'a> {
    layout: &'a BuildLayout,
    configuration: &'a str,
    include_debug_symbols: bool,
}

impl<'a> ArchiveAssembler<'a> {
    pub fn new(layout: &'a BuildLayout, configuration: &'a str, include_debug_symbols: bool) -> Self {
        Self {
            layout,
            configuration,
            include_debug_symbols,
        }
    }

    /// Framework paths the archive is built from, in request order.
    pub fn expected_variants(&self, request: &ArchiveRequest) -> Vec<PathBuf> {
        request
            .sdks
            .iter()
            .map(|&sdk| {
                self.layout
                    .module_framework(self.configuration, sdk, &request.module)
            })
            .collect()
    }

    /// `{build_root}/xcframeworks/{module}.xcframework`
    pub fn output_path(&self, request: &ArchiveRequest) -> PathBuf {
        self.layout
            .xcframework_dir()
            .join(format!("{}.xcframework", request.module.module))
    }

    /// Builds the `-create-xcframework` invocation for a request.
    ///
    /// Each variant whose `.dSYM` sits next to it gets a `-debug-symbols`
    /// argument when debug symbols are enabled.
    pub fn invocation(&self, request: &ArchiveRequest) -> Invocation {
        let mut invocation = Invocation::new(
            "xcodebuild",
            format!("xcodebuild -create-xcframework ({})", request.module.module),
        )
        .args(["-create-xcframework", "-allow-internal-distribution", "-output"])
        .path_arg(&self.output_path(request));

        for framework in self.expected_variants(request) {
            invocation = invocation.arg("-framework").path_arg(&framework);
            if self.include_debug_symbols
                && let Some(dsym) = debug_symbols_for(&framework)
            {
                invocation = invocation.arg("-debug-symbols").path_arg(&dsym);
            }
        }

        invocation
    }

    /// Assembles one archive, or reports why it was skipped.
    pub fn assemble(
        &self,
        runner: &mut dyn ToolRunner,
        request: &ArchiveRequest,
    ) -> Result<AssemblyOutcome, BuildError> {
        let missing: Vec<PathBuf> = self
            .expected_variants(request)
            .into_iter()
            .filter(|p| !p.is_dir())
            .collect();

        if !missing.is_empty() {
            let listing = missing
                .iter()
                .map(|p| format!("  - {}", p.display()))
                .collect::<Vec<_>>()
                .join("\n");
            warn!(
                "Skipping {} ({}): missing framework variants:\n{}\n\
                 The package may only ship vendored binaries.",
                request.module.module,
                platform_list(&request.platforms),
                listing
            );
            return Ok(AssemblyOutcome::Skipped(SkippedModule {
                platforms: request.platforms.clone(),
                package: request.module.package.clone(),
                module: request.module.module.clone(),
                missing,
            }));
        }

        let output = self.output_path(request);
        remove_if_exists(&output)?;
        let dir = self.layout.xcframework_dir();
        fs::create_dir_all(&dir).map_err(BuildError::fs("create directory", &dir))?;

        info!(
            "[*] Creating {}.xcframework from {} variants",
            request.module.module,
            request.sdks.len()
        );
        runner.run(&self.invocation(request))?;

        Ok(AssemblyOutcome::Assembled(output))
    }
}

/// `Foo.framework.dSYM` next to `Foo.framework`, made absolute.
fn debug_symbols_for(framework: &Path) -> Option<PathBuf> {
    let name = framework.file_name()?;
    let mut dsym_name = name.to_os_string();
    dsym_name.push(".dSYM");
    let dsym = framework.with_file_name(dsym_name);
    if !dsym.is_dir() {
        return None;
    }
    if dsym.is_absolute() {
        Some(dsym)
    } else {
        std::path::absolute(&dsym).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::BuildTarget;
    use crate::types::BuildOptions;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorder(Vec<Invocation>);

    impl ToolRunner for Recorder {
        fn run(&mut self, invocation: &Invocation) -> Result<(), BuildError> {
            self.0.push(invocation.clone());
            Ok(())
        }
    }

    fn layout(root: &Path) -> BuildLayout {
        BuildLayout {
            build_root: root.join("build"),
            destination: root.join("Rome"),
            dsym_destination: root.join("dSYM"),
        }
    }

    fn request(sdks: Vec<Sdk>) -> ArchiveRequest {
        ArchiveRequest {
            platforms: vec![Platform::Ios],
            module: ModuleDescriptor::new("Alamofire", "Alamofire"),
            sdks,
        }
    }

    #[test]
    fn test_collect_requests_dedups_modules() {
        let project = Project::new(
            "Pods/Pods.xcodeproj",
            "Pods",
            vec![
                BuildTarget::new("Pods-App", Platform::Ios)
                    .module("Core", "Core")
                    .module("Alamofire", "Alamofire"),
                BuildTarget::new("Pods-Ext", Platform::Ios).module("Core", "Core"),
                BuildTarget::new("Pods-Mac", Platform::Osx).module("Core", "Core"),
            ],
        );
        let matrix = SdkMatrix::new(&BuildOptions::default());

        let requests = collect_requests(&project, &matrix);
        let keys: Vec<_> = requests
            .iter()
            .map(|r| (r.platforms.clone(), r.module.module.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![
                (vec![Platform::Ios, Platform::Osx], "Core"),
                (vec![Platform::Ios], "Alamofire"),
            ]
        );
        assert_eq!(
            requests[0].sdks,
            vec![Sdk::IphoneSimulator, Sdk::IphoneOs, Sdk::MacOsx]
        );
        assert_eq!(requests[1].sdks, vec![Sdk::IphoneSimulator, Sdk::IphoneOs]);
    }

    #[test]
    fn test_shared_module_expects_catalyst_before_other_platforms() {
        let project = Project::new(
            "Pods/Pods.xcodeproj",
            "Pods",
            vec![
                BuildTarget::new("Pods-Mac", Platform::Osx).module("Core", "Core"),
                BuildTarget::new("Pods-Widget", Platform::Ios).module("Core", "Core"),
                BuildTarget::new("Pods-App", Platform::Ios).module("Core", "Core"),
            ],
        );
        let matrix = SdkMatrix::new(&BuildOptions {
            build_ios_catalyst: true,
            skipping_umbrella_targets_for_catalyst: vec!["Pods-Widget".to_string()],
            ..BuildOptions::default()
        });

        let requests = collect_requests(&project, &matrix);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].platforms, vec![Platform::Osx, Platform::Ios]);
        assert_eq!(
            requests[0].sdks,
            vec![
                Sdk::MacOsx,
                Sdk::MacCatalyst,
                Sdk::IphoneSimulator,
                Sdk::IphoneOs
            ]
        );
    }

    #[test]
    fn test_shared_module_single_invocation_across_platforms() {
        let layout = layout(Path::new("/w"));
        let assembler = ArchiveAssembler::new(&layout, "Release", false);
        let request = ArchiveRequest {
            platforms: vec![Platform::Ios, Platform::Osx],
            module: ModuleDescriptor::new("Core", "Core"),
            sdks: vec![Sdk::IphoneSimulator, Sdk::IphoneOs, Sdk::MacOsx],
        };

        let frameworks: Vec<_> = assembler
            .invocation(&request)
            .arguments()
            .windows(2)
            .filter(|pair| pair[0] == "-framework")
            .map(|pair| pair[1].clone())
            .collect();
        assert_eq!(
            frameworks,
            vec![
                "/w/build/Release-iphonesimulator/Core/Core.framework",
                "/w/build/Release-iphoneos/Core/Core.framework",
                "/w/build/Release/Core/Core.framework",
            ]
        );
    }

    #[test]
    fn test_catalyst_expected_if_any_target_includes_it() {
        let project = Project::new(
            "Pods/Pods.xcodeproj",
            "Pods",
            vec![
                BuildTarget::new("Pods-Widget", Platform::Ios)
                    .module("Core", "Core")
                    .module("WidgetKit", "WidgetKit"),
                BuildTarget::new("Pods-App", Platform::Ios).module("Core", "Core"),
            ],
        );
        let matrix = SdkMatrix::new(&BuildOptions {
            build_ios_catalyst: true,
            skipping_umbrella_targets_for_catalyst: vec!["Pods-Widget".to_string()],
            ..BuildOptions::default()
        });

        let requests = collect_requests(&project, &matrix);
        let core = requests.iter().find(|r| r.module.module == "Core").unwrap();
        let widget = requests
            .iter()
            .find(|r| r.module.module == "WidgetKit")
            .unwrap();
        assert_eq!(
            core.sdks,
            vec![Sdk::MacCatalyst, Sdk::IphoneSimulator, Sdk::IphoneOs]
        );
        assert_eq!(widget.sdks, vec![Sdk::IphoneSimulator, Sdk::IphoneOs]);
    }

    #[test]
    fn test_invocation_arguments() {
        let layout = layout(Path::new("/w"));
        let assembler = ArchiveAssembler::new(&layout, "Debug", false);
        let invocation = assembler.invocation(&request(vec![Sdk::IphoneSimulator, Sdk::IphoneOs]));

        assert_eq!(
            invocation.arguments(),
            &[
                "-create-xcframework",
                "-allow-internal-distribution",
                "-output",
                "/w/build/xcframeworks/Alamofire.xcframework",
                "-framework",
                "/w/build/Debug-iphonesimulator/Alamofire/Alamofire.framework",
                "-framework",
                "/w/build/Debug-iphoneos/Alamofire/Alamofire.framework",
            ]
        );
    }

    #[test]
    fn test_missing_variant_is_skipped_with_every_path() {
        let temp_dir = TempDir::new().unwrap();
        let layout = layout(temp_dir.path());
        let assembler = ArchiveAssembler::new(&layout, "Debug", false);
        let request = request(vec![Sdk::MacCatalyst, Sdk::IphoneSimulator, Sdk::IphoneOs]);
        fs::create_dir_all(layout.module_framework("Debug", Sdk::IphoneOs, &request.module))
            .unwrap();

        let mut runner = Recorder::default();
        let outcome = assembler.assemble(&mut runner, &request).unwrap();

        match outcome {
            AssemblyOutcome::Skipped(skipped) => {
                assert_eq!(skipped.module, "Alamofire");
                assert_eq!(skipped.missing.len(), 2);
            }
            other => panic!("expected skip, got {other:?}"),
        }
        assert!(runner.0.is_empty());
    }

    #[test]
    fn test_assemble_runs_once_and_replaces_output() {
        let temp_dir = TempDir::new().unwrap();
        let layout = layout(temp_dir.path());
        let assembler = ArchiveAssembler::new(&layout, "Debug", false);
        let request = request(vec![Sdk::IphoneSimulator, Sdk::IphoneOs]);
        for path in assembler.expected_variants(&request) {
            fs::create_dir_all(path).unwrap();
        }
        let stale = assembler.output_path(&request);
        fs::create_dir_all(&stale).unwrap();

        let mut runner = Recorder::default();
        let outcome = assembler.assemble(&mut runner, &request).unwrap();

        assert_eq!(outcome, AssemblyOutcome::Assembled(stale.clone()));
        assert_eq!(runner.0.len(), 1);
        assert!(!stale.exists(), "existing archive is removed before assembly");
    }

    #[test]
    fn test_debug_symbols_passed_when_present() {
        let temp_dir = TempDir::new().unwrap();
        let layout = layout(temp_dir.path());
        let request = request(vec![Sdk::IphoneSimulator, Sdk::IphoneOs]);
        let device = layout.module_framework("Debug", Sdk::IphoneOs, &request.module);
        fs::create_dir_all(&device).unwrap();
        let dsym = device.with_file_name("Alamofire.framework.dSYM");
        fs::create_dir_all(&dsym).unwrap();

        let with = ArchiveAssembler::new(&layout, "Debug", true).invocation(&request);
        let pos = with
            .arguments()
            .iter()
            .position(|a| a == "-debug-symbols")
            .unwrap();
        assert_eq!(with.arguments()[pos + 1], dsym.to_string_lossy());
        assert_eq!(with.arguments()[pos - 1], device.to_string_lossy());

        let without = ArchiveAssembler::new(&layout, "Debug", false).invocation(&request);
        assert!(!without.arguments().iter().any(|a| a == "-debug-symbols"));
    }
}
