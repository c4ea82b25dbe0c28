//! Project snapshot.
//!
//! The host package manager (CocoaPods) exports its umbrella targets once per
//! run as a flat JSON document. This module loads that document into an
//! immutable [`Project`]; nothing in the build pipeline talks to the host
//! after that.
//!
//! ```json
//! {
//!   "project_path": "Pods/Pods.xcodeproj",
//!   "sandbox_root": "Pods",
//!   "targets": [
//!     {
//!       "label": "Pods-App",
//!       "platform": "ios",
//!       "deployment_target": "13.0",
//!       "modules": [{ "package": "Alamofire", "module": "Alamofire" }],
//!       "vendored_frameworks": ["Pods/Vendor/Vendor.xcframework"]
//!     }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::types::{BuildError, Platform};

/// A compiled module and the package (pod) that provides it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    /// Package name, used as the products subdirectory.
    pub package: String,
    /// Module name, used as the bundle name.
    pub module: String,
}

impl ModuleDescriptor {
    pub fn new(package: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            module: module.into(),
        }
    }
}

/// An umbrella target: a set of modules built together for one platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildTarget {
    label: String,
    platform: Platform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    deployment_target: Option<String>,
    #[serde(default)]
    modules: Vec<ModuleDescriptor>,
    #[serde(default)]
    vendored_libraries: Vec<PathBuf>,
    #[serde(default)]
    vendored_frameworks: Vec<PathBuf>,
    #[serde(default)]
    resources: Vec<PathBuf>,
}

impl BuildTarget {
    /// Creates an empty target.
    pub fn new(label: impl Into<String>, platform: Platform) -> Self {
        Self {
            label: label.into(),
            platform,
            deployment_target: None,
            modules: Vec::new(),
            vendored_libraries: Vec::new(),
            vendored_frameworks: Vec::new(),
            resources: Vec::new(),
        }
    }

    pub fn deployment_target(mut self, version: impl Into<String>) -> Self {
        self.deployment_target = Some(version.into());
        self
    }

    /// Adds a module. Duplicate (package, module) pairs are ignored.
    pub fn module(mut self, package: impl Into<String>, module: impl Into<String>) -> Self {
        let descriptor = ModuleDescriptor::new(package, module);
        if !self.modules.contains(&descriptor) {
            self.modules.push(descriptor);
        }
        self
    }

    pub fn vendored_library(mut self, path: impl Into<PathBuf>) -> Self {
        self.vendored_libraries.push(path.into());
        self
    }

    pub fn vendored_framework(mut self, path: impl Into<PathBuf>) -> Self {
        self.vendored_frameworks.push(path.into());
        self
    }

    pub fn resource(mut self, path: impl Into<PathBuf>) -> Self {
        self.resources.push(path.into());
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn deployment_version(&self) -> Option<&str> {
        self.deployment_target.as_deref()
    }

    pub fn modules(&self) -> &[ModuleDescriptor] {
        &self.modules
    }

    pub fn vendored_libraries(&self) -> &[PathBuf] {
        &self.vendored_libraries
    }

    pub fn vendored_frameworks(&self) -> &[PathBuf] {
        &self.vendored_frameworks
    }

    pub fn resources(&self) -> &[PathBuf] {
        &self.resources
    }

    /// Targets without modules contribute vendored artifacts but are never
    /// built.
    pub fn is_buildable(&self) -> bool {
        !self.modules.is_empty()
    }

    fn normalize(&mut self, base_dir: &Path) {
        let mut seen = HashSet::new();
        self.modules.retain(|m| seen.insert(m.clone()));
        for list in [
            &mut self.vendored_libraries,
            &mut self.vendored_frameworks,
            &mut self.resources,
        ] {
            for path in list.iter_mut() {
                if path.is_relative() {
                    *path = base_dir.join(&*path);
                }
            }
        }
    }
}

/// Immutable snapshot of the host project, captured once per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    project_path: PathBuf,
    sandbox_root: PathBuf,
    #[serde(default)]
    targets: Vec<BuildTarget>,
}

impl Project {
    /// Creates a snapshot from already-resolved paths.
    pub fn new(
        project_path: impl Into<PathBuf>,
        sandbox_root: impl Into<PathBuf>,
        targets: Vec<BuildTarget>,
    ) -> Self {
        let mut project = Self {
            project_path: project_path.into(),
            sandbox_root: sandbox_root.into(),
            targets,
        };
        project.normalize(Path::new(""));
        project
    }

    /// Loads a snapshot file. Relative paths inside it resolve against the
    /// file's directory.
    pub fn load(path: &Path) -> Result<Self, BuildError> {
        let contents = fs::read_to_string(path).map_err(|e| {
            BuildError::Config(format!(
                "Failed to read project snapshot {}: {}\n\n\
                 Export the snapshot from your package manager first.",
                path.display(),
                e
            ))
        })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
        Self::from_json_str(&contents, base_dir)
    }

    /// Parses a snapshot document.
    pub fn from_json_str(contents: &str, base_dir: &Path) -> Result<Self, BuildError> {
        let mut project: Project = serde_json::from_str(contents).map_err(|e| {
            // Unknown platforms surface through serde as a custom error.
            BuildError::Config(format!("Invalid project snapshot: {}", e))
        })?;
        project.normalize(base_dir);
        Ok(project)
    }

    fn normalize(&mut self, base_dir: &Path) {
        if self.project_path.is_relative() {
            self.project_path = base_dir.join(&self.project_path);
        }
        if self.sandbox_root.is_relative() {
            self.sandbox_root = base_dir.join(&self.sandbox_root);
        }
        for target in &mut self.targets {
            target.normalize(base_dir);
        }
    }

    /// Path to the `.xcodeproj` passed to `xcodebuild -project`.
    pub fn project_path(&self) -> &Path {
        &self.project_path
    }

    /// The package manager's sandbox (`Pods/`).
    pub fn sandbox_root(&self) -> &Path {
        &self.sandbox_root
    }

    pub fn targets(&self) -> &[BuildTarget] {
        &self.targets
    }

    /// Distinct platforms in order of first appearance.
    pub fn platforms(&self) -> Vec<Platform> {
        let mut platforms = Vec::new();
        for target in &self.targets {
            if !platforms.contains(&target.platform) {
                platforms.push(target.platform);
            }
        }
        platforms
    }

    /// Buildable targets for a platform, in snapshot order.
    pub fn buildable_targets(&self, platform: Platform) -> impl Iterator<Item = &BuildTarget> {
        self.targets
            .iter()
            .filter(move |t| t.platform == platform && t.is_buildable())
    }

    /// Looks up a target by label.
    pub fn target(&self, label: &str) -> Option<&BuildTarget> {
        self.targets.iter().find(|t| t.label == label)
    }
}
