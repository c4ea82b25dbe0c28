//! Artifact staging.
//!
//! Everything the consumer needs ends up flat in the destination directory:
//! built archives (or merged bundles), vendored static libraries, vendored
//! frameworks and resource bundles. The destination is rebuilt from scratch
//! on every run, so staging the same inputs twice gives the same tree.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::common::{copy_replacing, dedup_paths, remove_if_exists};
use crate::project::Project;
use crate::types::BuildError;

/// The four collections that are copied into the destination.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagingManifest {
    pub archives: Vec<PathBuf>,
    pub vendored_libraries: Vec<PathBuf>,
    pub vendored_frameworks: Vec<PathBuf>,
    pub resources: Vec<PathBuf>,
}

impl StagingManifest {
    /// Builds a manifest from produced archives and every target's vendored
    /// artifacts, including targets that were never built.
    pub fn from_project(project: &Project, archives: Vec<PathBuf>) -> Self {
        let mut manifest = Self {
            archives,
            ..Self::default()
        };
        for target in project.targets() {
            manifest
                .vendored_libraries
                .extend_from_slice(target.vendored_libraries());
            manifest
                .vendored_frameworks
                .extend_from_slice(target.vendored_frameworks());
            manifest.resources.extend_from_slice(target.resources());
        }
        manifest.dedup();
        manifest
    }

    /// Drops repeated paths from each collection, keeping first-seen order.
    pub fn dedup(&mut self) {
        dedup_paths(&mut self.archives);
        dedup_paths(&mut self.vendored_libraries);
        dedup_paths(&mut self.vendored_frameworks);
        dedup_paths(&mut self.resources);
    }

    pub fn len(&self) -> usize {
        self.archives.len()
            + self.vendored_libraries.len()
            + self.vendored_frameworks.len()
            + self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn items(&self) -> impl Iterator<Item = &PathBuf> {
        self.archives
            .iter()
            .chain(&self.vendored_libraries)
            .chain(&self.vendored_frameworks)
            .chain(&self.resources)
    }
}

/// Clears `destination` and copies every manifest item into it.
///
/// Items are copied in manifest order with remove-then-copy, so when two
/// items share a file name the later one wins. A missing source is an error.
pub fn stage(destination: &Path, manifest: &StagingManifest) -> Result<Vec<PathBuf>, BuildError> {
    remove_if_exists(destination)?;
    fs::create_dir_all(destination).map_err(BuildError::fs("create directory", destination))?;

    info!(
        "[*] Staging {} item(s) into {}",
        manifest.len(),
        destination.display()
    );

    let mut staged = Vec::new();
    for item in manifest.items() {
        let Some(name) = item.file_name() else {
            return Err(BuildError::Config(format!(
                "Cannot stage {}: path has no file name",
                item.display()
            )));
        };
        let dest = destination.join(name);
        debug!("Copying {} -> {}", item.display(), dest.display());
        copy_replacing(item, &dest)?;
        if !staged.contains(&dest) {
            staged.push(dest);
        }
    }

    Ok(staged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::BuildTarget;
    use crate::types::Platform;
    use tempfile::TempDir;

    #[test]
    fn test_manifest_collects_all_targets() {
        let project = Project::new(
            "P.xcodeproj",
            "Pods",
            vec![
                BuildTarget::new("Pods-App", Platform::Ios)
                    .module("A", "A")
                    .vendored_framework("/v/Vendor.xcframework")
                    .resource("/r/Assets.bundle"),
                BuildTarget::new("Pods-Empty", Platform::Ios)
                    .vendored_library("/v/libfoo.a")
                    .vendored_framework("/v/Vendor.xcframework"),
            ],
        );
        let manifest = StagingManifest::from_project(&project, vec![PathBuf::from("/b/A.xcframework")]);

        assert_eq!(manifest.vendored_frameworks, vec![PathBuf::from("/v/Vendor.xcframework")]);
        assert_eq!(manifest.vendored_libraries, vec![PathBuf::from("/v/libfoo.a")]);
        assert_eq!(manifest.resources.len(), 1);
        assert_eq!(manifest.len(), 4);
    }

    #[test]
    fn test_stage_clears_destination() {
        let temp_dir = TempDir::new().unwrap();
        let destination = temp_dir.path().join("Rome");
        fs::create_dir_all(&destination).unwrap();
        fs::write(destination.join("Leftover.txt"), "old").unwrap();

        let lib = temp_dir.path().join("libfoo.a");
        fs::write(&lib, "lib").unwrap();
        let manifest = StagingManifest {
            vendored_libraries: vec![lib],
            ..StagingManifest::default()
        };

        let staged = stage(&destination, &manifest).unwrap();
        assert_eq!(staged, vec![destination.join("libfoo.a")]);
        assert!(!destination.join("Leftover.txt").exists());
    }

    #[test]
    fn test_stage_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("build/A.xcframework");
        fs::create_dir_all(archive.join("ios-arm64")).unwrap();
        fs::write(archive.join("Info.plist"), "plist").unwrap();
        let destination = temp_dir.path().join("Rome");
        let manifest = StagingManifest {
            archives: vec![archive.clone(), archive],
            ..StagingManifest::default()
        };

        let first = stage(&destination, &manifest).unwrap();
        let second = stage(&destination, &manifest).unwrap();

        assert_eq!(first, second);
        assert_eq!(fs::read_dir(&destination).unwrap().count(), 1);
        assert!(destination.join("A.xcframework/ios-arm64").is_dir());
    }

    #[test]
    fn test_later_item_with_same_name_wins() {
        let temp_dir = TempDir::new().unwrap();
        let sim = temp_dir.path().join("Debug-iphonesimulator/A.framework");
        let device = temp_dir.path().join("Debug-iphoneos/A.framework");
        for (dir, marker) in [(&sim, "sim"), (&device, "device")] {
            fs::create_dir_all(dir).unwrap();
            fs::write(dir.join("marker"), marker).unwrap();
        }
        let destination = temp_dir.path().join("Rome");
        let manifest = StagingManifest {
            archives: vec![sim, device],
            ..StagingManifest::default()
        };

        let staged = stage(&destination, &manifest).unwrap();
        assert_eq!(staged.len(), 1);
        assert_eq!(
            fs::read_to_string(destination.join("A.framework/marker")).unwrap(),
            "device"
        );
    }

    #[test]
    fn test_missing_source_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let manifest = StagingManifest {
            resources: vec![temp_dir.path().join("Missing.bundle")],
            ..StagingManifest::default()
        };
        let err = stage(&temp_dir.path().join("Rome"), &manifest).unwrap_err();
        assert!(matches!(err, BuildError::Filesystem { .. }));
    }
}
