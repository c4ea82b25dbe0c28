//! Framework merging.
//!
//! xcodebuild writes each module to `{cfg}-{sdk}/{package}/{module}.framework`.
//! Staging and the raw frameworks mode want one bundle per module directly
//! under `{cfg}-{sdk}/`, so after each SDK pass the bundles are hoisted one
//! level up. Targets sharing a module overwrite each other's copy; the last
//! visited wins.

use std::path::PathBuf;

use tracing::debug;

use super::common::copy_replacing;
use crate::project::BuildTarget;
use crate::types::{BuildError, BuildLayout, Sdk};

/// Copies every module framework of `target` to its merged location for each
/// SDK in `sdks`, in order.
///
/// Returns the merged paths that were written. Modules missing for an SDK are
/// skipped without error.
pub fn merge_frameworks(
    layout: &BuildLayout,
    target: &BuildTarget,
    sdks: &[Sdk],
    configuration: &str,
) -> Result<Vec<PathBuf>, BuildError> {
    let mut merged = Vec::new();

    for &sdk in sdks {
        for module in target.modules() {
            let source = layout.module_framework(configuration, sdk, module);
            if !source.is_dir() {
                debug!(
                    "No {} framework for {} in {}, skipping merge",
                    module.module,
                    sdk,
                    source.display()
                );
                continue;
            }

            let dest = layout.merged_framework(configuration, sdk, &module.module);
            copy_replacing(&source, &dest)?;
            merged.push(dest);
        }
    }

    Ok(merged)
}
