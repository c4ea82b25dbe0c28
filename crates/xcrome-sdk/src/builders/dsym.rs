//! Debug symbol relocation.
//!
//! Collects every `.dSYM` bundle xcodebuild left in the device and simulator
//! products directories and copies it under
//! `<dsym_destination>/<sdk>/`.

use std::fs;
use std::path::PathBuf;

use tracing::{debug, info};
use walkdir::WalkDir;

use super::common::{copy_replacing, remove_if_exists};
use crate::types::{BuildError, BuildLayout, Sdk};

/// SDKs whose debug symbols are relocated, in copy order.
pub const RELOCATED_SDKS: [Sdk; 2] = [Sdk::IphoneOs, Sdk::IphoneSimulator];

/// Clears the debug symbol destination and copies every `.dSYM` bundle found
/// under `{build_root}/{configuration}-{sdk}` into it.
///
/// Bundles are not searched inside; a `.dSYM` nested in another `.dSYM` is
/// copied as part of its parent. Returns the copied bundle paths.
pub fn relocate_debug_symbols(
    layout: &BuildLayout,
    configuration: &str,
) -> Result<Vec<PathBuf>, BuildError> {
    let root = &layout.dsym_destination;
    remove_if_exists(root)?;
    fs::create_dir_all(root).map_err(BuildError::fs("create directory", root))?;

    let mut relocated = Vec::new();
    for sdk in RELOCATED_SDKS {
        let products = layout.products_dir(configuration, sdk);
        if !products.is_dir() {
            debug!("No products for {} at {}", sdk, products.display());
            continue;
        }

        let target_dir = root.join(sdk.as_str());
        let mut walker = WalkDir::new(&products)
            .sort_by_file_name()
            .into_iter();
        while let Some(entry) = walker.next() {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(&products).to_path_buf();
                BuildError::Filesystem {
                    action: "walk",
                    path,
                    source: e.into(),
                }
            })?;
            if !entry.file_type().is_dir() || !is_dsym(entry.path()) {
                continue;
            }
            walker.skip_current_dir();

            let Some(name) = entry.path().file_name() else {
                continue;
            };
            let dest = target_dir.join(name);
            copy_replacing(entry.path(), &dest)?;
            relocated.push(dest);
        }
    }

    info!(
        "[*] Relocated {} dSYM bundle(s) to {}",
        relocated.len(),
        root.display()
    );
    Ok(relocated)
}

fn is_dsym(path: &std::path::Path) -> bool {
    path.extension().is_some_and(|ext| ext == "dSYM")
}
