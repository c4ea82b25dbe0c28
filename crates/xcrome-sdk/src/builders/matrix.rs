//! Platform to SDK resolution.
//!
//! Order matters: the merge phase copies variants in this order with
//! overwrite, so the last entry wins. Device SDKs therefore come after their
//! simulators, and Mac Catalyst (when enabled) comes first.

use std::collections::BTreeSet;

use crate::project::BuildTarget;
use crate::types::{BuildError, BuildOptions, Platform, Sdk};

/// Resolves the SDK variants each target is built for.
#[derive(Debug, Clone, Default)]
pub struct SdkMatrix {
    build_catalyst: bool,
    catalyst_exclusions: BTreeSet<String>,
}

impl SdkMatrix {
    pub fn new(options: &BuildOptions) -> Self {
        Self {
            build_catalyst: options.build_ios_catalyst,
            catalyst_exclusions: options
                .skipping_umbrella_targets_for_catalyst
                .iter()
                .cloned()
                .collect(),
        }
    }

    /// Every SDK any target of `platform` may need, in merge order.
    ///
    /// Catalyst is included whenever it is enabled; use [`Self::includes`] to
    /// apply the per-target exclusion list.
    pub fn for_platform(&self, platform: Platform) -> Vec<Sdk> {
        match platform {
            Platform::Ios => {
                let mut sdks = Vec::with_capacity(3);
                if self.build_catalyst {
                    sdks.push(Sdk::MacCatalyst);
                }
                sdks.push(Sdk::IphoneSimulator);
                sdks.push(Sdk::IphoneOs);
                sdks
            }
            Platform::Osx => vec![Sdk::MacOsx],
            Platform::Tvos => vec![Sdk::AppleTvSimulator, Sdk::AppleTvOs],
            Platform::Watchos => vec![Sdk::WatchSimulator, Sdk::WatchOs],
        }
    }

    /// SDKs for one target label on `platform`, in merge order.
    pub fn resolve(&self, platform: Platform, label: &str) -> Vec<Sdk> {
        self.for_platform(platform)
            .into_iter()
            .filter(|sdk| self.includes(*sdk, label))
            .collect()
    }

    /// Like [`Self::resolve`] but takes the platform by name, failing with a
    /// configuration error for names outside the known set.
    pub fn resolve_named(&self, platform: &str, label: &str) -> Result<Vec<Sdk>, BuildError> {
        let platform: Platform = platform.parse()?;
        Ok(self.resolve(platform, label))
    }

    pub fn for_target(&self, target: &BuildTarget) -> Vec<Sdk> {
        self.resolve(target.platform(), target.label())
    }

    /// Whether the target with `label` is built for `sdk`.
    ///
    /// Only Mac Catalyst is gated: it needs the flag and the label must not
    /// be in the exclusion list.
    pub fn includes(&self, sdk: Sdk, label: &str) -> bool {
        if sdk.is_cross_compile() {
            self.build_catalyst && !self.catalyst_exclusions.contains(label)
        } else {
            true
        }
    }
}
