use crate::version::Range;
use semver::Version;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use super::info::PackageInfo;

pub type RangeTransform = fn(&Range) -> Range;

/// Range-widening guarantees keyed by package-group name, scoped to one
/// planning run. A registered transform widens the peer range a dependent
/// declares before the reverse check runs against it.
#[derive(Default)]
pub struct CompatOverrides {
    table: HashMap<String, RangeTransform>,
}

impl CompatOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, group_name: impl Into<String>, transform: RangeTransform) {
        self.table.insert(group_name.into(), transform);
    }

    fn widen(&self, group_name: &str, range: &Range) -> Range {
        match self.table.get(group_name) {
            Some(transform) => transform(range),
            None => range.clone(),
        }
    }
}

/// A package group can guarantee that a major is also compatible with the
/// following major. This widens a peer range accordingly: packages that
/// accept `^5.0.0` then also accept the whole 6.x series, pre-releases of
/// its minors included.
pub fn following_major_guarantee(range: &Range) -> Range {
    if !range.is_valid() {
        return range.clone();
    }
    let Some(top) = range.max_allowed_major() else {
        // Unbounded above (e.g. >=5.0.0); nothing to widen.
        return range.clone();
    };

    let mut widened = range.raw().to_string();
    for minor in 0..20 {
        widened.push_str(&format!(" || ^{}.{minor}.0-alpha.0", top + 1));
    }

    let candidate = Range::parse(&widened);
    if candidate.is_valid() {
        candidate
    } else {
        range.clone()
    }
}

/// One collected peer-compatibility failure.
#[derive(Debug)]
pub enum CompatViolation {
    MissingPeer {
        package: String,
        peer: String,
        range: String,
    },
    Forward {
        package: String,
        peer: String,
        range: String,
        would_install: Version,
    },
    Reverse {
        dependent: String,
        package: String,
        range: String,
        widened: bool,
        would_install: Version,
    },
}

impl fmt::Display for CompatViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompatViolation::MissingPeer {
                package,
                peer,
                range,
            } => write!(
                f,
                "Package {:?} has a missing peer dependency of {:?} @ {:?}.",
                package, peer, range
            ),
            CompatViolation::Forward {
                package,
                peer,
                range,
                would_install,
            } => write!(
                f,
                "Package {:?} has an incompatible peer dependency to {:?} (requires {:?}, would install {:?}).",
                package,
                peer,
                range,
                would_install.to_string()
            ),
            CompatViolation::Reverse {
                dependent,
                package,
                range,
                widened,
                would_install,
            } => write!(
                f,
                "Package {:?} has an incompatible peer dependency to {:?} (requires {:?}{}, would install {:?}).",
                dependent,
                package,
                range,
                if *widened { " (extended)" } else { "" },
                would_install.to_string()
            ),
        }
    }
}

/// Check every package that would be updated against the whole graph, in
/// both directions, collecting all violations instead of stopping at the
/// first so one run reports every conflict.
pub fn validate_updates(
    infos: &BTreeMap<String, PackageInfo>,
    overrides: &CompatOverrides,
) -> Vec<CompatViolation> {
    let mut violations = Vec::new();
    for info in infos.values() {
        let Some(target) = &info.target else {
            continue;
        };
        validate_forward_peers(info, infos, &mut violations);
        validate_reverse_peers(&info.name, &target.version, infos, overrides, &mut violations);
    }
    violations
}

/// Forward direction: every peer the target manifest declares must
/// resolve to a compatible effective version.
fn validate_forward_peers(
    info: &PackageInfo,
    infos: &BTreeMap<String, PackageInfo>,
    violations: &mut Vec<CompatViolation>,
) {
    let Some(target) = &info.target else {
        return;
    };

    for (peer, range) in &target.manifest.peer_dependencies {
        let Some(peer_info) = infos.get(peer) else {
            violations.push(CompatViolation::MissingPeer {
                package: info.name.clone(),
                peer: peer.clone(),
                range: range.clone(),
            });
            continue;
        };

        let effective = peer_info
            .target
            .as_ref()
            .map(|target| &target.version)
            .unwrap_or(&peer_info.installed.version);

        if !Range::parse(range).satisfies(effective) {
            violations.push(CompatViolation::Forward {
                package: info.name.clone(),
                peer: peer.clone(),
                range: range.clone(),
                would_install: effective.clone(),
            });
        }
    }
}

/// Reverse direction: every package that declares a peer range on the one
/// being updated must accept the new target version, after any registered
/// group guarantee widened the range.
fn validate_reverse_peers(
    name: &str,
    target_version: &Version,
    infos: &BTreeMap<String, PackageInfo>,
    overrides: &CompatOverrides,
    violations: &mut Vec<CompatViolation>,
) {
    for (dependent_name, dependent) in infos {
        let manifest = dependent
            .target
            .as_ref()
            .map(|target| &target.manifest)
            .unwrap_or(&dependent.installed.manifest);

        for (peer, range) in &manifest.peer_dependencies {
            // Only peers on the package being updated matter; unmet peers
            // this update has no effect on are not its problem.
            if peer != name {
                continue;
            }

            let declared = Range::parse(range);
            let extended = match group_name_for(infos, peer) {
                Some(group_name) => overrides.widen(&group_name, &declared),
                None => declared.clone(),
            };

            if !extended.satisfies(target_version) {
                violations.push(CompatViolation::Reverse {
                    dependent: dependent_name.clone(),
                    package: name.to_string(),
                    range: range.clone(),
                    widened: extended.raw() != declared.raw(),
                    would_install: target_version.clone(),
                });
            }
        }
    }
}

/// The group name a package resolves to for override lookup: its target's
/// metadata when it has a target, else its installed metadata, falling
/// back to the package's own name.
fn group_name_for(infos: &BTreeMap<String, PackageInfo>, name: &str) -> Option<String> {
    let info = infos.get(name)?;
    let metadata = info
        .target
        .as_ref()
        .map(|target| &target.metadata)
        .unwrap_or(&info.installed.metadata);
    Some(
        metadata
            .package_group_name
            .clone()
            .unwrap_or_else(|| name.to_string()),
    )
}
