use crate::registry::{Packument, VersionManifest};
use colored::Colorize;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::info;

/// Build the requested-update list from command-line package specs.
/// Invalid specs and names the manifest does not declare are skipped with
/// a warning; under `all`, so are dependencies whose declared version is
/// a URL or a local path rather than a range.
pub fn build_package_list(
    specs: &[String],
    all: bool,
    next: bool,
    dependencies: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let spec_re = Regex::new(r"^((?:@[^/]{1,100}/)?[^@]{1,100})(?:@(.{1,100}))?$").unwrap();
    let default_spec = if next { "next" } else { "latest" };

    let requested: Vec<String> = if !specs.is_empty() {
        specs
            .iter()
            .flat_map(|spec| spec.split(','))
            .filter(|spec| !spec.trim().is_empty())
            .map(|spec| spec.trim().to_string())
            .collect()
    } else if all {
        dependencies.keys().cloned().collect()
    } else {
        Vec::new()
    };

    let mut packages = BTreeMap::new();
    for spec in requested {
        let Some(captures) = spec_re.captures(&spec) else {
            warn(format!("Invalid package argument: {:?}. Skipping.", spec));
            continue;
        };
        let name = &captures[1];
        let requested_version = captures.get(2).map(|m| m.as_str());

        let Some(declared) = dependencies.get(name) else {
            warn(format!("Package not installed: {:?}. Skipping.", name));
            continue;
        };

        // A label, URL, or local path has no versions to resolve against.
        // The explicit single-package case is left alone: the user knows
        // what they asked for.
        if all && has_custom_version_scheme(declared) {
            warn(format!(
                "Package {:?} has a custom version: {:?}. Skipping.",
                name, declared
            ));
            continue;
        }

        packages.insert(
            name.to_string(),
            requested_version.unwrap_or(default_spec).to_string(),
        );
    }

    packages
}

fn has_custom_version_scheme(range: &str) -> bool {
    let github_re = Regex::new(r"^\w{1,100}/\w{1,100}").unwrap();
    let path_re = Regex::new(r"^\.{0,2}/\w{1,100}").unwrap();

    range.starts_with("http:")
        || range.starts_with("file:")
        || range.starts_with("git:")
        || github_re.is_match(range)
        || path_re.is_match(range)
}

/// Grow the candidate list with declared package groups and peer
/// dependencies until one full pass adds no new name. Every pass either
/// adds at least one name or ends the loop, so the fixed point is reached
/// within as many passes as there are distinct names.
pub fn expand_candidates(
    candidates: &mut BTreeMap<String, String>,
    dependencies: &BTreeMap<String, String>,
    packuments: &BTreeMap<String, Arc<Packument>>,
) {
    loop {
        let before = candidates.len();
        for packument in packuments.values() {
            add_package_group(candidates, dependencies, packument);
            add_peer_dependencies(candidates, packument);
        }
        if candidates.len() == before {
            break;
        }
    }
}

/// Pull the members of a requested package's group into the candidate
/// list. Names from the command line are never overridden, and a group
/// member that package.json does not declare is never invented.
fn add_package_group(
    candidates: &mut BTreeMap<String, String>,
    dependencies: &BTreeMap<String, String>,
    packument: &Packument,
) {
    let Some(spec) = candidates.get(&packument.name).cloned() else {
        return;
    };
    let Some(manifest) = requested_manifest(packument, &spec) else {
        return;
    };
    let Some(group_value) = manifest.update.as_ref().and_then(|u| u.get("packageGroup")) else {
        return;
    };
    let Some(members) = package_group_members(group_value, &spec) else {
        warn(format!(
            "packageGroup metadata of package {} is malformed.",
            packument.name
        ));
        return;
    };

    for (member, member_spec) in members {
        if candidates.contains_key(&member) || !dependencies.contains_key(&member) {
            continue;
        }
        candidates.insert(member, member_spec);
    }
}

/// Pull a requested package's peer dependencies into the candidate list,
/// whether or not package.json declares them. Versions are not verified
/// here; a peer that cannot be resolved surfaces later as an explicit
/// missing-peer diagnostic.
fn add_peer_dependencies(candidates: &mut BTreeMap<String, String>, packument: &Packument) {
    let Some(spec) = candidates.get(&packument.name).cloned() else {
        return;
    };
    let Some(manifest) = requested_manifest(packument, &spec) else {
        return;
    };

    for (peer, range) in &manifest.peer_dependencies {
        if !candidates.contains_key(peer) {
            candidates.insert(peer.clone(), range.clone());
        }
    }
}

/// The version manifest a requested spec points at, resolved the same way
/// the info resolver will resolve the target.
fn requested_manifest<'a>(packument: &'a Packument, spec: &str) -> Option<&'a VersionManifest> {
    if let Some(version) = info::resolve_spec(packument, spec) {
        if let Some(manifest) = packument.manifest(&version) {
            return Some(manifest);
        }
    }
    packument.versions.get(spec)
}

/// Array-form groups inherit the requested spec, so every member follows
/// the same tag; map-form groups carry explicit per-member versions.
fn package_group_members(value: &Value, spec: &str) -> Option<Vec<(String, String)>> {
    match value {
        Value::Array(names) => names
            .iter()
            .map(|name| {
                name.as_str()
                    .map(|name| (name.to_string(), spec.to_string()))
            })
            .collect(),
        Value::Object(map) => map
            .iter()
            .map(|(name, version)| {
                version
                    .as_str()
                    .map(|version| (name.clone(), version.to_string()))
            })
            .collect(),
        _ => None,
    }
}

fn warn(message: String) {
    eprintln!("{} {}", "Warning:".yellow().bold(), message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::update::testutil::packument;
    use serde_json::json;

    fn deps(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(name, range)| (name.to_string(), range.to_string()))
            .collect()
    }

    #[test]
    fn parses_names_and_requested_versions() {
        let dependencies = deps(&[("core", "^5.0.0"), ("@scope/pkg", "^1.0.0")]);
        let packages = build_package_list(
            &["core@6.0.0".to_string(), "@scope/pkg@next".to_string()],
            false,
            false,
            &dependencies,
        );

        assert_eq!(packages.get("core").map(String::as_str), Some("6.0.0"));
        assert_eq!(packages.get("@scope/pkg").map(String::as_str), Some("next"));
    }

    #[test]
    fn bare_names_default_to_the_requested_tag() {
        let dependencies = deps(&[("core", "^5.0.0")]);

        let latest = build_package_list(&["core".to_string()], false, false, &dependencies);
        assert_eq!(latest.get("core").map(String::as_str), Some("latest"));

        let next = build_package_list(&["core".to_string()], false, true, &dependencies);
        assert_eq!(next.get("core").map(String::as_str), Some("next"));
    }

    #[test]
    fn comma_separated_arguments_are_split() {
        let dependencies = deps(&[("core", "^5.0.0"), ("widgets", "^5.0.0")]);
        let packages =
            build_package_list(&["core,widgets".to_string()], false, false, &dependencies);
        assert_eq!(packages.len(), 2);
    }

    #[test]
    fn undeclared_packages_are_skipped() {
        let dependencies = deps(&[("core", "^5.0.0")]);
        let packages = build_package_list(&["ghost".to_string()], false, false, &dependencies);
        assert!(packages.is_empty());
    }

    #[test]
    fn all_seeds_every_declared_dependency() {
        let dependencies = deps(&[("core", "^5.0.0"), ("widgets", "^5.0.0")]);
        let packages = build_package_list(&[], true, false, &dependencies);
        assert_eq!(packages.len(), 2);
    }

    #[test]
    fn all_skips_custom_version_schemes() {
        let dependencies = deps(&[
            ("core", "^5.0.0"),
            ("local", "file:../local"),
            ("fork", "someuser/somerepo"),
        ]);
        let packages = build_package_list(&[], true, false, &dependencies);
        assert_eq!(packages.len(), 1);
        assert!(packages.contains_key("core"));
    }

    #[test]
    fn group_members_follow_the_requested_package() {
        let dependencies = deps(&[("core", "^5.0.0"), ("widgets", "^5.0.0")]);
        let packuments = BTreeMap::from([(
            "core".to_string(),
            packument(json!({
                "name": "core",
                "dist-tags": { "latest": "6.0.0" },
                "versions": {
                    "6.0.0": {
                        "version": "6.0.0",
                        "pkgup": { "packageGroup": ["core", "widgets", "undeclared"] },
                    },
                },
            })),
        )]);

        let mut candidates = BTreeMap::from([("core".to_string(), "latest".to_string())]);
        expand_candidates(&mut candidates, &dependencies, &packuments);

        assert_eq!(candidates.get("widgets").map(String::as_str), Some("latest"));
        // Group expansion never invents a dependency.
        assert!(!candidates.contains_key("undeclared"));
    }

    #[test]
    fn peers_are_added_even_when_undeclared() {
        let dependencies = deps(&[("widgets", "^5.0.0")]);
        let packuments = BTreeMap::from([(
            "widgets".to_string(),
            packument(json!({
                "name": "widgets",
                "dist-tags": { "latest": "5.5.0" },
                "versions": {
                    "5.5.0": {
                        "version": "5.5.0",
                        "peerDependencies": { "core": "^5.0.0" },
                    },
                },
            })),
        )]);

        let mut candidates = BTreeMap::from([("widgets".to_string(), "latest".to_string())]);
        expand_candidates(&mut candidates, &dependencies, &packuments);

        assert_eq!(candidates.get("core").map(String::as_str), Some("^5.0.0"));
    }

    #[test]
    fn expansion_reaches_a_fixed_point() {
        let dependencies = deps(&[("core", "^5.0.0"), ("widgets", "^5.0.0")]);
        let packuments = BTreeMap::from([
            (
                "core".to_string(),
                packument(json!({
                    "name": "core",
                    "dist-tags": { "latest": "6.0.0" },
                    "versions": {
                        "6.0.0": {
                            "version": "6.0.0",
                            "pkgup": { "packageGroup": ["core", "widgets"] },
                        },
                    },
                })),
            ),
            (
                "widgets".to_string(),
                packument(json!({
                    "name": "widgets",
                    "dist-tags": { "latest": "6.0.0" },
                    "versions": {
                        "6.0.0": {
                            "version": "6.0.0",
                            "peerDependencies": { "runtime": "^6.0.0" },
                        },
                    },
                })),
            ),
        ]);

        let mut candidates = BTreeMap::from([("core".to_string(), "latest".to_string())]);
        expand_candidates(&mut candidates, &dependencies, &packuments);
        let after_first = candidates.clone();

        // The transitively discovered peer arrived through the group member.
        assert!(candidates.contains_key("runtime"));

        expand_candidates(&mut candidates, &dependencies, &packuments);
        assert_eq!(candidates, after_first);
    }
}
