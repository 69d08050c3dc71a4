use crate::error::{PkgupError, Result};
use crate::manifest;
use crate::registry::{Packument, VersionManifest};
use crate::version::{self, Range};
use semver::Version;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use super::metadata::UpdateMetadata;

/// One resolved version of a package: the concrete version, its published
/// manifest, and the parsed update metadata.
#[derive(Debug, Clone)]
pub struct PackageSnapshot {
    pub version: Version,
    pub manifest: VersionManifest,
    pub metadata: UpdateMetadata,
}

/// Everything the planner knows about one package: what is installed,
/// what the requested spec resolves to, and the range package.json
/// declares. `target` is only present when a strictly newer version
/// answers the request.
#[derive(Debug, Clone)]
pub struct PackageInfo {
    pub name: String,
    pub packument: Arc<Packument>,
    pub installed: PackageSnapshot,
    pub target: Option<PackageSnapshot>,
    #[allow(dead_code)]
    pub declared_range: String,
}

/// Resolve a requested spec against a packument: a dist-tag name wins,
/// the literal token `next` falls back to the latest tag, and anything
/// else is treated as a range.
pub(crate) fn resolve_spec(packument: &Packument, spec: &str) -> Option<Version> {
    if let Some(tagged) = packument.tagged_version(spec) {
        return Version::parse(tagged).ok();
    }
    if spec == "next" {
        return packument
            .tagged_version("latest")
            .and_then(|tagged| Version::parse(tagged).ok());
    }
    version::max_satisfying(packument.version_names(), &Range::parse(spec))
}

pub fn build_package_info(
    project_dir: &Path,
    candidates: &BTreeMap<String, String>,
    dependencies: &BTreeMap<String, String>,
    packument: &Arc<Packument>,
) -> Result<PackageInfo> {
    let name = packument.name.clone();
    let declared_range = dependencies
        .get(&name)
        .cloned()
        .ok_or_else(|| PkgupError::PackageNotInManifest(name.clone()))?;

    // The exact version recorded in the install tree wins; otherwise take
    // the newest published version the declared range admits.
    let local = manifest::installed_manifest(project_dir, &name);
    let installed_version = local
        .as_ref()
        .and_then(|manifest| Version::parse(&manifest.version).ok())
        .or_else(|| {
            version::max_satisfying(packument.version_names(), &Range::parse(&declared_range))
        })
        .ok_or_else(|| PkgupError::VersionNotFound {
            name: name.clone(),
            spec: declared_range.clone(),
        })?;

    // A locally installed version the registry no longer lists still has
    // its manifest on disk.
    let installed_manifest = packument
        .manifest(&installed_version)
        .cloned()
        .or(local)
        .ok_or_else(|| PkgupError::VersionNotFound {
            name: name.clone(),
            spec: installed_version.to_string(),
        })?;

    let target = match candidates.get(&name) {
        Some(spec) => resolve_target(packument, spec, &installed_version, &name)?,
        None => None,
    };

    Ok(PackageInfo {
        installed: snapshot(installed_version, installed_manifest, &name),
        target,
        name,
        packument: Arc::clone(packument),
        declared_range,
    })
}

fn resolve_target(
    packument: &Packument,
    spec: &str,
    installed: &Version,
    name: &str,
) -> Result<Option<PackageSnapshot>> {
    let Some(target_version) = resolve_spec(packument, spec) else {
        return Err(PkgupError::VersionNotFound {
            name: name.to_string(),
            spec: spec.to_string(),
        });
    };

    if target_version <= *installed {
        if std::env::var("PKGUP_VERBOSE").is_ok() {
            eprintln!(
                "[VERBOSE] Package {} already satisfied at {}.",
                name, installed
            );
        }
        return Ok(None);
    }

    let manifest = packument
        .manifest(&target_version)
        .cloned()
        .ok_or_else(|| PkgupError::VersionNotFound {
            name: name.to_string(),
            spec: target_version.to_string(),
        })?;

    Ok(Some(snapshot(target_version, manifest, name)))
}

fn snapshot(version: Version, manifest: VersionManifest, package_name: &str) -> PackageSnapshot {
    let metadata = UpdateMetadata::parse(&manifest, package_name);
    PackageSnapshot {
        version,
        manifest,
        metadata,
    }
}
