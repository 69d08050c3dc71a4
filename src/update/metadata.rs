use crate::registry::VersionManifest;
use colored::Colorize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Parsed `pkgup` block of a published version manifest. A package uses
/// it to declare the group it is updated together with, requirements on
/// other packages, and the migration collection shipped with a release.
/// Malformed fields are dropped with a warning, never an error; an absent
/// block yields the empty default.
#[derive(Debug, Clone, Default)]
pub struct UpdateMetadata {
    pub package_group: BTreeMap<String, String>,
    pub package_group_name: Option<String>,
    #[allow(dead_code)]
    pub requirements: BTreeMap<String, String>,
    pub migrations: Option<String>,
}

impl UpdateMetadata {
    pub fn parse(manifest: &VersionManifest, package_name: &str) -> Self {
        let mut result = UpdateMetadata::default();
        let Some(Value::Object(metadata)) = &manifest.update else {
            return result;
        };

        if let Some(group) = metadata.get("packageGroup") {
            match parse_package_group(group, &manifest.version) {
                Some((members, first)) => {
                    result.package_group = members;
                    result.package_group_name = first;
                }
                None => warn(format!(
                    "packageGroup metadata of package {} is malformed. Ignoring.",
                    package_name
                )),
            }
        }

        if let Some(Value::String(name)) = metadata.get("packageGroupName") {
            result.package_group_name = Some(name.clone());
        }

        if let Some(requirements) = metadata.get("requirements") {
            match string_map(requirements) {
                Some(map) => result.requirements = map,
                None => warn(format!(
                    "requirements metadata of package {} is malformed. Ignoring.",
                    package_name
                )),
            }
        }

        if let Some(migrations) = metadata.get("migrations") {
            match migrations.as_str() {
                Some(path) => result.migrations = Some(path.to_string()),
                None => warn(format!(
                    "migrations metadata of package {} is malformed. Ignoring.",
                    package_name
                )),
            }
        }

        result
    }
}

/// The array form maps every member to the publishing version; the map
/// form carries explicit per-member versions. The first declared member
/// doubles as the default group name.
fn parse_package_group(
    value: &Value,
    own_version: &str,
) -> Option<(BTreeMap<String, String>, Option<String>)> {
    match value {
        Value::Array(names) => {
            let mut members = BTreeMap::new();
            for name in names {
                members.insert(name.as_str()?.to_string(), own_version.to_string());
            }
            let first = names.first().and_then(|n| n.as_str()).map(str::to_string);
            Some((members, first))
        }
        other => {
            let members = string_map(other)?;
            let first = other
                .as_object()
                .and_then(|map| map.keys().next())
                .cloned();
            Some((members, first))
        }
    }
}

fn string_map(value: &Value) -> Option<BTreeMap<String, String>> {
    let object = value.as_object()?;
    let mut map = BTreeMap::new();
    for (key, value) in object {
        map.insert(key.clone(), value.as_str()?.to_string());
    }
    Some(map)
}

fn warn(message: String) {
    eprintln!("{} {}", "Warning:".yellow().bold(), message);
}
