use semver::Version;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Full registry metadata for one package name: the dist-tag table plus
/// every published version's manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct Packument {
    pub name: String,
    #[serde(rename = "dist-tags", default)]
    pub dist_tags: BTreeMap<String, String>,
    #[serde(default)]
    pub versions: BTreeMap<String, VersionManifest>,
}

/// Manifest fields of one published version. The `pkgup` block is kept
/// raw and validated lazily by `UpdateMetadata::parse`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionManifest {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    #[allow(dead_code)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub peer_dependencies: BTreeMap<String, String>,
    #[serde(rename = "pkgup", default)]
    pub update: Option<serde_json::Value>,
}

impl Packument {
    /// Concrete version a dist-tag points at, if the tag exists.
    pub fn tagged_version(&self, tag: &str) -> Option<&str> {
        self.dist_tags.get(tag).map(String::as_str)
    }

    pub fn manifest(&self, version: &Version) -> Option<&VersionManifest> {
        self.versions.get(&version.to_string())
    }

    pub fn version_names(&self) -> impl Iterator<Item = &str> {
        self.versions.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_registry_field_names() {
        let packument: Packument = serde_json::from_value(json!({
            "name": "widgets",
            "dist-tags": { "latest": "5.5.0", "next": "6.0.0-rc.1" },
            "versions": {
                "5.5.0": {
                    "version": "5.5.0",
                    "peerDependencies": { "core": "^5.0.0" },
                    "pkgup": { "packageGroup": ["widgets"] },
                },
            },
        }))
        .unwrap();

        assert_eq!(packument.tagged_version("latest"), Some("5.5.0"));
        assert_eq!(packument.tagged_version("beta"), None);

        let manifest = &packument.versions["5.5.0"];
        assert_eq!(
            manifest.peer_dependencies.get("core").map(String::as_str),
            Some("^5.0.0")
        );
        assert!(manifest.update.is_some());
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let packument: Packument = serde_json::from_value(json!({
            "name": "bare",
        }))
        .unwrap();

        assert!(packument.dist_tags.is_empty());
        assert!(packument.versions.is_empty());
    }
}
