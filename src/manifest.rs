use crate::error::{PkgupError, Result};
use crate::registry::VersionManifest;
use semver::Version;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Dependency blocks in precedence order: a rewrite lands in the first
/// block that declares the name, and stale duplicates in the later ones
/// are removed.
const DEPENDENCY_KINDS: [&str; 3] = ["dependencies", "devDependencies", "peerDependencies"];

/// The project's package.json, kept as a raw JSON document so a rewrite
/// preserves every field and the original key order.
pub struct Manifest {
    document: Value,
    path: PathBuf,
}

impl Manifest {
    pub fn load<P: AsRef<Path>>(project_dir: P) -> Result<Self> {
        let path = project_dir.as_ref().join("package.json");
        if !path.exists() {
            return Err(PkgupError::ManifestMissing);
        }

        let content = fs::read_to_string(&path)?;
        let document: Value = serde_json::from_str(&content)
            .map_err(|e| PkgupError::ManifestUnparsable(e.to_string()))?;

        if !document.is_object() {
            return Err(PkgupError::ManifestUnparsable(
                "top-level value is not an object".to_string(),
            ));
        }

        Ok(Self { document, path })
    }

    /// Merge the peer, dev, and runtime dependency blocks into one
    /// name→range map. Later blocks win on collision, so a runtime entry
    /// overrides a dev entry which overrides a peer entry.
    pub fn dependency_map(&self) -> BTreeMap<String, String> {
        let mut merged = BTreeMap::new();
        for kind in ["peerDependencies", "devDependencies", "dependencies"] {
            if let Some(block) = self.document.get(kind).and_then(|v| v.as_object()) {
                for (name, range) in block {
                    if let Some(range) = range.as_str() {
                        merged.insert(name.clone(), range.to_string());
                    }
                }
            }
        }
        merged
    }

    /// Rewrite the declared range for `name` to point at `new_version`,
    /// keeping a leading caret or tilde from the old range. Duplicate
    /// declarations in lesser dependency kinds are removed. Returns false
    /// when no dependency block declares the name.
    pub fn set_dependency_version(&mut self, name: &str, new_version: &Version) -> bool {
        let Some(index) = DEPENDENCY_KINDS.iter().position(|kind| {
            self.document
                .get(kind)
                .and_then(|block| block.get(name))
                .is_some()
        }) else {
            return false;
        };

        let kind = DEPENDENCY_KINDS[index];
        let old_range = self.document[kind][name].as_str().unwrap_or("");
        // Only caret and tilde prefixes survive an update.
        let new_range = match old_range.chars().next() {
            Some(prefix @ ('^' | '~')) => format!("{prefix}{new_version}"),
            _ => new_version.to_string(),
        };
        self.document[kind][name] = Value::String(new_range);

        for stale in &DEPENDENCY_KINDS[index + 1..] {
            if let Some(block) = self.document.get_mut(*stale).and_then(|v| v.as_object_mut()) {
                block.remove(name);
            }
        }

        true
    }

    fn render(&self) -> Result<String> {
        Ok(format!("{}\n", serde_json::to_string_pretty(&self.document)?))
    }

    /// Write the document back only when it differs from what is on disk.
    pub fn write_if_changed(&self) -> Result<bool> {
        let rendered = self.render()?;
        let current = fs::read_to_string(&self.path)?;
        if current == rendered {
            return Ok(false);
        }
        fs::write(&self.path, rendered)?;
        Ok(true)
    }
}

/// Manifest recorded in the local install tree for `name`, when present.
/// This is the exact-version artifact that wins over range resolution.
pub fn installed_manifest(project_dir: &Path, name: &str) -> Option<VersionManifest> {
    let path = project_dir
        .join("node_modules")
        .join(name)
        .join("package.json");
    let content = fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}
