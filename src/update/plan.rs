use semver::Version;
use std::collections::BTreeMap;

use super::info::PackageInfo;
use super::metadata::UpdateMetadata;

/// One manifest range rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEdit {
    pub name: String,
    pub from_version: Version,
    pub to_version: Version,
}

/// One migration task descriptor. The planner only schedules these; an
/// external runner executes them after the new versions are installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationTask {
    pub package: String,
    pub collection: String,
    pub from_version: Version,
    pub to_version: Version,
}

/// The planner's terminal artifact: the manifest edits to apply plus the
/// migrations to hand off.
#[derive(Debug, Default)]
pub struct UpdatePlan {
    pub edits: Vec<ManifestEdit>,
    pub migrations: Vec<MigrationTask>,
}

impl UpdatePlan {
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty() && self.migrations.is_empty()
    }
}

/// Collect an edit for every package with a target, and a migration task
/// for every such package that ships a migration collection.
pub fn build_plan(infos: &BTreeMap<String, PackageInfo>) -> UpdatePlan {
    let mut plan = UpdatePlan::default();
    for info in infos.values() {
        let Some(target) = &info.target else {
            continue;
        };

        plan.edits.push(ManifestEdit {
            name: info.name.clone(),
            from_version: info.installed.version.clone(),
            to_version: target.version.clone(),
        });

        if let Some(migrations) = &target.metadata.migrations {
            plan.migrations.push(MigrationTask {
                package: info.name.clone(),
                collection: migration_collection(&info.name, migrations),
                from_version: info.installed.version.clone(),
                to_version: target.version.clone(),
            });
        }
    }
    plan
}

/// A relative migrations path resolves inside the package itself.
fn migration_collection(package: &str, migrations: &str) -> String {
    if migrations.starts_with('.') || migrations.starts_with('/') {
        format!("{package}/{migrations}")
    } else {
        migrations.to_string()
    }
}

/// Migration task for a migrate-only run, built from the installed
/// snapshot. `None` when the installed version ships no migrations.
pub fn migrate_only_task(
    info: &PackageInfo,
    from: &Version,
    to: Option<&Version>,
) -> Option<MigrationTask> {
    let migrations = info.installed.metadata.migrations.as_ref()?;
    Some(MigrationTask {
        package: info.name.clone(),
        collection: migration_collection(&info.name, migrations),
        from_version: from.clone(),
        to_version: to.cloned().unwrap_or_else(|| info.installed.version.clone()),
    })
}

/// One row of the informational "packages to update" report.
#[derive(Debug, Clone)]
pub struct OutdatedEntry {
    pub name: String,
    pub installed: Version,
    pub latest: String,
    pub command: String,
}

/// Build the report shown when no update was requested: the newest tagged
/// version per package, restricted to packages that publish update
/// metadata, with package groups collapsed to their group name.
pub fn build_outdated_report(
    infos: &BTreeMap<String, PackageInfo>,
    next: bool,
) -> Vec<OutdatedEntry> {
    let mut group_members: BTreeMap<String, String> = BTreeMap::new();
    let mut entries = Vec::new();

    for (name, info) in infos {
        let tag = if next && info.packument.dist_tags.contains_key("next") {
            "next"
        } else {
            "latest"
        };
        let Some(version_name) = info.packument.tagged_version(tag) else {
            continue;
        };
        let Ok(version) = Version::parse(version_name) else {
            continue;
        };
        let Some(target) = info.packument.versions.get(version_name) else {
            continue;
        };
        if version <= info.installed.version {
            continue;
        }
        // Only packages that publish update metadata know how to be
        // updated by this tool; the rest are the package manager's job.
        if target.update.is_none() {
            continue;
        }

        let mut display_name = name.clone();
        let metadata = UpdateMetadata::parse(target, name);
        if !metadata.package_group.is_empty() {
            if let Some(group_name) = metadata.package_group_name.clone() {
                if group_members.contains_key(name.as_str()) {
                    // Already covered by another member of its group.
                    continue;
                }
                for member in metadata.package_group.keys() {
                    group_members.insert(member.clone(), group_name.clone());
                }
                group_members.insert(group_name.clone(), group_name.clone());
                display_name = group_name;
            }
        }

        let mut command = format!("pkgup update {display_name}");
        if tag == "next" {
            command.push_str(" --next");
        }

        entries.push(OutdatedEntry {
            name: display_name,
            installed: info.installed.version.clone(),
            latest: version_name.to_string(),
            command,
        });
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    entries.dedup_by(|a, b| a.name == b.name);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::update::info::PackageInfo;
    use crate::update::testutil::{info_with_target, installed_info, packument, snapshot};
    use serde_json::json;

    #[test]
    fn plan_covers_only_targeted_packages() {
        let infos = BTreeMap::from([
            (
                "core".to_string(),
                info_with_target(
                    "core",
                    json!({ "version": "5.0.0" }),
                    json!({ "version": "6.0.0" }),
                    "^5.0.0",
                ),
            ),
            (
                "widgets".to_string(),
                installed_info("widgets", json!({ "version": "5.5.0" }), "^5.0.0"),
            ),
        ]);

        let plan = build_plan(&infos);
        assert_eq!(plan.edits.len(), 1);
        assert_eq!(plan.edits[0].name, "core");
        assert_eq!(plan.edits[0].to_version, Version::parse("6.0.0").unwrap());
        assert!(plan.migrations.is_empty());
    }

    #[test]
    fn relative_migration_paths_resolve_inside_the_package() {
        let infos = BTreeMap::from([(
            "core".to_string(),
            info_with_target(
                "core",
                json!({ "version": "5.0.0" }),
                json!({
                    "version": "6.0.0",
                    "pkgup": { "migrations": "./migrations/collection.json" },
                }),
                "^5.0.0",
            ),
        )]);

        let plan = build_plan(&infos);
        assert_eq!(plan.migrations.len(), 1);
        let task = &plan.migrations[0];
        assert_eq!(task.collection, "core/./migrations/collection.json");
        assert_eq!(task.from_version, Version::parse("5.0.0").unwrap());
        assert_eq!(task.to_version, Version::parse("6.0.0").unwrap());
    }

    #[test]
    fn named_migration_collections_are_kept_verbatim() {
        let infos = BTreeMap::from([(
            "core".to_string(),
            info_with_target(
                "core",
                json!({ "version": "5.0.0" }),
                json!({
                    "version": "6.0.0",
                    "pkgup": { "migrations": "@corp/migrations" },
                }),
                "^5.0.0",
            ),
        )]);

        let plan = build_plan(&infos);
        assert_eq!(plan.migrations[0].collection, "@corp/migrations");
    }

    #[test]
    fn migrate_only_defaults_to_the_installed_version() {
        let info = installed_info(
            "core",
            json!({
                "version": "6.0.0",
                "pkgup": { "migrations": "./migrations.json" },
            }),
            "^6.0.0",
        );

        let from = Version::parse("5.0.0").unwrap();
        let task = migrate_only_task(&info, &from, None).unwrap();
        assert_eq!(task.from_version, from);
        assert_eq!(task.to_version, Version::parse("6.0.0").unwrap());

        let bare = installed_info("bare", json!({ "version": "1.0.0" }), "^1.0.0");
        assert!(migrate_only_task(&bare, &from, None).is_none());
    }

    fn report_info(name: &str, installed: &str, packument_json: serde_json::Value) -> PackageInfo {
        let mut info = installed_info(name, json!({ "version": installed }), "^1.0.0");
        info.packument = packument(packument_json);
        info
    }

    #[test]
    fn report_skips_packages_without_update_metadata() {
        let infos = BTreeMap::from([
            (
                "plain".to_string(),
                report_info(
                    "plain",
                    "1.0.0",
                    json!({
                        "name": "plain",
                        "dist-tags": { "latest": "2.0.0" },
                        "versions": { "2.0.0": { "version": "2.0.0" } },
                    }),
                ),
            ),
            (
                "managed".to_string(),
                report_info(
                    "managed",
                    "1.0.0",
                    json!({
                        "name": "managed",
                        "dist-tags": { "latest": "2.0.0" },
                        "versions": {
                            "2.0.0": { "version": "2.0.0", "pkgup": {} },
                        },
                    }),
                ),
            ),
        ]);

        let entries = build_outdated_report(&infos, false);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "managed");
        assert_eq!(entries[0].latest, "2.0.0");
        assert_eq!(entries[0].command, "pkgup update managed");
    }

    #[test]
    fn report_collapses_package_groups() {
        let group_packument = |name: &str| {
            json!({
                "name": name,
                "dist-tags": { "latest": "2.0.0" },
                "versions": {
                    "2.0.0": {
                        "version": "2.0.0",
                        "pkgup": { "packageGroup": ["core", "widgets"] },
                    },
                },
            })
        };
        let infos = BTreeMap::from([
            (
                "core".to_string(),
                report_info("core", "1.0.0", group_packument("core")),
            ),
            (
                "widgets".to_string(),
                report_info("widgets", "1.0.0", group_packument("widgets")),
            ),
        ]);

        let entries = build_outdated_report(&infos, false);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "core");
    }

    #[test]
    fn report_is_empty_when_everything_is_current() {
        let infos = BTreeMap::from([(
            "managed".to_string(),
            report_info(
                "managed",
                "2.0.0",
                json!({
                    "name": "managed",
                    "dist-tags": { "latest": "2.0.0" },
                    "versions": {
                        "2.0.0": { "version": "2.0.0", "pkgup": {} },
                    },
                }),
            ),
        )]);

        assert!(build_outdated_report(&infos, false).is_empty());
    }

    #[test]
    fn report_prefers_the_next_tag_when_asked() {
        let infos = BTreeMap::from([(
            "managed".to_string(),
            report_info(
                "managed",
                "1.0.0",
                json!({
                    "name": "managed",
                    "dist-tags": { "latest": "2.0.0", "next": "3.0.0-rc.0" },
                    "versions": {
                        "2.0.0": { "version": "2.0.0", "pkgup": {} },
                        "3.0.0-rc.0": { "version": "3.0.0-rc.0", "pkgup": {} },
                    },
                }),
            ),
        )]);

        let entries = build_outdated_report(&infos, true);
        assert_eq!(entries[0].latest, "3.0.0-rc.0");
        assert_eq!(entries[0].command, "pkgup update managed --next");
    }

    #[test]
    fn snapshot_helper_parses_metadata() {
        // Guard the shared test fixture itself: snapshots carry parsed
        // metadata the planner relies on.
        let snap = snapshot(
            json!({
                "version": "6.0.0",
                "pkgup": { "packageGroupName": "core" },
            }),
            "core",
        );
        assert_eq!(snap.metadata.package_group_name.as_deref(), Some("core"));
    }
}
