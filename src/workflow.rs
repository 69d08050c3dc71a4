use crate::error::{PkgupError, Result};
use crate::manifest::Manifest;
use crate::registry::{self, NpmRegistry, PackumentSet};
use crate::update::compat::{self, CompatOverrides, RangeTransform};
use crate::update::{self, MigrationTask, PackageInfo, UpdatePlan};
use crate::version;
use colored::Colorize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Peer-compatibility guarantees registered for every run, keyed by
/// package group name. A listed group promises that packages accepting
/// one of its majors also accept the following major.
const GROUP_GUARANTEES: &[(&str, RangeTransform)] =
    &[("@pkgup/core", compat::following_major_guarantee)];

fn compat_overrides() -> CompatOverrides {
    let mut overrides = CompatOverrides::new();
    for (group, transform) in GROUP_GUARANTEES {
        overrides.register(*group, *transform);
    }
    overrides
}

pub struct UpdateOptions {
    pub packages: Vec<String>,
    pub all: bool,
    pub next: bool,
    pub force: bool,
    pub migrate_only: bool,
    pub from: Option<String>,
    pub to: Option<String>,
    pub registry: Option<String>,
}

/// Execute the update workflow
pub fn execute_update<P: AsRef<Path>>(project_path: P, options: UpdateOptions) -> Result<()> {
    let project_dir = project_path.as_ref();
    println!("{}", "Planning dependency updates...".cyan().bold());

    if options.migrate_only && options.from.is_some() && options.packages.len() != 1 {
        return Err(PkgupError::InvalidArguments(
            "--from requires that only a single package be passed.".to_string(),
        ));
    }
    let from = version::normalize_migration_version(options.from.as_deref())?;
    let to = version::normalize_migration_version(options.to.as_deref())?;

    // Step 1: read the manifest
    println!("\n{}", "1. Reading package.json...".yellow());
    let mut manifest = Manifest::load(project_dir)?;
    let dependencies = manifest.dependency_map();
    println!(
        "{}",
        format!("✓ Found {} declared dependencies", dependencies.len()).green()
    );

    let mut candidates =
        update::build_package_list(&options.packages, options.all, options.next, &dependencies);
    let requested: BTreeSet<String> = candidates.keys().cloned().collect();

    // Step 2: fetch metadata for every declared dependency
    println!("\n{}", "2. Fetching registry metadata...".yellow());
    let registry_client = NpmRegistry::new(options.registry.as_deref())?;
    let names: Vec<String> = dependencies.keys().cloned().collect();
    let fetched = registry::fetch_all(&registry_client, &names)?;
    report_missing(&fetched, &requested, options.all)?;
    println!(
        "{}",
        format!("✓ Fetched metadata for {} packages", fetched.by_name.len()).green()
    );

    // Step 3: grow the update set and resolve each package
    println!("\n{}", "3. Resolving the update set...".yellow());
    update::expand_candidates(&mut candidates, &dependencies, &fetched.by_name);
    let (infos, resolution_errors) =
        resolve_infos(project_dir, &candidates, &dependencies, &fetched);
    for error in &resolution_errors {
        eprintln!("{} {}", "Error:".red().bold(), error);
    }
    println!(
        "{}",
        format!("✓ Considered {} packages", infos.len()).green()
    );

    // Nothing was requested: report what could be updated instead.
    if candidates.is_empty() {
        print_outdated_report(&infos, options.next);
        return finish(&resolution_errors);
    }

    if options.migrate_only {
        if let (Some(from), Some(name)) = (&from, requested.iter().next()) {
            match infos
                .get(name)
                .and_then(|info| update::migrate_only_task(info, from, to.as_ref()))
            {
                Some(task) => print_migrations(std::slice::from_ref(&task)),
                None => println!(
                    "{}",
                    format!("Package {} has no migrations to run.", name).yellow()
                ),
            }
            return finish(&resolution_errors);
        }
    }

    // Step 4: prove the whole graph stays peer-compatible
    println!("\n{}", "4. Validating peer dependencies...".yellow());
    let overrides = compat_overrides();
    let violations = update::validate_updates(&infos, &overrides);
    if violations.is_empty() {
        println!("{}", "✓ Peer dependencies are compatible".green());
    } else {
        for violation in &violations {
            if options.force {
                eprintln!("{} {}", "Warning:".yellow().bold(), violation);
            } else {
                eprintln!("{} {}", "Error:".red().bold(), violation);
            }
        }
        if !options.force {
            return Err(PkgupError::PeerCompatibility(violations.len()));
        }
        println!(
            "{}",
            "⚠ Proceeding despite peer conflicts (--force)".yellow()
        );
    }

    // Step 5: rewrite the manifest and hand off migrations
    println!("\n{}", "5. Applying the update plan...".yellow());
    let plan = update::build_plan(&infos);
    if plan.is_empty() {
        println!(
            "{}",
            "All requested packages are already up to date".yellow()
        );
        return finish(&resolution_errors);
    }

    if options.migrate_only {
        println!("{}", "Skipping package.json edits (--migrate-only)".dimmed());
    } else {
        for edit in &plan.edits {
            println!(
                "   Updating {} @ {} (was {})",
                edit.name.white().bold(),
                edit.to_version.to_string().green(),
                edit.from_version.to_string().dimmed()
            );
            if !manifest.set_dependency_version(&edit.name, &edit.to_version) {
                eprintln!(
                    "{} Package {} was not found in dependencies.",
                    "Warning:".yellow().bold(),
                    edit.name
                );
            }
        }
        if manifest.write_if_changed()? {
            println!("{}", "✓ package.json updated".green());
        }
    }

    print_plan(&plan);

    if resolution_errors.is_empty() {
        println!(
            "\n{}",
            "✨ Update process completed successfully!".green().bold()
        );
    }
    finish(&resolution_errors)
}

/// Execute the check workflow: report available updates, apply nothing.
pub fn execute_check<P: AsRef<Path>>(
    project_path: P,
    next: bool,
    registry_url: Option<String>,
) -> Result<()> {
    let project_dir = project_path.as_ref();
    println!("{}", "Checking for available updates...".cyan().bold());

    println!("\n{}", "1. Reading package.json...".yellow());
    let manifest = Manifest::load(project_dir)?;
    let dependencies = manifest.dependency_map();
    println!(
        "{}",
        format!("✓ Found {} declared dependencies", dependencies.len()).green()
    );

    println!("\n{}", "2. Fetching registry metadata...".yellow());
    let registry_client = NpmRegistry::new(registry_url.as_deref())?;
    let names: Vec<String> = dependencies.keys().cloned().collect();
    let fetched = registry::fetch_all(&registry_client, &names)?;
    println!(
        "{}",
        format!("✓ Fetched metadata for {} packages", fetched.by_name.len()).green()
    );

    let (infos, resolution_errors) =
        resolve_infos(project_dir, &BTreeMap::new(), &dependencies, &fetched);
    for error in &resolution_errors {
        eprintln!("{} {}", "Error:".red().bold(), error);
    }

    print_outdated_report(&infos, next);
    finish(&resolution_errors)
}

/// Build a `PackageInfo` for every fetched packument. Failures are
/// contained per package so one unresolvable dependency does not abort
/// the batch; they surface again in the exit code.
fn resolve_infos(
    project_dir: &Path,
    candidates: &BTreeMap<String, String>,
    dependencies: &BTreeMap<String, String>,
    fetched: &PackumentSet,
) -> (BTreeMap<String, PackageInfo>, Vec<PkgupError>) {
    let mut infos = BTreeMap::new();
    let mut errors = Vec::new();
    for packument in fetched.by_name.values() {
        match update::build_package_info(project_dir, candidates, dependencies, packument) {
            Ok(info) => {
                infos.insert(info.name.clone(), info);
            }
            Err(error) => errors.push(error),
        }
    }
    (infos, errors)
}

/// A missing packument only matters when the user explicitly asked for
/// that package; names pulled in speculatively may simply be private.
fn report_missing(fetched: &PackumentSet, requested: &BTreeSet<String>, all: bool) -> Result<()> {
    for name in &fetched.missing {
        if requested.contains(name) {
            if all {
                eprintln!(
                    "{} Package {:?} was not found on the registry. Skipping.",
                    "Warning:".yellow().bold(),
                    name
                );
            } else {
                return Err(PkgupError::PackageNotFound(name.clone()));
            }
        } else if std::env::var("PKGUP_VERBOSE").is_ok() {
            eprintln!("[VERBOSE] No registry metadata for {}, skipping.", name);
        }
    }
    Ok(())
}

fn finish(resolution_errors: &[PkgupError]) -> Result<()> {
    if resolution_errors.is_empty() {
        Ok(())
    } else {
        Err(PkgupError::ResolutionFailed(resolution_errors.len()))
    }
}

fn print_outdated_report(infos: &BTreeMap<String, PackageInfo>, next: bool) {
    let entries = update::build_outdated_report(infos, next);
    if entries.is_empty() {
        println!(
            "\n{}",
            "We analyzed your package.json and everything seems to be in order. Good work!"
                .green()
                .bold()
        );
        return;
    }

    println!(
        "\n{}\n",
        "We analyzed your package.json, there are some packages to update:"
            .cyan()
            .bold()
    );

    let name_width = entries
        .iter()
        .map(|entry| entry.name.len())
        .max()
        .unwrap_or(28)
        + 2;
    let version_width = 25;

    println!(
        "  {:<name_width$}{:<version_width$}{}",
        "Name", "Version", "Command to update"
    );
    println!(" {}", "-".repeat(name_width + version_width + 20));
    for entry in &entries {
        let versions = format!("{} -> {}", entry.installed, entry.latest);
        println!(
            "  {}{:<version_width$}{}",
            format!("{:<name_width$}", entry.name).white().bold(),
            versions,
            entry.command.cyan()
        );
    }

    println!(
        "\n{}",
        "There might be additional packages that are outdated.".dimmed()
    );
    println!(
        "{}",
        "Run \"pkgup update --all\" to try to update all at the same time.".dimmed()
    );
}

fn print_plan(plan: &UpdatePlan) {
    println!("\n{}", "Update Summary:".cyan().bold());
    println!(
        "{}",
        format!("Total updates: {}", plan.edits.len()).green()
    );
    for edit in &plan.edits {
        println!(
            "  • {} {} → {}",
            edit.name.white().bold(),
            edit.from_version.to_string().red(),
            edit.to_version.to_string().green()
        );
    }

    if !plan.migrations.is_empty() {
        print_migrations(&plan.migrations);
    }
}

fn print_migrations(tasks: &[MigrationTask]) {
    println!("\n{}:", "Scheduled migrations".cyan());
    for task in tasks {
        println!(
            "  • {} {} ({} → {})",
            task.package.white().bold(),
            task.collection.dimmed(),
            task.from_version,
            task.to_version
        );
    }
    println!(
        "{}",
        "Hand these to your migration runner once installation completes.".dimmed()
    );
}
