use crate::error::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

pub mod npm;
pub mod packument;

pub use npm::NpmRegistry;
pub use packument::{Packument, VersionManifest};

const FETCH_WORKERS: usize = 8;

pub trait RegistryClient: Send + Sync {
    /// Fetch the full metadata document for a package name. Registry and
    /// transport failures surface as `Ok(None)`, never as a fault.
    fn fetch_packument(&self, name: &str) -> Result<Option<Packument>>;
}

/// Every packument fetched for one planning run, keyed by the registry's
/// own package name. Each requested name is fetched exactly once; names
/// the registry did not know end up in `missing`.
pub struct PackumentSet {
    pub by_name: BTreeMap<String, Arc<Packument>>,
    pub missing: Vec<String>,
}

/// Fetch metadata for every name, fanning the requests out over a small
/// worker pool. Fetching is the only concurrent phase of a run; results
/// are written once into the set and read-only afterwards.
pub fn fetch_all(client: &dyn RegistryClient, names: &[String]) -> Result<PackumentSet> {
    let bar = ProgressBar::new(names.len() as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("  [{bar:40}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("=>-"),
    );

    let results: Mutex<Vec<(String, Result<Option<Packument>>)>> =
        Mutex::new(Vec::with_capacity(names.len()));
    let cursor = AtomicUsize::new(0);

    if !names.is_empty() {
        let workers = names.len().min(FETCH_WORKERS);
        thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| {
                    loop {
                        let index = cursor.fetch_add(1, Ordering::Relaxed);
                        let Some(name) = names.get(index) else {
                            break;
                        };
                        bar.set_message(format!("Fetching {}", name));
                        let fetched = client.fetch_packument(name);
                        bar.inc(1);
                        results.lock().unwrap().push((name.clone(), fetched));
                    }
                });
            }
        });
    }
    bar.finish_and_clear();

    let mut by_name = BTreeMap::new();
    let mut missing = Vec::new();
    for (name, fetched) in results.into_inner().unwrap() {
        match fetched? {
            Some(packument) => {
                by_name.insert(packument.name.clone(), Arc::new(packument));
            }
            None => missing.push(name),
        }
    }
    missing.sort();

    Ok(PackumentSet { by_name, missing })
}
