//! Dependency closure resolution.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ScopeError;
use crate::manifest::{Manifest, Package};

/// Breadth-first closure of `seeds` over declared dependencies.
///
/// Excluded names are dropped before expansion, so anything reachable only
/// through an excluded package is left out too. Names missing from the
/// manifest are skipped. Packages come back in the order they were reached.
pub fn resolve<S: AsRef<str>>(manifest: &Manifest, seeds: &[S], excludes: &[S]) -> Vec<Package> {
    let excluded: HashSet<&str> = excludes.iter().map(|s| s.as_ref()).collect();
    let mut seen: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<String> = seeds.iter().map(|s| s.as_ref().to_string()).collect();
    let mut resolved = Vec::new();

    while let Some(name) = queue.pop_front() {
        if excluded.contains(name.as_str()) || !seen.insert(name.clone()) {
            continue;
        }
        let Some(package) = manifest.get(&name) else {
            debug!(package = %name, "not in manifest, skipping");
            continue;
        };
        for dep in &package.dependencies {
            if !seen.contains(dep) && !excluded.contains(dep.as_str()) {
                queue.push_back(dep.clone());
            }
        }
        resolved.push(package.clone());
    }

    resolved
}

/// Resolves packages against a vendor directory, loading its manifest once.
#[derive(Debug)]
pub struct PackageFinder {
    vendor_dir: PathBuf,
    manifest: Option<Manifest>,
}

impl PackageFinder {
    pub fn new(vendor_dir: impl Into<PathBuf>) -> Self {
        PackageFinder {
            vendor_dir: vendor_dir.into(),
            manifest: None,
        }
    }

    pub fn vendor_dir(&self) -> &Path {
        &self.vendor_dir
    }

    /// The manifest, read from disk on first use.
    pub fn manifest(&mut self) -> Result<&Manifest, ScopeError> {
        let manifest = match self.manifest.take() {
            Some(manifest) => manifest,
            None => Manifest::load(&self.vendor_dir)?,
        };
        let manifest: &Manifest = self.manifest.insert(manifest);
        Ok(manifest)
    }

    /// Resolve `seeds` and everything they depend on.
    pub fn find_packages<S: AsRef<str>>(
        &mut self,
        seeds: &[S],
        excludes: &[S],
    ) -> Result<Vec<Package>, ScopeError> {
        let manifest = self.manifest()?;
        Ok(resolve(manifest, seeds, excludes))
    }
}
