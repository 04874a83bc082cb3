//! The prefixing run: resolve, copy, harvest, rewrite, generate.
//!
//! Every stage takes the previous stage's output and nothing else. A stage
//! that finds nothing to do ends the run successfully. Only configuration,
//! manifest and target-directory failures abort; single files that cannot be
//! read or written are logged and skipped.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use vendorscope_core::autoload;
use vendorscope_core::config::{Config, DevConfig};
use vendorscope_core::copier::{clean_target, delete_packages, CopyOutcome, FileCopier};
use vendorscope_core::error::ScopeError;
use vendorscope_core::facts::{harvest_constants, harvest_global_types, ScopeFacts};
use vendorscope_core::manifest::Package;
use vendorscope_core::output::RunSummary;
use vendorscope_core::relocate::{rewrite_file, RelocationPipeline, Relocator};
use vendorscope_core::resolve::PackageFinder;
use vendorscope_core::syntax::PhpScanner;

// ============================================================================
// Plan (dry run)
// ============================================================================

/// What a run would do, computed without touching the filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunPlan {
    pub namespace_prefix: String,
    pub class_prefix: String,
    pub constant_prefix: String,
    /// Resolved packages, seeds and their dependencies.
    pub packages: Vec<String>,
    pub namespaces: Vec<String>,
    pub target_directory: PathBuf,
    pub call_site_directories: Vec<PathBuf>,
    pub dev_packages: Vec<String>,
}

// ============================================================================
// Prefixer
// ============================================================================

/// Runs one prefixing pass for a loaded [`Config`].
#[derive(Debug)]
pub struct Prefixer {
    config: Config,
    finder: PackageFinder,
}

impl Prefixer {
    pub fn new(config: Config) -> Self {
        let finder = PackageFinder::new(config.vendor_directory());
        Prefixer { config, finder }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resolve packages and report what [`Prefixer::run`] would touch.
    pub fn plan(&mut self) -> Result<RunPlan, ScopeError> {
        let packages = if self.config.packages.is_empty() {
            Vec::new()
        } else {
            self.finder
                .find_packages(&self.config.packages, &self.config.exclude_packages)?
        };
        let dev_packages = match self.config.dev_packages.as_ref().filter(|d| d.is_active()) {
            Some(dev) => self
                .finder
                .find_packages(&dev.packages, &self.config.exclude_packages)?,
            None => Vec::new(),
        };

        Ok(RunPlan {
            namespace_prefix: self.config.namespace_prefix.clone(),
            class_prefix: self.config.class_prefix.clone(),
            constant_prefix: self.config.constant_prefix.clone(),
            namespaces: collect_namespaces(&packages),
            packages: packages.into_iter().map(|p| p.name).collect(),
            target_directory: self.config.absolute_target_directory(),
            call_site_directories: if self.config.update_call_sites {
                self.config.call_site_directories()
            } else {
                Vec::new()
            },
            dev_packages: dev_packages.into_iter().map(|p| p.name).collect(),
        })
    }

    /// Run every stage and return the counters.
    pub fn run(&mut self) -> Result<RunSummary, ScopeError> {
        let mut summary = RunSummary::new(self.config.target_directory.clone());
        let target = self.config.absolute_target_directory();

        if self.config.packages.is_empty() {
            info!("no packages configured");
            if !self.config.host_psr4.is_empty() {
                info!(target = %target.display(), "generating autoloader for host project");
                autoload::generate(
                    &target,
                    &[],
                    &self.config.host_psr4,
                    &self.config.working_dir,
                )?;
            }
            return Ok(summary);
        }

        // Resolve
        let packages = self
            .finder
            .find_packages(&self.config.packages, &self.config.exclude_packages)?;
        if packages.is_empty() {
            warn!("no packages found; run 'composer install' first");
            return Ok(summary);
        }
        summary.packages = packages.len();
        info!(
            count = packages.len(),
            packages = %package_names(&packages),
            "resolved packages"
        );

        // Copy
        let copier = FileCopier::new(
            self.config.exclude_filter()?,
            &self.config.exclude_directories,
        );
        info!(target = %target.display(), "cleaning target directory");
        clean_target(&target)?;
        let copied = copy_all(&copier, &packages, &target);
        let files_autoload = surviving_auto_includes(&packages, &target);

        summary.source_files = copied.php_files.len();
        summary.template_files = copied.template_files.len();
        summary.excluded_files = copied.excluded_files;
        summary.original_size = copied.original_size;
        summary.total_size = copied.total_size;
        info!(
            php = copied.php_files.len(),
            templates = copied.template_files.len(),
            excluded = copied.excluded_files,
            "copied files"
        );

        // Harvest
        let namespaces = collect_namespaces(&packages);
        let facts = ScopeFacts::harvest(namespaces, &copied.php_files)?;
        summary.namespaces = facts.namespaces.len();
        summary.global_types = facts.global_types.len();
        summary.constants = facts.constants.len();
        info!(
            namespaces = facts.namespaces.len(),
            global_types = facts.global_types.len(),
            constants = facts.constants.len(),
            "harvested symbols"
        );

        // Rewrite
        let pipeline = facts.pipeline(&self.config.prefixes())?;
        let rewritten = rewrite_all(&pipeline, &copied.php_files);
        info!(files = rewritten, "applied prefixes");

        if self.config.update_call_sites {
            summary.call_sites_updated = self.update_call_sites(&pipeline, &target);
        }

        autoload::generate(
            &target,
            &files_autoload,
            &self.config.host_psr4,
            &self.config.working_dir,
        )?;

        if let Some(dev) = self.config.dev_packages.clone().filter(DevConfig::is_active) {
            self.run_dev_packages(&dev, &copier, &facts.namespaces)?;
        }

        if self.config.delete_vendor_packages {
            let removed = delete_packages(&packages);
            info!(removed, "deleted original vendor packages");
        }

        info!("done");
        Ok(summary)
    }

    /// Rewrite the host project's own sources; returns how many changed.
    fn update_call_sites(&self, pipeline: &RelocationPipeline, target: &Path) -> usize {
        let dirs = self.config.call_site_directories();
        if dirs.is_empty() {
            info!("no call site directories found, skipping call site updates");
            return 0;
        }
        let files = call_site_files(&dirs, target);
        let count = rewrite_all(pipeline, &files);
        info!(files = count, "updated call sites");
        count
    }

    /// Prefix dev packages into their own target.
    ///
    /// Namespaces are the union of the main run's and the dev packages';
    /// global types and constants come from the dev files alone.
    fn run_dev_packages(
        &mut self,
        dev: &DevConfig,
        copier: &FileCopier,
        existing_namespaces: &[String],
    ) -> Result<(), ScopeError> {
        info!("processing dev packages");
        let packages = self
            .finder
            .find_packages(&dev.packages, &self.config.exclude_packages)?;
        if packages.is_empty() {
            info!("no dev packages found");
            return Ok(());
        }

        let Some(target) = self.config.absolute_dev_target_directory() else {
            return Ok(());
        };
        clean_target(&target)?;
        let copied = copy_all(copier, &packages, &target);
        let files_autoload = surviving_auto_includes(&packages, &target);

        let mut namespaces = existing_namespaces.to_vec();
        for ns in collect_namespaces(&packages) {
            if !namespaces.contains(&ns) {
                namespaces.push(ns);
            }
        }
        let scanner = PhpScanner::new()?;
        let facts = ScopeFacts {
            namespaces,
            global_types: harvest_global_types(&scanner, &copied.php_files),
            constants: harvest_constants(&scanner, &copied.php_files),
        };
        let pipeline = facts.pipeline(&self.config.prefixes())?;
        rewrite_all(&pipeline, &copied.php_files);

        autoload::generate(&target, &files_autoload, &Default::default(), &self.config.working_dir)?;
        info!(files = copied.php_files.len(), "processed dev packages");
        Ok(())
    }
}

// ============================================================================
// Stage helpers
// ============================================================================

fn package_names(packages: &[Package]) -> String {
    packages
        .iter()
        .map(|p| p.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn copy_all(copier: &FileCopier, packages: &[Package], target: &Path) -> CopyOutcome {
    let mut total = CopyOutcome::default();
    for package in packages {
        debug!(package = %package.name, "copying");
        total.merge(copier.copy_package(package, target));
    }
    total
}

/// Auto-include files, target-relative, that were actually copied.
fn surviving_auto_includes(packages: &[Package], target: &Path) -> Vec<String> {
    let mut files = Vec::new();
    for package in packages {
        for file in &package.files {
            let relative = format!("{}/{}", package.name, file.trim_start_matches("./"));
            if target.join(&relative).is_file() {
                files.push(relative);
            } else {
                debug!(package = %package.name, file = %file, "auto-include file was excluded");
            }
        }
    }
    files
}

/// Namespaces of all packages, in package order, de-duplicated.
fn collect_namespaces(packages: &[Package]) -> Vec<String> {
    let mut namespaces: Vec<String> = Vec::new();
    for ns in packages.iter().flat_map(Package::namespaces) {
        if !namespaces.contains(&ns) {
            namespaces.push(ns);
        }
    }
    namespaces
}

fn rewrite_all(relocator: &dyn Relocator, files: &[PathBuf]) -> usize {
    files.iter().filter(|f| rewrite_file(relocator, f)).count()
}

/// `*.php` files under `dirs`, skipping any `vendor` directory and `target`.
fn call_site_files(dirs: &[PathBuf], target: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for dir in dirs {
        let walker = WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                if e.depth() == 0 || !e.file_type().is_dir() {
                    return true;
                }
                e.file_name() != "vendor" && e.path() != target
            });
        for entry in walker.filter_map(Result::ok) {
            let path = entry.path();
            if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == "php") {
                files.push(path.to_path_buf());
            }
        }
    }
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn namespaces_are_collected_in_package_order() {
        let packages = vec![
            Package::new("geoip2/geoip2", "/v/g").with_psr4(r"GeoIp2\", "src"),
            Package::new("maxmind-db/reader", "/v/m")
                .with_psr4(r"MaxMind\Db\", "src/MaxMind/Db")
                .with_psr4(r"GeoIp2\", "compat"),
        ];
        assert_eq!(collect_namespaces(&packages), vec!["GeoIp2", r"MaxMind\Db"]);
    }

    #[test]
    fn call_site_walk_skips_vendor_and_target() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        for rel in ["Plugin.php", "Admin/Page.php", "vendor/x.php", "deps/y.php", "notes.txt"] {
            let path = src.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, "<?php\n").unwrap();
        }
        let files = call_site_files(&[src.clone()], &src.join("deps"));
        assert_eq!(files, vec![src.join("Admin/Page.php"), src.join("Plugin.php")]);
    }

    #[test]
    fn auto_includes_must_survive_copying() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("a/b/src")).unwrap();
        fs::write(dir.path().join("a/b/src/functions.php"), "<?php\n").unwrap();
        let mut package = Package::new("a/b", "/v/a/b");
        package.files = vec!["src/functions.php".into(), "tests/bootstrap.php".into()];
        assert_eq!(
            surviving_auto_includes(&[package], dir.path()),
            vec!["a/b/src/functions.php"]
        );
    }
}
