//! Copying package files into the target directory.
//!
//! Files are filtered by exclude pattern on their package-relative path and
//! PHP files are split into source files (relocated) and template files
//! (copied verbatim). A file that cannot be read or written is logged and
//! skipped; only preparing the target directory itself is fatal.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::config::ExcludeFilter;
use crate::error::ScopeError;
use crate::manifest::Package;

/// Version-control directories never copied.
const VCS_DIRS: &[&str] = &[".git", ".svn", ".hg", "CVS", "_darcs", ".bzr"];

static DECLARES_SYMBOLS: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^\s*(?:namespace|(?:abstract\s+|final\s+)?class|interface|trait|enum)\s+[A-Za-z]",
    )
    .ok()
});
static HTML_OPEN: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"<[a-zA-Z]").ok());
static HTML_TAG: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"<[a-zA-Z][^>]*>").ok());

/// What copying one package produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CopyOutcome {
    /// Copied PHP files to relocate.
    pub php_files: Vec<PathBuf>,
    /// Copied PHP files classified as templates.
    pub template_files: Vec<PathBuf>,
    pub excluded_files: usize,
    /// Bytes of every file seen, excluded or not.
    pub original_size: u64,
    /// Bytes actually copied.
    pub total_size: u64,
}

impl CopyOutcome {
    /// Fold another package's outcome into this one.
    pub fn merge(&mut self, other: CopyOutcome) {
        self.php_files.extend(other.php_files);
        self.template_files.extend(other.template_files);
        self.excluded_files += other.excluded_files;
        self.original_size += other.original_size;
        self.total_size += other.total_size;
    }
}

/// Copies packages under a target directory.
#[derive(Debug, Clone)]
pub struct FileCopier {
    excludes: ExcludeFilter,
    template_dirs: Vec<String>,
}

impl FileCopier {
    pub fn new<S: AsRef<str>>(excludes: ExcludeFilter, template_dirs: &[S]) -> Self {
        FileCopier {
            excludes,
            template_dirs: template_dirs
                .iter()
                .map(|d| d.as_ref().to_lowercase())
                .collect(),
        }
    }

    /// Copy `package` into `<target>/<package-name>/`.
    ///
    /// A package whose directory is missing yields an empty outcome.
    pub fn copy_package(&self, package: &Package, target: &Path) -> CopyOutcome {
        let mut outcome = CopyOutcome::default();
        if !package.path.is_dir() {
            warn!(package = %package.name, path = %package.path.display(), "package directory missing");
            return outcome;
        }
        let package_target = target.join(&package.name);

        let walker = WalkDir::new(&package.path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden_or_vcs(e));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(package = %package.name, error = %err, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&package.path) else {
                continue;
            };
            let relative = relative_slash_path(relative);
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            outcome.original_size += size;

            if self.excludes.is_excluded(&relative) {
                debug!(package = %package.name, file = %relative, "excluded");
                outcome.excluded_files += 1;
                continue;
            }

            let destination = package_target.join(&relative);
            if let Err(err) = copy_file(entry.path(), &destination) {
                warn!(path = %entry.path().display(), error = %err, "copy failed, skipping");
                continue;
            }
            outcome.total_size += size;

            if entry.path().extension().is_some_and(|ext| ext == "php") {
                if self.is_template_file(entry.path(), &relative) {
                    outcome.template_files.push(destination);
                } else {
                    outcome.php_files.push(destination);
                }
            }
        }

        debug!(
            package = %package.name,
            php = outcome.php_files.len(),
            templates = outcome.template_files.len(),
            excluded = outcome.excluded_files,
            "copied package"
        );
        outcome
    }

    /// True if the PHP file at `path` is markup with embedded PHP rather
    /// than a source file.
    ///
    /// A file opening with `<?php` that declares a namespace or type is never
    /// a template. Otherwise a file under a template directory is one, as is
    /// a file that does not open with `<?php` but contains HTML, or one whose
    /// HTML tags outnumber its PHP open tags more than three to one.
    pub fn is_template_file(&self, path: &Path, relative: &str) -> bool {
        let content = fs::read_to_string(path).unwrap_or_default();
        let trimmed = content.trim_start();
        let opens_with_php = trimmed.starts_with("<?php");

        if opens_with_php
            && DECLARES_SYMBOLS
                .as_ref()
                .is_some_and(|re| re.is_match(&content))
        {
            return false;
        }

        let in_template_dir = relative
            .split(['/', '\\'])
            .any(|part| self.template_dirs.contains(&part.to_lowercase()));
        if in_template_dir {
            return true;
        }
        if content.is_empty() {
            return false;
        }

        if !opens_with_php && HTML_OPEN.as_ref().is_some_and(|re| re.is_match(trimmed)) {
            return true;
        }

        let php_tags = content.matches("<?php").count() + content.matches("<?=").count();
        let html_tags = HTML_TAG
            .as_ref()
            .map(|re| re.find_iter(&content).count())
            .unwrap_or(0);
        html_tags > 5 && html_tags > php_tags * 3
    }
}

fn is_hidden_or_vcs(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || VCS_DIRS.contains(&&*name)
}

fn relative_slash_path(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn copy_file(from: &Path, to: &Path) -> io::Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(from, to)?;
    Ok(())
}

/// Remove `dir` if present, then recreate it empty.
pub fn clean_target(dir: &Path) -> Result<(), ScopeError> {
    if dir.exists() {
        fs::remove_dir_all(dir).map_err(|e| ScopeError::io(dir, e))?;
    }
    fs::create_dir_all(dir).map_err(|e| ScopeError::io(dir, e))
}

/// Remove the original install directories of `packages`.
///
/// Failures are logged; returns how many directories were removed.
pub fn delete_packages(packages: &[Package]) -> usize {
    let mut removed = 0;
    for package in packages {
        if !package.path.is_dir() {
            continue;
        }
        match fs::remove_dir_all(&package.path) {
            Ok(()) => {
                debug!(package = %package.name, "deleted original package");
                removed += 1;
            }
            Err(err) => {
                warn!(package = %package.name, error = %err, "could not delete package");
            }
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn fixture_package(root: &Path) -> Package {
        let pkg = root.join("vendor/geoip2/geoip2");
        write(
            &pkg.join("src/Database/Reader.php"),
            "<?php\nnamespace GeoIp2\\Database;\n\nclass Reader {}\n",
        );
        write(
            &pkg.join("src/Model/City.php"),
            "<?php\nnamespace GeoIp2\\Model;\n\nclass City {}\n",
        );
        write(&pkg.join("README.md"), "# GeoIP2\n");
        write(&pkg.join("tests/ReaderTest.php"), "<?php\n");
        write(&pkg.join(".git/HEAD"), "ref: refs/heads/main\n");
        write(&pkg.join(".gitattributes"), "* text\n");
        write(&pkg.join("views/row.php"), "<tr><td><?= $x ?></td></tr>\n");
        Package::new("geoip2/geoip2", pkg).with_psr4(r"GeoIp2\", "src/")
    }

    fn copier(patterns: &[&str], template_dirs: &[&str]) -> FileCopier {
        FileCopier::new(ExcludeFilter::new(patterns).unwrap(), template_dirs)
    }

    #[test]
    fn copies_package_files() {
        let dir = TempDir::new().unwrap();
        let package = fixture_package(dir.path());
        let target = dir.path().join("out");

        let outcome = copier(&[], &["views"]).copy_package(&package, &target);
        let base = target.join("geoip2/geoip2");
        assert!(base.join("src/Database/Reader.php").is_file());
        assert!(base.join("src/Model/City.php").is_file());
        assert!(!base.join(".git").exists());
        assert!(!base.join(".gitattributes").exists());
        assert_eq!(
            outcome.php_files,
            vec![
                base.join("src/Database/Reader.php"),
                base.join("src/Model/City.php"),
                base.join("tests/ReaderTest.php"),
            ]
        );
        assert_eq!(outcome.template_files, vec![base.join("views/row.php")]);
        assert_eq!(outcome.original_size, outcome.total_size);
    }

    #[test]
    fn excludes_patterns_and_accounts_sizes() {
        let dir = TempDir::new().unwrap();
        let package = fixture_package(dir.path());
        let target = dir.path().join("out");

        let outcome = copier(&[r"\.md$", r"(?:^|/)tests?/"], &[]).copy_package(&package, &target);
        let base = target.join("geoip2/geoip2");
        assert!(!base.join("README.md").exists());
        assert!(!base.join("tests").exists());
        assert_eq!(outcome.excluded_files, 2);
        assert!(outcome.original_size > outcome.total_size);
    }

    #[test]
    fn missing_package_directory_yields_nothing() {
        let dir = TempDir::new().unwrap();
        let package = Package::new("a/b", dir.path().join("nowhere"));
        let outcome = copier(&[], &[]).copy_package(&package, dir.path());
        assert_eq!(outcome, CopyOutcome::default());
    }

    #[test]
    fn detects_template_directories() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("template.php");
        fs::write(&file, "<div><?php echo $name; ?></div>").unwrap();
        let c = copier(&[], &["views", "templates"]);
        assert!(c.is_template_file(&file, "views/template.php"));
        assert!(c.is_template_file(&file, "some/Views/page.php"));
    }

    #[test]
    fn class_in_template_directory_is_source() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("ServiceProvider.php");
        fs::write(&file, "<?php\n\nnamespace Rabbit\\Templates;\n\nclass ServiceProvider {}\n").unwrap();
        let c = copier(&[], &["views", "templates"]);
        assert!(!c.is_template_file(&file, "templates/ServiceProvider.php"));
    }

    #[test]
    fn detects_templates_by_content() {
        let dir = TempDir::new().unwrap();
        let c = copier(&[], &[]);

        let html_first = dir.path().join("a.php");
        fs::write(&html_first, "<html>\n<body><?php echo $title; ?></body>\n</html>\n").unwrap();
        assert!(c.is_template_file(&html_first, "other/a.php"));

        let tag_heavy = dir.path().join("b.php");
        fs::write(
            &tag_heavy,
            "<?php $rows = get_rows(); ?>\n<table><tr><td>a</td><td>b</td></tr><tr><td>c</td></tr></table>\n",
        )
        .unwrap();
        assert!(c.is_template_file(&tag_heavy, "b.php"));

        let source = dir.path().join("c.php");
        fs::write(&source, "<?php\n/** Returns <b>bold</b> */\nfunction f() {}\n").unwrap();
        assert!(!c.is_template_file(&source, "src/c.php"));
    }

    #[test]
    fn clean_target_empties_directory() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("clean-test");
        write(&target.join("old-file.php"), "<?php // old");
        clean_target(&target).unwrap();
        assert!(target.is_dir());
        assert!(!target.join("old-file.php").exists());
    }

    #[test]
    fn deletes_original_packages() {
        let dir = TempDir::new().unwrap();
        let package = fixture_package(dir.path());
        let ghost = Package::new("ghost/pkg", dir.path().join("ghost"));
        assert_eq!(delete_packages(&[package.clone(), ghost]), 1);
        assert!(!package.path.exists());
    }
}
