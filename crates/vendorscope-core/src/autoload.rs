//! Autoloader generation for the target directory.
//!
//! Two files are written into the target: `autoload-classmap.php`, a PHP
//! array of fully qualified type name to target-relative path, and
//! `autoload.php`, which registers the classmap, optionally a PSR-4 loader
//! for the host project, and requires every auto-include file.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::ScopeError;
use crate::syntax::PhpScanner;

pub const AUTOLOAD_FILE: &str = "autoload.php";
pub const CLASSMAP_FILE: &str = "autoload-classmap.php";

/// Map every type declared under `dir` to its `/`-separated path relative
/// to `dir`. The generated autoload files themselves are skipped.
pub fn build_classmap(dir: &Path) -> Result<BTreeMap<String, String>, ScopeError> {
    let scanner = PhpScanner::new()?;
    let mut classmap = BTreeMap::new();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "skipping unreadable entry");
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().is_file() || !path.extension().is_some_and(|ext| ext == "php") {
            continue;
        }
        let Ok(relative) = path.strip_prefix(dir) else {
            continue;
        };
        let relative = slash_path(relative);
        if relative == AUTOLOAD_FILE || relative == CLASSMAP_FILE {
            continue;
        }
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping unreadable file");
                continue;
            }
        };
        for name in scanner.qualified_types(&text) {
            classmap.entry(name).or_insert_with(|| relative.clone());
        }
    }

    debug!(dir = %dir.display(), types = classmap.len(), "built classmap");
    Ok(classmap)
}

/// Write `autoload-classmap.php` and `autoload.php` into `dir`.
///
/// `files` are auto-include paths relative to `dir`. Host PSR-4 directories
/// are relative to `working_dir` and are rewritten relative to `dir`.
pub fn generate(
    dir: &Path,
    files: &[String],
    host_psr4: &BTreeMap<String, Vec<String>>,
    working_dir: &Path,
) -> Result<(), ScopeError> {
    fs::create_dir_all(dir).map_err(|e| ScopeError::io(dir, e))?;
    let classmap = build_classmap(dir)?;

    let classmap_path = dir.join(CLASSMAP_FILE);
    fs::write(&classmap_path, render_classmap(&classmap))
        .map_err(|e| ScopeError::io(&classmap_path, e))?;

    let psr4: BTreeMap<String, Vec<String>> = host_psr4
        .iter()
        .map(|(ns, dirs)| {
            let dirs = dirs
                .iter()
                .map(|d| relative_to(dir, &working_dir.join(d)))
                .collect();
            (ns.clone(), dirs)
        })
        .collect();

    let autoload_path = dir.join(AUTOLOAD_FILE);
    fs::write(&autoload_path, render_autoload(files, &psr4))
        .map_err(|e| ScopeError::io(&autoload_path, e))?;

    info!(
        dir = %dir.display(),
        types = classmap.len(),
        files = files.len(),
        "generated autoloader"
    );
    Ok(())
}

/// Escape for a single-quoted PHP string.
fn php_quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn render_classmap(classmap: &BTreeMap<String, String>) -> String {
    let mut out = String::from("<?php\n\n// Generated by vendorscope. Do not edit.\n\nreturn [\n");
    for (name, path) in classmap {
        let _ = writeln!(out, "    {} => {},", php_quote(name), php_quote(path));
    }
    out.push_str("];\n");
    out
}

fn render_autoload(files: &[String], psr4: &BTreeMap<String, Vec<String>>) -> String {
    let mut out = String::from("<?php\n\n// Generated by vendorscope. Do not edit.\n\n");
    out.push_str(
        "spl_autoload_register(static function ($class) {\n\
         \x20   static $classmap = null;\n\
         \x20   if ($classmap === null) {\n\
         \x20       $classmap = require __DIR__ . '/autoload-classmap.php';\n\
         \x20   }\n\
         \x20   if (isset($classmap[$class])) {\n\
         \x20       require_once __DIR__ . '/' . $classmap[$class];\n\
         \x20   }\n\
         });\n",
    );

    if !psr4.is_empty() {
        out.push_str("\nspl_autoload_register(static function ($class) {\n    $prefixes = [\n");
        for (namespace, dirs) in psr4 {
            let dirs: Vec<String> = dirs
                .iter()
                .map(|d| format!("__DIR__ . {}", php_quote(&format!("/{}/", d.trim_end_matches('/')))))
                .collect();
            let _ = writeln!(out, "        {} => [{}],", php_quote(namespace), dirs.join(", "));
        }
        out.push_str(
            "    ];\n\
             \x20   foreach ($prefixes as $prefix => $dirs) {\n\
             \x20       $len = strlen($prefix);\n\
             \x20       if (strncmp($class, $prefix, $len) !== 0) {\n\
             \x20           continue;\n\
             \x20       }\n\
             \x20       $relative = str_replace('\\\\', '/', substr($class, $len)) . '.php';\n\
             \x20       foreach ($dirs as $dir) {\n\
             \x20           if (is_file($dir . $relative)) {\n\
             \x20               require_once $dir . $relative;\n\
             \x20               return;\n\
             \x20           }\n\
             \x20       }\n\
             \x20   }\n\
             });\n",
        );
    }

    if !files.is_empty() {
        out.push('\n');
        for file in files {
            let _ = writeln!(out, "require_once __DIR__ . {};", php_quote(&format!("/{}", file)));
        }
    }
    out
}

fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// `to` expressed relative to `from`, `/`-separated.
fn relative_to(from: &Path, to: &Path) -> String {
    let from = normalize(from);
    let to = normalize(to);
    let from_parts: Vec<_> = from.components().collect();
    let to_parts: Vec<_> = to.components().collect();
    let common = from_parts
        .iter()
        .zip(&to_parts)
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = vec!["..".to_string(); from_parts.len() - common];
    parts.extend(
        to_parts[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );
    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}
