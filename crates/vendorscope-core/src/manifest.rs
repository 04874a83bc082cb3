//! Reading Composer's `vendor/composer/installed.json`.
//!
//! Both manifest shapes are accepted: Composer 1 writes a top-level array of
//! packages, Composer 2 wraps it as `{"packages": [...]}`. Composer emits an
//! empty PHP array (`[]`) for empty maps, so map-valued fields are read
//! leniently.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::ScopeError;

/// Manifest location relative to the vendor directory.
pub const INSTALLED_JSON: &str = "composer/installed.json";

// ============================================================================
// Package
// ============================================================================

/// One installed package, as far as relocation cares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Package {
    pub name: String,
    /// Directory the package is installed in.
    pub path: PathBuf,
    /// PSR-4 namespace -> directories, keys as written (`GeoIp2\`).
    pub psr4: BTreeMap<String, Vec<String>>,
    /// PSR-0 namespace -> directories.
    pub psr0: BTreeMap<String, Vec<String>>,
    /// Classmap directories and files.
    pub classmap: Vec<String>,
    /// Files included on every request.
    pub files: Vec<String>,
    /// Names of required packages, platform requirements removed.
    pub dependencies: Vec<String>,
}

impl Package {
    /// A package with no autoload information.
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Package {
            name: name.into(),
            path: path.into(),
            psr4: BTreeMap::new(),
            psr0: BTreeMap::new(),
            classmap: Vec::new(),
            files: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_psr4(mut self, namespace: impl Into<String>, dir: impl Into<String>) -> Self {
        self.psr4.entry(namespace.into()).or_default().push(dir.into());
        self
    }

    /// Namespaces declared by the package's PSR-4 and PSR-0 maps, trailing
    /// separators trimmed. Root mappings (empty namespace) are dropped.
    pub fn namespaces(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for key in self.psr4.keys().chain(self.psr0.keys()) {
            let ns = key.trim_matches('\\');
            if !ns.is_empty() && !out.iter().any(|n| n == ns) {
                out.push(ns.to_string());
            }
        }
        out
    }
}

/// True for requirements that name the runtime or one of its extensions
/// rather than an installable package.
pub fn is_platform_package(name: &str) -> bool {
    name == "php"
        || name.starts_with("php-")
        || name.starts_with("ext-")
        || name.starts_with("lib-")
        || name == "composer-plugin-api"
        || name == "composer-runtime-api"
        || !name.contains('/')
}

// ============================================================================
// Raw manifest shape
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InstalledJson {
    Wrapped { packages: Vec<RawPackage> },
    Flat(Vec<RawPackage>),
}

#[derive(Debug, Deserialize)]
struct RawPackage {
    name: Option<String>,
    #[serde(rename = "install-path")]
    install_path: Option<String>,
    #[serde(default, deserialize_with = "lenient_map")]
    autoload: Map<String, Value>,
    #[serde(default, deserialize_with = "lenient_map")]
    require: Map<String, Value>,
}

fn lenient_map<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(map) => map,
        _ => Map::new(),
    })
}

/// A string or list of strings.
fn strings(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

fn namespace_map(autoload: &Map<String, Value>, key: &str) -> BTreeMap<String, Vec<String>> {
    autoload
        .get(key)
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .map(|(ns, dirs)| (ns.clone(), strings(dirs)))
                .collect()
        })
        .unwrap_or_default()
}

// ============================================================================
// Manifest
// ============================================================================

/// All packages recorded in one `installed.json`, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    packages: BTreeMap<String, Package>,
}

impl Manifest {
    /// Load `<vendor_dir>/composer/installed.json`.
    pub fn load(vendor_dir: &Path) -> Result<Self, ScopeError> {
        let path = vendor_dir.join(INSTALLED_JSON);
        if !path.is_file() {
            return Err(ScopeError::ManifestNotFound { path });
        }
        let content = fs::read_to_string(&path).map_err(|e| ScopeError::io(&path, e))?;
        let raw: InstalledJson =
            serde_json::from_str(&content).map_err(|e| ScopeError::ManifestInvalid {
                path: path.clone(),
                message: e.to_string(),
            })?;
        let manifest = Self::from_raw(vendor_dir, raw);
        debug!(path = %path.display(), packages = manifest.len(), "loaded manifest");
        Ok(manifest)
    }

    /// Build a manifest from already constructed packages.
    pub fn from_packages(packages: impl IntoIterator<Item = Package>) -> Self {
        Manifest {
            packages: packages.into_iter().map(|p| (p.name.clone(), p)).collect(),
        }
    }

    fn from_raw(vendor_dir: &Path, raw: InstalledJson) -> Self {
        let entries = match raw {
            InstalledJson::Wrapped { packages } => packages,
            InstalledJson::Flat(packages) => packages,
        };
        let packages = entries.into_iter().filter_map(|entry| {
            let name = entry.name.clone()?;
            Some(build_package(vendor_dir, name, entry))
        });
        Self::from_packages(packages)
    }

    pub fn get(&self, name: &str) -> Option<&Package> {
        self.packages.get(name)
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

fn install_dir(vendor_dir: &Path, name: &str, install_path: Option<&str>) -> PathBuf {
    let fallback = vendor_dir.join(name);
    let Some(relative) = install_path else {
        return fallback;
    };
    match fs::canonicalize(vendor_dir.join("composer").join(relative)) {
        Ok(path) if path.is_dir() => path,
        _ => fallback,
    }
}

fn build_package(vendor_dir: &Path, name: String, raw: RawPackage) -> Package {
    let path = install_dir(vendor_dir, &name, raw.install_path.as_deref());
    let dependencies = raw
        .require
        .keys()
        .filter(|dep| !is_platform_package(dep))
        .cloned()
        .collect();

    Package {
        psr4: namespace_map(&raw.autoload, "psr-4"),
        psr0: namespace_map(&raw.autoload, "psr-0"),
        classmap: raw.autoload.get("classmap").map(strings).unwrap_or_default(),
        files: raw.autoload.get("files").map(strings).unwrap_or_default(),
        dependencies,
        name,
        path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_manifest(vendor: &Path, json: &str) {
        fs::create_dir_all(vendor.join("composer")).unwrap();
        fs::write(vendor.join(INSTALLED_JSON), json).unwrap();
    }

    #[test]
    fn reads_composer_2_shape() {
        let dir = TempDir::new().unwrap();
        let vendor = dir.path().join("vendor");
        fs::create_dir_all(vendor.join("geoip2/geoip2")).unwrap();
        write_manifest(
            &vendor,
            r#"{
                "packages": [
                    {
                        "name": "geoip2/geoip2",
                        "install-path": "../geoip2/geoip2",
                        "require": {"php": ">=8.1", "ext-json": "*", "maxmind-db/reader": "^1.11"},
                        "autoload": {"psr-4": {"GeoIp2\\": "src"}, "files": ["src/functions.php"]}
                    }
                ],
                "dev": true
            }"#,
        );

        let manifest = Manifest::load(&vendor).unwrap();
        let pkg = manifest.get("geoip2/geoip2").unwrap();
        assert_eq!(pkg.dependencies, vec!["maxmind-db/reader"]);
        assert_eq!(pkg.namespaces(), vec!["GeoIp2"]);
        assert_eq!(pkg.files, vec!["src/functions.php"]);
        assert_eq!(
            pkg.path,
            fs::canonicalize(vendor.join("geoip2/geoip2")).unwrap()
        );
    }

    #[test]
    fn reads_composer_1_shape_and_lenient_fields() {
        let dir = TempDir::new().unwrap();
        let vendor = dir.path().to_path_buf();
        write_manifest(
            &vendor,
            r#"[
                {
                    "name": "mustangostang/spyc",
                    "require": [],
                    "autoload": {"classmap": "Spyc.php", "psr-0": {"Legacy_": ["lib", "more"]}}
                },
                {"version": "1.0"}
            ]"#,
        );

        let manifest = Manifest::load(&vendor).unwrap();
        assert_eq!(manifest.len(), 1);
        let pkg = manifest.get("mustangostang/spyc").unwrap();
        assert_eq!(pkg.path, vendor.join("mustangostang/spyc"));
        assert_eq!(pkg.classmap, vec!["Spyc.php"]);
        assert_eq!(pkg.psr0["Legacy_"], vec!["lib", "more"]);
        assert!(pkg.dependencies.is_empty());
    }

    #[test]
    fn missing_manifest_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = Manifest::load(dir.path()).unwrap_err();
        assert!(matches!(err, ScopeError::ManifestNotFound { .. }));
        assert!(err.to_string().contains("composer install"));
    }

    #[test]
    fn invalid_manifest_is_an_error() {
        let dir = TempDir::new().unwrap();
        write_manifest(dir.path(), "{ not json");
        let err = Manifest::load(dir.path()).unwrap_err();
        assert!(matches!(err, ScopeError::ManifestInvalid { .. }));
    }

    #[test]
    fn platform_packages_are_recognised() {
        for name in ["php", "php-64bit", "ext-mbstring", "lib-icu", "composer-plugin-api", "composer-runtime-api", "hhvm"] {
            assert!(is_platform_package(name), "{name}");
        }
        assert!(!is_platform_package("psr/log"));
    }

    #[test]
    fn namespaces_skip_root_mappings_and_duplicates() {
        let pkg = Package::new("a/b", "/tmp/a")
            .with_psr4("", "src")
            .with_psr4(r"MaxMind\Db\", "src/MaxMind/Db")
            .with_psr4(r"MaxMind\Db\", "lib");
        assert_eq!(pkg.namespaces(), vec![r"MaxMind\Db"]);
        assert_eq!(pkg.psr4[r"MaxMind\Db\"].len(), 2);
    }
}
