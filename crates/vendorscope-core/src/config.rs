//! Run configuration, read from the consuming project's `composer.json`.
//!
//! ```json
//! {
//!     "extra": {
//!         "vendorscope": {
//!             "namespace_prefix": "WP_Statistics\\Deps",
//!             "packages": ["geoip2/geoip2"]
//!         }
//!     }
//! }
//! ```
//!
//! Only `namespace_prefix` and `packages` are required. Class and constant
//! prefixes are derived from the namespace prefix unless given.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ScopeError;
use crate::facts::Prefixes;

/// Key under `extra` holding the configuration.
pub const CONFIG_KEY: &str = "vendorscope";

pub const DEFAULT_TARGET_DIRECTORY: &str = "vendor-prefixed";
pub const DEFAULT_DEV_TARGET_DIRECTORY: &str = "tests/vendor-prefixed";

/// Paths never worth shipping in a prefixed copy. Matched against the
/// package-relative path with `/` separators; directory patterns only match
/// whole path segments.
pub const BUILTIN_EXCLUDE_PATTERNS: &[&str] = &[
    r"(?i)\.md$",
    r"(?i)LICENSE(\.txt)?$",
    r"(?i)CHANGELOG",
    r"(?i)UPGRADING",
    r"composer\.json$",
    r"composer\.lock$",
    r"autoload\.php$",
    r"(?i)package\.xml$",
    r"(?i)phpcs\.xml",
    r"(?i)phpstan\.neon",
    r"(?i)psalm\.xml",
    r"(?i)\.phpunit",
    r"\.editorconfig$",
    r"\.gitignore$",
    r"(?i)(?:^|/)\.github/",
    r"(?i)(?:^|/)\.gitlab/",
    r"(?i)(?:^|/)examples?/",
    r"(?i)(?:^|/)ext/",
    r"(?i)(?:^|/)php4/",
    r"(?i)(?:^|/)tests?/",
    r"(?i)(?:^|/)bin/",
    r"(?i)(?:^|/)dev-bin/",
    r"Makefile$",
    r"(?i)phpunit\.xml(\.dist)?$",
    r"\.travis\.yml$",
    r"(?i)Dockerfile$",
    r"(?i)docker-compose",
    r"(?i)COPYING$",
];

// ============================================================================
// Raw configuration
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    namespace_prefix: Option<String>,
    packages: Option<Vec<String>>,
    target_directory: Option<String>,
    class_prefix: Option<String>,
    constant_prefix: Option<String>,
    #[serde(default)]
    exclude_packages: Vec<String>,
    #[serde(default)]
    exclude_patterns: Vec<String>,
    exclude_directories: Option<Vec<String>>,
    #[serde(default)]
    delete_vendor_packages: bool,
    update_call_sites: Option<bool>,
    call_site_directories: Option<Vec<String>>,
    dev_packages: Option<DevConfig>,
}

/// Development-only packages, prefixed into their own directory.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DevConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_dev_target")]
    pub target_directory: String,
    #[serde(default)]
    pub packages: Vec<String>,
}

fn default_dev_target() -> String {
    DEFAULT_DEV_TARGET_DIRECTORY.to_string()
}

impl DevConfig {
    /// Enabled and has something to do.
    pub fn is_active(&self) -> bool {
        self.enabled && !self.packages.is_empty()
    }
}

// ============================================================================
// Config
// ============================================================================

/// Resolved configuration for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Config {
    pub working_dir: PathBuf,
    pub namespace_prefix: String,
    pub packages: Vec<String>,
    pub target_directory: String,
    pub class_prefix: String,
    pub constant_prefix: String,
    pub exclude_packages: Vec<String>,
    /// User-supplied exclude patterns; see [`Config::exclude_patterns`].
    pub user_exclude_patterns: Vec<String>,
    pub exclude_directories: Vec<String>,
    pub delete_vendor_packages: bool,
    pub update_call_sites: bool,
    pub call_site_directories: Option<Vec<String>>,
    pub dev_packages: Option<DevConfig>,
    /// The project's own `autoload.psr-4` map.
    pub host_psr4: BTreeMap<String, Vec<String>>,
}

impl Config {
    /// Read `extra.vendorscope` (and `autoload.psr-4`) from `composer.json`.
    pub fn from_composer_json(path: &Path) -> Result<Self, ScopeError> {
        if !path.is_file() {
            return Err(ScopeError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = fs::read_to_string(path).map_err(|e| ScopeError::io(path, e))?;
        let json: Value = serde_json::from_str(&content).map_err(|e| {
            ScopeError::config(format!("invalid JSON in {}: {}", path.display(), e))
        })?;

        let settings = json
            .get("extra")
            .and_then(|extra| extra.get(CONFIG_KEY))
            .ok_or_else(|| {
                ScopeError::config(format!(
                    "no \"extra.{}\" configuration found in {}",
                    CONFIG_KEY,
                    path.display()
                ))
            })?;

        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        let working_dir = fs::canonicalize(parent).unwrap_or_else(|_| parent.to_path_buf());

        let host_psr4 = json
            .get("autoload")
            .and_then(|autoload| autoload.get("psr-4"))
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .map(|(ns, dirs)| (ns.clone(), string_list(dirs)))
                    .collect()
            })
            .unwrap_or_default();

        Self::from_value(settings, working_dir, host_psr4)
    }

    /// Build from the JSON object under `extra.vendorscope`.
    pub fn from_value(
        settings: &Value,
        working_dir: impl Into<PathBuf>,
        host_psr4: BTreeMap<String, Vec<String>>,
    ) -> Result<Self, ScopeError> {
        let raw: RawConfig = serde_json::from_value(settings.clone())
            .map_err(|e| ScopeError::config(format!("extra.{}: {}", CONFIG_KEY, e)))?;

        let namespace_prefix = raw
            .namespace_prefix
            .map(|p| p.trim_end_matches('\\').to_string())
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                ScopeError::config(format!(
                    "\"namespace_prefix\" is required in extra.{}",
                    CONFIG_KEY
                ))
            })?;
        let packages = raw.packages.ok_or_else(|| {
            ScopeError::config(format!("\"packages\" is required in extra.{}", CONFIG_KEY))
        })?;

        Ok(Config {
            working_dir: working_dir.into(),
            class_prefix: raw
                .class_prefix
                .unwrap_or_else(|| derive_class_prefix(&namespace_prefix)),
            constant_prefix: raw
                .constant_prefix
                .unwrap_or_else(|| derive_constant_prefix(&namespace_prefix)),
            namespace_prefix,
            packages,
            target_directory: raw
                .target_directory
                .unwrap_or_else(|| DEFAULT_TARGET_DIRECTORY.to_string()),
            exclude_packages: raw.exclude_packages,
            user_exclude_patterns: raw.exclude_patterns,
            exclude_directories: raw.exclude_directories.unwrap_or_else(|| {
                ["views", "templates", "resources"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            }),
            delete_vendor_packages: raw.delete_vendor_packages,
            update_call_sites: raw.update_call_sites.unwrap_or(true),
            call_site_directories: raw.call_site_directories,
            dev_packages: raw.dev_packages,
            host_psr4,
        })
    }

    pub fn prefixes(&self) -> Prefixes {
        Prefixes {
            namespace: self.namespace_prefix.clone(),
            class: self.class_prefix.clone(),
            constant: self.constant_prefix.clone(),
        }
    }

    pub fn vendor_directory(&self) -> PathBuf {
        self.working_dir.join("vendor")
    }

    /// Target directory, resolved against the working directory when relative.
    pub fn absolute_target_directory(&self) -> PathBuf {
        self.resolve_dir(&self.target_directory)
    }

    /// Dev target directory, when dev packages are configured.
    pub fn absolute_dev_target_directory(&self) -> Option<PathBuf> {
        self.dev_packages
            .as_ref()
            .map(|dev| self.resolve_dir(&dev.target_directory))
    }

    fn resolve_dir(&self, dir: &str) -> PathBuf {
        let path = Path::new(dir);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.working_dir.join(path)
        }
    }

    /// Built-in patterns followed by the user's, duplicates removed.
    pub fn exclude_patterns(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for pattern in BUILTIN_EXCLUDE_PATTERNS
            .iter()
            .map(|p| p.to_string())
            .chain(self.user_exclude_patterns.iter().cloned())
        {
            if !out.contains(&pattern) {
                out.push(pattern);
            }
        }
        out
    }

    /// Compile [`Config::exclude_patterns`].
    pub fn exclude_filter(&self) -> Result<ExcludeFilter, ScopeError> {
        ExcludeFilter::new(&self.exclude_patterns())
    }

    /// Directories of the host project whose sources get call-site rewrites.
    ///
    /// Explicit `call_site_directories`, else the directories of the host's
    /// PSR-4 map, else `src`. Only existing directories are returned.
    pub fn call_site_directories(&self) -> Vec<PathBuf> {
        let dirs: Vec<String> = match &self.call_site_directories {
            Some(dirs) => dirs.clone(),
            None if !self.host_psr4.is_empty() => {
                let mut dirs: Vec<String> = Vec::new();
                for dir in self.host_psr4.values().flatten() {
                    let dir = dir.trim_end_matches('/').to_string();
                    if !dirs.contains(&dir) {
                        dirs.push(dir);
                    }
                }
                dirs
            }
            None => vec!["src".to_string()],
        };
        dirs.iter()
            .map(|d| self.resolve_dir(d))
            .filter(|d| d.is_dir())
            .collect()
    }
}

fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

/// `WP_Statistics\Deps` -> `WP_StatisticsDeps_`
pub fn derive_class_prefix(namespace_prefix: &str) -> String {
    format!("{}_", namespace_prefix.replace('\\', ""))
}

/// `WP_Statistics\Deps` -> `WP_STATISTICS_DEPS_`
///
/// Each segment has a `_` inserted at every lower-to-upper case boundary and
/// is uppercased; segments are joined with `_`.
pub fn derive_constant_prefix(namespace_prefix: &str) -> String {
    let segments: Vec<String> = namespace_prefix
        .split('\\')
        .map(|segment| {
            let mut out = String::with_capacity(segment.len() + 4);
            let mut prev: Option<char> = None;
            for c in segment.chars() {
                if prev.is_some_and(|p| p.is_ascii_lowercase()) && c.is_ascii_uppercase() {
                    out.push('_');
                }
                out.push(c.to_ascii_uppercase());
                prev = Some(c);
            }
            out
        })
        .collect();
    format!("{}_", segments.join("_"))
}

// ============================================================================
// Exclude patterns
// ============================================================================

/// Compiled exclude patterns, matched against package-relative paths.
#[derive(Debug, Clone)]
pub struct ExcludeFilter {
    patterns: Vec<Regex>,
}

impl ExcludeFilter {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ScopeError> {
        let patterns = patterns
            .iter()
            .map(|p| compile_pattern(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ExcludeFilter { patterns })
    }

    /// True if `relative_path` (with `/` separators) matches any pattern.
    pub fn is_excluded(&self, relative_path: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(relative_path))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Compile a pattern given either as a plain regex or in delimited
/// `/pattern/flags` form. Supported flags: `i`, `m`, `s`, `x`; `u` is
/// accepted and ignored.
pub fn compile_pattern(pattern: &str) -> Result<Regex, ScopeError> {
    let source = delimited_to_inline(pattern).unwrap_or_else(|| pattern.to_string());
    Regex::new(&source).map_err(|e| ScopeError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

fn delimited_to_inline(pattern: &str) -> Option<String> {
    let delimiter = pattern.chars().next()?;
    if delimiter.is_alphanumeric() || delimiter == '\\' || delimiter.is_whitespace() {
        return None;
    }
    let body = &pattern[delimiter.len_utf8()..];
    let close = body.rfind(delimiter)?;
    let (inner, flags) = (&body[..close], &body[close + delimiter.len_utf8()..]);
    if !flags.chars().all(|f| matches!(f, 'i' | 'm' | 's' | 'x' | 'u')) {
        return None;
    }
    let inline: String = flags.chars().filter(|f| *f != 'u').collect();
    // An escaped delimiter inside the body is just the delimiter.
    let inner = inner.replace(&format!("\\{}", delimiter), &delimiter.to_string());
    if inline.is_empty() {
        Some(inner)
    } else {
        Some(format!("(?{}){}", inline, inner))
    }
}
