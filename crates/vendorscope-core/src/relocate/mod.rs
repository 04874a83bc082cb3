//! Identifier relocation: namespaces, global types and global constants.
//!
//! Each relocator is built once per run from the frozen fact set and then
//! applied to every in-scope file. Within one file the passes always run in
//! the order namespace → type → constant, because the later passes rely on
//! the earlier ones having already prefixed what they own (see
//! [`RelocationPipeline`]).

mod constant;
mod global_type;
mod namespace;

use std::borrow::Cow;
use std::fs;
use std::path::Path;

use tracing::{debug, warn};

pub use constant::ConstantRelocator;
pub use global_type::GlobalTypeRelocator;
pub use namespace::NamespaceRelocator;

/// A text-to-text rewriter for one kind of symbol.
///
/// Implementations must be idempotent and must return the input borrowed
/// when they have nothing to change.
pub trait Relocator {
    fn relocate<'a>(&self, text: &'a str) -> Cow<'a, str>;
}

/// Run `relocator` over an already-processed value without losing borrowedness.
pub(crate) fn chain<'a>(text: Cow<'a, str>, relocator: &dyn Relocator) -> Cow<'a, str> {
    let rewritten = match relocator.relocate(&text) {
        Cow::Borrowed(_) => None,
        Cow::Owned(changed) => Some(changed),
    };
    match rewritten {
        Some(changed) => Cow::Owned(changed),
        None => text,
    }
}

/// De-duplicate `names` and order them longest first.
///
/// Longest-first keeps `MaxMind\Db` from being partially consumed by a
/// `MaxMind` rule. Ties keep their first-seen order.
pub(crate) fn longest_first(names: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::new();
    for name in names {
        if !name.is_empty() && !unique.contains(&name) {
            unique.push(name);
        }
    }
    unique.sort_by(|a, b| b.len().cmp(&a.len()));
    unique
}

// ============================================================================
// RelocationPipeline
// ============================================================================

/// The three relocators composed in their required order.
#[derive(Debug)]
pub struct RelocationPipeline {
    namespaces: NamespaceRelocator,
    types: Option<GlobalTypeRelocator>,
    constants: Option<ConstantRelocator>,
}

impl RelocationPipeline {
    pub fn new(
        namespaces: NamespaceRelocator,
        types: Option<GlobalTypeRelocator>,
        constants: Option<ConstantRelocator>,
    ) -> Self {
        RelocationPipeline {
            namespaces,
            types,
            constants,
        }
    }

    pub fn namespaces(&self) -> &NamespaceRelocator {
        &self.namespaces
    }

    pub fn types(&self) -> Option<&GlobalTypeRelocator> {
        self.types.as_ref()
    }

    pub fn constants(&self) -> Option<&ConstantRelocator> {
        self.constants.as_ref()
    }
}

impl Relocator for RelocationPipeline {
    fn relocate<'a>(&self, text: &'a str) -> Cow<'a, str> {
        let mut current = self.namespaces.relocate(text);
        if let Some(types) = &self.types {
            current = chain(current, types);
        }
        if let Some(constants) = &self.constants {
            current = chain(current, constants);
        }
        current
    }
}

/// Rewrite the file at `path` in place; true if its content changed.
///
/// A file that cannot be read as UTF-8 or cannot be written back is logged
/// and counts as unchanged.
pub fn rewrite_file(relocator: &dyn Relocator, path: &Path) -> bool {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "skipping unreadable file");
            return false;
        }
    };
    let Cow::Owned(rewritten) = relocator.relocate(&text) else {
        return false;
    };
    if rewritten == text {
        return false;
    }
    match fs::write(path, rewritten) {
        Ok(()) => {
            debug!(path = %path.display(), "rewrote");
            true
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "could not write file");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline() -> RelocationPipeline {
        RelocationPipeline::new(
            NamespaceRelocator::new(r"Test\Deps", vec!["GeoIp2".to_string()]).unwrap(),
            Some(GlobalTypeRelocator::new("TestDeps_", vec!["Spyc".to_string()]).unwrap()),
            Some(ConstantRelocator::new("TEST_DEPS_", vec!["GEOIP_VERSION".to_string()]).unwrap()),
        )
    }

    #[test]
    fn rewrite_file_reports_changes() {
        let dir = tempfile::TempDir::new().unwrap();
        let changed = dir.path().join("a.php");
        let untouched = dir.path().join("b.php");
        fs::write(&changed, "<?php\nuse GeoIp2\\Model\\City;\n").unwrap();
        fs::write(&untouched, "<?php\necho 'hello';\n").unwrap();

        let pipeline = pipeline();
        assert!(rewrite_file(&pipeline, &changed));
        assert!(!rewrite_file(&pipeline, &changed));
        assert!(!rewrite_file(&pipeline, &untouched));
        assert!(!rewrite_file(&pipeline, &dir.path().join("missing.php")));
        assert_eq!(
            fs::read_to_string(&changed).unwrap(),
            "<?php\nuse Test\\Deps\\GeoIp2\\Model\\City;\n"
        );
    }

    #[test]
    fn longest_first_dedups_and_orders() {
        let names = longest_first(
            ["MaxMind", r"MaxMind\Db", "MaxMind", "", "Geo"]
                .iter()
                .map(|s| s.to_string()),
        );
        assert_eq!(names, vec![r"MaxMind\Db", "MaxMind", "Geo"]);
    }

    #[test]
    fn pipeline_applies_all_three_passes() {
        let input = "<?php\nnamespace GeoIp2\\Database;\n\nuse Spyc;\n\n$v = GEOIP_VERSION;\n";
        let output = pipeline().relocate(input);
        assert!(output.contains("namespace Test\\Deps\\GeoIp2\\Database;"));
        assert!(output.contains("use TestDeps_Spyc;"));
        assert!(output.contains("$v = TEST_DEPS_GEOIP_VERSION;"));
    }

    #[test]
    fn pipeline_is_idempotent() {
        let input = "<?php\nuse GeoIp2\\Model\\City;\n$p = new Spyc();\ndefine('GEOIP_VERSION', '2');\n";
        let pipeline = pipeline();
        let once = pipeline.relocate(input).into_owned();
        let twice = pipeline.relocate(&once).into_owned();
        assert_eq!(once, twice);
    }

    #[test]
    fn pipeline_leaves_unrelated_text_borrowed() {
        let input = "<?php\necho 'hello';\n";
        assert!(matches!(pipeline().relocate(input), Cow::Borrowed(_)));
    }
}
