//! The frozen fact set a run relocates against.
//!
//! Namespaces come from package metadata. Global types and constants are
//! harvested by scanning every copied source file once, before any file is
//! rewritten, so a type declared in one package is relocated inside every
//! other package that references it.

use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use crate::builtins::is_builtin_constant;
use crate::error::ScopeError;
use crate::relocate::{ConstantRelocator, GlobalTypeRelocator, NamespaceRelocator, RelocationPipeline};
use crate::syntax::PhpScanner;

/// The three prefixes of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prefixes {
    /// Namespace prefix, without trailing separator (`WP_Statistics\Deps`).
    pub namespace: String,
    /// Prefix glued onto global type names (`WP_StatisticsDeps_`).
    pub class: String,
    /// Prefix glued onto global constant names (`WP_STATISTICS_DEPS_`).
    pub constant: String,
}

/// Everything discovered for one run. Built once, then only read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScopeFacts {
    pub namespaces: Vec<String>,
    pub global_types: Vec<String>,
    pub constants: Vec<String>,
}

impl ScopeFacts {
    /// Harvest global types and constants from `files` and combine them with
    /// the package namespaces.
    pub fn harvest<P: AsRef<Path>>(
        namespaces: Vec<String>,
        files: &[P],
    ) -> Result<Self, ScopeError> {
        let scanner = PhpScanner::new()?;
        Ok(ScopeFacts {
            namespaces,
            global_types: harvest_global_types(&scanner, files),
            constants: harvest_constants(&scanner, files),
        })
    }

    /// Build the relocation pipeline for these facts.
    ///
    /// The type and constant stages are omitted when nothing was harvested
    /// for them.
    pub fn pipeline(&self, prefixes: &Prefixes) -> Result<RelocationPipeline, ScopeError> {
        let namespaces = NamespaceRelocator::new(prefixes.namespace.clone(), self.namespaces.clone())?;
        let types = if self.global_types.is_empty() {
            None
        } else {
            Some(GlobalTypeRelocator::new(
                prefixes.class.clone(),
                self.global_types.clone(),
            )?)
        };
        let constants = if self.constants.is_empty() {
            None
        } else {
            Some(ConstantRelocator::new(
                prefixes.constant.clone(),
                self.constants.clone(),
            )?)
        };
        Ok(RelocationPipeline::new(namespaces, types, constants))
    }
}

fn read_source(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(text) => Some(text),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "skipping unreadable file");
            None
        }
    }
}

fn push_unique(names: &mut Vec<String>, name: &str) {
    if !names.iter().any(|n| n == name) {
        names.push(name.to_string());
    }
}

/// Types declared in files that declare no namespace, first-seen order.
pub fn harvest_global_types<P: AsRef<Path>>(scanner: &PhpScanner, files: &[P]) -> Vec<String> {
    let mut names = Vec::new();
    for path in files {
        let path = path.as_ref();
        let Some(text) = read_source(path) else {
            continue;
        };
        if scanner.is_namespaced(&text) {
            continue;
        }
        for name in scanner.declared_types(&text) {
            debug!(path = %path.display(), name, "global type");
            push_unique(&mut names, name);
        }
    }
    names
}

/// Constants passed to `define()`, minus runtime constants, first-seen order.
pub fn harvest_constants<P: AsRef<Path>>(scanner: &PhpScanner, files: &[P]) -> Vec<String> {
    let mut names = Vec::new();
    for path in files {
        let path = path.as_ref();
        let Some(text) = read_source(path) else {
            continue;
        };
        for name in scanner.defined_constants(&text) {
            if is_builtin_constant(name) {
                continue;
            }
            debug!(path = %path.display(), name, "global constant");
            push_unique(&mut names, name);
        }
    }
    names
}
