//! Line-level inspection of PHP source: namespace declarations, global type
//! declarations, import bindings and `define()` calls.
//!
//! Nothing here parses PHP. The scanner answers the few structural questions
//! the relocators and the fact harvest need, using the same anchored regexes
//! for both so the two always agree on what a file declares.

use std::collections::HashSet;

use regex::Regex;

use crate::error::ScopeError;

/// Compiled scanners shared by the type relocator and the fact harvest.
#[derive(Debug, Clone)]
pub struct PhpScanner {
    namespace_decl: Regex,
    type_decl: Regex,
    use_stmt: Regex,
    define_call: Regex,
}

impl PhpScanner {
    pub fn new() -> Result<Self, ScopeError> {
        Ok(PhpScanner {
            namespace_decl: Regex::new(r"(?m)^\s*namespace\s+([A-Za-z_][A-Za-z0-9_\\]*)")?,
            type_decl: Regex::new(
                r"(?m)^[ \t]*(?:(?:abstract|final|readonly)\s+)*(?:class|interface|trait|enum)\s+([A-Za-z_][A-Za-z0-9_]*)",
            )?,
            use_stmt: Regex::new(r"(?m)^[ \t]*use\s+([^;]+);")?,
            define_call: Regex::new(r#"\bdefine\s*\(\s*['"]([A-Z][A-Z0-9_]*)['"]"#)?,
        })
    }

    /// True if the file declares a namespace.
    pub fn is_namespaced(&self, text: &str) -> bool {
        self.namespace_decl.is_match(text)
    }

    /// Names of every class, interface, trait and enum declared in the file.
    pub fn declared_types<'t>(&self, text: &'t str) -> Vec<&'t str> {
        self.type_decl
            .captures_iter(text)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
            .collect()
    }

    /// Fully qualified names of the declared types, each qualified by the
    /// closest namespace declaration above it.
    pub fn qualified_types(&self, text: &str) -> Vec<String> {
        let namespaces: Vec<(usize, &str)> = self
            .namespace_decl
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                Some((whole.start(), caps.get(1)?.as_str()))
            })
            .collect();

        self.type_decl
            .captures_iter(text)
            .filter_map(|caps| {
                let start = caps.get(0)?.start();
                let name = caps.get(1)?.as_str();
                let namespace = namespaces
                    .iter()
                    .take_while(|(at, _)| *at < start)
                    .last()
                    .map(|(_, ns)| ns.trim_end_matches('\\'));
                Some(match namespace {
                    Some(ns) if !ns.is_empty() => format!("{}\\{}", ns, name),
                    _ => name.to_string(),
                })
            })
            .collect()
    }

    /// Constant names passed as the literal first argument of `define()`.
    pub fn defined_constants<'t>(&self, text: &'t str) -> Vec<&'t str> {
        self.define_call
            .captures_iter(text)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
            .collect()
    }

    /// Short names bound in this file to something other than the global
    /// type of the same name.
    ///
    /// Covers `use A\B\Name;`, `use Other as Name;`, grouped imports and
    /// local type declarations. `use Name;` binds the global type itself and
    /// does not count.
    pub fn local_bindings(&self, text: &str) -> HashSet<String> {
        let mut names = HashSet::new();
        for caps in self.use_stmt.captures_iter(text) {
            if let Some(body) = caps.get(1) {
                collect_import_bindings(body.as_str(), &mut names);
            }
        }
        names.extend(self.declared_types(text).into_iter().map(str::to_string));
        names
    }
}

fn collect_import_bindings(body: &str, names: &mut HashSet<String>) {
    let body = body.trim();
    let is_keyword = |kw: &str| {
        body.strip_prefix(kw)
            .is_some_and(|rest| rest.starts_with(char::is_whitespace))
    };
    if is_keyword("function") || is_keyword("const") {
        return;
    }

    match body.split_once('{') {
        Some((base, group)) => {
            let base = base.trim().trim_end_matches('\\');
            let group = group.trim().trim_end_matches('}');
            for item in group.split(',') {
                let item = item.trim();
                if !item.is_empty() {
                    bind(&format!("{}\\{}", base, item), names);
                }
            }
        }
        None => {
            for item in body.split(',') {
                bind(item, names);
            }
        }
    }
}

fn bind(item: &str, names: &mut HashSet<String>) {
    let mut parts = item.split_whitespace();
    let Some(path) = parts.next() else {
        return;
    };
    let path = path.trim_start_matches('\\');
    let alias = match (parts.next(), parts.next()) {
        (Some(kw), Some(alias)) if kw.eq_ignore_ascii_case("as") => Some(alias),
        _ => None,
    };
    let binding = alias.unwrap_or_else(|| path.rsplit('\\').next().unwrap_or(path));
    if binding != path {
        names.insert(binding.to_string());
    }
}
