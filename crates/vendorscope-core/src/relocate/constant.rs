//! Global constant relocation.
//!
//! Rewrites the literal first argument of `define`, `defined` and `constant`,
//! and bare references to the constant in code. Class constants, namespaced
//! constants, variables, member names and string contents are not touched.

use std::borrow::Cow;

use crate::builtins::is_builtin_constant;
use crate::error::ScopeError;
use crate::relocate::{longest_first, Relocator};
use crate::rule::{
    apply_rules, ends_in_ident, is_ident_char, is_root_marker, starts_with_ident,
    template_literal, ContextGuard, RewriteRule,
};

/// Rewrites global constant names under a constant prefix.
#[derive(Debug)]
pub struct ConstantRelocator {
    prefix: String,
    constants: Vec<(String, Vec<RewriteRule>)>,
}

impl ConstantRelocator {
    /// Build a relocator for `constants` under `prefix`.
    ///
    /// Runtime constants and names already carrying the prefix are dropped.
    pub fn new(prefix: impl Into<String>, constants: Vec<String>) -> Result<Self, ScopeError> {
        let prefix = prefix.into();
        if prefix.is_empty() {
            return Err(ScopeError::config("constant prefix must not be empty"));
        }

        let names = longest_first(
            constants
                .into_iter()
                .filter(|name| !is_builtin_constant(name) && !name.starts_with(prefix.as_str())),
        );
        let constants = names
            .into_iter()
            .map(|name| -> Result<_, ScopeError> {
                let rules = constant_rules(&prefix, &name)?;
                Ok((name, rules))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ConstantRelocator { prefix, constants })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn constants(&self) -> impl Iterator<Item = &str> {
        self.constants.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }
}

impl Relocator for ConstantRelocator {
    fn relocate<'a>(&self, text: &'a str) -> Cow<'a, str> {
        let mut current = Cow::Borrowed(text);
        for (name, rules) in &self.constants {
            if current.contains(name.as_str()) {
                current = apply_rules(current, rules);
            }
        }
        current
    }
}

/// Text before the candidate ends with the `const` keyword and whitespace.
fn follows_const_keyword(before: &str) -> bool {
    let trimmed = before.trim_end();
    if trimmed.len() == before.len() {
        return false;
    }
    trimmed.strip_suffix("const").is_some_and(|head| !ends_in_ident(head))
}

fn starts_bare_reference(before: &str) -> bool {
    if before.ends_with('\\') {
        return is_root_marker(before);
    }
    !before.ends_with(|c: char| is_ident_char(c) || matches!(c, '$' | '>' | '\'' | '"' | ':'))
        && !follows_const_keyword(before)
}

fn constant_rules(prefix: &str, name: &str) -> Result<Vec<RewriteRule>, regex::Error> {
    let en = regex::escape(name);
    let lit = template_literal(&format!("{}{}", prefix, name));

    Ok(vec![
        RewriteRule::new(
            "constant-function-argument",
            &format!(
                r#"(?P<lead>\b(?:define|defined|constant)\s*\(\s*)(?P<quote>['"])(?P<target>{en})(?P<close>['"])"#
            ),
            format!("${{lead}}${{quote}}{lit}${{close}}"),
            ContextGuard::new(),
        )?,
        RewriteRule::new(
            "bare-constant",
            &format!(r"(?P<target>{en})"),
            lit,
            ContextGuard::new().before(starts_bare_reference).after(|after| {
                !starts_with_ident(after) && !after.starts_with(['\\', '('])
            }),
        )?,
    ])
}
