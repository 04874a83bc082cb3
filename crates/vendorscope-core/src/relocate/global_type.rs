//! Global type relocation.
//!
//! A global (non-namespaced) class, interface, trait or enum `Name` becomes
//! `PName`. Declarations are renamed only in files without a namespace
//! declaration. Usage sites are emitted fully qualified (`\PName`) so they
//! resolve to the global type from inside any namespace.
//!
//! In a namespaced file that binds `Name` to something else (a namespaced
//! import or a local declaration), unqualified usage sites refer to that
//! binding and are left alone. Imports of the global type, `\Name`
//! references and string literals are still rewritten.

use std::borrow::Cow;

use crate::builtins::is_builtin_type;
use crate::error::ScopeError;
use crate::relocate::{longest_first, Relocator};
use crate::rule::{
    apply_rules, ends_in_ident, first_char, is_root_marker, starts_with_ident, template_literal,
    ContextGuard, RewriteRule,
};
use crate::syntax::PhpScanner;

/// Rewrites global type names under a class prefix.
#[derive(Debug)]
pub struct GlobalTypeRelocator {
    prefix: String,
    types: Vec<TypeRules>,
    scanner: PhpScanner,
}

#[derive(Debug)]
struct TypeRules {
    name: String,
    declarations: Vec<RewriteRule>,
    imports: Vec<RewriteRule>,
    usages: Vec<RewriteRule>,
    qualified_usages: Vec<RewriteRule>,
    strings: Vec<RewriteRule>,
}

impl GlobalTypeRelocator {
    /// Build a relocator for `types` under `prefix`.
    ///
    /// Runtime types and names already carrying the prefix are dropped.
    pub fn new(prefix: impl Into<String>, types: Vec<String>) -> Result<Self, ScopeError> {
        let prefix = prefix.into();
        if prefix.is_empty() {
            return Err(ScopeError::config("class prefix must not be empty"));
        }

        let names = longest_first(
            types
                .into_iter()
                .filter(|name| !is_builtin_type(name) && !name.starts_with(prefix.as_str())),
        );
        let types = names
            .into_iter()
            .map(|name| TypeRules::build(&prefix, name))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(GlobalTypeRelocator {
            prefix,
            types,
            scanner: PhpScanner::new()?,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Relocated type names in application order.
    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.types.iter().map(|t| t.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Relocator for GlobalTypeRelocator {
    fn relocate<'a>(&self, text: &'a str) -> Cow<'a, str> {
        let present: Vec<&TypeRules> = self
            .types
            .iter()
            .filter(|t| text.contains(t.name.as_str()))
            .collect();
        if present.is_empty() {
            return Cow::Borrowed(text);
        }

        let namespaced = self.scanner.is_namespaced(text);
        let bound = if namespaced {
            self.scanner.local_bindings(text)
        } else {
            Default::default()
        };

        let mut current = Cow::Borrowed(text);
        for rules in present {
            if !namespaced {
                current = apply_rules(current, &rules.declarations);
            }
            current = apply_rules(current, &rules.imports);
            current = if bound.contains(&rules.name) {
                apply_rules(current, &rules.qualified_usages)
            } else {
                apply_rules(current, &rules.usages)
            };
            current = apply_rules(current, &rules.strings);
        }
        current
    }
}

// ============================================================================
// Rule construction
// ============================================================================

fn ends_name(after: &str) -> bool {
    !starts_with_ident(after) && !after.starts_with('\\')
}

/// Left boundary of a usage site. A backslash directly before the name must
/// be a root marker; otherwise the name must not continue an identifier,
/// variable, member access or string.
fn starts_usage(before: &str) -> bool {
    if before.ends_with('\\') {
        is_root_marker(before)
    } else {
        !ends_in_ident(before) && !before.ends_with(['$', '>', '\'', '"'])
    }
}

fn opens_body(after: &str) -> bool {
    matches!(first_char(after.trim_start()), Some('{' | ';'))
}

/// Usage-site rules. `root` is the pattern for the optional or required
/// leading backslash.
fn usage_rules(en: &str, qualified: &str, root: &str) -> Result<Vec<RewriteRule>, regex::Error> {
    let usage = || ContextGuard::new().before(starts_usage);
    Ok(vec![
        RewriteRule::new(
            "extends-implements",
            &format!(
                r"(?P<lead>\b(?:extends|implements)\s+(?:[\\A-Za-z0-9_]+\s*,\s*)*)(?P<root>{root})(?P<target>{en})"
            ),
            format!("${{lead}}{qualified}"),
            usage().after(ends_name),
        )?,
        RewriteRule::new(
            "new",
            &format!(r"(?P<lead>\bnew\s+)(?P<root>{root})(?P<target>{en})"),
            format!("${{lead}}{qualified}"),
            usage().after(ends_name),
        )?,
        RewriteRule::new(
            "instanceof",
            &format!(r"(?P<lead>\binstanceof\s+)(?P<root>{root})(?P<target>{en})"),
            format!("${{lead}}{qualified}"),
            usage().after(ends_name),
        )?,
        RewriteRule::new(
            "static-access",
            &format!(r"(?P<root>{root})(?P<target>{en})(?P<tail>\s*::)"),
            format!("{qualified}${{tail}}"),
            usage(),
        )?,
        RewriteRule::new(
            "parameter-type",
            &format!(
                r"(?P<lead>[(,]\s*(?:\?\s*)?)(?P<root>{root})(?P<target>{en})(?P<tail>\s+(?:&\s*)?(?:\.\.\.\s*)?\$)"
            ),
            format!("${{lead}}{qualified}${{tail}}"),
            usage(),
        )?,
        RewriteRule::new(
            "return-type",
            &format!(r"(?P<lead>\)\s*:\s*(?:\?\s*)?)(?P<root>{root})(?P<target>{en})"),
            format!("${{lead}}{qualified}"),
            usage().after(opens_body),
        )?,
    ])
}

impl TypeRules {
    fn build(prefix: &str, name: String) -> Result<Self, ScopeError> {
        let prefixed = format!("{}{}", prefix, name);
        let en = regex::escape(&name);
        let lit = template_literal(&prefixed);
        let qualified = format!("\\{lit}");

        let declarations = vec![RewriteRule::new(
            "type-declaration",
            &format!(
                r"(?m)^(?P<lead>[ \t]*(?:(?:abstract|final|readonly)\s+)*(?:class|interface|trait|enum)\s+)(?P<target>{en})"
            ),
            format!("${{lead}}{lit}"),
            ContextGuard::new().after(ends_name),
        )?];

        let imports = vec![RewriteRule::new(
            "use-import",
            &format!(r"(?m)^(?P<lead>[ \t]*use\s+)(?P<root>\\?)(?P<target>{en})"),
            format!("${{lead}}${{root}}{lit}"),
            ContextGuard::new().after(|after| {
                let trimmed = after.trim_start();
                ends_name(after)
                    && (trimmed.starts_with(';')
                        || trimmed.starts_with(',')
                        || trimmed
                            .strip_prefix("as")
                            .is_some_and(|rest| first_char(rest).is_some_and(char::is_whitespace)))
            }),
        )?];

        let usages = usage_rules(&en, &qualified, r"\\?")?;
        let qualified_usages = usage_rules(&en, &qualified, r"\\")?;

        let strings = vec![
            RewriteRule::new(
                "string-literal",
                &format!(r#"(?P<quote>['"])(?P<root>\\?\\?)(?P<target>{en})(?P<close>['"])"#),
                format!("${{quote}}${{root}}{lit}${{close}}"),
                ContextGuard::new(),
            )?,
            RewriteRule::new(
                "callable-string",
                &format!(r#"(?P<quote>['"])(?P<root>\\?\\?)(?P<target>{en})(?P<tail>::)"#),
                format!("${{quote}}${{root}}{lit}${{tail}}"),
                ContextGuard::new(),
            )?,
        ];

        Ok(TypeRules {
            name,
            declarations,
            imports,
            usages,
            qualified_usages,
            strings,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
