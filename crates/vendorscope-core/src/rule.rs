//! Guarded rewrite rules: the primitive every relocator is built from.
//!
//! A [`RewriteRule`] pairs a regex with a replacement template and a
//! [`ContextGuard`]. The regex finds *candidates*; the guard then inspects the
//! text on either side of the candidate's `target` group and decides whether
//! the candidate is a real reference. Lookaround lives in the guard rather
//! than in the pattern, so rules stay expressible with the `regex` crate and
//! the boundary logic is plain Rust that can be unit tested on its own.
//!
//! ## Scan semantics
//!
//! - Candidates are visited left to right.
//! - A rejected candidate resumes the scan one character after its start, so
//!   an overlapping candidate behind it is still considered.
//! - An accepted candidate is expanded with [`regex::Captures::expand`]
//!   (`$name` / `${name}` group references) and the scan resumes after it.
//! - If nothing is accepted the input is returned as `Cow::Borrowed`, which
//!   makes "no change" byte-identical by construction.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use regex::Regex;

/// Name of the capture group the guard is evaluated around.
pub const TARGET_GROUP: &str = "target";

/// Predicate over a slice of text adjacent to a candidate.
pub type TextPredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

// ============================================================================
// Character classes
// ============================================================================

/// True for characters that may appear inside a PHP identifier.
///
/// PHP treats every byte >= 0x80 as an identifier byte, so non-ASCII
/// characters count as identifier characters too.
pub fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || !c.is_ascii()
}

/// Last character of `text`, if any.
pub fn last_char(text: &str) -> Option<char> {
    text.chars().next_back()
}

/// First character of `text`, if any.
pub fn first_char(text: &str) -> Option<char> {
    text.chars().next()
}

/// True when `before` ends in an identifier character.
pub fn ends_in_ident(before: &str) -> bool {
    last_char(before).is_some_and(is_ident_char)
}

/// True when `after` starts with an identifier character.
pub fn starts_with_ident(after: &str) -> bool {
    first_char(after).is_some_and(is_ident_char)
}

/// True when `before` ends in a backslash that starts a fully qualified
/// name rather than separating two segments of a longer one.
pub fn is_root_marker(before: &str) -> bool {
    before
        .strip_suffix('\\')
        .is_some_and(|rest| !ends_in_ident(rest) && !rest.ends_with('\\'))
}

/// Escape `$` so a literal can be embedded in a replacement template.
pub fn template_literal(text: &str) -> String {
    text.replace('$', "$$")
}

// ============================================================================
// ContextGuard
// ============================================================================

/// Left/right context requirements for a candidate match.
///
/// Every configured check must pass for the candidate to be rewritten.
#[derive(Clone, Default)]
pub struct ContextGuard {
    before: Option<TextPredicate>,
    after: Option<TextPredicate>,
    not_preceded_by: Option<String>,
    not_starting_with: Option<String>,
}

impl ContextGuard {
    /// A guard that accepts every candidate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `check(text_before_target)` to hold.
    pub fn before(mut self, check: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.before = Some(Arc::new(check));
        self
    }

    /// Require `check(text_after_target)` to hold.
    pub fn after(mut self, check: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.after = Some(Arc::new(check));
        self
    }

    /// Reject candidates immediately preceded by `text`.
    ///
    /// This is the idempotence lookbehind: passing the replacement prefix
    /// keeps a second run from prefixing an already prefixed reference.
    pub fn not_preceded_by(mut self, text: impl Into<String>) -> Self {
        self.not_preceded_by = Some(text.into());
        self
    }

    /// Reject candidates whose target text starts with `text`.
    pub fn not_starting_with(mut self, text: impl Into<String>) -> Self {
        self.not_starting_with = Some(text.into());
        self
    }

    /// Evaluate the guard for the target span `start..end` of `text`.
    pub fn accepts(&self, text: &str, start: usize, end: usize) -> bool {
        let before = &text[..start];
        let from_target = &text[start..];
        let after = &text[end..];

        if let Some(prefix) = &self.not_preceded_by {
            if before.ends_with(prefix.as_str()) {
                return false;
            }
        }
        if let Some(prefix) = &self.not_starting_with {
            if from_target.starts_with(prefix.as_str()) {
                return false;
            }
        }
        if let Some(check) = &self.before {
            if !check(before) {
                return false;
            }
        }
        if let Some(check) = &self.after {
            if !check(after) {
                return false;
            }
        }
        true
    }
}

impl fmt::Debug for ContextGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextGuard")
            .field("before", &self.before.is_some())
            .field("after", &self.after.is_some())
            .field("not_preceded_by", &self.not_preceded_by)
            .field("not_starting_with", &self.not_starting_with)
            .finish()
    }
}

// ============================================================================
// RewriteRule
// ============================================================================

/// One guarded regex substitution.
#[derive(Clone)]
pub struct RewriteRule {
    name: &'static str,
    pattern: Regex,
    replacement: String,
    guard: ContextGuard,
}

impl RewriteRule {
    /// Compile a rule.
    ///
    /// `replacement` is a [`regex::Captures::expand`] template; literals placed
    /// into it should go through [`template_literal`].
    pub fn new(
        name: &'static str,
        pattern: &str,
        replacement: impl Into<String>,
        guard: ContextGuard,
    ) -> Result<Self, regex::Error> {
        Ok(RewriteRule {
            name,
            pattern: Regex::new(pattern)?,
            replacement: replacement.into(),
            guard,
        })
    }

    /// Short label used in logs and test failures.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Apply the rule to `text`, returning it borrowed when nothing changed.
    pub fn apply<'a>(&self, text: &'a str) -> Cow<'a, str> {
        let mut out: Option<String> = None;
        let mut copied = 0;
        let mut at = 0;

        while at <= text.len() {
            let Some(caps) = self.pattern.captures_at(text, at) else {
                break;
            };
            let Some(whole) = caps.get(0) else {
                break;
            };
            let target = caps.name(TARGET_GROUP).unwrap_or(whole);

            if self.guard.accepts(text, target.start(), target.end()) {
                let buf = out.get_or_insert_with(|| String::with_capacity(text.len() + 64));
                buf.push_str(&text[copied..whole.start()]);
                caps.expand(&self.replacement, buf);
                copied = whole.end();
                at = if whole.end() > whole.start() {
                    whole.end()
                } else {
                    next_boundary(text, whole.end())
                };
            } else {
                at = next_boundary(text, whole.start());
            }
        }

        match out {
            None => Cow::Borrowed(text),
            Some(mut buf) => {
                buf.push_str(&text[copied..]);
                if buf == text {
                    Cow::Borrowed(text)
                } else {
                    Cow::Owned(buf)
                }
            }
        }
    }
}

impl fmt::Debug for RewriteRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RewriteRule")
            .field("name", &self.name)
            .field("pattern", &self.pattern.as_str())
            .field("replacement", &self.replacement)
            .field("guard", &self.guard)
            .finish()
    }
}

/// Byte offset of the character after the one starting at `pos`.
fn next_boundary(text: &str, pos: usize) -> usize {
    match text[pos..].chars().next() {
        Some(c) => pos + c.len_utf8(),
        None => text.len() + 1,
    }
}

/// Feed `text` through `rules` in order, staying borrowed while nothing changes.
pub fn apply_rules<'a>(text: Cow<'a, str>, rules: &[RewriteRule]) -> Cow<'a, str> {
    rules.iter().fold(text, |current, rule| {
        let rewritten = match rule.apply(&current) {
            Cow::Borrowed(_) => None,
            Cow::Owned(changed) => Some(changed),
        };
        match rewritten {
            Some(changed) => Cow::Owned(changed),
            None => current,
        }
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn word_rule(word: &str, with: &str) -> RewriteRule {
        RewriteRule::new(
            "word",
            &format!("(?P<target>{})", regex::escape(word)),
            template_literal(with),
            ContextGuard::new()
                .before(|b| !ends_in_ident(b))
                .after(|a| !starts_with_ident(a)),
        )
        .unwrap()
    }

    #[test]
    fn unchanged_text_is_borrowed() {
        let rule = word_rule("Geo", "Prefixed");
        let input = "MyGeoHelper and GeoHelper";
        assert!(matches!(rule.apply(input), Cow::Borrowed(_)));
    }

    #[test]
    fn boundaries_are_checked_on_both_sides() {
        let rule = word_rule("Geo", "X_Geo");
        assert_eq!(rule.apply("Geo MyGeo Geo2 (Geo)"), "X_Geo MyGeo Geo2 (X_Geo)");
    }

    #[test]
    fn rejected_candidate_does_not_hide_overlapping_one() {
        // "aa" inside "aaa": the first candidate is rejected (followed by an
        // identifier char), the one starting one char later is accepted.
        let rule = RewriteRule::new(
            "overlap",
            "(?P<target>aa)",
            "BB",
            ContextGuard::new().after(|a| !a.starts_with('a')),
        )
        .unwrap();
        assert_eq!(rule.apply("aaa"), "aBB");
    }

    #[test]
    fn not_preceded_by_blocks_already_prefixed_text() {
        let rule = RewriteRule::new(
            "ns",
            r"(?P<target>GeoIp2)\\",
            r"Vendor\GeoIp2\",
            ContextGuard::new().not_preceded_by(r"Vendor\"),
        )
        .unwrap();
        assert_eq!(rule.apply(r"GeoIp2\Reader"), r"Vendor\GeoIp2\Reader");
        assert_eq!(rule.apply(r"Vendor\GeoIp2\Reader"), r"Vendor\GeoIp2\Reader");
    }

    #[test]
    fn not_starting_with_blocks_target_prefix() {
        let rule = RewriteRule::new(
            "lead",
            r#"(?P<q>')(?P<target>Vendor)"#,
            "${q}Scoped",
            ContextGuard::new().not_starting_with(r"Vendor\Scoped"),
        )
        .unwrap();
        assert_eq!(rule.apply("'Vendor'"), "'Scoped'");
        assert_eq!(rule.apply(r"'Vendor\Scoped\X'"), r"'Vendor\Scoped\X'");
    }

    #[test]
    fn template_groups_are_expanded() {
        let rule = RewriteRule::new(
            "new",
            r"(?P<lead>new\s+)(?P<target>Foo)",
            format!("${{lead}}{}", template_literal(r"\P_Foo")),
            ContextGuard::new(),
        )
        .unwrap();
        assert_eq!(rule.apply("$x = new  Foo();"), r"$x = new  \P_Foo();");
    }

    #[test]
    fn root_marker_needs_a_non_name_on_its_left() {
        assert!(is_root_marker(r"new \"));
        assert!(is_root_marker(r"(\"));
        assert!(is_root_marker("\\"));
        assert!(!is_root_marker(r"Support\"));
        assert!(!is_root_marker(r"\\"));
        assert!(!is_root_marker("new "));
    }

    #[test]
    fn dollar_in_literal_is_preserved() {
        let rule = word_rule("cost", "$cost");
        assert_eq!(rule.apply("a cost b"), "a $cost b");
    }

    #[test]
    fn multibyte_text_is_scanned_safely() {
        let rule = word_rule("Geo", "P_Geo");
        assert_eq!(rule.apply("é Geo ü éGeo"), "é P_Geo ü éGeo");
    }

    #[test]
    fn apply_rules_chains_in_order() {
        let rules = vec![word_rule("A", "B"), word_rule("B", "C")];
        assert_eq!(apply_rules(Cow::Borrowed("A"), &rules), "C");
        assert!(matches!(
            apply_rules(Cow::Borrowed("xyz"), &rules),
            Cow::Borrowed(_)
        ));
    }
}
