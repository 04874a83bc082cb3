//! Namespace relocation.
//!
//! Every configured namespace `N` becomes `P\N` in six syntactic contexts,
//! applied in this order for each namespace (longest namespace first):
//!
//! 1. `namespace N;` / `namespace N\Sub {` declarations
//! 2. `use N\X;`, `use function N\f;`, `use const N\C;`, `use N\{A, B};`
//! 3. fully qualified references `\N\X` and `\N`
//! 4. unqualified in-code references `N\X`
//! 5. string literals `'N\X'` and `"N\\X"`
//! 6. doc annotations `@param N\X`, `@return A|N\X`
//!
//! A fully qualified reference only counts when its leading backslash is not
//! itself part of a longer path, which is what keeps `X\Y\N` (where `N` is
//! also a relocated root) from being prefixed mid-path. Two repair sweeps run
//! after all namespaces have been processed and undo the known double-prefix
//! shapes should any slip through.

use std::borrow::Cow;

use crate::error::ScopeError;
use crate::relocate::{longest_first, Relocator};
use crate::rule::{
    apply_rules, ends_in_ident, first_char, is_root_marker, starts_with_ident, template_literal,
    ContextGuard, RewriteRule,
};

/// Rewrites namespace references under a namespace prefix.
#[derive(Debug)]
pub struct NamespaceRelocator {
    prefix: String,
    namespaces: Vec<NamespaceRules>,
}

#[derive(Debug)]
struct NamespaceRules {
    namespace: String,
    /// `namespace` with every separator doubled, as written in `"..."` strings.
    doubled: String,
    primary: Vec<RewriteRule>,
    /// `P\N\P\` -> `P\N\`, plain and doubled.
    double_prefix: [(String, String); 2],
    /// `\P\N` marker searched for before running `mid_path`.
    mid_path_marker: String,
    mid_path: RewriteRule,
}

impl NamespaceRelocator {
    /// Build a relocator for `namespaces` under `prefix`.
    ///
    /// Leading and trailing separators are trimmed from every name; empty
    /// names and duplicates are dropped.
    pub fn new(prefix: impl Into<String>, namespaces: Vec<String>) -> Result<Self, ScopeError> {
        let prefix = prefix.into().trim_matches('\\').to_string();
        if prefix.is_empty() {
            return Err(ScopeError::config("namespace prefix must not be empty"));
        }

        let names = longest_first(
            namespaces
                .into_iter()
                .map(|ns| ns.trim_matches('\\').to_string()),
        );
        let namespaces = names
            .into_iter()
            .map(|ns| NamespaceRules::build(&prefix, ns))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(NamespaceRelocator {
            prefix,
            namespaces,
        })
    }

    /// The namespace prefix, without trailing separator.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Relocated namespaces in application order (longest first).
    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.namespaces.iter().map(|ns| ns.namespace.as_str())
    }

    pub fn len(&self) -> usize {
        self.namespaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }

    fn rewrite_primary<'a>(&self, text: &'a str) -> Cow<'a, str> {
        let mut current = Cow::Borrowed(text);
        for ns in &self.namespaces {
            if !current.contains(ns.namespace.as_str()) && !current.contains(ns.doubled.as_str()) {
                continue;
            }
            current = apply_rules(current, &ns.primary);
        }
        current
    }

    fn repair<'a>(&self, text: Cow<'a, str>) -> Cow<'a, str> {
        let mut current = text;
        for ns in &self.namespaces {
            for (doubled, single) in &ns.double_prefix {
                if current.contains(doubled.as_str()) {
                    current = Cow::Owned(current.replace(doubled.as_str(), single));
                }
            }
            if current.contains(ns.mid_path_marker.as_str()) {
                current = apply_rules(current, std::slice::from_ref(&ns.mid_path));
            }
        }
        current
    }
}

impl Relocator for NamespaceRelocator {
    fn relocate<'a>(&self, text: &'a str) -> Cow<'a, str> {
        let primary = self.rewrite_primary(text);
        self.repair(primary)
    }
}

// ============================================================================
// Rule construction
// ============================================================================

/// `after` starts with a separator followed by the start of another segment.
fn continues_path(after: &str) -> bool {
    after
        .strip_prefix('\\')
        .and_then(first_char)
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
}

/// What may follow the namespace inside an import statement.
fn continues_import(after: &str) -> bool {
    if let Some(rest) = after.strip_prefix('\\') {
        return first_char(rest).is_some_and(|c| c == '{' || c.is_ascii_alphabetic() || c == '_');
    }
    let trimmed = after.trim_start();
    if trimmed.starts_with(';') || trimmed.starts_with(',') {
        return true;
    }
    first_char(after).is_some_and(char::is_whitespace)
        && trimmed
            .strip_prefix("as")
            .is_some_and(|rest| !starts_with_ident(rest))
}

/// What may follow the namespace in a `namespace` declaration.
fn ends_declaration(after: &str) -> bool {
    match first_char(after) {
        None => true,
        Some(c) => c == '\\' || c == ';' || c == '{' || c.is_whitespace(),
    }
}

/// Left boundary of an unqualified reference: not part of a longer name,
/// not a variable, not a property or method name.
fn starts_reference(before: &str) -> bool {
    !ends_in_ident(before) && !before.ends_with(['\\', '$', '>'])
}

impl NamespaceRules {
    fn build(prefix: &str, namespace: String) -> Result<Self, ScopeError> {
        let prefixed = format!("{}\\{}", prefix, namespace);
        let already = format!("{}\\", prefix);
        let doubled = namespace.replace('\\', "\\\\");
        let prefixed_doubled = prefixed.replace('\\', "\\\\");
        let already_doubled = format!("{}\\\\", prefix.replace('\\', "\\\\"));

        let en = regex::escape(&namespace);
        let en_doubled = regex::escape(&doubled);
        let lit = template_literal(&prefixed);
        let lit_doubled = template_literal(&prefixed_doubled);

        let guard = || {
            ContextGuard::new()
                .not_preceded_by(already.clone())
                .not_starting_with(already.clone())
        };

        let primary = vec![
            RewriteRule::new(
                "namespace-declaration",
                &format!(r"(?m)^(?P<lead>[ \t]*namespace\s+)(?P<target>{en})"),
                format!("${{lead}}{lit}"),
                guard().after(ends_declaration),
            )?,
            RewriteRule::new(
                "use-import",
                &format!(
                    r"(?m)^(?P<lead>[ \t]*use\s+(?:function\s+|const\s+)?)(?P<root>\\?)(?P<target>{en})"
                ),
                format!("${{lead}}${{root}}{lit}"),
                guard().after(continues_import),
            )?,
            RewriteRule::new(
                "fully-qualified",
                &format!(r"\\(?P<target>{en})"),
                format!("\\{lit}"),
                guard().before(is_root_marker).after(|after| {
                    if after.starts_with('\\') {
                        continues_path(after)
                    } else {
                        !starts_with_ident(after)
                    }
                }),
            )?,
            RewriteRule::new(
                "unqualified",
                &format!(r"(?P<target>{en})"),
                lit.clone(),
                guard().before(starts_reference).after(continues_path),
            )?,
            RewriteRule::new(
                "string-literal",
                &format!(r#"(?P<quote>['"])(?P<root>\\?)(?P<target>{en})\\(?P<next>[A-Za-z_])"#),
                format!("${{quote}}${{root}}{lit}\\${{next}}"),
                guard(),
            )?,
            RewriteRule::new(
                "string-literal-escaped",
                &format!(
                    r#"(?P<quote>['"])(?P<root>(?:\\\\)?)(?P<target>{en_doubled})\\\\(?P<next>[A-Za-z_])"#
                ),
                format!("${{quote}}${{root}}{lit_doubled}\\\\${{next}}"),
                ContextGuard::new()
                    .not_preceded_by(already_doubled.clone())
                    .not_starting_with(already_doubled),
            )?,
            RewriteRule::new(
                "doc-annotation",
                &format!(
                    r"(?P<lead>@(?:[a-z]+-)?(?:param|return|var|throws|see|property(?:-read|-write)?|method|mixin)\s+\\?)(?P<target>{en})"
                ),
                format!("${{lead}}{lit}"),
                guard().after(continues_path),
            )?,
            RewriteRule::new(
                "doc-union",
                &format!(r"(?P<lead>\|\\?)(?P<target>{en})"),
                format!("${{lead}}{lit}"),
                guard().after(continues_path),
            )?,
        ];

        let mid_path_marker = format!("\\{}", prefixed);
        let mid_path = RewriteRule::new(
            "mid-path-repair",
            &format!(
                r"(?P<lead>[A-Za-z0-9_])(?P<target>{})",
                regex::escape(&mid_path_marker)
            ),
            format!("${{lead}}\\{}", template_literal(&namespace)),
            ContextGuard::new().after(|after| !starts_with_ident(after) && !after.starts_with('\\')),
        )?;

        let double_prefix = [
            (
                format!("{}\\{}\\", prefixed, prefix),
                format!("{}\\", prefixed),
            ),
            (
                format!("{}\\\\{}\\\\", prefixed_doubled, prefix.replace('\\', "\\\\")),
                format!("{}\\\\", prefixed_doubled),
            ),
        ];

        Ok(NamespaceRules {
            namespace,
            doubled,
            primary,
            double_prefix,
            mid_path_marker,
            mid_path,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn relocator(namespaces: &[&str]) -> NamespaceRelocator {
        NamespaceRelocator::new(
            r"WP_Statistics\Deps",
            namespaces.iter().map(|s| s.to_string()).collect(),
        )
        .unwrap()
    }

    fn geo() -> NamespaceRelocator {
        relocator(&["GeoIp2"])
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    #[test]
    fn prefixes_namespace_declaration() {
        let out = geo().relocate("<?php\nnamespace GeoIp2;");
        assert!(out.contains(r"namespace WP_Statistics\Deps\GeoIp2;"));
    }

    #[test]
    fn prefixes_namespace_declaration_with_sub_namespace() {
        let out = geo().relocate("<?php\nnamespace GeoIp2\\Database;");
        assert!(out.contains(r"namespace WP_Statistics\Deps\GeoIp2\Database;"));
    }

    #[test]
    fn prefixes_namespace_declaration_with_braces() {
        let out = geo().relocate("<?php\nnamespace GeoIp2\\Database {");
        assert!(out.contains(r"namespace WP_Statistics\Deps\GeoIp2\Database {"));
    }

    #[test]
    fn does_not_double_prefix_namespace_declaration() {
        let input = "<?php\nnamespace WP_Statistics\\Deps\\GeoIp2;";
        assert_eq!(geo().relocate(input), input);
    }

    #[test]
    fn leaves_longer_namespace_names_alone() {
        let input = "<?php\nnamespace GeoIp2Extras;";
        assert_eq!(geo().relocate(input), input);
    }

    // ========================================================================
    // Imports
    // ========================================================================

    #[test]
    fn prefixes_use_statements() {
        let r = geo();
        assert_eq!(
            r.relocate(r"use GeoIp2\Database\Reader;"),
            r"use WP_Statistics\Deps\GeoIp2\Database\Reader;"
        );
        assert_eq!(
            r.relocate(r"use function GeoIp2\someFunction;"),
            r"use function WP_Statistics\Deps\GeoIp2\someFunction;"
        );
        assert_eq!(
            r.relocate(r"use const GeoIp2\SOME_CONST;"),
            r"use const WP_Statistics\Deps\GeoIp2\SOME_CONST;"
        );
    }

    #[test]
    fn prefixes_grouped_and_bare_imports() {
        let r = geo();
        assert_eq!(
            r.relocate(r"use GeoIp2\{Model\City, Database\Reader};"),
            r"use WP_Statistics\Deps\GeoIp2\{Model\City, Database\Reader};"
        );
        assert_eq!(r.relocate("use GeoIp2;"), r"use WP_Statistics\Deps\GeoIp2;");
        assert_eq!(
            r.relocate(r"use \GeoIp2\Model\City as GeoCity;"),
            r"use \WP_Statistics\Deps\GeoIp2\Model\City as GeoCity;"
        );
    }

    #[test]
    fn does_not_double_prefix_use_statement() {
        let input = r"use WP_Statistics\Deps\GeoIp2\Database\Reader;";
        assert_eq!(geo().relocate(input), input);
    }

    // ========================================================================
    // Fully qualified and unqualified references
    // ========================================================================

    #[test]
    fn prefixes_fully_qualified_references() {
        let r = geo();
        assert!(r
            .relocate(r"$x = new \GeoIp2\Database\Reader();")
            .contains(r"\WP_Statistics\Deps\GeoIp2\Database\Reader()"));
        assert!(r
            .relocate(r"if ($x instanceof \GeoIp2\Model\City)")
            .contains(r"\WP_Statistics\Deps\GeoIp2\Model\City)"));
        assert!(r
            .relocate(r"catch (\GeoIp2\Exception\AddressNotFoundException $e)")
            .contains(r"\WP_Statistics\Deps\GeoIp2\Exception\AddressNotFoundException $e"));
    }

    #[test]
    fn prefixes_nullable_type_hints() {
        let out = geo().relocate(r"function foo(?\GeoIp2\Model\City $city): ?\GeoIp2\Model\City");
        assert_eq!(
            out,
            r"function foo(?\WP_Statistics\Deps\GeoIp2\Model\City $city): ?\WP_Statistics\Deps\GeoIp2\Model\City"
        );
    }

    #[test]
    fn prefixes_unqualified_reference() {
        let out = geo().relocate(r"$x = new GeoIp2\Database\Reader();");
        assert_eq!(out, r"$x = new WP_Statistics\Deps\GeoIp2\Database\Reader();");
    }

    #[test]
    fn does_not_touch_property_access() {
        let r = relocator(&["GeoIp2", r"MaxMind\Db"]);
        let input = "$this->dbReader->get($ip);";
        assert!(matches!(r.relocate(input), Cow::Borrowed(_)));
    }

    #[test]
    fn does_not_touch_variables() {
        let input = "$GeoIp2Reader = \"test\";\n$GeoIp2\\x = 1;";
        assert_eq!(geo().relocate(input), input);
    }

    #[test]
    fn does_not_touch_longer_identifiers() {
        let input = r"class MyGeoIp2Helper extends Base\GeoIp2\Thing {";
        assert_eq!(geo().relocate(input), input);
    }

    #[test]
    fn does_not_touch_property_names_or_array_keys() {
        let r = relocator(&[r"MaxMind\Db"]);
        let input = "<?php\nclass Reader {\n    private $database;\n    public function __construct(string $database)\n    {\n        $this->database = $database;\n    }\n}\n";
        assert_eq!(r.relocate(input), input);

        let input = "$data['GeoIp2'] = true;";
        assert_eq!(geo().relocate(input), input);
    }

    // ========================================================================
    // String literals and doc annotations
    // ========================================================================

    #[test]
    fn prefixes_single_quoted_string() {
        let out = geo().relocate(r"$class = 'GeoIp2\Database\Reader';");
        assert_eq!(out, r"$class = 'WP_Statistics\Deps\GeoIp2\Database\Reader';");
    }

    #[test]
    fn prefixes_double_quoted_string_with_escaped_separators() {
        let out = geo().relocate(r#"$class = "GeoIp2\\Database\\Reader";"#);
        assert_eq!(out, r#"$class = "WP_Statistics\\Deps\\GeoIp2\\Database\\Reader";"#);

        let out = geo().relocate(r#"$class = "\\GeoIp2\\Model\\City";"#);
        assert_eq!(out, r#"$class = "\\WP_Statistics\\Deps\\GeoIp2\\Model\\City";"#);
    }

    #[test]
    fn prefixes_multi_segment_namespace_in_escaped_string() {
        let r = relocator(&[r"MaxMind\Db"]);
        let out = r.relocate(r#"$c = "MaxMind\\Db\\Reader";"#);
        assert_eq!(out, r#"$c = "WP_Statistics\\Deps\\MaxMind\\Db\\Reader";"#);
    }

    #[test]
    fn prefixes_doc_annotations() {
        let r = geo();
        assert!(r
            .relocate(r"/** @param GeoIp2\Model\City $city */")
            .contains(r"@param WP_Statistics\Deps\GeoIp2\Model\City"));
        assert!(r
            .relocate(r"/** @return \GeoIp2\Model\City */")
            .contains(r"@return \WP_Statistics\Deps\GeoIp2\Model\City"));
        assert!(r
            .relocate(r"/** @var GeoIp2\Database\Reader $reader */")
            .contains(r"@var WP_Statistics\Deps\GeoIp2\Database\Reader"));
        assert_eq!(
            r.relocate(r"/** @return null|GeoIp2\Model\City|\GeoIp2\Model\Country */"),
            r"/** @return null|WP_Statistics\Deps\GeoIp2\Model\City|\WP_Statistics\Deps\GeoIp2\Model\Country */"
        );
    }

    // ========================================================================
    // Multiple namespaces and precedence
    // ========================================================================

    #[test]
    fn handles_multiple_namespaces() {
        let r = relocator(&["GeoIp2", r"MaxMind\Db"]);
        let input = r#"<?php
namespace GeoIp2\Database;

use MaxMind\Db\Reader as DbReader;

class Reader
{
    private $dbReader;

    public function __construct(string $filename)
    {
        $this->dbReader = new DbReader($filename);
    }
}
"#;
        let out = r.relocate(input);
        assert!(out.contains(r"namespace WP_Statistics\Deps\GeoIp2\Database;"));
        assert!(out.contains(r"use WP_Statistics\Deps\MaxMind\Db\Reader as DbReader;"));
        assert!(out.contains("$this->dbReader = new DbReader($filename);"));
    }

    #[test]
    fn longest_namespace_matched_first() {
        let r = NamespaceRelocator::new("Prefix", vec!["MaxMind".into(), r"MaxMind\Db".into()])
            .unwrap();
        assert_eq!(
            r.namespaces().collect::<Vec<_>>(),
            vec![r"MaxMind\Db", "MaxMind"]
        );
        let out = r.relocate(r"use MaxMind\Db\Reader; $r = new \MaxMind\Db\Reader\Decoder();");
        assert_eq!(
            out,
            r"use Prefix\MaxMind\Db\Reader; $r = new \Prefix\MaxMind\Db\Reader\Decoder();"
        );
        assert!(!out.contains(r"Prefix\Prefix\"));
    }

    // ========================================================================
    // Edge cases
    // ========================================================================

    #[test]
    fn leaves_non_php_content_unchanged() {
        let input = "<html><body>GeoIp2 is great</body></html>";
        assert!(matches!(geo().relocate(input), Cow::Borrowed(_)));
        assert_eq!(geo().relocate(""), "");
    }

    #[test]
    fn relocation_is_idempotent() {
        let r = relocator(&["GeoIp2", r"MaxMind\Db", "MaxMind"]);
        let input = r#"<?php
namespace GeoIp2\Database;

use GeoIp2\Model\{City, Country};
use MaxMind\Db\Reader as DbReader;

/**
 * @return \GeoIp2\Model\City|null
 */
function lookup(?GeoIp2\Model\City $c): \MaxMind\Db\Reader {
    $name = 'GeoIp2\Model\City';
    $other = "MaxMind\\Db\\Reader";
    return new \MaxMind\Db\Reader('x');
}
"#;
        let once = r.relocate(input).into_owned();
        let twice = r.relocate(&once).into_owned();
        assert_eq!(once, twice);
        assert!(!once.contains(r"Deps\WP_Statistics"));
    }

    #[test]
    fn empty_prefix_is_rejected() {
        assert!(NamespaceRelocator::new(r"\", vec!["GeoIp2".into()]).is_err());
    }

    // ========================================================================
    // Double-prefix prevention and repair
    // ========================================================================

    #[test]
    fn does_not_double_prefix_when_class_name_matches_namespace() {
        let r = NamespaceRelocator::new(r"WP_Statistics\Dependencies", vec!["DeviceDetector".into()])
            .unwrap();
        let out = r.relocate(r"use DeviceDetector\DeviceDetector;");
        assert_eq!(out, r"use WP_Statistics\Dependencies\DeviceDetector\DeviceDetector;");
        // The primary pass alone must already get this right.
        assert_eq!(r.rewrite_primary(r"use DeviceDetector\DeviceDetector;"), out);
    }

    #[test]
    fn does_not_double_prefix_mixed_call_sites() {
        let r = NamespaceRelocator::new(r"WP_Statistics\Dependencies", vec!["DeviceDetector".into()])
            .unwrap();
        let input = r#"<?php
use DeviceDetector\DeviceDetector;

class Service {
    public function create() {
        return new \WP_Statistics\Dependencies\DeviceDetector\DeviceDetector('ua');
    }
}
"#;
        let out = r.relocate(input);
        assert!(out.contains(r"use WP_Statistics\Dependencies\DeviceDetector\DeviceDetector;"));
        assert!(!out.contains(r"DeviceDetector\WP_Statistics\Dependencies\DeviceDetector"));
        assert_eq!(
            out.matches(r"WP_Statistics\Dependencies\DeviceDetector\DeviceDetector")
                .count(),
            2
        );
    }

    #[test]
    fn does_not_prefix_namespace_that_is_tail_of_another_path() {
        let r = NamespaceRelocator::new(
            r"WPSmsWooPro\Vendor",
            vec!["Illuminate".into(), "Carbon".into()],
        )
        .unwrap();
        let input = r#"<?php
namespace WPSmsWooPro\Vendor\Illuminate\Database\Eloquent\Concerns;

use WPSmsWooPro\Vendor\Carbon\CarbonImmutable;
use WPSmsWooPro\Vendor\Illuminate\Support\Carbon;
use WPSmsWooPro\Vendor\Illuminate\Support\Carbon as IlluminateCarbon;

class HasAttributes
{
    protected function serializeDate($date)
    {
        return Carbon::instance($date)->toJSON();
    }
}
"#;
        let out = r.relocate(input);
        assert_eq!(out, input);
        assert_eq!(r.rewrite_primary(input), input);
    }

    #[test]
    fn tail_segment_is_not_prefixed_in_unprefixed_input() {
        let r = NamespaceRelocator::new("Prefix", vec!["Illuminate".into(), "Carbon".into()])
            .unwrap();
        let out = r.relocate(r"use Illuminate\Support\Carbon; $d = \Illuminate\Support\Carbon::now();");
        assert_eq!(
            out,
            r"use Prefix\Illuminate\Support\Carbon; $d = \Prefix\Illuminate\Support\Carbon::now();"
        );
    }

    #[test]
    fn repair_sweeps_fix_known_double_prefix_shapes() {
        let r = NamespaceRelocator::new("Prefix", vec!["Illuminate".into(), "Carbon".into(), "X".into()])
            .unwrap();

        let mid_path = r"use Prefix\Illuminate\Support\Prefix\Carbon;";
        assert_eq!(
            r.repair(Cow::Borrowed(mid_path)),
            r"use Prefix\Illuminate\Support\Carbon;"
        );

        let doubled = r"use Prefix\X\Prefix\X;";
        assert_eq!(r.repair(Cow::Borrowed(doubled)), r"use Prefix\X\X;");

        let doubled_string = r#"$c = "Prefix\\X\\Prefix\\X";"#;
        assert_eq!(
            r.repair(Cow::Borrowed(doubled_string)),
            r#"$c = "Prefix\\X\\X";"#
        );

        // Clean output passes through both sweeps untouched.
        let clean = r"use Prefix\Illuminate\Support\Carbon; use Prefix\X\X;";
        assert!(matches!(r.repair(Cow::Borrowed(clean)), Cow::Borrowed(_)));
    }
}
