//! Run summaries and JSON responses.
//!
//! Text output is a boxed two-column table; JSON output is a pretty-printed
//! response object with `status` first. Both are deterministic for a given
//! summary.

use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use crate::error::{OutputErrorCode, ScopeError};

/// Current schema version for JSON responses.
pub const SCHEMA_VERSION: &str = "1";

const TABLE_TITLE: &str = "vendorscope - your dependencies, your namespace!";

// ============================================================================
// Run summary
// ============================================================================

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub packages: usize,
    /// PHP files relocated in the target directory.
    pub source_files: usize,
    /// PHP files copied verbatim as templates.
    pub template_files: usize,
    pub excluded_files: usize,
    /// Bytes of all package files before exclusion.
    pub original_size: u64,
    /// Bytes copied into the target directory.
    pub total_size: u64,
    pub namespaces: usize,
    pub global_types: usize,
    pub constants: usize,
    /// Host project files changed by call-site rewriting.
    pub call_sites_updated: usize,
    pub target_directory: String,
}

impl RunSummary {
    pub fn new(target_directory: impl Into<String>) -> Self {
        RunSummary {
            target_directory: target_directory.into(),
            ..Default::default()
        }
    }
}

/// Lines of a boxed table describing `summary`.
pub fn format_summary_table(summary: &RunSummary) -> Vec<String> {
    let target = if summary.target_directory.is_empty() {
        "-".to_string()
    } else {
        summary.target_directory.clone()
    };
    let rows: [(&str, String); 9] = [
        ("Packages", summary.packages.to_string()),
        ("PHP Files Prefixed", summary.source_files.to_string()),
        ("Files Excluded", summary.excluded_files.to_string()),
        ("Namespaces Prefixed", summary.namespaces.to_string()),
        ("Global Classes", summary.global_types.to_string()),
        ("Constants", summary.constants.to_string()),
        ("Call Sites Updated", summary.call_sites_updated.to_string()),
        (
            "Output Size",
            format_size_with_reduction(summary.original_size, summary.total_size),
        ),
        ("Target Directory", target),
    ];

    let label_width = rows.iter().map(|(l, _)| l.chars().count()).max().unwrap_or(0);
    let value_width = rows.iter().map(|(_, v)| v.chars().count()).max().unwrap_or(0);
    let inner_width = (label_width + 3 + value_width).max(TABLE_TITLE.chars().count());
    let value_width = inner_width - label_width - 3;

    let border = format!("+{}+", "-".repeat(inner_width + 2));
    let divider = format!(
        "+{}+{}+",
        "-".repeat(label_width + 2),
        "-".repeat(inner_width - label_width - 1)
    );

    let mut lines = Vec::with_capacity(rows.len() + 4);
    lines.push(border.clone());
    lines.push(format!("| {:<inner_width$} |", TABLE_TITLE));
    lines.push(divider);
    for (label, value) in &rows {
        lines.push(format!("| {:<label_width$} | {:<value_width$} |", label, value));
    }
    lines.push(border);
    lines
}

/// `output` formatted, with the reduction against `original` when known.
pub fn format_size_with_reduction(original: u64, output: u64) -> String {
    if original == 0 {
        return format_bytes(output);
    }
    let reduction = ((1.0 - output as f64 / original as f64) * 100.0).round() as i64;
    format!(
        "{} / {} (-{}%)",
        format_bytes(output),
        format_bytes(original),
        reduction
    )
}

/// Human-readable size: one decimal, trailing `.0` dropped.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    let rounded = (size * 10.0).round() / 10.0;
    let text = format!("{:.1}", rounded);
    let text = text.strip_suffix(".0").unwrap_or(&text);
    format!("{} {}", text, UNITS[unit])
}

// ============================================================================
// JSON responses
// ============================================================================

/// Successful `prefix` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrefixResponse {
    /// Status: "ok".
    pub status: String,
    pub schema_version: String,
    /// True when nothing was written.
    pub dry_run: bool,
    pub summary: RunSummary,
}

impl PrefixResponse {
    pub fn new(summary: RunSummary, dry_run: bool) -> Self {
        PrefixResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            dry_run,
            summary,
        }
    }
}

/// Error details inside an [`ErrorResponse`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: u8,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorInfo {
    pub fn from_error(err: &ScopeError) -> Self {
        let details = match err {
            ScopeError::ConfigNotFound { path }
            | ScopeError::ManifestNotFound { path }
            | ScopeError::ManifestInvalid { path, .. }
            | ScopeError::Io { path, .. } => {
                Some(serde_json::json!({ "path": path.display().to_string() }))
            }
            ScopeError::InvalidPattern { pattern, .. } => {
                Some(serde_json::json!({ "pattern": pattern }))
            }
            ScopeError::Config { .. } | ScopeError::Internal { .. } => None,
        };
        ErrorInfo {
            code: OutputErrorCode::from(err).code(),
            message: err.to_string(),
            details,
        }
    }
}

/// Error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Status: "error".
    pub status: String,
    pub schema_version: String,
    pub error: ErrorInfo,
}

impl ErrorResponse {
    pub fn from_error(err: &ScopeError) -> Self {
        ErrorResponse {
            status: "error".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            error: ErrorInfo::from_error(err),
        }
    }

    pub fn new(code: u8, message: impl Into<String>) -> Self {
        ErrorResponse {
            status: "error".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            error: ErrorInfo {
                code,
                message: message.into(),
                details: None,
            },
        }
    }
}

/// Write `response` as pretty JSON followed by a newline.
pub fn emit_response<T: Serialize>(response: &T, writer: &mut impl Write) -> io::Result<()> {
    let json = serde_json::to_string_pretty(response)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{}", json)
}
