//! Error types and error code constants for vendorscope.
//!
//! `ScopeError` is the single error type surfaced by the engine and the
//! orchestrator. Only fatal conditions are represented here: configuration
//! problems and an absent or malformed package manifest abort a run. Per-file
//! I/O failures during copying or rewriting are logged and skipped by the
//! caller instead of becoming errors, and packages missing from the manifest
//! are tolerated by the resolver.
//!
//! ## Error Code Mapping
//!
//! - `2`: Configuration errors (missing or invalid settings)
//! - `3`: Manifest errors (installed.json absent or unparseable)
//! - `4`: I/O errors that abort a run (target directory cannot be prepared)
//! - `10`: Internal errors (bugs, unexpected state)

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

// ============================================================================
// Output Error Codes
// ============================================================================

/// Stable numeric codes used for process exit status and JSON error output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputErrorCode {
    /// Missing or invalid configuration.
    InvalidConfiguration = 2,
    /// Package manifest absent or malformed.
    ManifestError = 3,
    /// Filesystem failure that prevents the run from continuing.
    IoError = 4,
    /// Internal errors (bugs, unexpected state).
    InternalError = 10,
}

impl OutputErrorCode {
    /// Get the numeric code value.
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for OutputErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Unified error type for the relocation engine.
#[derive(Debug, Error)]
pub enum ScopeError {
    /// A required setting is missing or a setting has the wrong shape.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// The project file holding the configuration does not exist.
    #[error("configuration file not found: {}", path.display())]
    ConfigNotFound { path: PathBuf },

    /// The package manifest could not be located.
    #[error(
        "could not find installed.json at: {}. Run 'composer install' first.",
        path.display()
    )]
    ManifestNotFound { path: PathBuf },

    /// The package manifest exists but is not valid.
    #[error("invalid manifest {}: {message}", path.display())]
    ManifestInvalid { path: PathBuf, message: String },

    /// A user-supplied exclude pattern does not compile.
    #[error("invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// A filesystem operation that the run cannot continue without failed.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Internal error (bug or unexpected state).
    #[error("internal error: {message}")]
    Internal { message: String },
}

// ============================================================================
// Error Code Mapping
// ============================================================================

impl From<&ScopeError> for OutputErrorCode {
    fn from(err: &ScopeError) -> Self {
        match err {
            ScopeError::Config { .. } => OutputErrorCode::InvalidConfiguration,
            ScopeError::ConfigNotFound { .. } => OutputErrorCode::InvalidConfiguration,
            ScopeError::InvalidPattern { .. } => OutputErrorCode::InvalidConfiguration,
            ScopeError::ManifestNotFound { .. } => OutputErrorCode::ManifestError,
            ScopeError::ManifestInvalid { .. } => OutputErrorCode::ManifestError,
            ScopeError::Io { .. } => OutputErrorCode::IoError,
            ScopeError::Internal { .. } => OutputErrorCode::InternalError,
        }
    }
}

impl From<ScopeError> for OutputErrorCode {
    fn from(err: ScopeError) -> Self {
        OutputErrorCode::from(&err)
    }
}

// ============================================================================
// Bridge: regex::Error -> ScopeError
// ============================================================================

impl From<regex::Error> for ScopeError {
    fn from(err: regex::Error) -> Self {
        // Rule patterns are built from escaped literals, so a compile failure
        // here means a pattern template is wrong or a size limit was hit.
        ScopeError::Internal {
            message: format!("rewrite rule failed to compile: {}", err),
        }
    }
}

// ============================================================================
// Convenience Constructors
// ============================================================================

impl ScopeError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        ScopeError::Config {
            message: message.into(),
        }
    }

    /// Wrap an I/O error with the path it happened at.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ScopeError::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        ScopeError::Internal {
            message: message.into(),
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> OutputErrorCode {
        OutputErrorCode::from(self)
    }
}

// ============================================================================
// Tests
// ============================================================================
