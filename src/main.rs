//! Binary entry point for the vendorscope CLI.
//!
//! ```bash
//! # Prefix the packages configured in ./composer.json
//! vendorscope prefix
//!
//! # Show what would be prefixed, as JSON
//! vendorscope prefix path/to/project --dry-run --format json
//! ```

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use vendorscope::config::Config;
use vendorscope::error::{OutputErrorCode, ScopeError};
use vendorscope::output::{emit_response, format_summary_table, ErrorResponse, PrefixResponse};
use vendorscope::pipeline::Prefixer;

// ============================================================================
// CLI Structure
// ============================================================================

/// Prefix PHP dependency namespaces, global classes and constants.
#[derive(Parser, Debug)]
#[command(name = "vendorscope", version, about)]
struct Cli {
    /// Log level for tracing output (RUST_LOG takes precedence).
    #[arg(long, global = true, value_enum, default_value = "info")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Copy the configured packages and relocate their symbols.
    Prefix {
        /// Project directory containing composer.json (default: current directory).
        working_dir: Option<PathBuf>,

        /// Resolve and report without writing anything.
        #[arg(long)]
        dry_run: bool,

        /// Output format.
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Summary table.
    #[default]
    Text,
    /// JSON response.
    Json,
}

// ============================================================================
// Entry point
// ============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_level);

    let format = match &cli.command {
        Command::Prefix { format, .. } => *format,
    };

    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = OutputErrorCode::from(&err);
            match format {
                OutputFormat::Json => {
                    let _ = emit_response(&ErrorResponse::from_error(&err), &mut io::stdout());
                    let _ = io::stdout().flush();
                }
                OutputFormat::Text => eprintln!("error: {}", err),
            }
            ExitCode::from(code.code())
        }
    }
}

/// Initialize tracing subscriber.
fn init_tracing(level: LogLevel) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_tracing_level().to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn execute(cli: Cli) -> Result<(), ScopeError> {
    match cli.command {
        Command::Prefix {
            working_dir,
            dry_run,
            format,
        } => execute_prefix(working_dir, dry_run, format),
    }
}

fn execute_prefix(
    working_dir: Option<PathBuf>,
    dry_run: bool,
    format: OutputFormat,
) -> Result<(), ScopeError> {
    let working_dir = match working_dir {
        Some(dir) => dir,
        None => std::env::current_dir().map_err(|e| ScopeError::io(".", e))?,
    };
    let config = Config::from_composer_json(&working_dir.join("composer.json"))?;
    let mut prefixer = Prefixer::new(config);
    let mut stdout = io::stdout();

    if dry_run {
        let plan = prefixer.plan()?;
        match format {
            OutputFormat::Json => emit_response(&plan, &mut stdout)
                .map_err(|e| ScopeError::io("<stdout>", e))?,
            OutputFormat::Text => {
                let lines = [
                    "Dry run - no changes will be made".to_string(),
                    String::new(),
                    format!("  Namespace prefix: {}", plan.namespace_prefix),
                    format!("  Class prefix:     {}", plan.class_prefix),
                    format!("  Constant prefix:  {}", plan.constant_prefix),
                    format!("  Packages:         {}", plan.packages.join(", ")),
                    format!("  Namespaces:       {}", plan.namespaces.join(", ")),
                    format!("  Target directory: {}", plan.target_directory.display()),
                ];
                for line in lines {
                    writeln!(stdout, "{}", line).map_err(|e| ScopeError::io("<stdout>", e))?;
                }
            }
        }
        return Ok(());
    }

    let summary = prefixer.run()?;
    info!(packages = summary.packages, "prefixing complete");
    match format {
        OutputFormat::Json => emit_response(&PrefixResponse::new(summary, false), &mut stdout)
            .map_err(|e| ScopeError::io("<stdout>", e))?,
        OutputFormat::Text => {
            for line in format_summary_table(&summary) {
                writeln!(stdout, "{}", line).map_err(|e| ScopeError::io("<stdout>", e))?;
            }
        }
    }
    Ok(())
}
