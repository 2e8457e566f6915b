// crates/registry-migrate-cli/src/main.rs
// ============================================================================
// Module: Registry Migrate CLI Entry Point
// Description: Command dispatcher for the schema registry v2 migration.
// Purpose: Plan, run and verify the migration against a configured store.
// Dependencies: clap, registry-migrate-config, registry-migrate-core, serde, thiserror
// ============================================================================

//! ## Overview
//! `registry-migrate` resolves `registry-migrate.toml` (or the `--store`
//! override), opens the legacy store and either plans, runs or verifies the
//! v2 migration. Results are printed to stdout as JSON; audit events go to
//! the configured sink. Every failure exits non-zero with a single-line
//! error on stderr.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::ArgAction;
use clap::Args;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use registry_migrate_config::AuditSinkKind;
use registry_migrate_config::MigrateConfig;
use registry_migrate_core::FileAuditSink;
use registry_migrate_core::MigrationAuditSink;
use registry_migrate_core::MigrationError;
use registry_migrate_core::MigrationPlan;
use registry_migrate_core::MigrationReport;
use registry_migrate_core::Migrator;
use registry_migrate_core::NoopAuditSink;
use registry_migrate_core::SchemaShape;
use registry_migrate_core::StderrAuditSink;
use registry_migrate_core::VerificationReport;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "registry-migrate", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the v2 migration in one atomic transaction.
    Migrate(StoreArgs),
    /// Compute the migration outcome without writing.
    Plan(PlanCommand),
    /// Check a migrated store against the v2 contract.
    Verify(StoreArgs),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Store selection shared by every store command.
#[derive(Args, Debug)]
struct StoreArgs {
    /// Config file path (defaults to `REGISTRY_MIGRATE_CONFIG` or ./registry-migrate.toml).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Store path overriding `store.path`.
    #[arg(long, value_name = "PATH")]
    store: Option<PathBuf>,
}

/// Arguments for `plan`.
#[derive(Args, Debug)]
struct PlanCommand {
    /// Store selection.
    #[command(flatten)]
    store: StoreArgs,
    /// Include the per-commit and per-version outcome.
    #[arg(long, action = ArgAction::SetTrue)]
    detail: bool,
}

/// Configuration subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a registry-migrate configuration file.
    Validate(ConfigValidateCommand),
}

/// Arguments for `config validate`.
#[derive(Args, Debug)]
struct ConfigValidateCommand {
    /// Config file path (defaults to `REGISTRY_MIGRATE_CONFIG` or ./registry-migrate.toml).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

// ============================================================================
// SECTION: Output Types
// ============================================================================

/// `migrate` output.
#[derive(Serialize)]
struct MigrateOutput<'a> {
    /// Always `committed`.
    status: &'static str,
    /// Final counts.
    report: &'a MigrationReport,
}

/// `plan` output without detail.
#[derive(Serialize)]
struct PlanOutput<'a> {
    /// Always `planned`.
    status: &'static str,
    /// Predicted counts.
    report: &'a MigrationReport,
}

/// `verify` output.
#[derive(Serialize)]
struct VerifyOutput<'a> {
    /// `passed` or `failed`.
    status: &'static str,
    /// Observed store shape.
    shape: &'static str,
    /// Verification details.
    verification: &'a VerificationReport,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }

    /// Wraps a migration failure, noting when a re-run is safe.
    fn migration(action: &str, err: &MigrationError) -> Self {
        let hint = if err.is_retryable() { " (safe to retry)" } else { "" };
        Self::new(format!("{action} failed [{}]: {err}{hint}", err.kind()))
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    if cli.show_version {
        let version = env!("CARGO_PKG_VERSION");
        write_stdout_line(&format!("registry-migrate {version}"))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }
    let Some(command) = cli.command else {
        show_help()?;
        return Ok(ExitCode::SUCCESS);
    };
    match command {
        Commands::Migrate(args) => command_migrate(&args),
        Commands::Plan(command) => command_plan(&command),
        Commands::Verify(args) => command_verify(&args),
        Commands::Config {
            command,
        } => match command {
            ConfigCommand::Validate(command) => command_config_validate(&command),
        },
    }
}

// ============================================================================
// SECTION: Migration Commands
// ============================================================================

/// Executes `migrate`.
fn command_migrate(args: &StoreArgs) -> CliResult<ExitCode> {
    let mut migrator = open_migrator(args)?;
    let report = migrator.run().map_err(|err| CliError::migration("migration", &err))?;
    write_json(&MigrateOutput {
        status: "committed",
        report: &report,
    })?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `plan`.
fn command_plan(command: &PlanCommand) -> CliResult<ExitCode> {
    let mut migrator = open_migrator(&command.store)?;
    let plan: MigrationPlan = migrator.plan().map_err(|err| CliError::migration("plan", &err))?;
    if command.detail {
        write_json(&plan)?;
    } else {
        write_json(&PlanOutput {
            status: "planned",
            report: &plan.report,
        })?;
    }
    Ok(ExitCode::SUCCESS)
}

/// Executes `verify`.
fn command_verify(args: &StoreArgs) -> CliResult<ExitCode> {
    let migrator = open_migrator(args)?;
    let shape = SchemaShape::inspect(migrator.connection())
        .map_err(|err| CliError::migration("verification", &err))?;
    let verification =
        migrator.verify().map_err(|err| CliError::migration("verification", &err))?;
    let passed = verification.passed();
    write_json(&VerifyOutput {
        status: if passed { "passed" } else { "failed" },
        shape: shape.label(),
        verification: &verification,
    })?;
    Ok(if passed { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Executes `config validate`.
fn command_config_validate(command: &ConfigValidateCommand) -> CliResult<ExitCode> {
    MigrateConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    write_stdout_line("config ok").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Loads config, builds the audit sink and opens the store.
fn open_migrator(args: &StoreArgs) -> CliResult<Migrator> {
    let config = MigrateConfig::load_with_store(args.config.as_deref(), args.store.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    let store = config
        .store_config()
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    let audit = build_audit_sink(&config)?;
    let migrator = Migrator::open(&store)
        .map_err(|err| CliError::new(format!("failed to open store: {err}")))?;
    Ok(migrator.with_audit_sink(audit))
}

/// Builds the configured audit sink.
fn build_audit_sink(config: &MigrateConfig) -> CliResult<Arc<dyn MigrationAuditSink>> {
    let sink: Arc<dyn MigrationAuditSink> = match (config.audit.sink, &config.audit.path) {
        (AuditSinkKind::File, Some(path)) => Arc::new(FileAuditSink::new(path).map_err(|err| {
            CliError::new(format!("failed to open audit log {}: {err}", path.display()))
        })?),
        (AuditSinkKind::File, None) => {
            return Err(CliError::new("audit.path is required for the file sink".to_string()));
        }
        (AuditSinkKind::Stderr, _) => Arc::new(StderrAuditSink),
        (AuditSinkKind::None, _) => Arc::new(NoopAuditSink),
    };
    Ok(sink)
}

/// Writes a value to stdout as pretty JSON.
fn write_json<T: Serialize>(value: &T) -> CliResult<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::new(format!("failed to render output: {err}")))?;
    write_stdout_line(&rendered).map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Prints top-level help.
fn show_help() -> CliResult<()> {
    let mut command = Cli::command();
    let help = command.render_help().to_string();
    write_stdout_line(&help).map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
