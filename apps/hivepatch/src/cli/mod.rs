//! # Hivepatch CLI Module
//!
//! This module implements the CLI interface for hivepatch.
//!
//! ## Available Commands
//!
//! - `apply` - Capture current values, write the desired ones, keep an audit file
//! - `validate` - Dry run: open and read everything, write nothing
//! - `seed` - Populate a hive file from a document (hive backend only)
//! - `rollback-plan` - Turn an audit file into the document that restores it

mod commands;

use crate::settings::{Backend, DEFAULT_HIVE_FILE, Settings};
use clap::{Parser, Subcommand};
use hivepatch_core::HivepatchError;
use std::io;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// hivepatch - apply registry edits from a JSON document
///
/// Every value is read before it is overwritten, and the document is saved
/// back with those previous values as an audit trail.
#[derive(Parser, Debug)]
#[command(name = "hivepatch")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Store backend: "windows" (live registry) or "hive" (redb hive file)
    #[arg(short = 'B', long, global = true, value_enum)]
    pub backend: Option<Backend>,

    /// Path to the hive file used by the hive backend
    #[arg(short = 'H', long, global = true)]
    pub hive: Option<PathBuf>,

    /// Path to a TOML settings file
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply a document, capturing every previous value
    Apply {
        /// Path to the JSON document
        #[arg(short, long)]
        config: PathBuf,

        /// Also overwrite the input document with the captured values
        #[arg(long)]
        save_prev: bool,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,

        /// Directory for the audit file (defaults to the input's directory)
        #[arg(long)]
        audit_dir: Option<PathBuf>,
    },

    /// Read every targeted value without writing anything
    Validate {
        /// Path to the JSON document
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Create keys and values in a hive file from a document
    Seed {
        /// Path to the JSON document
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Build the document that restores the values captured in an audit file
    RollbackPlan {
        /// Audit file written by `apply`
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write the rollback document
        #[arg(short, long)]
        output: PathBuf,
    },
}

// =============================================================================
// RUN CONTEXT
// =============================================================================

/// Global options after settings and flags are merged.
#[derive(Debug, Clone)]
pub struct Context {
    pub backend: Backend,
    pub hive: PathBuf,
    pub json_mode: bool,
    pub verbose: bool,
}

impl Context {
    /// Merge flags over settings over built-in defaults.
    #[must_use]
    pub fn new(cli: &Cli, settings: &Settings) -> Self {
        Self {
            backend: cli
                .backend
                .or(settings.backend)
                .unwrap_or_else(Backend::platform_default),
            hive: cli
                .hive
                .clone()
                .or_else(|| settings.hive.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_HIVE_FILE)),
            json_mode: cli.json_mode,
            verbose: cli.verbose,
        }
    }
}

/// Options of a single `apply` run.
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    pub config: PathBuf,
    pub save_prev: bool,
    pub confirm: bool,
    pub audit_dir: Option<PathBuf>,
}

impl ApplyOptions {
    /// Merge `apply` flags over settings. `--yes` always skips the prompt.
    #[must_use]
    pub fn new(
        config: PathBuf,
        save_prev: bool,
        yes: bool,
        audit_dir: Option<PathBuf>,
        settings: &Settings,
    ) -> Self {
        Self {
            config,
            save_prev: save_prev || settings.save_prev,
            confirm: !yes && settings.confirm.unwrap_or(true),
            audit_dir: audit_dir.or_else(|| settings.audit_dir.clone()),
        }
    }
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), HivepatchError> {
    let settings = Settings::load(cli.settings.as_deref())?;
    let ctx = Context::new(&cli, &settings);
    tracing::debug!("Backend: {}, hive: {}", ctx.backend, ctx.hive.display());

    match cli.command {
        Commands::Apply {
            config,
            save_prev,
            yes,
            audit_dir,
        } => {
            let opts = ApplyOptions::new(config, save_prev, yes, audit_dir, &settings);
            let stdin = io::stdin();
            let mut input = stdin.lock();
            let mut output = io::stderr();
            cmd_apply(&ctx, &opts, &mut input, &mut output).map(|_| ())
        }
        Commands::Validate { config } => cmd_validate(&ctx, &config),
        Commands::Seed { config } => cmd_seed(&ctx, &config),
        Commands::RollbackPlan { input, output } => cmd_rollback_plan(&ctx, &input, &output),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("parse")
    }

    #[test]
    fn apply_flags_parse() {
        let cli = parse(&[
            "hivepatch",
            "--backend",
            "hive",
            "--hive",
            "lab.hive",
            "apply",
            "-c",
            "proxy.json",
            "--save-prev",
            "--yes",
        ]);

        assert_eq!(cli.backend, Some(Backend::Hive));
        match cli.command {
            Commands::Apply {
                config,
                save_prev,
                yes,
                audit_dir,
            } => {
                assert_eq!(config, PathBuf::from("proxy.json"));
                assert!(save_prev);
                assert!(yes);
                assert_eq!(audit_dir, None);
            }
            other => unreachable!("expected apply, got {:?}", other),
        }
    }

    #[test]
    fn unknown_backend_rejected() {
        let result = Cli::try_parse_from(["hivepatch", "-B", "sqlite", "validate", "-c", "x"]);
        assert!(result.is_err());
    }

    #[test]
    fn flags_override_settings() {
        let settings = Settings {
            backend: Some(Backend::Windows),
            hive: Some(PathBuf::from("settings.hive")),
            save_prev: true,
            confirm: Some(false),
            audit_dir: Some(PathBuf::from("audit")),
        };
        let cli = parse(&["hivepatch", "-B", "hive", "validate", "-c", "x.json"]);

        let ctx = Context::new(&cli, &settings);
        assert_eq!(ctx.backend, Backend::Hive);
        assert_eq!(ctx.hive, PathBuf::from("settings.hive"));

        let opts = ApplyOptions::new(PathBuf::from("x.json"), false, false, None, &settings);
        assert!(opts.save_prev);
        assert!(!opts.confirm);
        assert_eq!(opts.audit_dir, Some(PathBuf::from("audit")));
    }

    #[test]
    fn defaults_without_settings() {
        let cli = parse(&["hivepatch", "validate", "-c", "x.json"]);
        let ctx = Context::new(&cli, &Settings::default());
        assert_eq!(ctx.backend, Backend::platform_default());
        assert_eq!(ctx.hive, PathBuf::from(DEFAULT_HIVE_FILE));

        let defaults = Settings::default();
        let opts = ApplyOptions::new(PathBuf::from("x.json"), false, false, None, &defaults);
        assert!(opts.confirm);
        assert!(!opts.save_prev);

        let opts = ApplyOptions::new(PathBuf::from("x.json"), false, true, None, &defaults);
        assert!(!opts.confirm);
    }
}
