//! Binary entry point for labsheet.
//!
//! This binary provides the CLI for moving laboratory setup data between
//! sites through transfer archives.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

mod commands;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use labsheet::config::LabsheetConfig;
use labsheet::observability;

use commands::{cmd_export, cmd_import, cmd_inspect};

/// Labsheet - schema-driven export and import of laboratory setup data.
#[derive(Parser)]
#[command(name = "labsheet")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Actor recorded as the creator of imported objects.
    #[arg(short, long, global = true, env = "LABSHEET_USER")]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Export a site into a transfer archive.
    Export {
        /// Site file to export.
        #[arg(long)]
        site: PathBuf,

        /// Archive to write (defaults to the site path with `.tar.zst`).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import a transfer archive into a site.
    Import {
        /// Site file to update, created when absent.
        #[arg(long)]
        site: PathBuf,

        /// Archive or unpacked directory to import.
        #[arg(short, long)]
        input: PathBuf,

        /// Type schema file used to provision or extend the site (repeatable).
        #[arg(short, long)]
        schema: Vec<PathBuf>,

        /// Title of a newly provisioned site.
        #[arg(long)]
        title: Option<String>,

        /// Default language of a newly provisioned site.
        #[arg(long)]
        language: Option<String>,
    },

    /// Show an archive's manifest, entries and sheets.
    Inspect {
        /// Archive to inspect.
        archive: PathBuf,

        /// Also write every sheet as CSV into this directory.
        #[arg(long)]
        csv_dir: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref(), cli.user.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e:#}");
            return ExitCode::FAILURE;
        },
    };

    if let Err(e) = observability::init_from_settings(&config.logging, cli.verbose) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
fn run_command(command: Commands, config: &LabsheetConfig) -> anyhow::Result<()> {
    match command {
        Commands::Export { site, output } => cmd_export(config, site, output),

        Commands::Import {
            site,
            input,
            schema,
            title,
            language,
        } => cmd_import(config, site, input, schema, title, language),

        Commands::Inspect { archive, csv_dir } => cmd_inspect(config, archive, csv_dir),
    }
}

/// Loads configuration from `path`, or from the default location.
fn load_config(path: Option<&str>, user: Option<&str>) -> anyhow::Result<LabsheetConfig> {
    let config = match path {
        Some(path) => LabsheetConfig::load_from_file(Path::new(path))
            .with_context(|| format!("invalid config file {path}"))?,
        None => LabsheetConfig::load_default(),
    };
    Ok(match user {
        Some(user) => config.with_actor(user),
        None => config,
    })
}
