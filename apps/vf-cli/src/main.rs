//! # vf-cli
//!
//! Command-line interface for variant-forge.
//!
//! - `vf serve` — run the HTTP generation endpoint
//! - `vf generate` — run every generator once against a local spreadsheet
//!   and write the resulting zip
//! - `vf check` — validate config, generator scripts and interpreters

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use vf_daemon::{ConfigOverrides, DaemonConfig, DEFAULT_CONFIG_FILE};

/// variant-forge CLI — generate spreadsheet variants.
#[derive(Parser)]
#[command(name = "vf", version, about)]
struct Cli {
    /// Config file (defaults apply when it does not exist).
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Directory holding the generator scripts.
    #[arg(long, global = true)]
    scripts_dir: Option<PathBuf>,

    /// Parent directory for per-request workspaces.
    #[arg(long, global = true)]
    work_root: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    Serve {
        /// Listen address, e.g. 0.0.0.0:8787.
        #[arg(long)]
        bind: Option<String>,
    },
    /// Run all generators once and write the archive to a file.
    Generate {
        /// Base spreadsheet (defaults to the configured default base file).
        #[arg(long, short)]
        input: Option<PathBuf>,
        /// Where to write the zip.
        #[arg(long, short)]
        output: PathBuf,
    },
    /// Report configuration and generator problems.
    Check,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    vf_daemon::logging::init(cli.log_json)?;

    let mut config = DaemonConfig::load_or_default(&cli.config)?;
    let bind = match &cli.command {
        Commands::Serve { bind } => bind.clone(),
        _ => None,
    };
    config.apply(ConfigOverrides {
        bind,
        scripts_dir: cli.scripts_dir,
        work_root: cli.work_root,
    });

    match cli.command {
        Commands::Serve { .. } => commands::serve::execute(config),
        Commands::Generate { input, output } => {
            commands::generate::execute(config, input.as_deref(), &output)
        }
        Commands::Check => commands::check::execute(&config),
    }
}
