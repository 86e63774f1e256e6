// Commission audit CLI - batch classification of sales spreadsheets

mod audit;
mod exit_codes;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use exit_codes::EXIT_SUCCESS;

#[derive(Parser)]
#[command(name = "comaudit")]
#[command(about = "Audit declared sales commissions against a rule catalog and offer history")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an audit from a TOML config file
    #[command(after_help = "\
Examples:
  comaudit run audit.toml
  comaudit run audit.toml --json
  comaudit run audit.toml --output result.json --workbook result.xlsx
  comaudit run audit.toml -q")]
    Run {
        /// Path to the audit .toml config file
        config: PathBuf,

        /// Output JSON to stdout instead of human summary
        #[arg(long)]
        json: bool,

        /// Write JSON output to file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Write the reviewer workbook (one sheet per bucket) to file
        #[arg(long)]
        workbook: Option<PathBuf>,

        /// Suppress progress output on stderr
        #[arg(long, short = 'q')]
        quiet: bool,
    },

    /// Validate an audit config without running
    #[command(after_help = "\
Examples:
  comaudit validate audit.toml")]
    Validate {
        /// Path to the audit .toml config file
        config: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            config,
            json,
            output,
            workbook,
            quiet,
        } => audit::cmd_run(config, json, output, workbook, quiet),
        Commands::Validate { config } => audit::cmd_validate(config),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}
