pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "smsdesk",
    about = "smsdesk operator CLI",
    long_about = "Inspect configuration, check integration readiness and scaffold a config file for the SMS support desk.",
    after_help = "Examples:\n  smsdesk init\n  smsdesk config\n  smsdesk doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config and check SMS, text-generation and storefront readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Write a starter smsdesk.toml with owner-only permissions")]
    Init {
        #[arg(long, help = "Destination file (defaults to ./smsdesk.toml)")]
        path: Option<PathBuf>,
        #[arg(long, help = "Overwrite an existing file")]
        force: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => commands::config::run(),
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Init { path, force } => commands::init::run(path, force),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
