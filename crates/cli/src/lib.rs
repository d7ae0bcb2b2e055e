pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use commands::sweep::SweepOptions;

#[derive(Debug, Parser)]
#[command(
    name = "tender",
    about = "Tender operator CLI",
    long_about = "Operate the quotation engine: migrations, config inspection, deadline sweeps, and readiness checks.",
    after_help = "Examples:\n  tender migrate --status\n  tender config\n  tender sweep --watch --interval-secs 30\n  tender doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate {
        #[arg(long, help = "Report applied and pending versions without applying anything")]
        status: bool,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Close every open quotation whose deadline has passed")]
    Sweep {
        #[arg(long, help = "Keep sweeping until interrupted")]
        watch: bool,
        #[arg(long, help = "Seconds between sweeps in watch mode (default: lifecycle.sweep_interval_secs)")]
        interval_secs: Option<u64>,
        #[arg(long, default_value_t = 100, help = "Queued chat messages to relay per sweep")]
        relay_limit: u32,
    },
    #[command(about = "Validate config, database connectivity, migrations, and messaging readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate { status } => commands::migrate::run(status),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Sweep { watch, interval_secs, relay_limit } => {
            commands::sweep::run(SweepOptions { watch, interval_secs, relay_limit })
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
