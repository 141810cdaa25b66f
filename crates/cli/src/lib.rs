pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use landlord_core::config::{AppConfig, LoadOptions};

use crate::commands::screen::ScreenArgs;

#[derive(Debug, Parser)]
#[command(
    name = "landlord",
    about = "Landlord assistant operator CLI",
    long_about = "Inspect configuration, check model artefacts, screen applicants offline, and \
                  chat with the assistant from a terminal.",
    after_help = "Examples:\n  landlord doctor --json\n  landlord config\n  landlord screen \
                  --credit-score 720 --income 4000 --rent 1200 --employment-status employed\n  \
                  landlord chat --state session.json \"I want to estimate rent\""
)]
pub struct Cli {
    #[arg(long, global = true, help = "Config file to load instead of landlord.toml")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, completion credentials, and model artefacts")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Screen a tenant applicant with the deterministic rule engine")]
    Screen(ScreenCommand),
    #[command(about = "Send one message, keeping the session in a JSON state file")]
    Chat {
        #[arg(long, help = "Session file; created when missing")]
        state: PathBuf,
        #[arg(help = "The message to send")]
        message: String,
    },
}

#[derive(Debug, Args)]
struct ScreenCommand {
    #[arg(long)]
    credit_score: i64,
    #[arg(long, help = "Monthly income")]
    income: f64,
    #[arg(long, help = "Monthly rent")]
    rent: f64,
    #[arg(long)]
    employment_status: String,
    #[arg(long, help = "The applicant has a prior eviction")]
    eviction: bool,
}

impl From<ScreenCommand> for ScreenArgs {
    fn from(command: ScreenCommand) -> Self {
        Self {
            credit_score: command.credit_score,
            income: command.income,
            rent: command.rent,
            employment_status: command.employment_status,
            eviction_record: command.eviction,
        }
    }
}

fn load_options(config: Option<PathBuf>) -> LoadOptions {
    let require_file = config.is_some();
    LoadOptions { config_path: config, require_file, ..LoadOptions::default() }
}

/// Logs go to stderr so stdout stays a single JSON document. `RUST_LOG` wins over the
/// configured level.
fn init_logging(options: &LoadOptions) {
    use landlord_core::config::LogFormat::*;
    use tracing_subscriber::EnvFilter;

    let Ok(config) = AppConfig::load(options.clone()) else {
        return;
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let _ = match config.logging.format {
        Compact => builder.compact().try_init(),
        Pretty => builder.pretty().try_init(),
        Json => builder.json().try_init(),
    };
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = load_options(cli.config);
    init_logging(&options);

    let (exit_code, output) = match cli.command {
        Command::Config => (0, commands::config::run(options)),
        Command::Doctor { json } => {
            let (passed, output) = commands::doctor::run(options, json);
            (if passed { 0 } else { 1 }, output)
        }
        Command::Screen(command) => {
            let result = commands::screen::run(&ScreenArgs::from(command));
            (result.exit_code, result.output)
        }
        Command::Chat { state, message } => {
            let result = commands::chat::run(options, &state, &message);
            (result.exit_code, result.output)
        }
    };

    println!("{output}");
    ExitCode::from(exit_code)
}
