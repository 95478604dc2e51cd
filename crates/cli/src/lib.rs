pub mod commands;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use pulsedesk_core::config::{AppConfig, LoadOptions, LogFormat};

#[derive(Debug, Parser)]
#[command(
    name = "pulsedesk",
    about = "PulseDesk operator CLI",
    long_about = "Operate PulseDesk migrations, demo data, readiness checks, digests, and tenant provider credentials.",
    after_help = "Examples:\n  pulsedesk doctor --json\n  pulsedesk digest --tenant agency-01\n  pulsedesk credential set --tenant agency-01 --provider anthropic --model claude-sonnet --api-key sk-..."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load deterministic demo spend data for a tenant")]
    Seed {
        #[arg(long, default_value = "agency-demo", help = "Tenant to seed demo data for")]
        tenant: String,
    },
    #[command(about = "Validate config, vault master key, and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Build and persist the daily digest for a tenant")]
    Digest {
        #[arg(long, help = "Tenant to build the digest for")]
        tenant: String,
    },
    #[command(subcommand, about = "Manage a tenant's model provider credential")]
    Credential(CredentialCommand),
}

#[derive(Debug, Subcommand)]
pub enum CredentialCommand {
    #[command(about = "Encrypt and store a provider API key for a tenant")]
    Set {
        #[arg(long)]
        tenant: String,
        #[arg(long, help = "Provider family: openai, anthropic, or gemini")]
        provider: String,
        #[arg(long, help = "Model handle to use with this credential")]
        model: String,
        #[arg(long, help = "Plaintext API key; stored encrypted, never logged")]
        api_key: String,
    },
    #[command(about = "Probe the stored credential against its provider and record the result")]
    Validate {
        #[arg(long)]
        tenant: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed { tenant } => commands::seed::run(&tenant),
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Digest { tenant } => commands::digest::run(&tenant),
        Command::Credential(command) => commands::credential::run(command),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Command output goes to stdout as JSON; diagnostics go to stderr through
/// tracing. A config that fails to load falls back to compact info logging
/// so the command itself can still report the config error.
fn init_logging() {
    use tracing::Level;

    let logging = AppConfig::load(LoadOptions::default())
        .map(|config| config.logging)
        .unwrap_or_else(|_| pulsedesk_core::config::LoggingConfig {
            level: "info".to_string(),
            format: LogFormat::Compact,
        });
    let level = logging.level.parse::<Level>().unwrap_or(Level::INFO);

    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .with_writer(std::io::stderr);
    // try_init: a subscriber may already be installed when running under test.
    let _ = match logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
