use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use trigger_gateway::admin::{self, TriggerAction};
use trigger_gateway::config::{DEFAULT_PORT, DatabaseLocation, Mode};
use trigger_gateway::db::{self, TriggerRepo};
use trigger_gateway::{Config, Daemon};

/// Trigger gateway - canned Telegram replies for exact trigger phrases
#[derive(Parser)]
#[command(name = "trigger-gateway", version, about)]
struct Cli {
    /// Ingress mode
    #[arg(long, env = "GATEWAY_MODE", value_enum, default_value_t = Mode::Polling)]
    mode: Mode,

    /// Port for the webhook and health endpoints
    #[arg(long, env = "GATEWAY_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Manage stored triggers
    Triggers {
        /// Trigger database
        #[arg(long, env = "DATABASE_URL")]
        database: String,

        #[command(subcommand)]
        action: TriggerAction,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity; RUST_LOG wins when set
    let filter = match cli.verbose {
        0 => "info,trigger_gateway=info",
        1 => "info,trigger_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(Command::Triggers { database, action }) = cli.command {
        return manage_triggers(&database, action);
    }

    let config = Config::from_env(cli.mode, cli.port)?;
    tracing::info!(mode = ?config.mode, port = config.port, "starting trigger gateway");

    let daemon = Daemon::new(config)?;
    daemon.run().await?;

    Ok(())
}

fn manage_triggers(database: &str, action: TriggerAction) -> anyhow::Result<()> {
    let location = DatabaseLocation::parse(database)?;
    let repo = TriggerRepo::new(db::open(&location)?);
    admin::manage_triggers(&repo, action, &mut std::io::stdout().lock())?;
    Ok(())
}
