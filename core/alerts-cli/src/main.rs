//! smn-alerts: command-line client for the SMN alerts daemon.
//!
//! Reads the daemon's state and writes user settings through its socket.
//!
//! ## Subcommands
//!
//! - `status`: Current settings and the alerts for the selected province
//! - `activate` / `deactivate`: Turn polling on or off
//! - `province`: Select or clear the province of interest
//! - `delay`: Change the polling interval
//! - `watch`: Reprint the status on every daemon update
//! - `health`: Daemon liveness and version

mod daemon_client;
mod logging;
mod output;

use chrono::Local;
use clap::{Parser, Subcommand};
use daemon_client::{ClientError, DaemonClient};
use smn_alerts_protocol::{SetParams, MIN_DELAY_MS};

#[derive(Parser)]
#[command(name = "smn-alerts")]
#[command(about = "SMN weather alerts client")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show settings and matching alerts
    Status,

    /// Resume polling the alert feed
    Activate,

    /// Stop polling the alert feed
    Deactivate,

    /// Select the province to watch
    Province {
        /// Province name, matched case-insensitively against alert zones
        #[arg(value_name = "NAME", required_unless_present = "clear")]
        name: Option<String>,

        /// Clear the current selection
        #[arg(long, conflicts_with = "name")]
        clear: bool,
    },

    /// Set the polling interval
    Delay {
        /// Minutes between feed fetches
        #[arg(value_name = "MINUTES", value_parser = clap::value_parser!(u64).range(1..))]
        minutes: u64,
    },

    /// Print the status again every time the daemon publishes an update
    Watch,

    /// Check that the daemon is running
    Health,
}

fn main() {
    let _logging_guard = logging::init();
    let cli = Cli::parse();

    if let Err(err) = run(cli.command) {
        tracing::error!(error = %err, "smn-alerts command failed");
        eprintln!("smn-alerts: {}", err);
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<(), ClientError> {
    let client = DaemonClient::from_env()?;
    tracing::debug!(socket = %client.socket().display(), "Using daemon socket");

    match command {
        Commands::Status => {
            println!("{}", output::format_summary(&client.state()?));
        }
        Commands::Activate => write_settings(&client, active_params(true))?,
        Commands::Deactivate => write_settings(&client, active_params(false))?,
        Commands::Province { name, clear } => {
            // The daemon treats a blank province as "no selection".
            let province = if clear { String::new() } else { name.unwrap_or_default() };
            write_settings(
                &client,
                SetParams {
                    selected_province: Some(province),
                    ..SetParams::default()
                },
            )?;
        }
        Commands::Delay { minutes } => {
            let delay = minutes.saturating_mul(60_000).max(MIN_DELAY_MS);
            write_settings(
                &client,
                SetParams {
                    delay: Some(delay),
                    ..SetParams::default()
                },
            )?;
        }
        Commands::Watch => watch(&client)?,
        Commands::Health => {
            let health = client.health()?;
            println!("{}", serde_json::to_string_pretty(&health)?);
        }
    }

    Ok(())
}

fn active_params(active: bool) -> SetParams {
    SetParams {
        active: Some(active),
        ..SetParams::default()
    }
}

fn write_settings(client: &DaemonClient, params: SetParams) -> Result<(), ClientError> {
    tracing::info!(params = ?params, "Updating daemon settings");
    let snapshot = client.set(params)?;
    println!("{}", output::format_summary(&snapshot));
    Ok(())
}

fn watch(client: &DaemonClient) -> Result<(), ClientError> {
    let subscription = client.subscribe()?;
    println!("{}\n", output::format_update(&client.state()?, Local::now()));

    for snapshot in subscription {
        println!("{}\n", output::format_update(&snapshot?, Local::now()));
    }

    tracing::info!("Daemon closed the subscription");
    Ok(())
}
