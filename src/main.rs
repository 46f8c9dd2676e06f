#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::doc_markdown,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::needless_pass_by_value,
    clippy::uninlined_format_args
)]

use anyhow::Result;
use clap::{Parser, Subcommand};
use flightdb::commands;
use flightdb::{Config, FlightStore};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

/// `flightdb` - per-session SQL storage for flight telemetry.
#[derive(Parser, Debug)]
#[command(name = "flightdb")]
#[command(version)]
#[command(about = "Store, query and repair flight telemetry sessions.", long_about = None)]
struct Cli {
    /// Path to the TOML config file (defaults apply when it is missing)
    #[arg(long, global = true, default_value = "flightdb.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest a JSON payload of `{message: {field: [values...]}}`
    Store {
        /// Session id
        session: String,
        /// Payload file
        payload: PathBuf,
    },
    /// Run a SQL statement against a session
    Query {
        /// Session id
        session: String,
        /// Statement, run verbatim
        sql: String,
    },
    /// Show tables, columns and descriptions of a session
    Schema {
        /// Session id
        session: String,
    },
    /// Repair column type drift in every table of a session
    Reconcile {
        /// Session id
        session: String,
    },
    /// List sessions stored under the base directory
    Sessions,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the JSON result.
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Config::load(&cli.config)?;
    let db = FlightStore::from_config(&config);

    let output = match &cli.command {
        Commands::Store { session, payload } => commands::store(&db, session, payload)?,
        Commands::Query { session, sql } => commands::query(&db, session, sql)?,
        Commands::Schema { session } => commands::schema(&db, session)?,
        Commands::Reconcile { session } => commands::reconcile(&db, session)?,
        Commands::Sessions => commands::sessions(&db),
    };
    db.close_all();

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
