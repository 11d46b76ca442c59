//! # docmig CLI entry point
//!
//! Parses command-line arguments, initialises logging, and dispatches to the
//! subcommand handlers. Logs go to stderr; stdout carries only the report.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use docmig_cli::encode::{run_encode, EncodeArgs};
use docmig_cli::migrate::{run_migrate, MigrateArgs};

/// One-way migration of MongoDB exports into Firestore.
///
/// Each record becomes a Firestore document keyed by a natural key, so
/// re-running the same export skips what is already there.
#[derive(Parser, Debug)]
#[command(name = "docmig", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    /// Ignored when RUST_LOG is set.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Migrate an export file into a Firestore collection.
    Migrate(MigrateArgs),

    /// Print the Firestore fields payload for each record, without writing.
    Encode(EncodeArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    tracing::debug!("docmig {} starting", env!("CARGO_PKG_VERSION"));

    let result = match cli.command {
        Commands::Migrate(args) => run_migrate(&args).await,
        Commands::Encode(args) => run_encode(&args, &mut std::io::stdout().lock()),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(docmig_cli::exit_code(&e))
        }
    }
}

fn init_tracing(verbose: u8, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
