//! Deedlock CLI
//!
//! Drives a property sale through an in-memory escrow node.

mod commands;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "deedlock")]
#[command(version)]
#[command(about = "Deedlock - Tokenized real-estate escrow", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full sale walkthrough: list, deposit, inspect, approve, settle
    Simulate(commands::simulate::SimulateArgs),

    /// Print the effective node configuration
    Config(commands::config::ConfigArgs),
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Simulate(args) => commands::simulate::run(args).await,
        Commands::Config(args) => commands::config::run(args),
    };

    if let Err(err) = result {
        output::error(&format!("{:#}", err));
        std::process::exit(1);
    }
}
