use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "nsw")]
#[command(about = "Naver shop watch: sync product snapshots and serve the board")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one sync pass and write the snapshot.
    Sync,
    /// Run forever, syncing at local midnight and every 24 hours after.
    Daily,
    /// Serve the product board.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Sync) {
        Commands::Sync => {
            let summary = nsw_sync::run_once_from_env().await?;
            println!(
                "sync complete: run_id={} outcome={:?} items={} pages={} total={}",
                summary.run_id,
                summary.outcome,
                summary.collected,
                summary.pages_fetched,
                summary.reported_total
            );
        }
        Commands::Daily => {
            nsw_sync::run_daily_from_env().await?;
        }
        Commands::Serve => {
            nsw_web::serve_from_env().await?;
        }
    }

    Ok(())
}
