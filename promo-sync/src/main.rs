use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;

use promo_sync::model::Campaign;
use promo_sync::{Config, Extractor, Loader};

/// Rebuild the promo workflow tables from the planning spreadsheet
#[derive(Parser, Debug)]
#[command(name = "promo-sync", version, about)]
struct Cli {
    /// Configuration file (defaults to $PROMO_SYNC_CONFIG or the user config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Download and parse the spreadsheet, print the campaigns, skip the database
    #[arg(long)]
    extract_only: bool,

    /// Create the tables if they are missing before loading
    #[arg(long, conflicts_with = "extract_only")]
    init_schema: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    // Fixed once so extraction and reconciliation agree on what "past" means
    let today = chrono::Local::now().date_naive();
    log::info!("Starting promo sync for {}", today);

    let extractor = Extractor::with_rclone(&config);

    if cli.extract_only {
        let extraction = extractor
            .fetch(today)
            .await
            .context("Failed to extract campaigns")?;
        print_preview(&extraction.campaigns);
        println!(
            "{} campaigns extracted, {} rows dropped",
            extraction.campaigns.len().to_string().bright_green(),
            extraction.dropped_rows.to_string().yellow()
        );
        return Ok(());
    }

    let loader = Loader::connect(&config)
        .await
        .context("Failed to connect to database")?;
    if cli.init_schema {
        loader.ensure_schema().await.context("Failed to create tables")?;
    }

    let summary = promo_sync::run(&extractor, &loader, today)
        .await
        .context("Promo sync failed")?;

    println!("{}", "Promo sync complete".bright_green().bold());
    println!("  campaigns:  {}", summary.load.campaigns);
    println!("  steps:      {}", summary.load.steps);
    println!("  sub-steps:  {}", summary.load.sub_steps);
    println!("  completed:  {}", summary.load.completed_campaigns);
    if summary.extraction.dropped_rows > 0 {
        println!(
            "  {} {} rows with unreadable dates",
            "dropped:".yellow(),
            summary.extraction.dropped_rows
        );
    }

    Ok(())
}

fn print_preview(campaigns: &[Campaign]) {
    println!(
        "{:<12} {:<10} {:<10} {:<10} {:<10} {}",
        "code".bold(),
        "start".bold(),
        "end".bold(),
        "clearance".bold(),
        "status".bold(),
        "title".bold()
    );
    for campaign in campaigns.iter().take(10) {
        println!(
            "{:<12} {:<10} {:<10} {:<10} {:<10} {}",
            campaign.code,
            campaign.start_date.to_string(),
            campaign.end_date.to_string(),
            campaign.clearance_date.to_string(),
            campaign.status.to_string(),
            campaign.title
        );
    }
    if campaigns.len() > 10 {
        println!("{}", format!("... {} more", campaigns.len() - 10).dimmed());
    }
}
