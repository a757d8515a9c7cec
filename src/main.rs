mod config;
mod mailer;
mod models;
mod pipeline;
mod report;
mod scheduler;
mod scraper;
mod storage;
mod utils;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::AppConfig;
use crate::pipeline::Pipeline;
use crate::scheduler::Scheduler;

#[derive(Parser)]
#[command(
    name = "findata",
    about = "Daily FX central parity and SGE gold/silver price collector",
    version
)]
struct Cli {
    /// Run the task once and exit instead of staying on the daily schedule
    #[arg(long)]
    once: bool,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "findata=info,warn",
        1 => "findata=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load()?;
    let pipeline = Pipeline::from_config(&config)?;

    info!("Program started, first task running");
    pipeline.run_once().await;

    if cli.once {
        return Ok(());
    }

    let mut scheduler = Scheduler::new(&config.schedule, Utc::now())?;
    let pipeline = &pipeline;
    scheduler.run_forever(move || pipeline.run_once()).await;

    Ok(())
}
