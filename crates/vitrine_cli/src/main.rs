//! Vitrine CLI
//!
//! Drive the scroll timeline and background timer headlessly.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use vitrine_platform::SystemClock;

mod config;
mod countdown;
mod scroll;

use config::VitrineConfig;
use countdown::CountdownPlan;
use scroll::Sweep;

#[derive(Parser)]
#[command(name = "vitrine")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Vitrine scroll timeline and background timer", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file
    #[arg(short, long, global = true, default_value = "vitrine.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scroll through the configured story, frame by frame
    Scroll {
        /// Offset change per frame
        #[arg(short, long, default_value = "40")]
        step: f64,

        /// Frame duration in milliseconds
        #[arg(short, long, default_value = "16")]
        frame_ms: u64,

        /// Scroll back to the top after reaching the end
        #[arg(short, long)]
        bounce: bool,
    },

    /// Run a background countdown
    Countdown {
        /// Seconds to count down from
        #[arg(default_value = "10")]
        seconds: i64,

        /// Timer id, used to namespace persisted state
        #[arg(long, default_value = "countdown")]
        id: String,

        /// Resume a previously saved run with the same id
        #[arg(short, long)]
        persist: bool,

        /// Send the app to the background after this many seconds
        #[arg(long)]
        suspend_after: Option<u64>,

        /// Seconds to stay in the background
        #[arg(long, default_value = "5")]
        suspend_for: u64,

        /// Freeze timers while backgrounded, as Android does
        #[arg(long)]
        freeze: bool,
    },

    /// Write a default vitrine.toml
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Scroll {
            step,
            frame_ms,
            bounce,
        } => cmd_scroll(
            &cli.config,
            Sweep {
                step,
                frame: Duration::from_millis(frame_ms),
                bounce,
            },
        ),

        Commands::Countdown {
            seconds,
            id,
            persist,
            suspend_after,
            suspend_for,
            freeze,
        } => cmd_countdown(
            &cli.config,
            CountdownPlan {
                id,
                seconds,
                persist,
                suspend_after: suspend_after.map(Duration::from_secs),
                suspend_for: Duration::from_secs(suspend_for),
                freeze,
                ..CountdownPlan::default()
            },
        ),

        Commands::Init { force } => cmd_init(&cli.config, force),
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("Failed to start the async runtime")
}

fn cmd_scroll(config_path: &Path, sweep: Sweep) -> Result<()> {
    let config = VitrineConfig::load_or_default(config_path)?;
    info!(
        "Scrolling {} regions over {} viewport heights",
        config.timeline.regions.len(),
        config.timeline.length
    );

    let reports = runtime()?.block_on(scroll::run_scroll(&config.timeline, sweep))?;

    for report in reports {
        info!(
            "{:<12} entered {}x, exited {}x{}",
            report.name,
            report.entries,
            report.exits,
            if report.rendering { ", still on screen" } else { "" }
        );
    }
    Ok(())
}

fn cmd_countdown(config_path: &Path, plan: CountdownPlan) -> Result<()> {
    let config = VitrineConfig::load_or_default(config_path)?;
    let storage = countdown::open_storage(&config.timer)?;

    let values = runtime()?.block_on(countdown::run_countdown(
        &config.timer,
        &plan,
        storage,
        Arc::new(SystemClock),
    ))?;

    info!("Reported {} values", values.len());
    Ok(())
}

fn cmd_init(config_path: &Path, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        anyhow::bail!(
            "{} already exists. Use --force to overwrite it.",
            config_path.display()
        );
    }

    let content = VitrineConfig::default().to_toml()?;
    fs::write(config_path, content)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    info!("Wrote {}", config_path.display());
    Ok(())
}
