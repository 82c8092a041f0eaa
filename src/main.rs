//! shiftwatch - Shift-Based Machine State Accounting
//!
//! Monitors machine tools, classifies their PMC signals into operating
//! states and accounts time-in-state per Day/Night production shift.
//!
//! # Usage
//!
//! ```bash
//! # Monitor the configured equipment (simulated signals)
//! shiftwatch run
//!
//! # Cycle-time report for one shift
//! shiftwatch report --equipment 10.0.0.1 --date 2024-05-10 --shift day
//!
//! # Stored accumulations for the current shift
//! shiftwatch status
//! ```
//!
//! # Environment Variables
//!
//! - `SHIFTWATCH_CONFIG`: Path to the plant TOML config
//! - `RUST_LOG`: Logging level (default: info)

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use shiftwatch::acquisition::SimulatedPlant;
use shiftwatch::config::{self, PlantConfig};
use shiftwatch::pipeline::{MonitorEvent, Supervisor};
use shiftwatch::shift::{Clock, ShiftClock, SystemClock};
use shiftwatch::storage::{PersistenceGateway, SledGateway};
use shiftwatch::types::ShiftType;
use shiftwatch::CycleReportGenerator;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "shiftwatch")]
#[command(about = "Shift-based machine state accounting")]
#[command(version)]
struct CliArgs {
    /// Plant config file (overrides $SHIFTWATCH_CONFIG and ./shiftwatch.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Option<SubCommand>,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Monitor all configured equipment until Ctrl+C (default)
    Run {
        /// Seed for the simulated signal source
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Print the cycle-time report for one equipment and shift
    Report {
        #[arg(long)]
        equipment: String,
        /// Shift date (YYYY-MM-DD); defaults to the current shift's date
        #[arg(long)]
        date: Option<NaiveDate>,
        /// day | night; defaults to the current shift
        #[arg(long)]
        shift: Option<String>,
    },
    /// Print stored accumulations for the current shift
    Status,
}

// ============================================================================
// Commands
// ============================================================================

async fn run_monitor(plant: &PlantConfig, seed: Option<u64>) -> Result<()> {
    std::fs::create_dir_all(&plant.storage.data_dir).with_context(|| {
        format!("Failed to create data dir {}", plant.storage.data_dir.display())
    })?;
    let gateway: Arc<dyn PersistenceGateway> =
        Arc::new(SledGateway::open(plant.db_path()).context("Failed to open shift store")?);

    let sim = Arc::new(SimulatedPlant::new(
        plant
            .equipment
            .iter()
            .map(|e| (e.id.clone(), e.loading_m_code)),
        seed,
    ));

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    let (events_tx, events_rx) = mpsc::channel(plant.monitor.event_channel_capacity);
    let event_logger = tokio::spawn(log_events(events_rx));

    let mut supervisor = Supervisor::new(
        sim.clone(),
        sim,
        Arc::clone(&gateway),
        Arc::new(SystemClock),
        events_tx,
        cancel_token.clone(),
    )
    .with_monitor_config(&plant.monitor);

    for equipment in &plant.equipment {
        if let Err(e) = supervisor.add_equipment(equipment) {
            error!(equipment = %equipment.id, error = %e, "Failed to add equipment");
        }
    }

    let exits = supervisor.run().await;
    let unflushed: Vec<&str> = exits
        .iter()
        .filter(|e| !e.flushed)
        .map(|e| e.equipment_id.as_str())
        .collect();
    if !unflushed.is_empty() {
        warn!(equipment = ?unflushed, "Some accumulations were not flushed on shutdown");
    }

    // Senders were dropped with the monitors; the logger drains and exits
    event_logger.await.ok();
    Ok(())
}

async fn log_events(mut rx: mpsc::Receiver<MonitorEvent>) {
    while let Some(event) = rx.recv().await {
        match &event {
            MonitorEvent::StateChanged {
                equipment_id,
                from,
                to,
                elapsed_secs,
                production_count,
                ..
            } => info!(
                equipment = %equipment_id,
                from = %from,
                to = %to,
                elapsed_secs = %format!("{elapsed_secs:.1}"),
                production = production_count,
                "State changed"
            ),
            MonitorEvent::ShiftRolled {
                equipment_id,
                closed,
                opened_shift,
                ..
            } => info!(
                equipment = %equipment_id,
                closed_shift = %closed.shift_type,
                operation_rate = %format!("{:.1}%", closed.operation_rate() * 100.0),
                production = closed.production_count,
                opened_shift = %opened_shift,
                "Shift rolled over"
            ),
            MonitorEvent::TickSkipped { .. } => {}
        }
    }
}

fn print_report(
    plant: &PlantConfig,
    equipment: &str,
    date: Option<NaiveDate>,
    shift: Option<String>,
) -> Result<()> {
    let current = ShiftClock::current_window(SystemClock.now());
    let shift_type = match shift {
        Some(s) => ShiftType::parse(&s)
            .ok_or_else(|| anyhow::anyhow!("Invalid shift '{}', expected day or night", s))?,
        None => current.shift_type,
    };
    let date = date.unwrap_or_else(|| current.shift_date());

    let gateway = SledGateway::open(plant.db_path()).context("Failed to open shift store")?;
    let report = CycleReportGenerator::for_shift(&gateway, equipment, date, shift_type)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn print_status(plant: &PlantConfig) -> Result<()> {
    let window = ShiftClock::current_window(SystemClock.now());
    let gateway = SledGateway::open(plant.db_path()).context("Failed to open shift store")?;
    let accumulations = gateway.list_accumulations(window.shift_date(), window.shift_type)?;

    println!(
        "{} shift {} ({} - {})",
        window.shift_type,
        window.shift_date(),
        window.start.format("%H:%M"),
        window.end.format("%H:%M")
    );
    if accumulations.is_empty() {
        println!("  no accumulations stored");
    }
    for acc in accumulations {
        println!(
            "  {:<16} run {:>7.0}s  load {:>6.0}s  alarm {:>6.0}s  idle {:>7.0}s  unmeasured {:>6.0}s  parts {:>4}  rate {:>5.1}%",
            acc.equipment_id,
            acc.running_seconds,
            acc.loading_seconds,
            acc.alarm_seconds,
            acc.idle_seconds,
            acc.unmeasured_seconds,
            acc.production_count,
            acc.operation_rate() * 100.0
        );
    }
    Ok(())
}

// ============================================================================
// Entry Point
// ============================================================================

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.json);

    let plant = match &args.config {
        Some(path) => PlantConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PlantConfig::load(),
    };
    config::init(plant);
    let plant = config::get();

    match args.command.unwrap_or(SubCommand::Run { seed: None }) {
        SubCommand::Run { seed } => {
            info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
            info!("  shiftwatch - plant {}", plant.plant.name);
            info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
            info!(
                equipment = plant.equipment.len(),
                tick_ms = plant.monitor.tick_interval_ms,
                store = %plant.db_path().display(),
                "Starting monitors"
            );
            run_monitor(plant, seed).await?;
            info!("✓ shiftwatch shutdown complete");
        }
        SubCommand::Report {
            equipment,
            date,
            shift,
        } => print_report(plant, &equipment, date, shift)?,
        SubCommand::Status => print_status(plant)?,
    }

    Ok(())
}
