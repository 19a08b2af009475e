//! # Bumblebee Transfer
//!
//! Runs a transfer protocol on the deck described by `--deck`. Ctrl-C raises
//! the abort signal: running transfers lift their tips to Z safe and release
//! their stages, blocked waits are cancelled. Unrecoverable move errors are
//! put to the operator on the console unless `--auto-retry` is given.

use bee_common::config::ConfigLoader;
use bee_common::consts::DEFAULT_DECK_PATH;
use bee_common::deck::DeckConfig;
use bee_hal::{Deck, DriverRegistry};
use bee_transfer::escalation::{AutoRetry, ConsoleEscalation, ErrorEscalation};
use bee_transfer::{
    AbortSignal, ResourceArbiter, Scheduler, SimulatedPlateHandler, TransferContext, load_protocol,
};
use clap::Parser;
use std::path::PathBuf;
use std::process;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Bumblebee dual-tip transfer runner
#[derive(Parser, Debug)]
#[command(name = "bee_transfer")]
#[command(version)]
#[command(about = "Run a liquid transfer protocol on the Bumblebee deck")]
struct Args {
    /// Deck configuration TOML.
    #[arg(long, default_value = DEFAULT_DECK_PATH)]
    deck: PathBuf,

    /// Protocol TOML (labware, liquid profiles, plates, transfers).
    #[arg(long)]
    protocol: PathBuf,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,

    /// Retry every escalated error instead of prompting.
    #[arg(long)]
    auto_retry: bool,
}

fn main() {
    let args = Args::parse();
    setup_tracing(&args);

    info!("Bumblebee transfer v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&args) {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("Bumblebee transfer finished");
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let deck_config = DeckConfig::load(&args.deck)?;
    let protocol = load_protocol(&args.protocol)?;

    let deck = Deck::from_config(&deck_config, &DriverRegistry::with_builtin())?;

    let abort = AbortSignal::new();
    let on_interrupt = abort.clone();
    ctrlc::set_handler(move || {
        warn!("Received interrupt, aborting run");
        on_interrupt.abort();
    })?;

    let arbiter = ResourceArbiter::for_deck(&deck, abort);
    let escalation: Box<dyn ErrorEscalation> = if args.auto_retry {
        Box::new(AutoRetry::new())
    } else {
        Box::new(ConsoleEscalation::stdio())
    };
    let plate_handler = SimulatedPlateHandler::new();
    let ctx = TransferContext {
        deck: &deck,
        arbiter: &arbiter,
        labware: &protocol.catalog,
        profiles: &protocol.catalog,
        escalation: escalation.as_ref(),
    };

    let report = Scheduler::new(ctx, &plate_handler, &protocol).run()?;

    info!(
        "{} transfers in {} runs ({} dual)",
        report.transfers_done(),
        report.assignments.len(),
        report.assignments.iter().filter(|a| a.is_dual()).count()
    );
    for plate in &report.destination_plates {
        info!(
            "Destination {}: {} well events",
            plate.plate(),
            plate.history().len()
        );
    }
    Ok(())
}

fn setup_tracing(args: &Args) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
