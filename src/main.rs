// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! plugwatch - appliance event detector
//!
//! Watches smart-plug power readings, detects appliance usage events and
//! reports them on a shared display and by push notification.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use plugwatch::config::StoreBackend;
use plugwatch::{Config, ProfileSet, VERSION};

/// plugwatch - appliance usage events from smart-plug power readings
#[derive(Parser, Debug)]
#[command(name = "plugwatch")]
#[command(author = "bad-antics")]
#[command(version = VERSION)]
#[command(about = "Detect appliance usage events and report them on a shared display")]
struct Args {
    /// Configuration file path (TOML, or JSON profile file)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace-level logging
    #[arg(long)]
    trace: bool,

    /// Demo mode with simulated plugs
    #[arg(long)]
    demo: bool,

    /// Run a single poll cycle and exit
    #[arg(long)]
    once: bool,

    /// Validate the configuration, print the profiles and exit
    #[arg(long)]
    check_config: bool,

    /// Write a starter configuration to the config path and exit
    #[arg(long)]
    init_config: bool,

    /// Event store backend, overrides the configuration
    #[arg(long, value_enum)]
    store: Option<StoreBackend>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Secrets may live in a .env file next to the service
    let _ = dotenvy::dotenv();

    let config_path = args.config.clone().unwrap_or_else(Config::default_path);
    if args.init_config {
        Config::write_template(&config_path)?;
        println!("Wrote starter configuration to {}", config_path.display());
        return Ok(());
    }

    let mut config = Config::load(&config_path)?;
    if args.demo {
        config.demo_mode = true;
    }

    // Initialize logging
    let log_level = if args.trace {
        Level::TRACE
    } else if args.debug {
        Level::DEBUG
    } else {
        config.log_level.parse().unwrap_or(Level::INFO)
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_file(args.debug)
        .with_line_number(args.debug)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("plugwatch v{} - appliance event detector", VERSION);
    info!("Configuration loaded from {:?}", config_path);
    info!("Demo mode: {}", config.demo_mode);

    let profiles = config.profile_set()?;

    if args.check_config {
        print_profiles(&profiles);
        return Ok(());
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_service(config, profiles, args.store, args.once))
}

fn print_profiles(profiles: &ProfileSet) {
    println!("{} appliance profiles:", profiles.len());
    for (device, profile) in profiles.iter() {
        let max = profile
            .max_duration_seconds
            .map(|m| format!("{}s", m))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<20} {:<16} on>={}W off<{}W min={}s max={} cooldown={}s confirm={}s",
            device,
            profile.event_name,
            profile.threshold_on,
            profile.threshold_off,
            profile.min_duration_seconds,
            max,
            profile.cooldown_seconds,
            profile.cooling_confirmation_seconds
        );
    }
}

/// Wire up the collaborators and poll until Ctrl+C
async fn run_service(
    config: Config,
    profiles: ProfileSet,
    store_override: Option<StoreBackend>,
    once: bool,
) -> Result<()> {
    use plugwatch::core::{Clock, Collaborators, Orchestrator, SystemClock};
    use plugwatch::db::open_store;
    use plugwatch::detection::DetectorRegistry;
    use plugwatch::notify::{build_display, build_push};
    use plugwatch::sensors::{InfluxReadings, ReadingsSource, SimulatedReadings};
    use tokio::sync::broadcast;

    info!("Initializing event detector...");

    let registry = DetectorRegistry::new(&profiles);
    let store = open_store(&config, store_override.unwrap_or(config.store.backend))?;

    let source: Box<dyn ReadingsSource> = if config.demo_mode {
        info!("Using simulated plugs");
        Box::new(SimulatedReadings::new(&profiles))
    } else {
        Box::new(InfluxReadings::new(&config.influx)?)
    };

    let display = build_display(&config.display)?;
    let push = build_push(&config.pushover)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let mut orchestrator = Orchestrator::new(
        &config,
        registry,
        Collaborators {
            source,
            store,
            display,
            push,
            clock,
        },
    );

    if once {
        let report = orchestrator.run_cycle().await?;
        info!("Cycle complete: {:?}", report);
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received, finishing current cycle...");
            let _ = shutdown_tx.send(());
        }
    });

    info!("Event detector running, press Ctrl+C to shutdown");
    orchestrator.run(shutdown_rx).await?;

    info!("plugwatch shutdown complete");
    Ok(())
}
