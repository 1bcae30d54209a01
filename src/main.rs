//! copsim, the Edge COP Simulator.
//!
//! Multi-domain C2 simulation engine. Loads a scenario, initializes the
//! clock, entity store, domain simulators, and transport adapters, then
//! runs the tick loop until the scenario completes or a signal stops it.
//!
//! # Usage
//!
//! ```bash
//! # Run a scenario with the WebSocket and console transports
//! copsim --scenario scenarios/esszone_incursion.yaml --speed 10
//!
//! # Validate a scenario file without running it
//! copsim --scenario scenarios/esszone_incursion.yaml --validate
//! ```
//!
//! # Environment Variables
//!
//! - `WS_AUTH`: gate WebSocket clients behind a JWT (default: false)
//! - `JWT_SECRET` / `JWT_ALGORITHM`: token verification settings
//! - `COOKIE_NAME`: session cookie carrying the token
//! - `COPSIM_GEODATA`: geodata directory (default: geodata/)
//! - `RUST_LOG`: logging level (default: info)

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use copsim::config::AppConfig;
use copsim::core::{EntityStore, SimulationClock};
use copsim::domains::{
    AviationSimulator, DomainProcessor, GroundVehicleSimulator, MaritimeSimulator,
    PersonnelSimulator,
};
use copsim::engine::{SimStatus, SimulationLoop};
use copsim::movement::TerrainIndex;
use copsim::scenario::ScenarioLoader;
use copsim::transport::{
    ConsoleAdapter, CotAdapter, RestAdapter, TransportRegistry, WebSocketAdapter,
};
use copsim::transport::rest::RestConfig;

const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "copsim")]
#[command(about = "Edge COP Simulator: multi-domain C2 simulation engine")]
#[command(version)]
struct CliArgs {
    /// Path to scenario YAML file
    #[arg(short, long)]
    scenario: Option<PathBuf>,

    /// Simulation speed multiplier (1, 2, 5, 10, 60)
    #[arg(long, default_value = "1.0")]
    speed: f64,

    /// WebSocket server port
    #[arg(short, long, default_value = "8765")]
    port: u16,

    /// Ticks per second (wall time)
    #[arg(long, default_value = "1.0")]
    tick_rate: f64,

    /// Comma-separated transports: ws,console,rest,cot
    #[arg(long, default_value = "ws,console")]
    transport: String,

    /// Validate the scenario file and exit
    #[arg(long)]
    validate: bool,

    /// TAK server address for the CoT transport
    #[arg(long, default_value = "localhost:8087")]
    tak_server: String,

    /// Base URL for the REST transport
    #[arg(long, default_value = "http://localhost:9000")]
    rest_url: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = CliArgs::parse();

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(run(args))
}

async fn run(args: CliArgs) -> Result<()> {
    println!("\nEdge COP Simulator v{VERSION}");
    println!("========================================");

    let config = AppConfig::from_env();
    let loader = ScenarioLoader::new(std::path::Path::new(&config.geodata_path));

    // Validation mode: report problems and exit without running.
    if args.validate {
        let path = args
            .scenario
            .as_deref()
            .context("--validate requires --scenario")?;
        let errors = loader.validate(path);
        if errors.is_empty() {
            println!("Scenario OK: {}", path.display());
            return Ok(());
        }
        for error in &errors {
            println!("ERROR: {error}");
        }
        anyhow::bail!("{} validation error(s)", errors.len());
    }

    let scenario = match args.scenario.as_deref() {
        Some(path) => {
            println!("Loading scenario: {}", path.display());
            let state = loader
                .load(path, None)
                .with_context(|| format!("Failed to load scenario {}", path.display()))?;

            let background = state
                .entities
                .values()
                .filter(|e| e.meta_bool("background").unwrap_or(false))
                .count();
            println!(
                "Loaded {} scenario entities, {background} background entities",
                state.entities.len() - background
            );
            println!(
                "Loaded {} events over {:.0} minutes",
                state.events.len(),
                state.duration.num_seconds() as f64 / 60.0
            );
            Some(state)
        }
        None => None,
    };

    let terrain = Arc::new(TerrainIndex::new(loader.geodata().land_mask()));
    let start_time = scenario
        .as_ref()
        .map_or_else(chrono::Utc::now, |s| s.start_time);
    let clock = Arc::new(SimulationClock::new(start_time, args.speed));
    let store = Arc::new(EntityStore::new());
    let status = Arc::new(ArcSwap::from_pointee(SimStatus::initial(
        scenario.as_ref().map_or("none", |s| s.name.as_str()),
        start_time,
    )));
    let (command_tx, command_rx) = mpsc::channel(32);

    // Transport adapters per --transport.
    let transport_names: Vec<&str> = args.transport.split(',').map(str::trim).collect();
    let mut registry = TransportRegistry::new();

    if transport_names.contains(&"console") {
        registry.register(Arc::new(ConsoleAdapter::new(2.0)));
        println!("Console output enabled");
    }
    if transport_names.contains(&"ws") {
        let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
        let ws = WebSocketAdapter::new(
            addr,
            Arc::clone(&store),
            Arc::clone(&clock),
            Arc::clone(&status),
            command_tx.clone(),
            config.ws_auth.clone(),
        );
        if let Some(ref state) = scenario {
            let routes: serde_json::Map<String, serde_json::Value> = state
                .routes()
                .into_iter()
                .map(|(id, points)| {
                    let pts: Vec<serde_json::Value> = points
                        .iter()
                        .map(|(lat, lon, alt)| {
                            serde_json::json!({"lat": lat, "lon": lon, "alt_m": alt})
                        })
                        .collect();
                    (id, serde_json::Value::Array(pts))
                })
                .collect();
            ws.set_route_data(serde_json::Value::Object(routes));
        }
        registry.register(Arc::new(ws));
        println!("WebSocket server on ws://0.0.0.0:{}/ws", args.port);
    }
    if transport_names.contains(&"rest") {
        registry.register(Arc::new(RestAdapter::new(RestConfig {
            base_url: args.rest_url.clone(),
            ..RestConfig::default()
        })));
        println!("REST adapter targeting {}", args.rest_url);
    }
    if transport_names.contains(&"cot") {
        let (host, port) = args
            .tak_server
            .split_once(':')
            .and_then(|(h, p)| p.parse::<u16>().ok().map(|p| (h.to_string(), p)))
            .unwrap_or_else(|| (args.tak_server.clone(), 8087));
        registry.register(Arc::new(CotAdapter::new(host, port, 30)));
        println!("CoT adapter targeting {}", args.tak_server);
    }
    let registry = Arc::new(registry);

    registry.connect_all().await;

    // Cancellation: SIGINT/SIGTERM wake the tick loop at its sleep point.
    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    let Some(scenario) = scenario else {
        info!("No scenario specified, running in standby mode");
        cancel.cancelled().await;
        println!("\nShutting down...");
        registry.disconnect_all().await;
        println!("Simulator stopped");
        return Ok(());
    };

    let processors: Vec<Box<dyn DomainProcessor>> = vec![
        Box::new(MaritimeSimulator::new(Arc::clone(&store))),
        Box::new(AviationSimulator::new(Arc::clone(&store))),
        Box::new(GroundVehicleSimulator::new(Arc::clone(&store))),
        Box::new(PersonnelSimulator::new(Arc::clone(&store))),
    ];

    let sim = SimulationLoop::new(
        scenario,
        Arc::clone(&clock),
        Arc::clone(&store),
        Arc::clone(&registry),
        terrain,
        processors,
        command_rx,
        Arc::clone(&status),
        args.tick_rate,
    );
    sim.seed_store();

    clock.start();
    println!(
        "\nSimulation starting at {} (speed: {}x)",
        start_time.to_rfc3339(),
        args.speed
    );
    println!("Press Ctrl+C to stop\n");

    sim.run(cancel).await;

    // Summary.
    println!("\nShutting down...");
    let final_status = status.load();
    println!(
        "Simulation ran for {:.1} simulated minutes",
        final_status.elapsed_s / 60.0
    );
    println!(
        "Events fired: {}/{}",
        final_status.events_fired, final_status.events_total
    );
    println!("Entities tracked: {}", store.count());

    registry.disconnect_all().await;
    println!("Simulator stopped");
    Ok(())
}

fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            let mut sigterm = match tokio::signal::unix::signal(
                tokio::signal::unix::SignalKind::terminate(),
            ) {
                Ok(sig) => sig,
                Err(e) => {
                    warn!("Failed to install SIGTERM handler: {e}");
                    if ctrl_c.await.is_ok() {
                        cancel.cancel();
                    }
                    return;
                }
            };
            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
        }

        cancel.cancel();
    });
}
