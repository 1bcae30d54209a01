//! copsim: multi-domain Common Operating Picture simulation engine.
//!
//! Advances a population of simulated entities (vessels, aircraft, ground
//! vehicles, personnel) along scripted trajectories at a configurable
//! multiple of wall time, fires scripted operational events that rewire
//! entity behavior mid-run, and fans every state change out through
//! pluggable transport adapters to downstream C2 consumers.
//!
//! ## Architecture
//!
//! - **Core**: simulation clock and concurrent entity store
//! - **Movement**: waypoint, patrol, orbit, and intercept strategies plus
//!   sensor noise and terrain validation
//! - **Scenario**: YAML loader, geodata index, and the timed event engine
//! - **Domains**: per-domain post-processors (AIS, flight phases,
//!   conversions, formations)
//! - **Transport**: WebSocket, console, REST, and CoT adapters behind a
//!   fan-out registry
//! - **Engine**: the tick orchestrator binding it all together

pub mod config;
pub mod core;
pub mod domains;
pub mod engine;
pub mod movement;
pub mod scenario;
pub mod signals;
pub mod transport;
pub mod types;

// Re-export the simulation core
pub use self::core::{EntityStore, SimulationClock, StoreError};
pub use engine::{SimCommand, SimStatus, SimulationLoop};

// Re-export commonly used types
pub use types::{Agency, Domain, Entity, EntityStatus, Position, ScenarioEvent};

// Re-export movement strategies
pub use movement::{
    InterceptMovement, MovementMap, MovementState, MovementStrategy, OrbitMovement,
    PatrolMovement, PositionNoise, TerrainIndex, Waypoint, WaypointMovement,
};

// Re-export scenario machinery
pub use scenario::{EventEngine, GeodataIndex, ScenarioError, ScenarioLoader, ScenarioState};

// Re-export transports
pub use transport::{TransportAdapter, TransportError, TransportRegistry};
