//! Movement strategy layer.
//!
//! Each strategy is a generator over simulation time: given `sim_time` it
//! returns an interpolated [`MovementState`]. The tick orchestrator holds
//! strategies in a movements map keyed by entity id; the event engine
//! rewires that map mid-run (intercept orders, deployments, lockdowns).

pub mod geodesy;
pub mod intercept;
pub mod noise;
pub mod orbit;
pub mod patrol;
pub mod terrain;
pub mod waypoint;

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

pub use intercept::InterceptMovement;
pub use noise::PositionNoise;
pub use orbit::OrbitMovement;
pub use patrol::PatrolMovement;
pub use terrain::TerrainIndex;
pub use waypoint::WaypointMovement;

#[derive(Error, Debug)]
pub enum MovementError {
    #[error("at least one waypoint required")]
    EmptyWaypointList,
}

/// Interpolated entity state at a point in time.
#[derive(Debug, Clone)]
pub struct MovementState {
    pub lat: f64,
    pub lon: f64,
    pub alt_m: f64,
    /// True heading [0, 360).
    pub heading_deg: f64,
    pub speed_knots: f64,
    /// Course over ground.
    pub course_deg: f64,
    /// Merged into the entity's metadata after noise is applied.
    pub metadata_overrides: Option<Map<String, Value>>,
}

impl MovementState {
    pub fn fixed(lat: f64, lon: f64, alt_m: f64, heading_deg: f64) -> Self {
        Self {
            lat,
            lon,
            alt_m,
            heading_deg,
            speed_knots: 0.0,
            course_deg: heading_deg,
            metadata_overrides: None,
        }
    }
}

/// A single waypoint in a movement plan.
#[derive(Debug, Clone)]
pub struct Waypoint {
    pub lat: f64,
    pub lon: f64,
    pub alt_m: f64,
    pub speed_knots: f64,
    /// Offset from scenario start.
    pub time_offset: Duration,
    pub metadata_overrides: Option<Map<String, Value>>,
}

impl Waypoint {
    pub fn new(lat: f64, lon: f64, speed_knots: f64, time_offset: Duration) -> Self {
        Self {
            lat,
            lon,
            alt_m: 0.0,
            speed_knots,
            time_offset,
            metadata_overrides: None,
        }
    }
}

/// Common contract for all movement strategies.
///
/// `state` may mutate internal bookkeeping (orbit angle, intercept latch,
/// patrol regeneration) but is pure with respect to wall time: the same
/// `sim_time` sequence reproduces the same trajectory.
pub trait MovementStrategy: Send {
    fn state(&mut self, sim_time: DateTime<Utc>) -> MovementState;

    fn is_complete(&self, sim_time: DateTime<Utc>) -> bool;
}

/// The live movement binding, shared between the tick orchestrator
/// (reader) and the event engine (writer), serialised through the tick.
pub type MovementMap = HashMap<String, Box<dyn MovementStrategy>>;
