//! Domain post-processors.
//!
//! After the orchestrator writes entity positions for a tick, each domain
//! simulator runs over its slice of the store: maritime entities get AIS
//! cadence and nav status, aircraft get a flight-phase state machine,
//! ground vehicles get unit conversions, personnel get formation spread.

pub mod aviation;
pub mod ground;
pub mod maritime;
pub mod personnel;

use chrono::{DateTime, Utc};

pub use aviation::AviationSimulator;
pub use ground::GroundVehicleSimulator;
pub use maritime::MaritimeSimulator;
pub use personnel::PersonnelSimulator;

/// Per-tick domain pass over the entity store.
pub trait DomainProcessor: Send {
    fn name(&self) -> &'static str;

    fn tick(&mut self, sim_time: DateTime<Utc>);

    /// Drop per-entity timing state. Called when the scenario restarts,
    /// since sim time jumps backwards past any recorded timestamps.
    fn reset(&mut self) {}
}
