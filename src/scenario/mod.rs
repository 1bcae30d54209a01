//! Scenario loading, geodata indexing, and the timed event engine.

pub mod event_engine;
pub mod geodata;
pub mod loader;

pub use event_engine::EventEngine;
pub use geodata::GeodataIndex;
pub use loader::{MovementPlan, ScenarioError, ScenarioLoader, ScenarioState};
