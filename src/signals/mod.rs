//! Signal-format encoders for downstream track consumers.
//!
//! AIS (AIVDM NMEA) for maritime entities and ADS-B (SBS BaseStation
//! text) for aircraft. Both derive stable per-entity identifiers (MMSI,
//! ICAO hex) from the entity id, so an entity always transmits under the
//! same identity across runs.

pub mod adsb;
pub mod ais;

pub use adsb::AdsbEncoder;
pub use ais::AisEncoder;
