//! Console transport: prints entity updates to stdout.
//!
//! Useful for development without any external consumers. Rate-limited
//! per entity so the terminal stays readable.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;

use super::{TransportAdapter, TransportError};
use crate::types::Entity;

/// Prints entity updates and events to the console.
pub struct ConsoleAdapter {
    min_interval: Duration,
    last_print: Mutex<HashMap<String, Instant>>,
}

impl ConsoleAdapter {
    /// `min_interval_s`: minimum seconds between prints for one entity.
    pub fn new(min_interval_s: f64) -> Self {
        Self {
            min_interval: Duration::from_secs_f64(min_interval_s),
            last_print: Mutex::new(HashMap::new()),
        }
    }

    fn should_print(&self, entity_id: &str) -> bool {
        let mut last_print = match self.last_print.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let now = Instant::now();
        match last_print.get(entity_id) {
            Some(last) if now.duration_since(*last) < self.min_interval => false,
            _ => {
                last_print.insert(entity_id.to_string(), now);
                true
            }
        }
    }
}

#[async_trait]
impl TransportAdapter for ConsoleAdapter {
    fn name(&self) -> &'static str {
        "console"
    }

    async fn connect(&self) -> Result<(), TransportError> {
        println!("[CONSOLE] Transport adapter connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        println!("[CONSOLE] Transport adapter disconnected");
        Ok(())
    }

    async fn push_entity_update(&self, entity: &Entity) -> Result<(), TransportError> {
        if !self.should_print(&entity.entity_id) {
            return Ok(());
        }
        println!(
            "[{}] [{:>8}] {:<20} @ ({:8.4}, {:9.4}) HDG {:5.1} SPD {:5.1}kn {}",
            entity.timestamp.format("%H:%M:%S"),
            entity.agency.as_str(),
            entity.callsign,
            entity.position.latitude,
            entity.position.longitude,
            entity.heading_deg,
            entity.speed_knots,
            entity.status.as_str(),
        );
        Ok(())
    }

    async fn push_bulk_update(&self, entities: &[Entity]) -> Result<(), TransportError> {
        for entity in entities {
            self.push_entity_update(entity).await?;
        }
        Ok(())
    }

    async fn push_event(&self, event: &Value) -> Result<(), TransportError> {
        let event_type = event
            .get("event_type")
            .or_else(|| event.get("type"))
            .and_then(Value::as_str)
            .unwrap_or("EVENT");
        let description = event
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or("Unknown event");
        println!("[EVENT] {event_type}: {description}");
        Ok(())
    }
}
