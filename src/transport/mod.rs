//! Transport adapters and the fan-out registry.
//!
//! Each adapter implements the same interface; the simulator core pushes
//! entity updates and events through every registered adapter. A failing
//! adapter is logged and skipped; its siblings still receive the call,
//! and the next tick retries.

pub mod console;
pub mod cot;
pub mod rest;
pub mod websocket;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::types::Entity;

pub use console::ConsoleAdapter;
pub use cot::CotAdapter;
pub use rest::RestAdapter;
pub use websocket::WebSocketAdapter;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("send failed: {0}")]
    Send(String),

    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outbound channel for entity and event data.
///
/// Adapters take `&self` and manage their own interior state; slow
/// consumers must buffer or drop internally rather than stall the caller.
#[async_trait]
pub trait TransportAdapter: Send + Sync {
    /// Human-readable adapter name for logging.
    fn name(&self) -> &'static str;

    /// Establish connection / start server.
    async fn connect(&self) -> Result<(), TransportError>;

    /// Close connection / stop server.
    async fn disconnect(&self) -> Result<(), TransportError>;

    /// Send a single entity update.
    async fn push_entity_update(&self, entity: &Entity) -> Result<(), TransportError>;

    /// Send multiple entity updates at once.
    async fn push_bulk_update(&self, entities: &[Entity]) -> Result<(), TransportError>;

    /// Send an operational event.
    async fn push_event(&self, event: &Value) -> Result<(), TransportError>;

    /// Drop accumulated history (trails, replay buffers) on restart.
    async fn clear_history(&self) {}
}

/// Manages the registered transport adapters and fans out every push.
#[derive(Default)]
pub struct TransportRegistry {
    transports: Vec<Arc<dyn TransportAdapter>>,
}

impl TransportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, adapter: Arc<dyn TransportAdapter>) {
        info!("Registered transport: {}", adapter.name());
        self.transports.push(adapter);
    }

    pub fn count(&self) -> usize {
        self.transports.len()
    }

    pub fn transport_names(&self) -> Vec<&'static str> {
        self.transports.iter().map(|t| t.name()).collect()
    }

    pub async fn connect_all(&self) {
        for t in &self.transports {
            if let Err(e) = t.connect().await {
                warn!("Transport {} connect failed: {e}", t.name());
            }
        }
    }

    pub async fn disconnect_all(&self) {
        for t in &self.transports {
            if let Err(e) = t.disconnect().await {
                warn!("Transport {} disconnect failed: {e}", t.name());
            }
        }
    }

    pub async fn push_entity_update(&self, entity: &Entity) {
        for t in &self.transports {
            if let Err(e) = t.push_entity_update(entity).await {
                warn!("Transport {} entity update failed: {e}", t.name());
            }
        }
    }

    pub async fn push_bulk_update(&self, entities: &[Entity]) {
        for t in &self.transports {
            if let Err(e) = t.push_bulk_update(entities).await {
                warn!("Transport {} bulk update failed: {e}", t.name());
            }
        }
    }

    pub async fn push_event(&self, event: &Value) {
        for t in &self.transports {
            if let Err(e) = t.push_event(event).await {
                warn!("Transport {} event push failed: {e}", t.name());
            }
        }
    }

    pub async fn clear_history(&self) {
        for t in &self.transports {
            t.clear_history().await;
        }
    }
}
