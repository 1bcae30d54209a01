//! REST transport adapter.
//!
//! Maps entity updates onto an HTTP API: entities are created on first
//! sight, then position updates flow either immediately or through a
//! batch buffer flushed by a background task. A dry-run mode records
//! payloads instead of sending, for integration testing without a
//! downstream C2 endpoint.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{TransportAdapter, TransportError};
use crate::types::Entity;

/// REST adapter configuration.
#[derive(Debug, Clone)]
pub struct RestConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub bearer_token: Option<String>,
    pub batch_mode: bool,
    pub batch_interval_s: f64,
    pub dry_run: bool,
    pub max_retries: u32,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9000".to_string(),
            api_key: None,
            bearer_token: None,
            batch_mode: true,
            batch_interval_s: 1.0,
            dry_run: false,
            max_retries: 3,
        }
    }
}

/// REST API transport adapter.
pub struct RestAdapter {
    config: RestConfig,
    client: reqwest::Client,
    buffer: Arc<Mutex<Vec<Value>>>,
    created: Mutex<HashSet<String>>,
    dry_run_log: Arc<Mutex<Vec<Value>>>,
    flush_task: Mutex<Option<JoinHandle<()>>>,
}

impl RestAdapter {
    pub fn new(config: RestConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            buffer: Arc::new(Mutex::new(Vec::new())),
            created: Mutex::new(HashSet::new()),
            dry_run_log: Arc::new(Mutex::new(Vec::new())),
            flush_task: Mutex::new(None),
        }
    }

    /// Payloads recorded in dry-run mode.
    pub fn dry_run_log(&self) -> Vec<Value> {
        lock(&self.dry_run_log).clone()
    }

    fn entity_position_payload(entity: &Entity) -> Value {
        json!({
            "entity_id": entity.entity_id,
            "latitude": entity.position.latitude,
            "longitude": entity.position.longitude,
            "altitude_m": entity.position.altitude_m,
            "heading_deg": entity.heading_deg,
            "speed_knots": entity.speed_knots,
            "course_deg": entity.course_deg,
            "status": entity.status,
            "timestamp": entity.timestamp.to_rfc3339(),
        })
    }

    async fn send(&self, method: reqwest::Method, path: &str, payload: &Value) -> Result<(), TransportError> {
        send_request(&self.config, &self.client, &self.dry_run_log, method, path, payload).await
    }

    async fn flush(&self, batch: Vec<Value>) -> Result<(), TransportError> {
        flush_batch(&self.config, &self.client, &self.dry_run_log, batch).await
    }
}

async fn send_request(
    config: &RestConfig,
    client: &reqwest::Client,
    dry_run_log: &Arc<Mutex<Vec<Value>>>,
    method: reqwest::Method,
    path: &str,
    payload: &Value,
) -> Result<(), TransportError> {
    if config.dry_run {
        lock(dry_run_log).push(json!({
            "method": method.as_str(),
            "path": path,
            "payload": payload,
        }));
        return Ok(());
    }

    let url = format!("{}{path}", config.base_url.trim_end_matches('/'));

    // Exponential backoff on transient failures.
    let mut delay = Duration::from_millis(250);
    for attempt in 0..=config.max_retries {
        let mut request = client.request(method.clone(), &url).json(payload);
        if let Some(ref key) = config.api_key {
            request = request.header("X-API-Key", key);
        }
        if let Some(ref token) = config.bearer_token {
            request = request.bearer_auth(token);
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => return Ok(()),
            Ok(response) => {
                debug!("REST {url} returned {}", response.status());
            }
            Err(e) => {
                debug!("REST {url} attempt {attempt} failed: {e}");
            }
        }

        if attempt < config.max_retries {
            tokio::time::sleep(delay).await;
            delay *= 2;
        }
    }

    Err(TransportError::Send(format!(
        "{url} failed after {} retries",
        config.max_retries
    )))
}

async fn flush_batch(
    config: &RestConfig,
    client: &reqwest::Client,
    dry_run_log: &Arc<Mutex<Vec<Value>>>,
    batch: Vec<Value>,
) -> Result<(), TransportError> {
    if batch.is_empty() {
        return Ok(());
    }
    send_request(
        config,
        client,
        dry_run_log,
        reqwest::Method::POST,
        "/entities/positions/batch",
        &json!({ "updates": batch }),
    )
    .await
}

#[async_trait]
impl TransportAdapter for RestAdapter {
    fn name(&self) -> &'static str {
        "rest"
    }

    async fn connect(&self) -> Result<(), TransportError> {
        if self.config.batch_mode {
            // Background flush task drains the buffer on a fixed cadence,
            // so a slow API never holds up the tick loop.
            let buffer = Arc::clone(&self.buffer);
            let dry_run_log = Arc::clone(&self.dry_run_log);
            let config = self.config.clone();
            let client = self.client.clone();

            let task = tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs_f64(
                    config.batch_interval_s.max(0.05),
                ));
                loop {
                    interval.tick().await;
                    let batch: Vec<Value> = std::mem::take(&mut *lock(&buffer));
                    if let Err(e) = flush_batch(&config, &client, &dry_run_log, batch).await {
                        warn!("Batch flush error: {e}");
                    }
                }
            });
            *lock(&self.flush_task) = Some(task);
        }

        info!(
            "REST adapter initialized: {} (dry_run={}, batch={})",
            self.config.base_url, self.config.dry_run, self.config.batch_mode
        );
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        if let Some(task) = lock(&self.flush_task).take() {
            task.abort();
        }
        // Final drain of anything still buffered.
        let batch: Vec<Value> = std::mem::take(&mut *lock(&self.buffer));
        self.flush(batch).await?;
        info!(
            "REST adapter disconnected (dry_run log: {} entries)",
            lock(&self.dry_run_log).len()
        );
        Ok(())
    }

    async fn push_entity_update(&self, entity: &Entity) -> Result<(), TransportError> {
        // Create the entity downstream on first sight.
        let first_seen = lock(&self.created).insert(entity.entity_id.clone());
        if first_seen {
            self.send(
                reqwest::Method::POST,
                "/entities",
                &serde_json::to_value(entity)?,
            )
            .await?;
        }

        let payload = Self::entity_position_payload(entity);
        if self.config.batch_mode {
            lock(&self.buffer).push(payload);
            Ok(())
        } else {
            let path = format!("/entities/{}/position", entity.entity_id);
            self.send(reqwest::Method::PUT, &path, &payload).await
        }
    }

    async fn push_bulk_update(&self, entities: &[Entity]) -> Result<(), TransportError> {
        for entity in entities {
            self.push_entity_update(entity).await?;
        }
        Ok(())
    }

    async fn push_event(&self, event: &Value) -> Result<(), TransportError> {
        self.send(reqwest::Method::POST, "/events", event).await
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Agency, Domain, EntityStatus, Position};

    fn dry_adapter(batch_mode: bool) -> RestAdapter {
        RestAdapter::new(RestConfig {
            dry_run: true,
            batch_mode,
            ..RestConfig::default()
        })
    }

    fn sample_entity(id: &str) -> Entity {
        Entity {
            entity_id: id.to_string(),
            entity_type: "MMEA_PATROL".to_string(),
            domain: Domain::Maritime,
            agency: Agency::Mmea,
            callsign: id.to_string(),
            position: Position::new(5.0, 118.0, 0.0),
            heading_deg: 45.0,
            speed_knots: 12.0,
            course_deg: 45.0,
            timestamp: chrono::Utc::now(),
            status: EntityStatus::Active,
            sidc: String::new(),
            metadata: serde_json::Map::new(),
        }
    }

    #[tokio::test]
    async fn dry_run_records_create_then_position() {
        let adapter = dry_adapter(false);
        adapter.push_entity_update(&sample_entity("E1")).await.unwrap();
        adapter.push_entity_update(&sample_entity("E1")).await.unwrap();

        let log = adapter.dry_run_log();
        // First push: create + position. Second push: position only.
        assert_eq!(log.len(), 3);
        assert_eq!(log[0]["path"], "/entities");
        assert_eq!(log[1]["path"], "/entities/E1/position");
        assert_eq!(log[2]["path"], "/entities/E1/position");
    }

    #[tokio::test]
    async fn batch_mode_buffers_instead_of_sending() {
        let adapter = dry_adapter(true);
        adapter.push_entity_update(&sample_entity("E1")).await.unwrap();

        // The create goes out immediately; the position sits in the buffer.
        assert_eq!(adapter.dry_run_log().len(), 1);
        assert_eq!(lock(&adapter.buffer).len(), 1);
    }

    #[tokio::test]
    async fn disconnect_flushes_remaining_batch() {
        let adapter = dry_adapter(true);
        adapter.push_entity_update(&sample_entity("E1")).await.unwrap();
        adapter.disconnect().await.unwrap();

        let log = adapter.dry_run_log();
        let batch = log
            .iter()
            .find(|entry| entry["path"] == "/entities/positions/batch")
            .expect("no batch flush recorded");
        assert_eq!(batch["payload"]["updates"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn events_post_to_events_endpoint() {
        let adapter = dry_adapter(false);
        adapter
            .push_event(&json!({"event_type": "ALERT", "description": "x"}))
            .await
            .unwrap();
        let log = adapter.dry_run_log();
        assert_eq!(log[0]["path"], "/events");
        assert_eq!(log[0]["method"], "POST");
    }
}
