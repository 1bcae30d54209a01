//! WebSocket server broadcasting entity updates to COP clients.
//!
//! Serves `/ws` upgrades plus a `/healthz` probe on one axum router. All
//! connected clients (typically the browser COP dashboard) receive
//! real-time entity batches, events, and a clock sync every second. On
//! connect a client gets a full snapshot, the accumulated position trails,
//! and the planned routes. Inbound messages carry clock commands
//! (`set_speed`, `pause`, `resume`) applied directly (the clock is
//! thread-safe) while world-mutating commands (`restart`, `update_sidc`)
//! are enqueued into the tick loop.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use super::{TransportAdapter, TransportError};
use crate::config::WsAuthConfig;
use crate::core::{EntityStore, SimulationClock};
use crate::engine::{SimCommand, SimStatus};
use crate::types::Entity;

/// Outbound broadcast channel depth; slow clients drop messages rather
/// than stalling the tick loop.
const BROADCAST_CAPACITY: usize = 256;

/// Positions retained per entity trail.
const TRAIL_CAPACITY: usize = 300;

type Trails = HashMap<String, VecDeque<Value>>;

struct WsShared {
    store: Arc<EntityStore>,
    clock: Arc<SimulationClock>,
    status: Arc<ArcSwap<SimStatus>>,
    outbound: broadcast::Sender<String>,
    commands: mpsc::Sender<SimCommand>,
    trails: Mutex<Trails>,
    routes: Mutex<Value>,
    auth: WsAuthConfig,
    client_count: AtomicUsize,
}

/// WebSocket transport adapter.
pub struct WebSocketAdapter {
    addr: SocketAddr,
    shared: Arc<WsShared>,
    server_task: Mutex<Option<JoinHandle<()>>>,
    clock_task: Mutex<Option<JoinHandle<()>>>,
}

impl WebSocketAdapter {
    pub fn new(
        addr: SocketAddr,
        store: Arc<EntityStore>,
        clock: Arc<SimulationClock>,
        status: Arc<ArcSwap<SimStatus>>,
        commands: mpsc::Sender<SimCommand>,
        auth: WsAuthConfig,
    ) -> Self {
        let (outbound, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            addr,
            shared: Arc::new(WsShared {
                store,
                clock,
                status,
                outbound,
                commands,
                trails: Mutex::new(HashMap::new()),
                routes: Mutex::new(Value::Null),
                auth,
                client_count: AtomicUsize::new(0),
            }),
            server_task: Mutex::new(None),
            clock_task: Mutex::new(None),
        }
    }

    /// Planned routes pushed to clients on connect.
    pub fn set_route_data(&self, routes: Value) {
        *lock(&self.shared.routes) = routes;
    }

    pub fn client_count(&self) -> usize {
        self.shared.client_count.load(Ordering::Relaxed)
    }

    fn broadcast(&self, message: String) {
        // No receivers is fine; broadcast just reports zero deliveries.
        let _ = self.shared.outbound.send(message);
    }

    fn record_trails(&self, entities: &[Entity]) {
        let mut trails = lock(&self.shared.trails);
        for entity in entities {
            let trail = trails
                .entry(entity.entity_id.clone())
                .or_insert_with(VecDeque::new);
            if trail.len() >= TRAIL_CAPACITY {
                trail.pop_front();
            }
            trail.push_back(json!({
                "lat": entity.position.latitude,
                "lon": entity.position.longitude,
                "alt_m": entity.position.altitude_m,
                "timestamp": entity.timestamp.to_rfc3339(),
            }));
        }
    }
}

#[async_trait]
impl TransportAdapter for WebSocketAdapter {
    fn name(&self) -> &'static str {
        "websocket"
    }

    async fn connect(&self) -> Result<(), TransportError> {
        let app = Router::new()
            .route("/ws", get(ws_handler))
            .route("/healthz", get(health_handler))
            .layer(CorsLayer::permissive())
            .with_state(Arc::clone(&self.shared));

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| TransportError::Connect(format!("bind {}: {e}", self.addr)))?;

        let server = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                warn!("WebSocket server stopped: {e}");
            }
        });
        *lock(&self.server_task) = Some(server);

        // Independent clock broadcast, once a second.
        let shared = Arc::clone(&self.shared);
        let clock_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(1));
            loop {
                interval.tick().await;
                let msg = clock_message(&shared);
                let _ = shared.outbound.send(msg);
            }
        });
        *lock(&self.clock_task) = Some(clock_task);

        info!("WebSocket server started on ws://{}/ws", self.addr);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        if let Some(task) = lock(&self.clock_task).take() {
            task.abort();
        }
        if let Some(task) = lock(&self.server_task).take() {
            task.abort();
        }
        info!("WebSocket server stopped");
        Ok(())
    }

    async fn push_entity_update(&self, entity: &Entity) -> Result<(), TransportError> {
        let msg = serde_json::to_string(&json!({
            "type": "entity_update",
            "entity": entity,
        }))?;
        self.broadcast(msg);
        Ok(())
    }

    async fn push_bulk_update(&self, entities: &[Entity]) -> Result<(), TransportError> {
        if entities.is_empty() {
            return Ok(());
        }
        self.record_trails(entities);
        let msg = serde_json::to_string(&json!({
            "type": "entity_batch",
            "entities": entities,
        }))?;
        self.broadcast(msg);
        Ok(())
    }

    async fn push_event(&self, event: &Value) -> Result<(), TransportError> {
        let msg = serde_json::to_string(&json!({
            "type": "event",
            "event": event,
        }))?;
        self.broadcast(msg);
        Ok(())
    }

    async fn clear_history(&self) {
        lock(&self.shared.trails).clear();
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn health_handler(State(shared): State<Arc<WsShared>>) -> Json<Value> {
    let status = shared.status.load();
    Json(json!({
        "status": "ok",
        "scenario": status.scenario,
        "entities": status.entities,
        "tick": status.tick,
        "events_fired": status.events_fired,
        "events_total": status.events_total,
        "running": status.running,
        "speed": status.speed,
        "elapsed_s": status.elapsed_s,
    }))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    State(shared): State<Arc<WsShared>>,
) -> impl IntoResponse {
    if shared.auth.enabled {
        let token = params
            .get("token")
            .cloned()
            .or_else(|| cookie_token(&headers, &shared.auth.cookie_name));
        match token {
            Some(token) if verify_token(&token, &shared.auth) => {}
            _ => {
                debug!("WS client rejected: missing or invalid token");
                return StatusCode::UNAUTHORIZED.into_response();
            }
        }
    }

    ws.on_upgrade(move |socket| handle_client(socket, shared))
        .into_response()
}

async fn handle_client(socket: WebSocket, shared: Arc<WsShared>) {
    let count = shared.client_count.fetch_add(1, Ordering::Relaxed) + 1;
    info!("Client connected ({count} total)");

    let (mut sender, mut receiver) = socket.split();
    let mut outbound = shared.outbound.subscribe();

    // On-connect payloads: snapshot, trails, routes.
    for msg in connect_payloads(&shared) {
        if sender.send(Message::Text(msg)).await.is_err() {
            finish_client(&shared);
            return;
        }
    }

    loop {
        tokio::select! {
            broadcasted = outbound.recv() => {
                match broadcasted {
                    Ok(msg) => {
                        if sender.send(Message::Text(msg)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("WS client lagged, dropped {skipped} messages");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            inbound = receiver.next() => {
                match inbound {
                    Some(Ok(Message::Text(raw))) => {
                        if let Some(reply) = handle_message(&raw, &shared).await {
                            if sender.send(Message::Text(reply)).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!("WS receive error: {e}");
                        break;
                    }
                }
            }
        }
    }

    finish_client(&shared);
}

fn finish_client(shared: &Arc<WsShared>) {
    let count = shared.client_count.fetch_sub(1, Ordering::Relaxed) - 1;
    info!("Client disconnected ({count} total)");
}

fn connect_payloads(shared: &Arc<WsShared>) -> Vec<String> {
    let mut payloads = Vec::with_capacity(3);

    let entities = shared.store.all();
    payloads.push(
        json!({
            "type": "snapshot",
            "entities": entities,
        })
        .to_string(),
    );

    let trails = lock(&shared.trails);
    if !trails.is_empty() {
        let trail_map: HashMap<&String, Vec<&Value>> = trails
            .iter()
            .map(|(id, trail)| (id, trail.iter().collect()))
            .collect();
        payloads.push(
            json!({
                "type": "trail_history",
                "trails": trail_map,
            })
            .to_string(),
        );
    }
    drop(trails);

    let routes = lock(&shared.routes);
    if !routes.is_null() {
        payloads.push(
            json!({
                "type": "routes",
                "routes": *routes,
            })
            .to_string(),
        );
    }

    payloads
}

/// Process an inbound client message. Returns a direct reply, if any.
async fn handle_message(raw: &str, shared: &Arc<WsShared>) -> Option<String> {
    let msg: Value = match serde_json::from_str(raw) {
        Ok(msg) => msg,
        Err(_) => {
            warn!("Invalid JSON from client: {}", &raw[..raw.len().min(100)]);
            return None;
        }
    };

    // Both { "type": ... } and { "cmd": ... } forms are accepted.
    let msg_type = msg
        .get("cmd")
        .or_else(|| msg.get("type"))
        .and_then(Value::as_str)?;

    match msg_type {
        "set_speed" => {
            let speed = msg.get("speed").and_then(Value::as_f64).unwrap_or(1.0);
            shared.clock.set_speed(speed);
            info!("Clock speed set to {speed}x");
            None
        }
        "pause" => {
            shared.clock.pause();
            info!("Clock paused");
            None
        }
        "resume" => {
            shared.clock.resume();
            info!("Clock resumed");
            None
        }
        "snapshot" => Some(
            json!({
                "type": "snapshot",
                "entities": shared.store.all(),
            })
            .to_string(),
        ),
        "reset" | "restart" => {
            info!("Restart requested by client");
            if shared.commands.send(SimCommand::Restart).await.is_err() {
                warn!("Tick loop gone, restart dropped");
            }
            None
        }
        "update_sidc" => {
            let entity_type = msg.get("entity_type").and_then(Value::as_str);
            let sidc = msg.get("sidc").and_then(Value::as_str);
            match (entity_type, sidc) {
                (Some(entity_type), Some(sidc)) if sidc.len() == 20 => {
                    let command = SimCommand::UpdateSidc {
                        entity_type: entity_type.to_string(),
                        sidc: sidc.to_string(),
                    };
                    if shared.commands.send(command).await.is_err() {
                        warn!("Tick loop gone, update_sidc dropped");
                    }
                }
                _ => warn!("Invalid SIDC update: {msg}"),
            }
            None
        }
        other => {
            debug!("Unknown message type: {other}");
            None
        }
    }
}

fn clock_message(shared: &Arc<WsShared>) -> String {
    let status = shared.status.load();
    json!({
        "type": "clock",
        "sim_time": shared.clock.sim_time().to_rfc3339(),
        "speed": shared.clock.speed(),
        "running": shared.clock.is_running(),
        "scenario_progress": (status.scenario_progress * 1000.0).round() / 1000.0,
    })
    .to_string()
}

// ============================================================================
// Auth
// ============================================================================

fn cookie_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let cookies = headers.get(axum::http::header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == cookie_name).then(|| value.to_string())
    })
}

fn verify_token(token: &str, auth: &WsAuthConfig) -> bool {
    use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

    let algorithm = match auth.jwt_algorithm.as_str() {
        "HS256" => Algorithm::HS256,
        "HS384" => Algorithm::HS384,
        "HS512" => Algorithm::HS512,
        other => {
            warn!("Unsupported JWT algorithm '{other}', rejecting client");
            return false;
        }
    };

    let mut validation = Validation::new(algorithm);
    validation.validate_aud = false;

    decode::<serde_json::Map<String, Value>>(
        token,
        &DecodingKey::from_secret(auth.jwt_secret.as_bytes()),
        &validation,
    )
    .is_ok()
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
