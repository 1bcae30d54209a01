//! Thread-safe in-memory entity registry.
//!
//! Central store of all simulated entities, keyed by entity id. Transport
//! adapters register listeners to receive entity changes and operational
//! events. Every operation is linearizable under a single internal mutex;
//! snapshot operations copy out, so iteration is lock-free for callers.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;
use thiserror::Error;

use crate::types::{Agency, Domain, Entity};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("entity {0} already exists")]
    AlreadyExists(String),

    #[error("entity {0} not found")]
    NotFound(String),
}

type UpdateListener = Box<dyn Fn(&Entity) + Send + Sync>;
type EventListener = Box<dyn Fn(&Value) + Send + Sync>;

/// In-memory store for all simulated entities.
///
/// Listener callbacks are invoked outside the critical section so a slow
/// listener cannot hold up store writers.
#[derive(Default)]
pub struct EntityStore {
    entities: Mutex<HashMap<String, Entity>>,
    update_listeners: Mutex<Vec<UpdateListener>>,
    event_listeners: Mutex<Vec<EventListener>>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new entity. Fails if the id is already present.
    pub fn add(&self, entity: Entity) -> Result<(), StoreError> {
        {
            let mut entities = lock(&self.entities);
            if entities.contains_key(&entity.entity_id) {
                return Err(StoreError::AlreadyExists(entity.entity_id));
            }
            entities.insert(entity.entity_id.clone(), entity.clone());
        }
        self.notify_update(&entity);
        Ok(())
    }

    /// Replace an existing entity. Fails if the id is not present.
    pub fn update(&self, entity: Entity) -> Result<(), StoreError> {
        {
            let mut entities = lock(&self.entities);
            if !entities.contains_key(&entity.entity_id) {
                return Err(StoreError::NotFound(entity.entity_id));
            }
            entities.insert(entity.entity_id.clone(), entity.clone());
        }
        self.notify_update(&entity);
        Ok(())
    }

    /// Insert or replace an entity.
    pub fn upsert(&self, entity: Entity) {
        {
            let mut entities = lock(&self.entities);
            entities.insert(entity.entity_id.clone(), entity.clone());
        }
        self.notify_update(&entity);
    }

    pub fn get(&self, entity_id: &str) -> Option<Entity> {
        lock(&self.entities).get(entity_id).cloned()
    }

    /// Consistent point-in-time copy of all entities.
    pub fn all(&self) -> Vec<Entity> {
        lock(&self.entities).values().cloned().collect()
    }

    pub fn by_domain(&self, domain: Domain) -> Vec<Entity> {
        lock(&self.entities)
            .values()
            .filter(|e| e.domain == domain)
            .cloned()
            .collect()
    }

    pub fn by_agency(&self, agency: Agency) -> Vec<Entity> {
        lock(&self.entities)
            .values()
            .filter(|e| e.agency == agency)
            .cloned()
            .collect()
    }

    pub fn remove(&self, entity_id: &str) -> Result<(), StoreError> {
        let mut entities = lock(&self.entities);
        entities
            .remove(entity_id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(entity_id.to_string()))
    }

    pub fn count(&self) -> usize {
        lock(&self.entities).len()
    }

    /// Register a listener for entity updates.
    pub fn on_update(&self, listener: impl Fn(&Entity) + Send + Sync + 'static) {
        lock(&self.update_listeners).push(Box::new(listener));
    }

    /// Register a listener for operational events.
    pub fn on_event(&self, listener: impl Fn(&Value) + Send + Sync + 'static) {
        lock(&self.event_listeners).push(Box::new(listener));
    }

    /// Push an operational event to all event listeners.
    pub fn emit_event(&self, event: &Value) {
        let listeners = lock(&self.event_listeners);
        for listener in listeners.iter() {
            listener(event);
        }
    }

    fn notify_update(&self, entity: &Entity) {
        let listeners = lock(&self.update_listeners);
        for listener in listeners.iter() {
            listener(entity);
        }
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
    use crate::types::{EntityStatus, Position};
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn entity(id: &str, domain: Domain, agency: Agency) -> Entity {
        Entity {
            entity_id: id.to_string(),
            entity_type: "MMEA_PATROL".to_string(),
            domain,
            agency,
            callsign: id.to_string(),
            position: Position::new(5.0, 118.0, 0.0),
            heading_deg: 0.0,
            speed_knots: 0.0,
            course_deg: 0.0,
            timestamp: Utc::now(),
            status: EntityStatus::Idle,
            sidc: String::new(),
            metadata: serde_json::Map::new(),
        }
    }

    #[test]
    fn add_rejects_duplicate_id() {
        let store = EntityStore::new();
        store.add(entity("E1", Domain::Maritime, Agency::Mmea)).unwrap();
        let err = store.add(entity("E1", Domain::Maritime, Agency::Mmea));
        assert!(matches!(err, Err(StoreError::AlreadyExists(_))));
    }

    #[test]
    fn update_requires_existing_entity() {
        let store = EntityStore::new();
        let err = store.update(entity("E1", Domain::Maritime, Agency::Mmea));
        assert!(matches!(err, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn upsert_is_idempotent() {
        let store = EntityStore::new();
        let e = entity("E1", Domain::Maritime, Agency::Mmea);
        store.upsert(e.clone());
        store.upsert(e);
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn filters_by_domain_and_agency() {
        let store = EntityStore::new();
        store.add(entity("SHIP", Domain::Maritime, Agency::Mmea)).unwrap();
        store.add(entity("AC", Domain::Air, Agency::Rmaf)).unwrap();
        store.add(entity("CAR", Domain::GroundVehicle, Agency::Rmp)).unwrap();

        assert_eq!(store.by_domain(Domain::Maritime).len(), 1);
        assert_eq!(store.by_domain(Domain::Air).len(), 1);
        assert_eq!(store.by_agency(Agency::Rmp).len(), 1);
        assert_eq!(store.all().len(), 3);
    }

    #[test]
    fn remove_missing_entity_errors() {
        let store = EntityStore::new();
        assert!(matches!(store.remove("nope"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn update_listeners_fire_on_writes() {
        let store = EntityStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        store.on_update(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        store.add(entity("E1", Domain::Maritime, Agency::Mmea)).unwrap();
        store.upsert(entity("E1", Domain::Maritime, Agency::Mmea));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn event_listeners_receive_emitted_events() {
        let store = EntityStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        store.on_event(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        store.emit_event(&serde_json::json!({"event_type": "ALERT"}));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
