//! Registry of live accumulators keyed by equipment id

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::NaiveDateTime;
use tokio::sync::Mutex;
use tracing::warn;

use crate::accumulator::{AccumulatorStatus, StateAccumulator};

/// Accumulator shared between its monitor task and status readers
pub type SharedAccumulator = Arc<Mutex<StateAccumulator>>;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("equipment '{0}' is already registered")]
    AlreadyRegistered(String),
    #[error("equipment '{0}' is not registered")]
    NotRegistered(String),
}

/// Map of equipment id to accumulator.
///
/// The outer lock only guards membership; each accumulator carries its own
/// async mutex so ticks on different machines never contend.
#[derive(Default)]
pub struct EquipmentRegistry {
    inner: RwLock<HashMap<String, SharedAccumulator>>,
}

impl EquipmentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_map(&self) -> RwLockReadGuard<'_, HashMap<String, SharedAccumulator>> {
        self.inner.read().unwrap_or_else(|e| {
            warn!("Equipment registry lock poisoned, recovering");
            e.into_inner()
        })
    }

    fn write_map(&self) -> RwLockWriteGuard<'_, HashMap<String, SharedAccumulator>> {
        self.inner.write().unwrap_or_else(|e| {
            warn!("Equipment registry lock poisoned, recovering");
            e.into_inner()
        })
    }

    pub fn insert(&self, accumulator: StateAccumulator) -> Result<SharedAccumulator, RegistryError> {
        let id = accumulator.equipment_id().to_string();
        let mut map = self.write_map();
        if map.contains_key(&id) {
            return Err(RegistryError::AlreadyRegistered(id));
        }
        let shared = Arc::new(Mutex::new(accumulator));
        map.insert(id, Arc::clone(&shared));
        Ok(shared)
    }

    pub fn remove(&self, equipment_id: &str) -> Result<SharedAccumulator, RegistryError> {
        self.write_map()
            .remove(equipment_id)
            .ok_or_else(|| RegistryError::NotRegistered(equipment_id.to_string()))
    }

    pub fn get(&self, equipment_id: &str) -> Option<SharedAccumulator> {
        self.read_map().get(equipment_id).cloned()
    }

    pub fn contains(&self, equipment_id: &str) -> bool {
        self.read_map().contains_key(equipment_id)
    }

    /// Registered ids, sorted
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.read_map().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.read_map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live status for every registered equipment, sorted by id.
    ///
    /// Waits for in-progress ticks to finish.
    pub async fn snapshot(&self, now: NaiveDateTime) -> Vec<AccumulatorStatus> {
        let entries: Vec<SharedAccumulator> = {
            let map = self.read_map();
            map.values().cloned().collect()
        };

        let mut statuses = Vec::with_capacity(entries.len());
        for entry in entries {
            statuses.push(entry.lock().await.status(now));
        }
        statuses.sort_by(|a, b| a.equipment_id.cmp(&b.equipment_id));
        statuses
    }
}
