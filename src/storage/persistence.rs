//! PersistenceGateway trait and in-memory backend
//!
//! Abstracts shift accumulation and cycle record persistence so backends can
//! be swapped without touching the accounting engine:
//! - `InMemoryGateway`: In-memory store for testing and minimal deployments
//! - `SledGateway`: Durable embedded store (see `sled_store`)

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};

use crate::types::{CycleRecord, ShiftAccumulation, ShiftType};

/// Trait for pluggable persistence backends
///
/// Implementations must be thread-safe (Send + Sync) for shared access
/// across monitor tasks. Writes for one equipment arrive in transition
/// order; implementations need not order writes across equipment.
pub trait PersistenceGateway: Send + Sync {
    /// Store an accumulation as the final record for its shift
    fn save(&self, acc: &ShiftAccumulation) -> Result<(), PersistenceError> {
        self.upsert(acc)
    }

    /// Load the accumulation for a shift key, with its last update time
    fn load(
        &self,
        equipment_id: &str,
        shift_date: NaiveDate,
        shift_type: ShiftType,
    ) -> Result<Option<(ShiftAccumulation, Option<NaiveDateTime>)>, PersistenceError>;

    /// Insert or replace the accumulation for its shift key.
    ///
    /// Idempotent: exactly one current row per (equipment, date, shift).
    fn upsert(&self, acc: &ShiftAccumulation) -> Result<(), PersistenceError>;

    /// Append a cycle record
    fn append_cycle(&self, record: &CycleRecord) -> Result<(), PersistenceError>;

    /// Cycle records for a shift key, oldest first
    fn load_cycles(
        &self,
        equipment_id: &str,
        shift_date: NaiveDate,
        shift_type: ShiftType,
    ) -> Result<Vec<CycleRecord>, PersistenceError>;

    /// All accumulations stored for a shift key across equipment
    fn list_accumulations(
        &self,
        shift_date: NaiveDate,
        shift_type: ShiftType,
    ) -> Result<Vec<ShiftAccumulation>, PersistenceError>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}

/// Persistence errors
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("invalid key: {0}")]
    InvalidKey(String),
}

impl From<sled::Error> for PersistenceError {
    fn from(err: sled::Error) -> Self {
        PersistenceError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        PersistenceError::Serialization(err.to_string())
    }
}

type ShiftKey = (String, NaiveDate, ShiftType);

/// In-memory persistence for testing and minimal deployments
///
/// Thread-safe via `RwLock`. Not durable: data is lost on restart.
#[derive(Default)]
pub struct InMemoryGateway {
    accumulations: std::sync::RwLock<HashMap<ShiftKey, ShiftAccumulation>>,
    cycles: std::sync::RwLock<Vec<CycleRecord>>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistenceGateway for InMemoryGateway {
    fn load(
        &self,
        equipment_id: &str,
        shift_date: NaiveDate,
        shift_type: ShiftType,
    ) -> Result<Option<(ShiftAccumulation, Option<NaiveDateTime>)>, PersistenceError> {
        let store = self
            .accumulations
            .read()
            .map_err(|e| PersistenceError::Storage(e.to_string()))?;

        Ok(store
            .get(&(equipment_id.to_string(), shift_date, shift_type))
            .map(|acc| (acc.clone(), acc.last_updated_at)))
    }

    fn upsert(&self, acc: &ShiftAccumulation) -> Result<(), PersistenceError> {
        let mut store = self
            .accumulations
            .write()
            .map_err(|e| PersistenceError::Storage(e.to_string()))?;

        store.insert(
            (acc.equipment_id.clone(), acc.shift_date, acc.shift_type),
            acc.clone(),
        );
        Ok(())
    }

    fn append_cycle(&self, record: &CycleRecord) -> Result<(), PersistenceError> {
        let mut store = self
            .cycles
            .write()
            .map_err(|e| PersistenceError::Storage(e.to_string()))?;

        store.push(record.clone());
        Ok(())
    }

    fn load_cycles(
        &self,
        equipment_id: &str,
        shift_date: NaiveDate,
        shift_type: ShiftType,
    ) -> Result<Vec<CycleRecord>, PersistenceError> {
        let store = self
            .cycles
            .read()
            .map_err(|e| PersistenceError::Storage(e.to_string()))?;

        Ok(store
            .iter()
            .filter(|r| {
                r.equipment_id == equipment_id
                    && r.shift_date == shift_date
                    && r.shift_type == shift_type
            })
            .cloned()
            .collect())
    }

    fn list_accumulations(
        &self,
        shift_date: NaiveDate,
        shift_type: ShiftType,
    ) -> Result<Vec<ShiftAccumulation>, PersistenceError> {
        let store = self
            .accumulations
            .read()
            .map_err(|e| PersistenceError::Storage(e.to_string()))?;

        let mut rows: Vec<_> = store
            .values()
            .filter(|acc| acc.is_for(shift_date, shift_type))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.equipment_id.cmp(&b.equipment_id));
        Ok(rows)
    }

    fn backend_name(&self) -> &'static str {
        "InMemory"
    }
}
