//! Sled-backed persistence gateway
//!
//! Two named trees inside one sled database:
//! - `shift_accumulations`: key `equipment|date|shift`, one row per shift
//! - `cycle_records`: key `equipment|date|shift|` + big-endian sequence id,
//!   so a prefix scan returns a shift's records in append order
//!
//! Values are JSON. Accumulation upserts are flushed immediately since they
//! are the crash-recovery state for gap reconciliation; cycle appends rely
//! on sled's background flushing.

use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use sled::Tree;

use super::persistence::{PersistenceError, PersistenceGateway};
use crate::types::{CycleRecord, ShiftAccumulation, ShiftType};

const ACCUMULATIONS_TREE: &str = "shift_accumulations";
const CYCLES_TREE: &str = "cycle_records";

/// Separator between key fragments (unit separator, never in an address)
const KEY_SEPARATOR: char = '\u{1f}';

fn shift_key(equipment_id: &str, shift_date: NaiveDate, shift_type: ShiftType) -> Result<String, PersistenceError> {
    if equipment_id.is_empty() || equipment_id.contains(KEY_SEPARATOR) {
        return Err(PersistenceError::InvalidKey(equipment_id.to_string()));
    }
    Ok(format!(
        "{}{sep}{}{sep}{}",
        equipment_id,
        shift_date.format("%Y-%m-%d"),
        shift_type.as_key(),
        sep = KEY_SEPARATOR
    ))
}

/// Durable gateway over an embedded sled database
#[derive(Clone)]
pub struct SledGateway {
    db: sled::Db,
    accumulations: Tree,
    cycles: Tree,
}

impl SledGateway {
    /// Open or create the store at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PersistenceError> {
        let path_ref = path.as_ref();
        let db = sled::open(path_ref)?;
        let accumulations = db.open_tree(ACCUMULATIONS_TREE)?;
        let cycles = db.open_tree(CYCLES_TREE)?;

        tracing::info!("Shift store opened at {:?}", path_ref);

        Ok(Self {
            db,
            accumulations,
            cycles,
        })
    }

    /// Number of stored accumulation rows
    pub fn accumulation_count(&self) -> usize {
        self.accumulations.len()
    }

    /// Number of stored cycle records
    pub fn cycle_count(&self) -> usize {
        self.cycles.len()
    }

    /// Flush pending writes to disk
    pub fn flush(&self) -> Result<(), PersistenceError> {
        self.db.flush()?;
        Ok(())
    }
}

impl PersistenceGateway for SledGateway {
    fn load(
        &self,
        equipment_id: &str,
        shift_date: NaiveDate,
        shift_type: ShiftType,
    ) -> Result<Option<(ShiftAccumulation, Option<NaiveDateTime>)>, PersistenceError> {
        let key = shift_key(equipment_id, shift_date, shift_type)?;
        match self.accumulations.get(key.as_bytes())? {
            Some(value) => {
                let acc: ShiftAccumulation = serde_json::from_slice(&value)?;
                let last_updated_at = acc.last_updated_at;
                Ok(Some((acc, last_updated_at)))
            }
            None => Ok(None),
        }
    }

    fn upsert(&self, acc: &ShiftAccumulation) -> Result<(), PersistenceError> {
        let key = shift_key(&acc.equipment_id, acc.shift_date, acc.shift_type)?;
        let value = serde_json::to_vec(acc)?;
        self.accumulations.insert(key.as_bytes(), value)?;
        self.accumulations.flush()?;

        tracing::debug!(
            equipment = %acc.equipment_id,
            shift = %acc.shift_type,
            date = %acc.shift_date,
            production = acc.production_count,
            "Accumulation upserted"
        );
        Ok(())
    }

    fn append_cycle(&self, record: &CycleRecord) -> Result<(), PersistenceError> {
        let mut key = shift_key(&record.equipment_id, record.shift_date, record.shift_type)?
            .into_bytes();
        key.push(KEY_SEPARATOR as u8);
        key.extend_from_slice(&self.db.generate_id()?.to_be_bytes());

        let value = serde_json::to_vec(record)?;
        self.cycles.insert(key, value)?;
        Ok(())
    }

    fn load_cycles(
        &self,
        equipment_id: &str,
        shift_date: NaiveDate,
        shift_type: ShiftType,
    ) -> Result<Vec<CycleRecord>, PersistenceError> {
        let mut prefix = shift_key(equipment_id, shift_date, shift_type)?.into_bytes();
        prefix.push(KEY_SEPARATOR as u8);

        let mut records = Vec::new();
        for item in self.cycles.scan_prefix(prefix) {
            let (_key, value) = item?;
            match serde_json::from_slice::<CycleRecord>(&value) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!("Failed to deserialize stored cycle record: {}", e);
                    continue;
                }
            }
        }
        Ok(records)
    }

    fn list_accumulations(
        &self,
        shift_date: NaiveDate,
        shift_type: ShiftType,
    ) -> Result<Vec<ShiftAccumulation>, PersistenceError> {
        let mut rows = Vec::new();
        for item in self.accumulations.iter() {
            let (_key, value) = item?;
            if let Ok(acc) = serde_json::from_slice::<ShiftAccumulation>(&value) {
                if acc.is_for(shift_date, shift_type) {
                    rows.push(acc);
                }
            }
        }
        Ok(rows)
    }

    fn backend_name(&self) -> &'static str {
        "sled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MachineState;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()
    }

    fn record(state: MachineState, secs: u32, minute: u32) -> CycleRecord {
        CycleRecord {
            equipment_id: "192.168.1.20".to_string(),
            shift_date: date(),
            shift_type: ShiftType::Day,
            state,
            duration_seconds: secs,
            timestamp: date().and_hms_opt(9, minute, 0).unwrap(),
            cycle_number: None,
        }
    }

    #[test]
    fn test_store_open() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = SledGateway::open(temp_dir.path()).unwrap();
        assert_eq!(store.accumulation_count(), 0);
        assert_eq!(store.cycle_count(), 0);
    }

    #[test]
    fn test_upsert_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = SledGateway::open(temp_dir.path()).unwrap();

        let mut acc = ShiftAccumulation::new("192.168.1.20", date(), ShiftType::Day);
        acc.idle_seconds = 120.0;
        acc.last_updated_at = date().and_hms_opt(9, 0, 0);
        store.upsert(&acc).unwrap();
        acc.idle_seconds = 180.0;
        store.upsert(&acc).unwrap();

        assert_eq!(store.accumulation_count(), 1);
        let (loaded, last) = store
            .load("192.168.1.20", date(), ShiftType::Day)
            .unwrap()
            .unwrap();
        assert_eq!(loaded.idle_seconds, 180.0);
        assert_eq!(last, date().and_hms_opt(9, 0, 0));
    }

    #[test]
    fn test_cycles_survive_reopen_in_order() {
        let temp_dir = tempfile::tempdir().unwrap();
        {
            let store = SledGateway::open(temp_dir.path()).unwrap();
            store.append_cycle(&record(MachineState::Loading, 20, 1)).unwrap();
            store.append_cycle(&record(MachineState::Running, 90, 2)).unwrap();
            store.flush().unwrap();
        }

        let store = SledGateway::open(temp_dir.path()).unwrap();
        let cycles = store.load_cycles("192.168.1.20", date(), ShiftType::Day).unwrap();
        assert_eq!(cycles.len(), 2);
        assert_eq!(cycles[0].state, MachineState::Loading);
        assert_eq!(cycles[1].duration_seconds, 90);

        let other_shift = store.load_cycles("192.168.1.20", date(), ShiftType::Night).unwrap();
        assert!(other_shift.is_empty());
    }

    #[test]
    fn test_prefix_does_not_leak_between_equipment() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = SledGateway::open(temp_dir.path()).unwrap();
        let mut other = record(MachineState::Running, 30, 3);
        other.equipment_id = "192.168.1.2".to_string();
        store.append_cycle(&other).unwrap();
        store.append_cycle(&record(MachineState::Running, 40, 4)).unwrap();

        let cycles = store.load_cycles("192.168.1.2", date(), ShiftType::Day).unwrap();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].duration_seconds, 30);
    }

    #[test]
    fn test_invalid_key_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = SledGateway::open(temp_dir.path()).unwrap();
        let acc = ShiftAccumulation::new("", date(), ShiftType::Day);
        assert!(matches!(store.upsert(&acc), Err(PersistenceError::InvalidKey(_))));
    }
}
