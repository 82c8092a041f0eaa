//! Cycle records and derived cycle-time report

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::{MachineState, ShiftType};

/// One quantized state duration, emitted when a state is exited.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CycleRecord {
    pub equipment_id: String,
    pub shift_date: NaiveDate,
    pub shift_type: ShiftType,

    /// The state that was exited
    pub state: MachineState,

    /// Duration rounded to a multiple of 10 seconds (minimum 10)
    pub duration_seconds: u32,

    /// Transition instant
    pub timestamp: NaiveDateTime,

    /// Production count reached by the Loading -> Running transition this
    /// record belongs to, if any
    #[serde(default)]
    pub cycle_number: Option<u32>,
}

/// One Loading interval closed by the Running interval that followed it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletedCycle {
    pub loading_seconds: u32,
    pub running_seconds: u32,
    /// Timestamp of the Running record that closed the cycle
    pub closed_at: NaiveDateTime,
    pub cycle_number: Option<u32>,
}

impl CompletedCycle {
    /// Loading plus running time
    pub fn total_seconds(&self) -> u32 {
        self.loading_seconds + self.running_seconds
    }
}

/// Cycle-time statistics for one (equipment, shift date, shift type).
///
/// Derived on demand; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CycleReport {
    pub has_data: bool,
    pub total_cycles: usize,
    pub avg_cycle_time: f64,
    pub max_cycle_time: u32,
    pub min_cycle_time: u32,
    pub anomaly_count: usize,
    pub anomalies: Vec<CompletedCycle>,
    /// Every completed cycle, in scan order
    #[serde(default)]
    pub cycles: Vec<CompletedCycle>,
}

impl CycleReport {
    /// Report for a shift with no completed cycles
    pub fn empty() -> Self {
        Self::default()
    }
}
