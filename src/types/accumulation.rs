//! Per-shift time-in-state accumulation

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::{MachineState, ShiftType};

/// Time-in-state counters for one (equipment, shift date, shift type).
///
/// Seconds are kept as `f64` so sub-second remainders are not lost across
/// many transitions; storage and reports round on the way out.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShiftAccumulation {
    /// Equipment identifier (network address)
    pub equipment_id: String,

    /// Date the shift window started on
    pub shift_date: NaiveDate,

    /// Day or night
    pub shift_type: ShiftType,

    pub running_seconds: f64,
    pub loading_seconds: f64,
    pub alarm_seconds: f64,
    pub idle_seconds: f64,

    /// Time the process was not observing the equipment (gap reconciliation)
    pub unmeasured_seconds: f64,

    /// Completed Loading -> Running transitions
    pub production_count: u32,

    /// Last time this record was written
    pub last_updated_at: Option<NaiveDateTime>,
}

impl ShiftAccumulation {
    /// Fresh all-zero record for a shift
    pub fn new(equipment_id: impl Into<String>, shift_date: NaiveDate, shift_type: ShiftType) -> Self {
        Self {
            equipment_id: equipment_id.into(),
            shift_date,
            shift_type,
            running_seconds: 0.0,
            loading_seconds: 0.0,
            alarm_seconds: 0.0,
            idle_seconds: 0.0,
            unmeasured_seconds: 0.0,
            production_count: 0,
            last_updated_at: None,
        }
    }

    /// Credit elapsed seconds to a state bucket
    pub fn credit(&mut self, state: MachineState, seconds: f64) {
        let seconds = seconds.max(0.0);
        match state {
            MachineState::Alarm => self.alarm_seconds += seconds,
            MachineState::Loading => self.loading_seconds += seconds,
            MachineState::Running => self.running_seconds += seconds,
            MachineState::Idle => self.idle_seconds += seconds,
        }
    }

    /// Seconds credited to a state bucket
    pub fn seconds_in(&self, state: MachineState) -> f64 {
        match state {
            MachineState::Alarm => self.alarm_seconds,
            MachineState::Loading => self.loading_seconds,
            MachineState::Running => self.running_seconds,
            MachineState::Idle => self.idle_seconds,
        }
    }

    /// Sum of all buckets, unmeasured included
    pub fn total_seconds(&self) -> f64 {
        self.running_seconds
            + self.loading_seconds
            + self.alarm_seconds
            + self.idle_seconds
            + self.unmeasured_seconds
    }

    /// Running time over total time (0 when nothing has been accumulated)
    pub fn operation_rate(&self) -> f64 {
        let total = self.total_seconds();
        if total <= 0.0 {
            0.0
        } else {
            self.running_seconds / total
        }
    }

    /// Whether this record belongs to the given shift key
    pub fn is_for(&self, shift_date: NaiveDate, shift_type: ShiftType) -> bool {
        self.shift_date == shift_date && self.shift_type == shift_type
    }
}
