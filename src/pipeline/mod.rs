//! Monitoring pipeline
//!
//! One [`EquipmentMonitor`] task per machine drives its
//! [`StateAccumulator`](crate::accumulator::StateAccumulator) on a fixed
//! interval. The [`Supervisor`] owns the tasks; the [`EquipmentRegistry`]
//! gives status readers shared access to each accumulator.
//!
//! Notable changes leave the pipeline as [`MonitorEvent`]s on a bounded
//! channel. Events are best-effort: a full channel drops them.

pub mod monitor;
pub mod registry;
pub mod supervisor;

pub use monitor::{EquipmentMonitor, MonitorExit, TickResult};
pub use registry::{EquipmentRegistry, RegistryError, SharedAccumulator};
pub use supervisor::Supervisor;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::accumulator::{ShiftRollover, Transition};
use crate::types::{CycleRecord, MachineState, ShiftAccumulation, ShiftType};

/// Why a tick did no accounting work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Previous tick for this equipment still held the accumulator
    Busy,
    /// Snapshot read failed
    SignalUnavailable,
}

/// Notification published by a monitor task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MonitorEvent {
    StateChanged {
        equipment_id: String,
        from: MachineState,
        to: MachineState,
        at: NaiveDateTime,
        elapsed_secs: f64,
        record: Option<CycleRecord>,
        production_count: u32,
    },
    ShiftRolled {
        equipment_id: String,
        closed: ShiftAccumulation,
        opened_shift: ShiftType,
        opened_at: NaiveDateTime,
    },
    TickSkipped {
        equipment_id: String,
        at: NaiveDateTime,
        reason: SkipReason,
    },
}

impl MonitorEvent {
    pub fn equipment_id(&self) -> &str {
        match self {
            MonitorEvent::StateChanged { equipment_id, .. }
            | MonitorEvent::ShiftRolled { equipment_id, .. }
            | MonitorEvent::TickSkipped { equipment_id, .. } => equipment_id,
        }
    }

    pub(crate) fn from_transition(equipment_id: &str, t: Transition) -> Self {
        MonitorEvent::StateChanged {
            equipment_id: equipment_id.to_string(),
            from: t.from,
            to: t.to,
            at: t.at,
            elapsed_secs: t.elapsed_secs,
            record: t.record,
            production_count: t.production_count,
        }
    }

    pub(crate) fn from_rollover(equipment_id: &str, r: ShiftRollover) -> Self {
        MonitorEvent::ShiftRolled {
            equipment_id: equipment_id.to_string(),
            closed: r.closed,
            opened_shift: r.opened.shift_type,
            opened_at: r.opened.start,
        }
    }
}
