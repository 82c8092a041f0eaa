//! shiftwatch: Shift-Based Machine State Accounting
//!
//! Classifies machine-tool PMC signals into operating states and accounts
//! time-in-state per production shift.
//!
//! ## Architecture
//!
//! - **Shift Clock**: maps wall-clock time to Day/Night shift windows
//! - **Classifier**: snapshot + alarm status -> Alarm / Loading / Running / Idle
//! - **Accumulator**: per-equipment state machine crediting elapsed time
//! - **Cycles**: quantized state records and cycle-time statistics
//! - **Storage**: persistence gateway (sled or in-memory)
//! - **Pipeline**: per-equipment monitor tasks under a supervisor

pub mod accumulator;
pub mod acquisition;
pub mod classifier;
pub mod config;
pub mod cycles;
pub mod pipeline;
pub mod shift;
pub mod storage;
pub mod types;

// Re-export plant configuration
pub use config::{EquipmentConfig, PlantConfig};

// Re-export commonly used types
pub use types::{
    CompletedCycle, CycleRecord, CycleReport, MachineState, ShiftAccumulation, ShiftType,
    SignalSnapshot,
};

// Re-export engine components
pub use accumulator::{AccumulatorStatus, Collaborators, GapReconciler, StateAccumulator};
pub use classifier::{ClassifierConfig, StateClassifier};
pub use cycles::{CycleRecorder, CycleReportGenerator};
pub use shift::{Clock, ShiftClock, ShiftWindow, SystemClock};

// Re-export storage
pub use storage::{InMemoryGateway, PersistenceError, PersistenceGateway, SledGateway};

// Re-export pipeline
pub use pipeline::{EquipmentRegistry, MonitorEvent, Supervisor};
