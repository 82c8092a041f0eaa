//! Shared data structures for shift-based machine state accounting
//!
//! This module defines the core types flowing through the engine:
//! - SignalSnapshot (PMC signal capture, input to classification)
//! - MachineState / ShiftType (classification and shift identity)
//! - ShiftAccumulation (per-shift time-in-state counters)
//! - CycleRecord / CycleReport (quantized state durations and statistics)

mod state;
mod signals;
mod accumulation;
mod cycle;

pub use state::*;
pub use signals::*;
pub use accumulation::*;
pub use cycle::*;
