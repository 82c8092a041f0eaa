//! Cycle recording and cycle-time reporting
//!
//! - `recorder`: quantizes every state exit into a `CycleRecord`
//! - `report`: pairs Loading -> Running records into cycles and derives statistics

pub mod recorder;
pub mod report;

pub use recorder::{quantize, CycleRecorder};
pub use report::CycleReportGenerator;
