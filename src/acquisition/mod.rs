//! Signal acquisition module
//!
//! Collaborator contracts consumed by the accounting engine. Device
//! connectivity and PMC address decoding live behind these traits; the
//! engine only sees decoded snapshots, an alarm flag and a counter.

mod counter;
pub mod simulated;

pub use counter::InMemoryCounter;
pub use simulated::SimulatedPlant;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::SignalSnapshot;

/// Acquisition errors
///
/// Every variant causes the current tick to be skipped; they are kept
/// distinct so logs tell a flaky link from an unpopulated device.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("Transient read failure: {0}")]
    Transient(String),

    #[error("No data available for {0}")]
    NoData(String),

    #[error("Equipment {0} is not connected")]
    Disconnected(String),
}

/// Source of PMC signal snapshots
#[async_trait]
pub trait SignalSource: Send + Sync {
    /// Read a snapshot for one equipment.
    async fn read_snapshot(&self, equipment_id: &str) -> Result<SignalSnapshot, AcquisitionError>;

    /// Human-readable name for logging
    fn source_name(&self) -> &str;
}

/// Source of the controller's alarm status (separate from the PMC alarm bit)
#[async_trait]
pub trait AlarmSource: Send + Sync {
    async fn has_alarm(&self, equipment_id: &str) -> Result<bool, AcquisitionError>;
}

/// Production counter scoped to one equipment
pub trait ProductionCounter: Send + Sync {
    fn get(&self) -> u32;
    fn increment(&self);
    fn reset(&self);
}

/// Alarm source that never reports an alarm
pub struct NoAlarmStatus;

#[async_trait]
impl AlarmSource for NoAlarmStatus {
    async fn has_alarm(&self, _equipment_id: &str) -> Result<bool, AcquisitionError> {
        Ok(false)
    }
}
