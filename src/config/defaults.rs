//! System-wide default constants.
//!
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Monitor
// ============================================================================

/// Interval between monitor ticks per equipment (milliseconds).
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1_000;

/// Capacity of the monitor event channel. Events are dropped, not queued,
/// when the consumer falls this far behind.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Upper bound on the shutdown flush per equipment (milliseconds).
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// Classification
// ============================================================================

/// Time the optional-stop M-code must hold before the machine counts as idle.
pub const DEFAULT_DWELL_THRESHOLD_SECS: u32 = 3;

// ============================================================================
// Cycles
// ============================================================================

/// Cycle record quantum (seconds). Records are multiples of this, minimum one.
pub const CYCLE_QUANTUM_SECS: u32 = 10;

/// A cycle is anomalous when its total exceeds this multiple of the average.
pub const CYCLE_ANOMALY_FACTOR: f64 = 1.2;

// ============================================================================
// Storage
// ============================================================================

/// Default data directory
pub const DEFAULT_DATA_DIR: &str = "./data";

/// Sled database directory name inside the data directory
pub const SHIFT_DB_NAME: &str = "shift_accounting.db";
