//! Plant Configuration Module
//!
//! Per-plant configuration loaded from TOML: which equipment to monitor,
//! per-equipment classification settings, and monitor loop tuning.
//!
//! ## Loading Order
//!
//! 1. `SHIFTWATCH_CONFIG` environment variable (path to TOML file)
//! 2. `shiftwatch.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! Call `config::init()` once at startup, then `config::get()` anywhere:
//!
//! ```ignore
//! config::init(PlantConfig::load());
//! let tick = config::get().monitor.tick_interval_ms;
//! ```

mod plant_config;
pub mod defaults;
pub mod validation;

pub use plant_config::*;

use std::sync::OnceLock;

/// Global plant configuration, initialized once at startup.
static PLANT_CONFIG: OnceLock<PlantConfig> = OnceLock::new();

/// Initialize the global plant configuration.
///
/// Later calls are ignored with a warning.
pub fn init(config: PlantConfig) {
    if PLANT_CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once, ignoring");
    }
}

/// Get a reference to the global plant configuration.
///
/// Falls back to built-in defaults if `init()` was never called.
pub fn get() -> &'static PlantConfig {
    PLANT_CONFIG.get_or_init(|| {
        tracing::warn!("config::get() called before config::init(), using defaults");
        PlantConfig::default()
    })
}

/// Check whether the config has been initialized.
pub fn is_initialized() -> bool {
    PLANT_CONFIG.get().is_some()
}
