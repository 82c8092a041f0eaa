//! PMC signal snapshot

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Point-in-time capture of the PMC signals used for state classification.
///
/// Immutable once captured. Signal parsing (addresses, bit offsets) belongs
/// to the acquisition layer; the engine only sees decoded values.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SignalSnapshot {
    /// When the snapshot was read
    pub captured_at: Option<NaiveDateTime>,

    /// Automatic operation in progress (cycle start lamp)
    pub auto_run_active: bool,

    /// Alarm output from the ladder
    pub alarm_signal: bool,

    /// Mode selector in MEMORY
    pub memory_mode_active: bool,

    /// Currently executing M-code (0 when none)
    pub active_m_code: u16,

    /// Loader handshake line A
    pub loader_handshake_a: bool,

    /// Loader handshake line B
    pub loader_handshake_b: bool,

    /// Emergency stop pressed
    pub emergency_stop: bool,
}

impl SignalSnapshot {
    /// Auto-run in memory mode, no M-code and no handshake
    pub fn running() -> Self {
        Self {
            auto_run_active: true,
            memory_mode_active: true,
            ..Self::default()
        }
    }

    /// Auto-run waiting on `m_code` with loader handshake A raised
    pub fn loading(m_code: u16) -> Self {
        Self {
            auto_run_active: true,
            memory_mode_active: true,
            active_m_code: m_code,
            loader_handshake_a: true,
            ..Self::default()
        }
    }

    /// Alarm output raised, everything else off
    pub fn alarm() -> Self {
        Self {
            alarm_signal: true,
            ..Self::default()
        }
    }

    /// Stamp the capture time
    pub fn at(mut self, captured_at: NaiveDateTime) -> Self {
        self.captured_at = Some(captured_at);
        self
    }

    /// Either loader handshake line raised
    pub fn loader_handshake(&self) -> bool {
        self.loader_handshake_a || self.loader_handshake_b
    }

    /// Auto-run active while the mode selector is in MEMORY
    pub fn in_memory_run(&self) -> bool {
        self.auto_run_active && self.memory_mode_active
    }
}
