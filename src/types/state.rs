//! Core state types: MachineState, ShiftType

use serde::{Deserialize, Serialize};

// ============================================================================
// Machine State
// ============================================================================

/// Operating state of a piece of equipment.
///
/// Exactly one state is current per equipment at any instant. Declaration
/// order matches classification priority (Alarm wins over everything).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
pub enum MachineState {
    /// Alarm signal or alarm status active
    Alarm,
    /// Automatic run waiting on the loader handshake
    Loading,
    /// Automatic run in memory mode
    Running,
    /// Anything else (stopped, manual mode, optional stop)
    #[default]
    Idle,
}

impl MachineState {
    /// All states in priority order
    pub const ALL: [MachineState; 4] = [
        MachineState::Alarm,
        MachineState::Loading,
        MachineState::Running,
        MachineState::Idle,
    ];

    /// Get short code for logging
    pub fn short_code(&self) -> &'static str {
        match self {
            MachineState::Alarm => "ALM",
            MachineState::Loading => "LOAD",
            MachineState::Running => "RUN",
            MachineState::Idle => "IDLE",
        }
    }
}

impl std::fmt::Display for MachineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MachineState::Alarm => write!(f, "Alarm"),
            MachineState::Loading => write!(f, "Loading"),
            MachineState::Running => write!(f, "Running"),
            MachineState::Idle => write!(f, "Idle"),
        }
    }
}

// ============================================================================
// Shift Type
// ============================================================================

/// Work shift identity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ShiftType {
    /// 08:30 - 17:30 (basic) or 08:30 - 20:30 (extended)
    Day,
    /// 20:30 - 08:30 next day
    Night,
}

impl ShiftType {
    /// Stable key fragment used by storage backends
    pub fn as_key(&self) -> &'static str {
        match self {
            ShiftType::Day => "day",
            ShiftType::Night => "night",
        }
    }

    /// Parse from string (for CLI/config)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "day" | "d" => Some(ShiftType::Day),
            "night" | "n" => Some(ShiftType::Night),
            _ => None,
        }
    }
}

impl std::fmt::Display for ShiftType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShiftType::Day => write!(f, "Day"),
            ShiftType::Night => write!(f, "Night"),
        }
    }
}
