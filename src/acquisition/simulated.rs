//! Simulated plant
//!
//! Stands in for real controller connectivity when running the binary
//! without a device link. Each equipment steps through a machining loop:
//!
//! ```text
//! Idle ──► Loading ──► Running ──► Loading ──► Running ...
//!               ▲                      │
//!               └──── Alarm ◄──────────┘ (occasionally)
//! ```
//!
//! Phase lengths are randomized; a small fraction of reads fail to exercise
//! the dropped-tick path.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::prelude::*;

use super::{AcquisitionError, AlarmSource, SignalSource};
use crate::types::SignalSnapshot;

/// Probability that a phase change lands in Alarm instead of Loading
const ALARM_PROBABILITY: f64 = 0.05;

/// Probability that a single read fails
const READ_FAILURE_PROBABILITY: f64 = 0.005;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Loading,
    Running,
    Alarm,
}

#[derive(Debug)]
struct MachineSim {
    phase: Phase,
    phase_ends_at: Instant,
}

/// Simulated signal and alarm source for a set of equipment
pub struct SimulatedPlant {
    loading_m_codes: HashMap<String, u16>,
    machines: Mutex<HashMap<String, MachineSim>>,
    rng: Mutex<StdRng>,
}

impl SimulatedPlant {
    /// `equipment` pairs each id with the loading M-code the simulated
    /// ladder raises while waiting on the loader.
    pub fn new(equipment: impl IntoIterator<Item = (String, u16)>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self {
            loading_m_codes: equipment.into_iter().collect(),
            machines: Mutex::new(HashMap::new()),
            rng: Mutex::new(rng),
        }
    }

    fn phase_length(rng: &mut StdRng, phase: Phase) -> Duration {
        let secs = match phase {
            Phase::Idle => rng.gen_range(20..90),
            Phase::Loading => rng.gen_range(10..40),
            Phase::Running => rng.gen_range(60..240),
            Phase::Alarm => rng.gen_range(30..120),
        };
        Duration::from_secs(secs)
    }

    fn next_phase(rng: &mut StdRng, phase: Phase) -> Phase {
        match phase {
            Phase::Idle | Phase::Alarm => Phase::Loading,
            Phase::Loading => Phase::Running,
            Phase::Running if rng.gen_bool(ALARM_PROBABILITY) => Phase::Alarm,
            Phase::Running => Phase::Loading,
        }
    }

    /// Advance the simulation for one equipment and return its phase
    fn step(&self, equipment_id: &str) -> Result<Phase, AcquisitionError> {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        if rng.gen_bool(READ_FAILURE_PROBABILITY) {
            return Err(AcquisitionError::Transient(format!(
                "simulated timeout reading {}",
                equipment_id
            )));
        }

        let mut machines = self.machines.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        let sim = machines.entry(equipment_id.to_string()).or_insert_with(|| MachineSim {
            phase: Phase::Idle,
            phase_ends_at: now + Self::phase_length(&mut rng, Phase::Idle),
        });

        if now >= sim.phase_ends_at {
            sim.phase = Self::next_phase(&mut rng, sim.phase);
            sim.phase_ends_at = now + Self::phase_length(&mut rng, sim.phase);
        }

        Ok(sim.phase)
    }
}

#[async_trait]
impl SignalSource for SimulatedPlant {
    async fn read_snapshot(&self, equipment_id: &str) -> Result<SignalSnapshot, AcquisitionError> {
        let m_code = *self
            .loading_m_codes
            .get(equipment_id)
            .ok_or_else(|| AcquisitionError::Disconnected(equipment_id.to_string()))?;

        let captured_at = chrono::Local::now().naive_local();
        let snapshot = match self.step(equipment_id)? {
            Phase::Idle => SignalSnapshot::default(),
            Phase::Loading if m_code > 0 => SignalSnapshot::loading(m_code),
            // Without a loading M-code the machine just pauses in auto
            Phase::Loading => SignalSnapshot::default(),
            Phase::Running => SignalSnapshot::running(),
            Phase::Alarm => SignalSnapshot::alarm(),
        };

        Ok(snapshot.at(captured_at))
    }

    fn source_name(&self) -> &str {
        "simulated"
    }
}

#[async_trait]
impl AlarmSource for SimulatedPlant {
    async fn has_alarm(&self, equipment_id: &str) -> Result<bool, AcquisitionError> {
        let machines = self.machines.lock().unwrap_or_else(|e| e.into_inner());
        Ok(machines
            .get(equipment_id)
            .is_some_and(|sim| sim.phase == Phase::Alarm))
    }
}
