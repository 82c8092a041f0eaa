//! State Classifier
//!
//! Maps a PMC signal snapshot plus the alarm-status flag to one of the four
//! machine states. Rules in priority order:
//!
//! 1. Alarm signal or alarm status -> `Alarm`
//! 2. Optional-stop dwell: the dwell M-code held for `threshold_secs` -> `Idle`
//! 3. Loading M-code with auto-run, memory mode and a loader handshake -> `Loading`
//! 4. Auto-run in memory mode -> `Running`
//! 5. Otherwise -> `Idle`
//!
//! The only state carried between calls is the dwell timer start.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::config::defaults::DEFAULT_DWELL_THRESHOLD_SECS;
use crate::types::{MachineState, SignalSnapshot};

/// Optional-stop dwell rule
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DwellRule {
    /// M-code that indicates an optional stop
    pub m_code: u16,
    /// How long the M-code must hold before the machine counts as idle
    pub threshold_secs: u32,
}

impl DwellRule {
    pub fn new(m_code: u16) -> Self {
        Self {
            m_code,
            threshold_secs: DEFAULT_DWELL_THRESHOLD_SECS,
        }
    }
}

/// Per-equipment classification settings
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassifierConfig {
    /// M-code signalling "awaiting loader"; 0 disables Loading detection
    pub loading_m_code: u16,
    /// Optional-stop dwell rule; `None` disables it
    pub dwell: Option<DwellRule>,
}

/// Stateful classifier, one per equipment
#[derive(Debug, Clone)]
pub struct StateClassifier {
    config: ClassifierConfig,
    dwell_started_at: Option<NaiveDateTime>,
}

impl StateClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            config,
            dwell_started_at: None,
        }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// When the dwell M-code was first observed, if it is currently held
    pub fn dwell_started_at(&self) -> Option<NaiveDateTime> {
        self.dwell_started_at
    }

    /// Clear the dwell timer (e.g. after a missed read sequence)
    pub fn reset(&mut self) {
        self.dwell_started_at = None;
    }

    /// Classify a snapshot observed at `now`.
    pub fn classify(
        &mut self,
        snapshot: &SignalSnapshot,
        has_alarm_status: bool,
        now: NaiveDateTime,
    ) -> MachineState {
        if snapshot.alarm_signal || has_alarm_status {
            self.dwell_started_at = None;
            return MachineState::Alarm;
        }

        match self.config.dwell {
            Some(rule) if snapshot.active_m_code == rule.m_code => {
                let started = *self.dwell_started_at.get_or_insert(now);
                let held = (now - started).num_milliseconds();
                if held >= i64::from(rule.threshold_secs) * 1000 {
                    return MachineState::Idle;
                }
            }
            _ => self.dwell_started_at = None,
        }

        let loading_m_code = self.config.loading_m_code;
        if loading_m_code > 0
            && snapshot.in_memory_run()
            && snapshot.active_m_code == loading_m_code
            && snapshot.loader_handshake()
        {
            return MachineState::Loading;
        }

        if snapshot.in_memory_run() {
            return MachineState::Running;
        }

        MachineState::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 10)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn classifier(loading_m_code: u16, dwell: Option<DwellRule>) -> StateClassifier {
        StateClassifier::new(ClassifierConfig {
            loading_m_code,
            dwell,
        })
    }

    #[test]
    fn alarm_wins_over_everything() {
        let mut c = classifier(100, None);
        let mut snap = SignalSnapshot::loading(100);
        snap.alarm_signal = true;
        assert_eq!(c.classify(&snap, false, t0()), MachineState::Alarm);

        let running = SignalSnapshot::running();
        assert_eq!(c.classify(&running, true, t0()), MachineState::Alarm);
    }

    #[test]
    fn loading_requires_handshake_and_mode() {
        let mut c = classifier(100, None);
        assert_eq!(c.classify(&SignalSnapshot::loading(100), false, t0()), MachineState::Loading);

        let mut no_handshake = SignalSnapshot::loading(100);
        no_handshake.loader_handshake_a = false;
        assert_eq!(c.classify(&no_handshake, false, t0()), MachineState::Running);

        let mut handshake_b = no_handshake;
        handshake_b.loader_handshake_b = true;
        assert_eq!(c.classify(&handshake_b, false, t0()), MachineState::Loading);

        let mut manual = SignalSnapshot::loading(100);
        manual.memory_mode_active = false;
        assert_eq!(c.classify(&manual, false, t0()), MachineState::Idle);
    }

    #[test]
    fn loading_disabled_when_m_code_zero() {
        let mut c = classifier(0, None);
        let snap = SignalSnapshot::loading(0);
        assert_eq!(c.classify(&snap, false, t0()), MachineState::Running);
    }

    #[test]
    fn wrong_m_code_is_running() {
        let mut c = classifier(100, None);
        assert_eq!(c.classify(&SignalSnapshot::loading(30), false, t0()), MachineState::Running);
    }

    #[test]
    fn idle_when_not_in_auto() {
        let mut c = classifier(100, None);
        assert_eq!(c.classify(&SignalSnapshot::default(), false, t0()), MachineState::Idle);
    }

    #[test]
    fn dwell_turns_idle_after_threshold() {
        let mut c = classifier(0, Some(DwellRule::new(1)));
        let mut snap = SignalSnapshot::running();
        snap.active_m_code = 1;

        assert_eq!(c.classify(&snap, false, t0()), MachineState::Running);
        assert_eq!(c.dwell_started_at(), Some(t0()));
        assert_eq!(
            c.classify(&snap, false, t0() + Duration::seconds(2)),
            MachineState::Running
        );
        assert_eq!(
            c.classify(&snap, false, t0() + Duration::seconds(3)),
            MachineState::Idle
        );
    }

    #[test]
    fn dwell_timer_resets_when_condition_clears() {
        let mut c = classifier(0, Some(DwellRule::new(1)));
        let mut held = SignalSnapshot::running();
        held.active_m_code = 1;

        c.classify(&held, false, t0());
        c.classify(&SignalSnapshot::running(), false, t0() + Duration::seconds(2));
        assert_eq!(c.dwell_started_at(), None);

        assert_eq!(
            c.classify(&held, false, t0() + Duration::seconds(4)),
            MachineState::Running
        );
    }

    #[test]
    fn alarm_resets_dwell_timer() {
        let mut c = classifier(0, Some(DwellRule::new(1)));
        let mut held = SignalSnapshot::running();
        held.active_m_code = 1;

        c.classify(&held, false, t0());
        assert_eq!(c.classify(&held, true, t0() + Duration::seconds(1)), MachineState::Alarm);
        assert_eq!(c.dwell_started_at(), None);
    }

    #[test]
    fn classification_is_deterministic() {
        let snap = SignalSnapshot::loading(100);
        let mut a = classifier(100, Some(DwellRule::new(1)));
        let mut b = classifier(100, Some(DwellRule::new(1)));
        for i in 0..5 {
            let now = t0() + Duration::seconds(i);
            assert_eq!(a.classify(&snap, false, now), b.classify(&snap, false, now));
        }
    }
}
