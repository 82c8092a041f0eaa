//! Cycle recorder: quantizes state exits into cycle records

use chrono::NaiveDateTime;

use crate::config::defaults::CYCLE_QUANTUM_SECS;
use crate::shift::ShiftWindow;
use crate::types::{CycleRecord, MachineState};

/// Round a raw duration to the 10-second quantum.
///
/// Durations shorter than one quantum are noise and return `None`. Rounding
/// is half away from zero: 25 s -> 30 s, 14.9 s -> 10 s.
pub fn quantize(elapsed_secs: f64) -> Option<u32> {
    let quantum = f64::from(CYCLE_QUANTUM_SECS);
    if !elapsed_secs.is_finite() || elapsed_secs < quantum {
        return None;
    }
    let rounded = (elapsed_secs / quantum).round() * quantum;
    if rounded < quantum || rounded > f64::from(u32::MAX) {
        return None;
    }
    Some(rounded as u32)
}

/// Emits cycle records for one equipment
#[derive(Debug)]
pub struct CycleRecorder {
    equipment_id: String,
    emitted: u64,
    discarded: u64,
}

impl CycleRecorder {
    pub fn new(equipment_id: impl Into<String>) -> Self {
        Self {
            equipment_id: equipment_id.into(),
            emitted: 0,
            discarded: 0,
        }
    }

    /// Build the record for a state exit, or `None` if it quantizes away.
    pub fn record(
        &mut self,
        window: &ShiftWindow,
        state: MachineState,
        elapsed_secs: f64,
        timestamp: NaiveDateTime,
        cycle_number: Option<u32>,
    ) -> Option<CycleRecord> {
        let Some(duration_seconds) = quantize(elapsed_secs) else {
            self.discarded += 1;
            tracing::trace!(
                equipment = %self.equipment_id,
                state = %state,
                elapsed_secs,
                "State exit below cycle quantum, discarded"
            );
            return None;
        };

        self.emitted += 1;
        Some(CycleRecord {
            equipment_id: self.equipment_id.clone(),
            shift_date: window.shift_date(),
            shift_type: window.shift_type,
            state,
            duration_seconds,
            timestamp,
            cycle_number,
        })
    }

    /// (emitted, discarded) since creation
    pub fn stats(&self) -> (u64, u64) {
        (self.emitted, self.discarded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shift::ShiftClock;
    use chrono::NaiveDate;

    #[test]
    fn test_quantize_noise_filter() {
        assert_eq!(quantize(4.9), None);
        assert_eq!(quantize(9.9), None);
        assert_eq!(quantize(0.0), None);
        assert_eq!(quantize(-3.0), None);
        assert_eq!(quantize(f64::NAN), None);
    }

    #[test]
    fn test_quantize_rounds_half_away_from_zero() {
        assert_eq!(quantize(10.0), Some(10));
        assert_eq!(quantize(14.9), Some(10));
        assert_eq!(quantize(15.0), Some(20));
        assert_eq!(quantize(25.0), Some(30));
        assert_eq!(quantize(50.0), Some(50));
        assert_eq!(quantize(123.4), Some(120));
    }

    #[test]
    fn test_record_tags_shift_identity() {
        let now = NaiveDate::from_ymd_opt(2024, 5, 11)
            .unwrap()
            .and_hms_opt(2, 0, 0)
            .unwrap();
        let window = ShiftClock::current_window(now);
        let mut recorder = CycleRecorder::new("10.0.0.5");

        let record = recorder
            .record(&window, MachineState::Idle, 50.2, now, None)
            .unwrap();
        assert_eq!(record.duration_seconds, 50);
        assert_eq!(record.shift_type, crate::types::ShiftType::Night);
        assert_eq!(record.shift_date, NaiveDate::from_ymd_opt(2024, 5, 10).unwrap());

        assert!(recorder.record(&window, MachineState::Alarm, 3.0, now, None).is_none());
        assert_eq!(recorder.stats(), (1, 1));
    }
}
