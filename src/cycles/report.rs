//! Cycle-time report generation
//!
//! Pairs each Loading record with the Running record that follows it and
//! derives average / min / max cycle time plus anomalies (cycles longer
//! than 1.2x the average). Runs on demand against persisted records,
//! decoupled from the live monitor loop.

use crate::config::defaults::CYCLE_ANOMALY_FACTOR;
use crate::storage::{PersistenceError, PersistenceGateway};
use crate::types::{CompletedCycle, CycleRecord, CycleReport, MachineState, ShiftType};
use chrono::NaiveDate;

/// Loading interval waiting for its Running interval
struct OpenCycle {
    loading_seconds: u32,
    cycle_number: Option<u32>,
}

pub struct CycleReportGenerator;

impl CycleReportGenerator {
    /// Pair records into completed cycles.
    ///
    /// Records must be ordered by timestamp. A Loading seen while a cycle is
    /// still open replaces it; a Running with no open cycle is ignored.
    pub fn pair_cycles(records: &[CycleRecord]) -> Vec<CompletedCycle> {
        let mut cycles = Vec::new();
        let mut open: Option<OpenCycle> = None;

        for record in records {
            match record.state {
                MachineState::Loading => {
                    open = Some(OpenCycle {
                        loading_seconds: record.duration_seconds,
                        cycle_number: record.cycle_number,
                    });
                }
                MachineState::Running => {
                    if let Some(cycle) = open.take() {
                        if record.duration_seconds > 0 {
                            cycles.push(CompletedCycle {
                                loading_seconds: cycle.loading_seconds,
                                running_seconds: record.duration_seconds,
                                closed_at: record.timestamp,
                                cycle_number: cycle.cycle_number.or(record.cycle_number),
                            });
                        }
                    }
                }
                MachineState::Alarm | MachineState::Idle => {}
            }
        }

        cycles
    }

    /// Compute the report for one shift's ordered records
    pub fn generate(records: &[CycleRecord]) -> CycleReport {
        let cycles = Self::pair_cycles(records);
        if cycles.is_empty() {
            return CycleReport::empty();
        }

        let totals: Vec<u32> = cycles.iter().map(CompletedCycle::total_seconds).collect();
        let sum: f64 = totals.iter().map(|&t| f64::from(t)).sum();
        let avg = sum / totals.len() as f64;
        let max = totals.iter().copied().max().unwrap_or(0);
        let min = totals.iter().copied().min().unwrap_or(0);

        let threshold = avg * CYCLE_ANOMALY_FACTOR;
        let anomalies: Vec<CompletedCycle> = cycles
            .iter()
            .filter(|c| f64::from(c.total_seconds()) > threshold)
            .copied()
            .collect();

        CycleReport {
            has_data: true,
            total_cycles: cycles.len(),
            avg_cycle_time: avg,
            max_cycle_time: max,
            min_cycle_time: min,
            anomaly_count: anomalies.len(),
            anomalies,
            cycles,
        }
    }

    /// Load a shift's records from persistence and report on them
    pub fn for_shift(
        gateway: &dyn PersistenceGateway,
        equipment_id: &str,
        shift_date: NaiveDate,
        shift_type: ShiftType,
    ) -> Result<CycleReport, PersistenceError> {
        let mut records = gateway.load_cycles(equipment_id, shift_date, shift_type)?;
        records.sort_by_key(|r| r.timestamp);
        let report = Self::generate(&records);

        tracing::info!(
            equipment = %equipment_id,
            shift = %shift_type,
            date = %shift_date,
            records = records.len(),
            cycles = report.total_cycles,
            anomalies = report.anomaly_count,
            "Cycle report generated"
        );

        Ok(report)
    }
}
