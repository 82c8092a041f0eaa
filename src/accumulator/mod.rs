//! State Accumulator
//!
//! Owns one equipment's live accounting state. Each tick:
//!
//! 1. Consult the shift clock; on a shift crossing, close the old shift's
//!    accumulation and open a fresh one.
//! 2. Read a signal snapshot. A failed read skips the tick, and the time
//!    until the next good read is credited to no state.
//! 3. Classify the snapshot.
//! 4. On a state change, credit the exited state's elapsed time, emit a
//!    cycle record, count production on Loading -> Running, and write the
//!    accumulation through to persistence.
//!
//! Time in the current state is not committed until the next transition,
//! shift crossing or shutdown flush; `status()` reports it on demand.

pub mod gap;

pub use gap::{GapOutcome, GapReconciler, Reconciled};

use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::acquisition::{AlarmSource, ProductionCounter, SignalSource};
use crate::classifier::{ClassifierConfig, StateClassifier};
use crate::cycles::CycleRecorder;
use crate::shift::{ShiftClock, ShiftWindow};
use crate::storage::{PersistenceError, PersistenceGateway};
use crate::types::{CycleRecord, MachineState, ShiftAccumulation, ShiftType};

/// Seconds from `from` to `to`, clamped at zero when the clock went backwards
fn seconds_between(from: NaiveDateTime, to: NaiveDateTime) -> f64 {
    ((to - from).num_milliseconds() as f64 / 1000.0).max(0.0)
}

/// External collaborators for one equipment
#[derive(Clone)]
pub struct Collaborators {
    pub signals: Arc<dyn SignalSource>,
    pub alarms: Arc<dyn AlarmSource>,
    pub counter: Arc<dyn ProductionCounter>,
    pub gateway: Arc<dyn PersistenceGateway>,
}

/// A committed state change
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: MachineState,
    pub to: MachineState,
    pub at: NaiveDateTime,
    /// Raw seconds credited to `from` by this transition
    pub elapsed_secs: f64,
    /// Quantized record, if the exit survived the noise filter
    pub record: Option<CycleRecord>,
    pub production_count: u32,
}

/// A closed shift and the one that replaced it
#[derive(Debug, Clone, PartialEq)]
pub struct ShiftRollover {
    pub closed: ShiftAccumulation,
    pub opened: ShiftWindow,
}

/// Result of one tick
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Classified, same state as before
    Unchanged(MachineState),
    /// Classified, state changed
    Transitioned(Transition),
    /// Snapshot read failed; nothing credited
    SignalUnavailable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub rollover: Option<ShiftRollover>,
    pub outcome: TickOutcome,
}

/// Live view of an equipment's shift, including uncommitted time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccumulatorStatus {
    pub equipment_id: String,
    pub state: MachineState,
    pub state_since: NaiveDateTime,
    pub in_flight_seconds: f64,
    pub shift_type: ShiftType,
    pub shift_date: NaiveDate,
    pub on_break: bool,
    pub running_seconds: f64,
    pub loading_seconds: f64,
    pub alarm_seconds: f64,
    pub idle_seconds: f64,
    pub unmeasured_seconds: f64,
    pub production_count: u32,
    pub operation_rate: f64,
}

/// Per-equipment accounting state machine
pub struct StateAccumulator {
    equipment_id: String,
    classifier: StateClassifier,
    recorder: CycleRecorder,
    collaborators: Collaborators,
    current_state: MachineState,
    state_start_time: NaiveDateTime,
    accumulation: ShiftAccumulation,
    current_window: ShiftWindow,
    /// Production number of the Loading -> Running transition whose
    /// Running interval is still open
    open_cycle: Option<u32>,
    /// Time of the last successful snapshot read
    last_observed: NaiveDateTime,
    /// Set while reads are failing: the last good read before the failures
    unread_since: Option<NaiveDateTime>,
    /// Seconds of the current state already committed before a read gap
    carried_secs: f64,
}

impl fmt::Debug for StateAccumulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateAccumulator")
            .field("equipment_id", &self.equipment_id)
            .field("current_state", &self.current_state)
            .field("state_start_time", &self.state_start_time)
            .field("current_window", &self.current_window)
            .field("accumulation", &self.accumulation)
            .field("unread_since", &self.unread_since)
            .finish_non_exhaustive()
    }
}

impl StateAccumulator {
    /// Resume accounting from a reconciled accumulation.
    ///
    /// The equipment starts in `Idle` at `now`. A fresh accumulation is
    /// written immediately so a later restart has a row to reconcile against.
    pub fn new(
        equipment_id: impl Into<String>,
        classifier_config: ClassifierConfig,
        collaborators: Collaborators,
        reconciled: Reconciled,
        now: NaiveDateTime,
    ) -> Self {
        let equipment_id = equipment_id.into();
        let mut accumulator = Self {
            classifier: StateClassifier::new(classifier_config),
            recorder: CycleRecorder::new(equipment_id.clone()),
            collaborators,
            current_state: MachineState::Idle,
            state_start_time: now,
            accumulation: reconciled.accumulation,
            current_window: reconciled.window,
            open_cycle: None,
            last_observed: now,
            unread_since: None,
            carried_secs: 0.0,
            equipment_id,
        };

        if reconciled.outcome.is_fresh() {
            accumulator.accumulation.last_updated_at = Some(now);
            accumulator.persist();
        }

        info!(
            equipment = %accumulator.equipment_id,
            shift = %accumulator.current_window.shift_type,
            date = %accumulator.current_window.shift_date(),
            outcome = ?reconciled.outcome,
            "Accumulator started"
        );

        accumulator
    }

    /// Reconcile against persistence, then start
    pub fn start(
        equipment_id: impl Into<String>,
        classifier_config: ClassifierConfig,
        collaborators: Collaborators,
        now: NaiveDateTime,
    ) -> Self {
        let equipment_id = equipment_id.into();
        let reconciled =
            GapReconciler::reconcile(collaborators.gateway.as_ref(), &equipment_id, now);
        Self::new(equipment_id, classifier_config, collaborators, reconciled, now)
    }

    pub fn equipment_id(&self) -> &str {
        &self.equipment_id
    }

    pub fn current_state(&self) -> MachineState {
        self.current_state
    }

    pub fn state_start_time(&self) -> NaiveDateTime {
        self.state_start_time
    }

    /// Committed counters (excludes the in-flight interval)
    pub fn accumulation(&self) -> &ShiftAccumulation {
        &self.accumulation
    }

    pub fn current_window(&self) -> &ShiftWindow {
        &self.current_window
    }

    /// Run one monitor tick at `now`.
    pub async fn tick(&mut self, now: NaiveDateTime) -> TickReport {
        let rollover = self.check_shift(now);

        let snapshot = match self
            .collaborators
            .signals
            .read_snapshot(&self.equipment_id)
            .await
        {
            Ok(snapshot) => snapshot,
            Err(e) => {
                if self.unread_since.is_none() {
                    self.unread_since = Some(self.last_observed);
                }
                warn!(equipment = %self.equipment_id, error = %e, "Signal read failed, tick skipped");
                return TickReport {
                    rollover,
                    outcome: TickOutcome::SignalUnavailable,
                };
            }
        };

        if let Some(last_seen) = self.unread_since.take() {
            self.close_read_gap(last_seen, now);
        }
        self.last_observed = now;

        let has_alarm = match self.collaborators.alarms.has_alarm(&self.equipment_id).await {
            Ok(flag) => flag,
            Err(e) => {
                debug!(equipment = %self.equipment_id, error = %e, "Alarm status read failed, assuming no alarm");
                false
            }
        };

        let new_state = self.classifier.classify(&snapshot, has_alarm, now);
        let outcome = if new_state == self.current_state {
            TickOutcome::Unchanged(new_state)
        } else {
            TickOutcome::Transitioned(self.transition(new_state, now))
        };

        TickReport { rollover, outcome }
    }

    /// Commit the in-flight interval and persist, without changing state.
    ///
    /// Called on a clean stop. An unclean stop loses the in-flight interval
    /// until the next start's gap reconciliation counts it as unmeasured.
    pub fn flush_on_shutdown(&mut self, now: NaiveDateTime) -> Result<(), PersistenceError> {
        // A boundary may have passed since the last tick
        self.check_shift(now);

        let elapsed = seconds_between(self.state_start_time, self.observed_until(now));
        self.accumulation.credit(self.current_state, elapsed);
        self.state_start_time = now;
        self.carried_secs = 0.0;
        self.accumulation.production_count = self.collaborators.counter.get();
        self.accumulation.last_updated_at = Some(now);
        self.collaborators.gateway.upsert(&self.accumulation)?;

        let (records, discarded) = self.recorder.stats();
        info!(
            equipment = %self.equipment_id,
            state = %self.current_state,
            elapsed_secs = elapsed,
            records,
            discarded,
            "Accumulation flushed on shutdown"
        );
        Ok(())
    }

    /// Live counters with the in-flight interval added to the current state
    pub fn status(&self, now: NaiveDateTime) -> AccumulatorStatus {
        let in_flight = seconds_between(self.state_start_time, self.observed_until(now));
        let mut live = self.accumulation.clone();
        live.credit(self.current_state, in_flight);

        AccumulatorStatus {
            equipment_id: self.equipment_id.clone(),
            state: self.current_state,
            state_since: self.state_start_time,
            in_flight_seconds: in_flight,
            shift_type: self.current_window.shift_type,
            shift_date: self.current_window.shift_date(),
            on_break: self.current_window.is_break(now),
            running_seconds: live.running_seconds,
            loading_seconds: live.loading_seconds,
            alarm_seconds: live.alarm_seconds,
            idle_seconds: live.idle_seconds,
            unmeasured_seconds: live.unmeasured_seconds,
            production_count: self.collaborators.counter.get(),
            operation_rate: live.operation_rate(),
        }
    }

    /// Roll the accumulation over if `now` is in a different shift.
    fn check_shift(&mut self, now: NaiveDateTime) -> Option<ShiftRollover> {
        let new_window = ShiftClock::current_window(now);
        if !ShiftClock::has_crossed(&self.current_window, &new_window) {
            // Same shift; picks up the 17:30 extension
            self.current_window = new_window;
            return None;
        }

        // Credit the old shift only up to the end of its full window. The
        // cached window may still carry the 17:30 basic end.
        let closing =
            ShiftClock::window_for(self.accumulation.shift_date, self.accumulation.shift_type);
        let boundary = now.min(closing.end);
        let elapsed = seconds_between(self.state_start_time, self.observed_until(boundary));
        self.accumulation.credit(self.current_state, elapsed);
        self.accumulation.production_count = self.collaborators.counter.get();
        self.accumulation.last_updated_at = Some(boundary);
        if let Err(e) = self.collaborators.gateway.save(&self.accumulation) {
            warn!(
                equipment = %self.equipment_id,
                error = %e,
                "Failed to persist closing shift accumulation"
            );
        }

        let opened_at = boundary.max(new_window.start);
        let mut fresh = ShiftAccumulation::new(
            self.equipment_id.clone(),
            new_window.shift_date(),
            new_window.shift_type,
        );
        fresh.last_updated_at = Some(opened_at);
        let closed = std::mem::replace(&mut self.accumulation, fresh);

        self.collaborators.counter.reset();
        self.current_window = new_window.clone();
        self.state_start_time = opened_at;
        self.carried_secs = 0.0;
        self.open_cycle = None;
        self.persist();

        info!(
            equipment = %self.equipment_id,
            closed_shift = %closed.shift_type,
            closed_date = %closed.shift_date,
            production = closed.production_count,
            opened_shift = %new_window.shift_type,
            "Shift boundary crossed"
        );

        Some(ShiftRollover {
            closed,
            opened: new_window,
        })
    }

    fn transition(&mut self, new_state: MachineState, now: NaiveDateTime) -> Transition {
        let from = self.current_state;
        let elapsed = seconds_between(self.state_start_time, now);
        self.accumulation.credit(from, elapsed);

        let cycle_number = match (from, new_state) {
            (MachineState::Loading, MachineState::Running) => {
                self.collaborators.counter.increment();
                let n = self.collaborators.counter.get();
                self.open_cycle = Some(n);
                Some(n)
            }
            (MachineState::Running, _) => self.open_cycle.take(),
            _ => None,
        };

        let observed = self.carried_secs + elapsed;
        self.carried_secs = 0.0;
        let record = self
            .recorder
            .record(&self.current_window, from, observed, now, cycle_number);
        if let Some(ref record) = record {
            if let Err(e) = self.collaborators.gateway.append_cycle(record) {
                warn!(equipment = %self.equipment_id, error = %e, "Failed to persist cycle record");
            }
        }

        let production_count = self.collaborators.counter.get();
        self.accumulation.production_count = production_count;
        self.accumulation.last_updated_at = Some(now);
        self.persist();

        debug!(
            equipment = %self.equipment_id,
            from = %from,
            to = %new_state,
            elapsed_secs = elapsed,
            production = production_count,
            "State transition"
        );

        self.current_state = new_state;
        self.state_start_time = now;

        Transition {
            from,
            to: new_state,
            at: now,
            elapsed_secs: elapsed,
            record,
            production_count,
        }
    }

    /// Latest instant whose state is known
    fn observed_until(&self, now: NaiveDateTime) -> NaiveDateTime {
        self.unread_since.map_or(now, |last_seen| last_seen.min(now))
    }

    /// First good read after failures: commit the current state up to the
    /// last good read and drop the unread interval.
    fn close_read_gap(&mut self, last_seen: NaiveDateTime, now: NaiveDateTime) {
        let credited = seconds_between(self.state_start_time, last_seen);
        let unread = seconds_between(last_seen, now);
        self.accumulation.credit(self.current_state, credited);
        self.carried_secs += credited;
        self.state_start_time = now;
        self.accumulation.last_updated_at = Some(now);
        self.persist();

        info!(
            equipment = %self.equipment_id,
            state = %self.current_state,
            unread_secs = unread,
            "Signal read recovered, unread interval dropped"
        );
    }

    /// Write-through; failures keep the in-memory state and retry on the next write
    fn persist(&self) {
        if let Err(e) = self.collaborators.gateway.upsert(&self.accumulation) {
            warn!(
                equipment = %self.equipment_id,
                backend = self.collaborators.gateway.backend_name(),
                error = %e,
                "Failed to persist accumulation"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::{AcquisitionError, InMemoryCounter, NoAlarmStatus};
    use crate::storage::InMemoryGateway;
    use crate::types::SignalSnapshot;
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::Mutex;

    /// Returns whatever snapshot was last set; `None` fails the read
    struct ScriptedSignals(Mutex<Option<SignalSnapshot>>);

    impl ScriptedSignals {
        fn set(&self, snapshot: Option<SignalSnapshot>) {
            *self.0.lock().unwrap() = snapshot;
        }
    }

    #[async_trait]
    impl SignalSource for ScriptedSignals {
        async fn read_snapshot(&self, id: &str) -> Result<SignalSnapshot, AcquisitionError> {
            (*self.0.lock().unwrap()).ok_or_else(|| AcquisitionError::Transient(id.to_string()))
        }
        fn source_name(&self) -> &str {
            "scripted"
        }
    }

    struct Rig {
        signals: Arc<ScriptedSignals>,
        counter: Arc<InMemoryCounter>,
        gateway: Arc<InMemoryGateway>,
        acc: StateAccumulator,
    }

    fn at(d: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, d)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn rig(start: NaiveDateTime) -> Rig {
        let signals = Arc::new(ScriptedSignals(Mutex::new(Some(SignalSnapshot::default()))));
        let counter = Arc::new(InMemoryCounter::new());
        let gateway = Arc::new(InMemoryGateway::new());
        let collaborators = Collaborators {
            signals: signals.clone(),
            alarms: Arc::new(NoAlarmStatus),
            counter: counter.clone(),
            gateway: gateway.clone(),
        };
        let config = ClassifierConfig {
            loading_m_code: 100,
            dwell: None,
        };
        let acc = StateAccumulator::start("10.0.0.1", config, collaborators, start);
        Rig {
            signals,
            counter,
            gateway,
            acc,
        }
    }

    #[tokio::test]
    async fn idle_to_running_credits_idle() {
        let t0 = at(10, 9, 0, 0);
        let mut r = rig(t0);

        r.signals.set(Some(SignalSnapshot::running()));
        let report = r.acc.tick(t0 + Duration::seconds(50)).await;

        let TickOutcome::Transitioned(tr) = report.outcome else {
            panic!("expected transition");
        };
        assert_eq!(tr.from, MachineState::Idle);
        assert_eq!(tr.to, MachineState::Running);
        assert_eq!(tr.record.unwrap().duration_seconds, 50);
        assert_eq!(r.acc.accumulation().idle_seconds, 50.0);
        assert_eq!(r.acc.accumulation().running_seconds, 0.0);

        let status = r.acc.status(t0 + Duration::seconds(80));
        assert_eq!(status.running_seconds, 30.0);
        assert_eq!(status.in_flight_seconds, 30.0);
    }

    #[tokio::test]
    async fn loading_to_running_counts_production_once() {
        let t0 = at(10, 9, 0, 0);
        let mut r = rig(t0);

        r.signals.set(Some(SignalSnapshot::loading(100)));
        r.acc.tick(t0 + Duration::seconds(10)).await;
        r.signals.set(Some(SignalSnapshot::running()));
        r.acc.tick(t0 + Duration::seconds(30)).await;
        r.acc.tick(t0 + Duration::seconds(31)).await;
        r.signals.set(Some(SignalSnapshot::alarm()));
        r.acc.tick(t0 + Duration::seconds(120)).await;
        r.signals.set(Some(SignalSnapshot::running()));
        r.acc.tick(t0 + Duration::seconds(150)).await;

        assert_eq!(r.counter.get(), 1);
        assert_eq!(r.acc.accumulation().production_count, 1);

        let records = r
            .gateway
            .load_cycles("10.0.0.1", at(10, 0, 0, 0).date(), ShiftType::Day)
            .unwrap();
        let loading = records.iter().find(|c| c.state == MachineState::Loading).unwrap();
        let running = records.iter().find(|c| c.state == MachineState::Running).unwrap();
        assert_eq!(loading.duration_seconds, 20);
        assert_eq!(loading.cycle_number, Some(1));
        assert_eq!(running.duration_seconds, 90);
        assert_eq!(running.cycle_number, Some(1));
    }

    #[tokio::test]
    async fn failed_read_changes_nothing() {
        let t0 = at(10, 9, 0, 0);
        let mut r = rig(t0);

        r.signals.set(None);
        let report = r.acc.tick(t0 + Duration::seconds(20)).await;
        assert_eq!(report.outcome, TickOutcome::SignalUnavailable);
        assert_eq!(r.acc.current_state(), MachineState::Idle);
        assert_eq!(r.acc.state_start_time(), t0);
        assert_eq!(r.acc.accumulation().total_seconds(), 0.0);
    }

    #[tokio::test]
    async fn shutdown_flush_commits_in_flight_time() {
        let t0 = at(10, 9, 0, 0);
        let mut r = rig(t0);
        r.signals.set(Some(SignalSnapshot::running()));
        r.acc.tick(t0 + Duration::seconds(5)).await;

        r.acc.flush_on_shutdown(t0 + Duration::seconds(65)).unwrap();
        let (stored, last) = r
            .gateway
            .load("10.0.0.1", at(10, 0, 0, 0).date(), ShiftType::Day)
            .unwrap()
            .unwrap();
        assert_eq!(stored.idle_seconds, 5.0);
        assert_eq!(stored.running_seconds, 60.0);
        assert_eq!(last, Some(t0 + Duration::seconds(65)));
    }

    #[tokio::test]
    async fn shift_crossing_closes_old_shift_at_boundary() {
        let t0 = at(10, 20, 29, 0);
        let mut r = rig(t0);
        r.signals.set(Some(SignalSnapshot::loading(100)));
        r.acc.tick(t0 + Duration::seconds(10)).await;
        r.signals.set(Some(SignalSnapshot::running()));
        r.acc.tick(t0 + Duration::seconds(30)).await;
        assert_eq!(r.counter.get(), 1);

        let report = r.acc.tick(at(10, 20, 30, 1)).await;
        let rollover = report.rollover.unwrap();
        assert_eq!(rollover.closed.shift_type, ShiftType::Day);
        assert_eq!(rollover.closed.running_seconds, 30.0);
        assert_eq!(rollover.closed.total_seconds(), 60.0);
        assert_eq!(rollover.closed.production_count, 1);
        assert_eq!(rollover.opened.shift_type, ShiftType::Night);

        assert_eq!(r.counter.get(), 0);
        assert_eq!(r.acc.current_state(), MachineState::Running);
        assert_eq!(r.acc.state_start_time(), at(10, 20, 30, 0));
        assert_eq!(r.acc.status(at(10, 20, 30, 1)).running_seconds, 1.0);

        let (night, _) = r
            .gateway
            .load("10.0.0.1", at(10, 0, 0, 0).date(), ShiftType::Night)
            .unwrap()
            .unwrap();
        assert_eq!(night.total_seconds(), 0.0);
    }

    #[tokio::test]
    async fn totals_match_wall_clock() {
        let t0 = at(10, 9, 0, 0);
        let mut r = rig(t0);
        let script = [
            (7, Some(SignalSnapshot::loading(100))),
            (19, Some(SignalSnapshot::running())),
            (45, Some(SignalSnapshot::running())),
            (80, Some(SignalSnapshot::alarm())),
            (95, Some(SignalSnapshot::default())),
            (130, Some(SignalSnapshot::loading(100))),
            (141, Some(SignalSnapshot::running())),
        ];
        for (offset, snapshot) in script {
            r.signals.set(snapshot);
            r.acc.tick(t0 + Duration::seconds(offset)).await;
        }

        let now = t0 + Duration::seconds(200);
        let status = r.acc.status(now);
        let total = status.running_seconds
            + status.loading_seconds
            + status.alarm_seconds
            + status.idle_seconds
            + status.unmeasured_seconds;
        assert!((total - 200.0).abs() < 1.0);
        assert_eq!(status.production_count, 2);
        assert!((r.acc.accumulation().total_seconds() - 141.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn failed_reads_leave_unread_interval_uncredited() {
        let t0 = at(10, 9, 0, 0);
        let mut r = rig(t0);
        let script = [
            (7, Some(SignalSnapshot::loading(100))),
            (19, Some(SignalSnapshot::running())),
            (44, Some(SignalSnapshot::running())),
            (45, None),
            (60, None),
            (80, Some(SignalSnapshot::alarm())),
            (95, Some(SignalSnapshot::default())),
            (130, Some(SignalSnapshot::loading(100))),
            (141, Some(SignalSnapshot::running())),
        ];
        for (offset, snapshot) in script {
            r.signals.set(snapshot);
            r.acc.tick(t0 + Duration::seconds(offset)).await;
        }

        // Running is known from 19 s to the last good read at 44 s; 44-80 s is unread
        assert_eq!(r.acc.accumulation().running_seconds, 25.0);
        assert_eq!(r.acc.accumulation().alarm_seconds, 15.0);
        assert!((r.acc.accumulation().total_seconds() - 105.0).abs() < 1e-9);

        let status = r.acc.status(t0 + Duration::seconds(200));
        let total = status.running_seconds
            + status.loading_seconds
            + status.alarm_seconds
            + status.idle_seconds
            + status.unmeasured_seconds;
        assert!((total - 164.0).abs() < 1e-9, "total {total}");
        assert_eq!(status.production_count, 2);

        let records = r
            .gateway
            .load_cycles("10.0.0.1", at(10, 0, 0, 0).date(), ShiftType::Day)
            .unwrap();
        let first_run = records
            .iter()
            .find(|c| c.state == MachineState::Running && c.cycle_number == Some(1))
            .unwrap();
        assert_eq!(first_run.duration_seconds, 30);
    }

    #[tokio::test]
    async fn status_stops_at_last_good_read_while_reads_fail() {
        let t0 = at(10, 9, 0, 0);
        let mut r = rig(t0);
        r.acc.tick(t0 + Duration::seconds(30)).await;
        r.signals.set(None);
        r.acc.tick(t0 + Duration::seconds(40)).await;

        let status = r.acc.status(t0 + Duration::seconds(90));
        assert_eq!(status.idle_seconds, 30.0);
        assert_eq!(status.in_flight_seconds, 30.0);
    }

    #[tokio::test]
    async fn crossing_after_missed_extension_credits_full_day() {
        let t0 = at(10, 17, 0, 0);
        let mut r = rig(t0);
        assert_eq!(r.acc.current_window().end, at(10, 17, 30, 0));

        r.signals.set(Some(SignalSnapshot::running()));
        r.acc.tick(at(10, 17, 10, 0)).await;
        let report = r.acc.tick(at(10, 20, 31, 0)).await;

        let closed = report.rollover.unwrap().closed;
        assert_eq!(closed.shift_type, ShiftType::Day);
        assert_eq!(closed.idle_seconds, 600.0);
        assert_eq!(closed.running_seconds, 12_000.0);
        assert_eq!(closed.total_seconds(), 12_600.0);
        assert_eq!(r.acc.state_start_time(), at(10, 20, 30, 0));
    }

    #[tokio::test]
    async fn shutdown_flush_after_boundary_splits_shifts() {
        let t0 = at(10, 20, 0, 0);
        let mut r = rig(t0);
        r.signals.set(Some(SignalSnapshot::running()));
        r.acc.tick(at(10, 20, 10, 0)).await;

        r.acc.flush_on_shutdown(at(10, 20, 40, 0)).unwrap();

        let (day, _) = r
            .gateway
            .load("10.0.0.1", at(10, 0, 0, 0).date(), ShiftType::Day)
            .unwrap()
            .unwrap();
        assert_eq!(day.idle_seconds, 600.0);
        assert_eq!(day.running_seconds, 1200.0);

        let (night, last) = r
            .gateway
            .load("10.0.0.1", at(10, 0, 0, 0).date(), ShiftType::Night)
            .unwrap()
            .unwrap();
        assert_eq!(night.running_seconds, 600.0);
        assert_eq!(night.total_seconds(), 600.0);
        assert_eq!(last, Some(at(10, 20, 40, 0)));
    }

    #[test]
    fn debug_output_names_equipment() {
        let r = rig(at(10, 9, 0, 0));
        let out = format!("{:?}", r.acc);
        assert!(out.starts_with("StateAccumulator"));
        assert!(out.contains("10.0.0.1"));
    }
}
