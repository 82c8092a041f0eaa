//! Per-equipment monitor task

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{MonitorEvent, SharedAccumulator, SkipReason};
use crate::accumulator::TickOutcome;
use crate::shift::Clock;

/// Counters reported when a monitor task exits
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorExit {
    pub equipment_id: String,
    pub ticks: u64,
    pub transitions: u64,
    pub skipped: u64,
    /// Whether the in-flight interval was committed before exit
    pub flushed: bool,
}

/// Drives one accumulator on a fixed interval until cancelled
pub struct EquipmentMonitor {
    equipment_id: String,
    accumulator: SharedAccumulator,
    clock: Arc<dyn Clock>,
    events: mpsc::Sender<MonitorEvent>,
    tick_interval: Duration,
    shutdown_timeout: Duration,
}

impl EquipmentMonitor {
    pub fn new(
        equipment_id: impl Into<String>,
        accumulator: SharedAccumulator,
        clock: Arc<dyn Clock>,
        events: mpsc::Sender<MonitorEvent>,
    ) -> Self {
        Self {
            equipment_id: equipment_id.into(),
            accumulator,
            clock,
            events,
            tick_interval: Duration::from_millis(crate::config::defaults::DEFAULT_TICK_INTERVAL_MS),
            shutdown_timeout: Duration::from_millis(
                crate::config::defaults::DEFAULT_SHUTDOWN_TIMEOUT_MS,
            ),
        }
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Tick until `cancel` fires, then flush.
    pub async fn run(self, cancel: CancellationToken) -> MonitorExit {
        let mut exit = MonitorExit {
            equipment_id: self.equipment_id.clone(),
            ..Default::default()
        };

        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            equipment = %self.equipment_id,
            interval_ms = self.tick_interval.as_millis() as u64,
            "[Monitor] Task starting"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(equipment = %self.equipment_id, ticks = exit.ticks, "[Monitor] Shutdown signal received");
                    break;
                }
                _ = interval.tick() => {
                    exit.ticks += 1;
                    match self.tick_once().await {
                        TickResult::Transitioned => exit.transitions += 1,
                        TickResult::Skipped => exit.skipped += 1,
                        TickResult::Unchanged => {}
                    }
                }
            }
        }

        exit.flushed = self.flush().await;
        exit
    }

    /// One tick: skip if the accumulator is held elsewhere, otherwise advance it.
    pub async fn tick_once(&self) -> TickResult {
        let now = self.clock.now();
        let Ok(mut accumulator) = self.accumulator.try_lock() else {
            warn!(equipment = %self.equipment_id, "Previous tick still in progress, skipping");
            self.publish(MonitorEvent::TickSkipped {
                equipment_id: self.equipment_id.clone(),
                at: now,
                reason: SkipReason::Busy,
            });
            return TickResult::Skipped;
        };

        let report = accumulator.tick(now).await;
        drop(accumulator);

        if let Some(rollover) = report.rollover {
            self.publish(MonitorEvent::from_rollover(&self.equipment_id, rollover));
        }

        match report.outcome {
            TickOutcome::Unchanged(_) => TickResult::Unchanged,
            TickOutcome::Transitioned(transition) => {
                self.publish(MonitorEvent::from_transition(&self.equipment_id, transition));
                TickResult::Transitioned
            }
            TickOutcome::SignalUnavailable => {
                self.publish(MonitorEvent::TickSkipped {
                    equipment_id: self.equipment_id.clone(),
                    at: now,
                    reason: SkipReason::SignalUnavailable,
                });
                TickResult::Skipped
            }
        }
    }

    /// Commit in-flight time, bounded by the shutdown timeout
    async fn flush(&self) -> bool {
        let flushed = tokio::time::timeout(self.shutdown_timeout, async {
            let mut accumulator = self.accumulator.lock().await;
            accumulator.flush_on_shutdown(self.clock.now())
        })
        .await;

        match flushed {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(equipment = %self.equipment_id, error = %e, "[Monitor] Shutdown flush failed");
                false
            }
            Err(_) => {
                warn!(
                    equipment = %self.equipment_id,
                    timeout_ms = self.shutdown_timeout.as_millis() as u64,
                    "[Monitor] Shutdown flush timed out"
                );
                false
            }
        }
    }

    fn publish(&self, event: MonitorEvent) {
        if let Err(e) = self.events.try_send(event) {
            debug!(equipment = %self.equipment_id, error = %e, "Monitor event dropped");
        }
    }
}

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickResult {
    Unchanged,
    Transitioned,
    Skipped,
}
