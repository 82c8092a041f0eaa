//! Supervisor: owns the monitor tasks and the registry they share

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::{EquipmentMonitor, EquipmentRegistry, MonitorEvent, MonitorExit, RegistryError};
use crate::accumulator::{Collaborators, GapReconciler, StateAccumulator};
use crate::acquisition::{AlarmSource, InMemoryCounter, SignalSource};
use crate::config::{EquipmentConfig, MonitorConfig};
use crate::shift::Clock;
use crate::storage::PersistenceGateway;

/// Spawns one monitor per equipment and waits for them on shutdown.
///
/// Each monitor gets a child of the supervisor's cancellation token, so a
/// single equipment can be removed without disturbing the others.
pub struct Supervisor {
    registry: Arc<EquipmentRegistry>,
    signals: Arc<dyn SignalSource>,
    alarms: Arc<dyn AlarmSource>,
    gateway: Arc<dyn PersistenceGateway>,
    clock: Arc<dyn Clock>,
    events: mpsc::Sender<MonitorEvent>,
    tick_interval: Duration,
    shutdown_timeout: Duration,
    cancel: CancellationToken,
    children: HashMap<String, CancellationToken>,
    tasks: JoinSet<MonitorExit>,
}

impl Supervisor {
    pub fn new(
        signals: Arc<dyn SignalSource>,
        alarms: Arc<dyn AlarmSource>,
        gateway: Arc<dyn PersistenceGateway>,
        clock: Arc<dyn Clock>,
        events: mpsc::Sender<MonitorEvent>,
        cancel: CancellationToken,
    ) -> Self {
        let monitor = if crate::config::is_initialized() {
            crate::config::get().monitor.clone()
        } else {
            MonitorConfig::default()
        };
        Self {
            registry: Arc::new(EquipmentRegistry::new()),
            signals,
            alarms,
            gateway,
            clock,
            events,
            tick_interval: Duration::from_millis(monitor.tick_interval_ms),
            shutdown_timeout: Duration::from_millis(monitor.shutdown_timeout_ms),
            cancel,
            children: HashMap::new(),
            tasks: JoinSet::new(),
        }
    }

    pub fn with_monitor_config(mut self, monitor: &MonitorConfig) -> Self {
        self.tick_interval = Duration::from_millis(monitor.tick_interval_ms);
        self.shutdown_timeout = Duration::from_millis(monitor.shutdown_timeout_ms);
        self
    }

    /// Shared registry for status readers
    pub fn registry(&self) -> Arc<EquipmentRegistry> {
        Arc::clone(&self.registry)
    }

    /// Reconcile, register and start monitoring one equipment.
    ///
    /// Equipment is added before `run`, which takes the supervisor.
    pub fn add_equipment(&mut self, equipment: &EquipmentConfig) -> Result<(), RegistryError> {
        if self.registry.contains(&equipment.id) {
            return Err(RegistryError::AlreadyRegistered(equipment.id.clone()));
        }

        let now = self.clock.now();
        let reconciled = GapReconciler::reconcile(self.gateway.as_ref(), &equipment.id, now);
        let counter = Arc::new(InMemoryCounter::starting_at(
            reconciled.accumulation.production_count,
        ));
        let collaborators = Collaborators {
            signals: Arc::clone(&self.signals),
            alarms: Arc::clone(&self.alarms),
            counter,
            gateway: Arc::clone(&self.gateway),
        };
        let accumulator = StateAccumulator::new(
            equipment.id.clone(),
            equipment.classifier_config(),
            collaborators,
            reconciled,
            now,
        );
        let shared = self.registry.insert(accumulator)?;

        let child = self.cancel.child_token();
        self.children.insert(equipment.id.clone(), child.clone());

        let monitor = EquipmentMonitor::new(
            equipment.id.clone(),
            shared,
            Arc::clone(&self.clock),
            self.events.clone(),
        )
        .with_tick_interval(self.tick_interval)
        .with_shutdown_timeout(self.shutdown_timeout);
        self.tasks.spawn(monitor.run(child));

        info!(
            equipment = %equipment.id,
            name = %equipment.display_name(),
            source = self.signals.source_name(),
            "[Supervisor] Equipment added"
        );
        Ok(())
    }

    /// Stop monitoring one equipment. Its task flushes before exiting.
    pub fn remove_equipment(&mut self, equipment_id: &str) -> Result<(), RegistryError> {
        self.registry.remove(equipment_id)?;
        if let Some(token) = self.children.remove(equipment_id) {
            token.cancel();
        }
        info!(equipment = %equipment_id, "[Supervisor] Equipment removed");
        Ok(())
    }

    /// Wait for cancellation, then for every monitor to flush and exit.
    ///
    /// A panicking monitor is logged; the others keep running.
    pub async fn run(mut self) -> Vec<MonitorExit> {
        info!(equipment = self.registry.len(), "[Supervisor] All monitors spawned, supervising...");
        let mut exits = Vec::new();

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("[Supervisor] Shutdown signal received");
                    break;
                }
                result = self.tasks.join_next() => {
                    match result {
                        Some(Ok(exit)) => {
                            info!(equipment = %exit.equipment_id, ticks = exit.ticks, "[Supervisor] Monitor completed");
                            exits.push(exit);
                        }
                        Some(Err(e)) => {
                            error!(error = %e, "[Supervisor] Monitor task panicked");
                        }
                        // Every monitor has exited; hold until shutdown
                        None => {
                            self.cancel.cancelled().await;
                            break;
                        }
                    }
                }
            }
        }

        while let Some(result) = self.tasks.join_next().await {
            match result {
                Ok(exit) => exits.push(exit),
                Err(e) => error!(error = %e, "[Supervisor] Monitor task panicked during shutdown"),
            }
        }

        let flushed = exits.iter().filter(|e| e.flushed).count();
        info!(
            monitors = exits.len(),
            flushed,
            "[Supervisor] All monitors stopped"
        );
        exits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::{NoAlarmStatus, SimulatedPlant};
    use crate::shift::SystemClock;
    use crate::storage::InMemoryGateway;

    fn supervisor(cancel: CancellationToken) -> (Supervisor, mpsc::Receiver<MonitorEvent>) {
        let plant = SimulatedPlant::new([("a".to_string(), 100), ("b".to_string(), 100)], Some(7));
        let (tx, rx) = mpsc::channel(64);
        let monitor = MonitorConfig {
            tick_interval_ms: 5,
            event_channel_capacity: 64,
            shutdown_timeout_ms: 500,
        };
        let sup = Supervisor::new(
            Arc::new(plant),
            Arc::new(NoAlarmStatus),
            Arc::new(InMemoryGateway::new()),
            Arc::new(SystemClock),
            tx,
            cancel,
        )
        .with_monitor_config(&monitor);
        (sup, rx)
    }

    #[tokio::test]
    async fn add_remove_and_shutdown() {
        let cancel = CancellationToken::new();
        let (mut sup, _rx) = supervisor(cancel.clone());

        sup.add_equipment(&EquipmentConfig::new("a")).unwrap();
        sup.add_equipment(&EquipmentConfig::new("b")).unwrap();
        assert_eq!(
            sup.add_equipment(&EquipmentConfig::new("a")).unwrap_err(),
            RegistryError::AlreadyRegistered("a".to_string())
        );

        let registry = sup.registry();
        sup.remove_equipment("b").unwrap();
        assert_eq!(registry.ids(), vec!["a"]);

        let handle = tokio::spawn(sup.run());
        tokio::time::sleep(Duration::from_millis(30)).await;
        cancel.cancel();

        let mut exits = handle.await.unwrap();
        exits.sort_by(|x, y| x.equipment_id.cmp(&y.equipment_id));
        assert_eq!(exits.len(), 2);
        assert!(exits.iter().all(|e| e.flushed));
    }

    #[tokio::test]
    async fn run_holds_until_cancel_after_monitors_exit() {
        let cancel = CancellationToken::new();
        let (mut sup, _rx) = supervisor(cancel.clone());
        sup.add_equipment(&EquipmentConfig::new("a")).unwrap();
        sup.remove_equipment("a").unwrap();

        let handle = tokio::spawn(sup.run());
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!handle.is_finished());

        cancel.cancel();
        let exits = handle.await.unwrap();
        assert_eq!(exits.len(), 1);
        assert_eq!(exits[0].equipment_id, "a");
    }
}
