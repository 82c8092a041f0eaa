//! Gap reconciliation at monitor start
//!
//! When monitoring (re)starts mid-shift, the time between the persisted
//! `last_updated_at` and now was not observed. That gap is folded into the
//! shift's `unmeasured_seconds`, bounded to the current shift window, so the
//! per-shift totals still add up to wall-clock time.

use chrono::NaiveDateTime;
use tracing::{info, warn};

use crate::shift::{ShiftClock, ShiftWindow};
use crate::storage::PersistenceGateway;
use crate::types::ShiftAccumulation;

/// What reconciliation found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapOutcome {
    /// No record for the current shift; starting from zero
    Fresh,
    /// Record found but never stamped; loaded as-is
    NoTimestamp,
    /// Record found, stamped at or after `now`
    NoGap,
    /// Gap credited to unmeasured time
    Credited { gap_seconds: i64 },
    /// Stored record belongs to a shift that has ended; starting from zero
    RolledOver,
    /// Store unreachable; starting from zero
    StoreUnavailable,
}

impl GapOutcome {
    /// Whether the accumulation starts from zero and has no stored row yet
    pub fn is_fresh(&self) -> bool {
        matches!(
            self,
            GapOutcome::Fresh | GapOutcome::RolledOver | GapOutcome::StoreUnavailable
        )
    }
}

/// Accumulation and window to resume monitoring with
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub accumulation: ShiftAccumulation,
    pub window: ShiftWindow,
    pub outcome: GapOutcome,
}

pub struct GapReconciler;

impl GapReconciler {
    /// Load the current shift's accumulation and fold in any unobserved gap.
    ///
    /// Never fails: an unreachable store falls back to a zeroed
    /// accumulation. A credited gap is persisted immediately.
    pub fn reconcile(
        gateway: &dyn PersistenceGateway,
        equipment_id: &str,
        now: NaiveDateTime,
    ) -> Reconciled {
        let window = ShiftClock::current_window(now);
        let fresh = || ShiftAccumulation::new(equipment_id, window.shift_date(), window.shift_type);

        let loaded = match gateway.load(equipment_id, window.shift_date(), window.shift_type) {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!(
                    equipment = %equipment_id,
                    error = %e,
                    "Failed to load shift accumulation, starting from zero"
                );
                return Reconciled {
                    accumulation: fresh(),
                    window,
                    outcome: GapOutcome::StoreUnavailable,
                };
            }
        };

        let Some((mut acc, last_updated_at)) = loaded else {
            info!(
                equipment = %equipment_id,
                shift = %window.shift_type,
                date = %window.shift_date(),
                "No stored accumulation for current shift, starting fresh"
            );
            return Reconciled {
                accumulation: fresh(),
                window,
                outcome: GapOutcome::Fresh,
            };
        };

        let record_window = ShiftClock::window_for(acc.shift_date, acc.shift_type);
        if !acc.is_for(window.shift_date(), window.shift_type) || !record_window.contains(now) {
            info!(
                equipment = %equipment_id,
                stored_shift = %acc.shift_type,
                stored_date = %acc.shift_date,
                "Stored accumulation belongs to an ended shift, starting fresh"
            );
            return Reconciled {
                accumulation: fresh(),
                window,
                outcome: GapOutcome::RolledOver,
            };
        }

        let Some(last_updated_at) = last_updated_at else {
            return Reconciled {
                accumulation: acc,
                window,
                outcome: GapOutcome::NoTimestamp,
            };
        };

        let from = last_updated_at.max(window.start);
        let gap_seconds = (now - from).num_seconds();
        if gap_seconds <= 0 {
            return Reconciled {
                accumulation: acc,
                window,
                outcome: GapOutcome::NoGap,
            };
        }

        acc.unmeasured_seconds += gap_seconds as f64;
        acc.last_updated_at = Some(now);
        if let Err(e) = gateway.upsert(&acc) {
            warn!(
                equipment = %equipment_id,
                error = %e,
                "Failed to persist reconciled gap, will retry on next transition"
            );
        }

        info!(
            equipment = %equipment_id,
            gap_seconds,
            since = %last_updated_at,
            "Unobserved gap credited to unmeasured time"
        );

        Reconciled {
            accumulation: acc,
            window,
            outcome: GapOutcome::Credited { gap_seconds },
        }
    }
}
