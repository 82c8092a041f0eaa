//! In-process production counter

use std::sync::atomic::{AtomicU32, Ordering};

use super::ProductionCounter;

/// Atomic counter for deployments without a controller-side counter
#[derive(Debug, Default)]
pub struct InMemoryCounter {
    value: AtomicU32,
}

impl InMemoryCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counter starting at `value` (restored from a persisted accumulation)
    pub fn starting_at(value: u32) -> Self {
        Self {
            value: AtomicU32::new(value),
        }
    }
}

impl ProductionCounter for InMemoryCounter {
    fn get(&self) -> u32 {
        self.value.load(Ordering::SeqCst)
    }

    fn increment(&self) {
        self.value.fetch_add(1, Ordering::SeqCst);
    }

    fn reset(&self) {
        self.value.store(0, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_lifecycle() {
        let counter = InMemoryCounter::starting_at(4);
        counter.increment();
        assert_eq!(counter.get(), 5);
        counter.reset();
        assert_eq!(counter.get(), 0);
    }
}
