use atomic_counter::{AtomicCounter, RelaxedCounter};

use std::sync::Arc;

/// Shared counters a driver can poll while a render is running.
#[derive(Clone)]
pub struct ProgressCounters {
    // orbit iterations over every reference
    pub reference: Arc<RelaxedCounter>,
    // finished reference orbits
    pub references: Arc<RelaxedCounter>,
    pub series_approximation: Arc<RelaxedCounter>,
    pub iteration: Arc<RelaxedCounter>,
    pub pixels: Arc<RelaxedCounter>,
    pub glitched: Arc<RelaxedCounter>,
}

impl ProgressCounters {
    pub fn new() -> ProgressCounters {
        ProgressCounters {
            reference: Arc::new(RelaxedCounter::new(0)),
            references: Arc::new(RelaxedCounter::new(0)),
            series_approximation: Arc::new(RelaxedCounter::new(0)),
            iteration: Arc::new(RelaxedCounter::new(0)),
            pixels: Arc::new(RelaxedCounter::new(0)),
            glitched: Arc::new(RelaxedCounter::new(0)),
        }
    }

    // Per pass counters, the reference and series counters run across the whole render
    pub fn reset_pass(&self) {
        self.iteration.reset();
        self.pixels.reset();
        self.glitched.reset();
    }

    pub fn add_iterations(&self, amount: usize) {
        self.iteration.add(amount);
    }

    pub fn total_iterations(&self) -> usize {
        self.iteration.get()
    }
}

impl Default for ProgressCounters {
    fn default() -> Self {
        ProgressCounters::new()
    }
}
