use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Accumulated timing metrics for the tick pipeline.
#[derive(Default, Clone, Debug, Serialize, Deserialize)]
pub struct SimMetrics {
    pub total_ticks: u64,
    pub total_time: Duration,
    /// Time spent inside the economy step (or waiting on the bridge).
    pub economy_time: Duration,
    /// Orchestrator-side reconciliation (everything after the economy step).
    pub reconcile_time: Duration,
}

impl SimMetrics {
    pub fn tick_avg_ms(&self) -> f64 {
        if self.total_ticks == 0 {
            0.0
        } else {
            self.total_time.as_secs_f64() * 1000.0 / self.total_ticks as f64
        }
    }

    pub fn days_per_second(&self) -> f64 {
        if self.total_time.as_secs_f64() == 0.0 {
            0.0
        } else {
            self.total_ticks as f64 / self.total_time.as_secs_f64()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_avg_with_no_ticks() {
        let metrics = SimMetrics::default();
        assert_eq!(metrics.tick_avg_ms(), 0.0);
        assert_eq!(metrics.days_per_second(), 0.0);
    }
}
