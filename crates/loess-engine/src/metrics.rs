//! Per-step performance metrics.

use crate::stage::Stage;

/// Timing data collected during a single step.
///
/// All durations are in microseconds. The simulation keeps the metrics of
/// the most recent step, whether it completed or was rolled back.
#[derive(Clone, Debug, Default)]
pub struct StepMetrics {
    /// Wall-clock time for the entire step.
    pub total_us: u64,
    /// Per-stage execution times, in the order the stages ran.
    pub stage_us: Vec<(Stage, u64)>,
    /// Per-propagator execution times: `(name, microseconds)`.
    pub propagator_us: Vec<(String, u64)>,
    /// End-of-step storage, evapotranspiration and sediment totals.
    pub aggregation_us: u64,
    /// Mass-balance checks.
    pub balance_us: u64,
    /// Cells that fell back to zero this step.
    pub fallback_cells: usize,
    /// Cumulative number of rolled-back steps.
    pub rollback_events: u64,
}

impl StepMetrics {
    /// Time spent in `stage` this step, if it ran.
    pub fn stage(&self, stage: Stage) -> Option<u64> {
        self.stage_us
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, us)| *us)
    }
}
