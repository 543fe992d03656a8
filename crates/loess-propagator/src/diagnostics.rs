//! Per-step diagnostics collected from propagators.
//!
//! Numeric-domain fallbacks are not errors: the affected cells take a
//! zero value for the step and the simulation continues. Propagators
//! record them here through [`StepContext::report`](crate::StepContext::report)
//! and the orchestrator surfaces them in its step report.

use loess_core::NumericDomainIssue;

/// A numeric-domain issue tagged with the propagator that raised it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DomainReport {
    /// Name of the reporting propagator.
    pub propagator: String,
    /// The offending cells.
    pub issue: NumericDomainIssue,
}

/// Diagnostics accumulated over one step.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StepDiagnostics {
    reports: Vec<DomainReport>,
}

impl StepDiagnostics {
    /// Create an empty diagnostics sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an issue. Empty issues are dropped.
    pub fn push(&mut self, propagator: &str, issue: NumericDomainIssue) {
        if issue.is_empty() {
            return;
        }
        self.reports.push(DomainReport {
            propagator: propagator.to_string(),
            issue,
        });
    }

    /// All recorded reports, in the order they were raised.
    pub fn reports(&self) -> &[DomainReport] {
        &self.reports
    }

    /// Total number of cells that fell back to zero this step.
    pub fn fallback_cells(&self) -> usize {
        self.reports.iter().map(|r| r.issue.count).sum()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}
