//! Execution context passed to propagators during a step.
//!
//! [`StepContext`] provides split-borrow field access through two read
//! views (live store and frozen step-start) plus mutable write access to
//! the propagator's declared outputs, the domain shape, and the
//! diagnostics sink.

use crate::diagnostics::StepDiagnostics;
use loess_core::{Domain, FieldReader, FieldWriter, NumericDomainIssue, StepId};

/// Execution context passed to each propagator's `step()` method.
///
/// Uses dynamic dispatch (`&dyn FieldReader`, `&mut dyn FieldWriter`) to
/// keep the [`Propagator`](crate::Propagator) trait object-safe while
/// supporting mock-based testing.
///
/// # Split-borrow semantics
///
/// - **`reads()`** is the live store: it includes every write committed
///   by earlier propagators in this step.
/// - **`reads_previous()`** is the frozen step-start view, used for
///   conservation audits against the pre-step state.
/// - **`writes()`** is a staging area holding only the propagator's
///   declared outputs; it is committed to the store when `step()`
///   returns `Ok`.
pub struct StepContext<'a> {
    reads: &'a dyn FieldReader,
    reads_previous: &'a dyn FieldReader,
    writes: &'a mut dyn FieldWriter,
    domain: &'a Domain,
    diagnostics: &'a mut StepDiagnostics,
    propagator: &'a str,
    step_id: StepId,
    dt: f64,
}

impl<'a> StepContext<'a> {
    /// Construct a new step context.
    ///
    /// Typically called by the orchestrator, not by propagators directly.
    /// For testing, construct with mock readers/writers from
    /// `loess-test-utils`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        reads: &'a dyn FieldReader,
        reads_previous: &'a dyn FieldReader,
        writes: &'a mut dyn FieldWriter,
        domain: &'a Domain,
        diagnostics: &'a mut StepDiagnostics,
        propagator: &'a str,
        step_id: StepId,
        dt: f64,
    ) -> Self {
        Self {
            reads,
            reads_previous,
            writes,
            domain,
            diagnostics,
            propagator,
            step_id,
            dt,
        }
    }

    /// Live store reader.
    pub fn reads(&self) -> &dyn FieldReader {
        self.reads
    }

    /// Frozen step-start reader.
    pub fn reads_previous(&self) -> &dyn FieldReader {
        self.reads_previous
    }

    /// Mutable writer for the current propagator's declared outputs.
    pub fn writes(&mut self) -> &mut dyn FieldWriter {
        self.writes
    }

    /// Shape of the compressed grid.
    pub fn domain(&self) -> &Domain {
        self.domain
    }

    /// Record cells that fell back to zero.
    pub fn report(&mut self, issue: NumericDomainIssue) {
        self.diagnostics.push(self.propagator, issue);
    }

    /// The step being computed.
    pub fn step_id(&self) -> StepId {
        self.step_id
    }

    /// Timestep length in seconds.
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Timestep length in days.
    pub fn dt_days(&self) -> f64 {
        self.dt / 86_400.0
    }
}
