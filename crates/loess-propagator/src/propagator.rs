//! The [`Propagator`] trait and [`WriteMode`] enum.
//!
//! Propagators are the physical-process modules executed in a fixed
//! order each simulated day. They declare field dependencies at
//! registration, enabling the orchestrator to validate the pipeline
//! before the first step.

use crate::context::StepContext;
use loess_core::{FieldId, FieldSet, PropagatorError};

/// Write initialization strategy for a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteMode {
    /// Fresh zeroed buffer. Propagator MUST fill every element.
    ///
    /// At most one propagator per pipeline may write a field in this
    /// mode.
    Full,

    /// Buffer seeded from the current store contents. Propagator
    /// modifies only what it needs to, so several modules may update
    /// the same state in sequence.
    Incremental,
}

/// A physical-process module in the orchestrator's per-day pipeline.
///
/// # Contract
///
/// - `step()` MUST be deterministic: same inputs produce identical outputs.
/// - `&self`: propagators are stateless; mutable state goes through fields.
/// - `reads()` and `writes()` are called once at startup, not per step.
///
/// # Examples
///
/// A collaborator stub that reports a fixed channel travel time:
///
/// ```
/// use loess_propagator::{Propagator, StepContext, WriteMode};
/// use loess_core::{FieldId, FieldSet, PropagatorError};
///
/// struct FixedTravelTime {
///     field: FieldId,
///     seconds: f64,
/// }
///
/// impl Propagator for FixedTravelTime {
///     fn name(&self) -> &str { "fixed_travel_time" }
///
///     fn reads(&self) -> FieldSet { FieldSet::empty() }
///
///     fn writes(&self) -> Vec<(FieldId, WriteMode)> {
///         vec![(self.field, WriteMode::Full)]
///     }
///
///     fn step(&self, ctx: &mut StepContext<'_>) -> Result<(), PropagatorError> {
///         let buf = ctx
///             .writes()
///             .write(self.field)
///             .ok_or(PropagatorError::unwritable(self.field))?;
///         buf.fill(self.seconds);
///         Ok(())
///     }
/// }
///
/// let prop = FixedTravelTime { field: FieldId(0), seconds: 7200.0 };
/// assert_eq!(prop.name(), "fixed_travel_time");
/// ```
pub trait Propagator: Send + 'static {
    /// Human-readable name for error reporting and telemetry.
    fn name(&self) -> &str;

    /// Fields this propagator reads from the live store.
    ///
    /// Reading through `ctx.reads()` sees values committed by earlier
    /// propagators in the current step.
    fn reads(&self) -> FieldSet;

    /// Fields this propagator reads from the frozen step-start view.
    ///
    /// Reading through `ctx.reads_previous()` always sees the state at
    /// the start of the day regardless of earlier writes.
    ///
    /// Default: empty set.
    fn reads_previous(&self) -> FieldSet {
        FieldSet::empty()
    }

    /// Fields this propagator writes, with their initialization mode.
    fn writes(&self) -> Vec<(FieldId, WriteMode)>;

    /// Largest timestep, in seconds, this module's formulation supports.
    ///
    /// Return `None` to impose no constraint.
    fn max_dt(&self) -> Option<f64> {
        None
    }

    /// Execute the propagator for one simulated day.
    fn step(&self, ctx: &mut StepContext<'_>) -> Result<(), PropagatorError>;
}
