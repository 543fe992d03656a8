//! Reusable propagator test fixtures.
//!
//! These stand in for the external collaborators (soil, routing,
//! waterbody hydraulics) that supply the sediment core with its inputs:
//!
//! - [`ConstPropagator`]: writes a constant value every step.
//! - [`SeriesPropagator`]: writes a prescribed vector, one per step,
//!   repeating the last one once the series is exhausted.
//! - [`LagPropagator`]: copies a field's step-start value into another.
//! - [`FailingPropagator`]: fails deterministically after N calls.

use loess_core::{FieldId, FieldSet, PropagatorError};
use loess_propagator::context::StepContext;
use loess_propagator::propagator::{Propagator, WriteMode};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Writes a constant value to every element (Full write mode, no reads).
pub struct ConstPropagator {
    pub name: String,
    pub output: FieldId,
    pub value: f64,
}

impl ConstPropagator {
    pub fn new(name: impl Into<String>, output: FieldId, value: f64) -> Self {
        Self {
            name: name.into(),
            output,
            value,
        }
    }
}

impl Propagator for ConstPropagator {
    fn name(&self) -> &str {
        &self.name
    }

    fn reads(&self) -> FieldSet {
        FieldSet::empty()
    }

    fn writes(&self) -> Vec<(FieldId, WriteMode)> {
        vec![(self.output, WriteMode::Full)]
    }

    fn step(&self, ctx: &mut StepContext<'_>) -> Result<(), PropagatorError> {
        let output = ctx
            .writes()
            .write(self.output)
            .ok_or(PropagatorError::unwritable(self.output))?;
        output.fill(self.value);
        Ok(())
    }
}

/// Writes `series[n]` on its n-th call, then repeats the last entry.
///
/// Uses `AtomicUsize` for the call counter so it satisfies `Send`.
pub struct SeriesPropagator {
    pub name: String,
    pub output: FieldId,
    pub mode: WriteMode,
    /// Largest supported step, if any.
    pub max_dt: Option<f64>,
    series: Vec<Vec<f64>>,
    call_count: AtomicUsize,
}

impl SeriesPropagator {
    pub fn new(name: impl Into<String>, output: FieldId, series: Vec<Vec<f64>>) -> Self {
        Self {
            name: name.into(),
            output,
            mode: WriteMode::Full,
            max_dt: None,
            series,
            call_count: AtomicUsize::new(0),
        }
    }

    /// A single vector written every step.
    pub fn fixed(name: impl Into<String>, output: FieldId, values: Vec<f64>) -> Self {
        Self::new(name, output, vec![values])
    }

    /// Declare the output as an incremental write, for collaborators that
    /// overwrite state another module also updates.
    pub fn incremental(mut self) -> Self {
        self.mode = WriteMode::Incremental;
        self
    }

    /// Declare the longest step, in seconds, the collaborator supports.
    pub fn with_max_dt(mut self, seconds: f64) -> Self {
        self.max_dt = Some(seconds);
        self
    }
}

impl Propagator for SeriesPropagator {
    fn name(&self) -> &str {
        &self.name
    }

    fn reads(&self) -> FieldSet {
        FieldSet::empty()
    }

    fn writes(&self) -> Vec<(FieldId, WriteMode)> {
        vec![(self.output, self.mode)]
    }

    fn max_dt(&self) -> Option<f64> {
        self.max_dt
    }

    fn step(&self, ctx: &mut StepContext<'_>) -> Result<(), PropagatorError> {
        let n = self.call_count.fetch_add(1, Ordering::Relaxed);
        let Some(values) = self.series.get(n).or_else(|| self.series.last()) else {
            return Ok(());
        };
        let output = ctx
            .writes()
            .write(self.output)
            .ok_or(PropagatorError::unwritable(self.output))?;
        if output.len() != values.len() {
            return Err(PropagatorError::ExecutionFailed {
                reason: format!(
                    "series entry has {} elements, field {} has {}",
                    values.len(),
                    self.output,
                    output.len()
                ),
            });
        }
        output.copy_from_slice(values);
        Ok(())
    }
}

/// Writes the step-start value of `input` to `output` (Full write mode).
///
/// Stands in for a collaborator that works from the previous day's state,
/// such as routing that starts from yesterday's channel storage.
pub struct LagPropagator {
    pub name: String,
    pub input: FieldId,
    pub output: FieldId,
}

impl LagPropagator {
    pub fn new(name: impl Into<String>, input: FieldId, output: FieldId) -> Self {
        Self {
            name: name.into(),
            input,
            output,
        }
    }
}

impl Propagator for LagPropagator {
    fn name(&self) -> &str {
        &self.name
    }

    fn reads(&self) -> FieldSet {
        FieldSet::empty()
    }

    fn reads_previous(&self) -> FieldSet {
        [self.input].into_iter().collect()
    }

    fn writes(&self) -> Vec<(FieldId, WriteMode)> {
        vec![(self.output, WriteMode::Full)]
    }

    fn step(&self, ctx: &mut StepContext<'_>) -> Result<(), PropagatorError> {
        let values = ctx
            .reads_previous()
            .read(self.input)
            .ok_or(PropagatorError::unreadable(self.input))?
            .to_vec();
        let output = ctx
            .writes()
            .write(self.output)
            .ok_or(PropagatorError::unwritable(self.output))?;
        if output.len() != values.len() {
            return Err(PropagatorError::ExecutionFailed {
                reason: format!(
                    "field {} has {} elements, field {} has {}",
                    self.input,
                    values.len(),
                    self.output,
                    output.len()
                ),
            });
        }
        output.copy_from_slice(&values);
        Ok(())
    }
}

/// Fails deterministically after a configurable number of successful calls.
///
/// Useful for testing step rollback and error propagation.
pub struct FailingPropagator {
    pub name: String,
    pub output: FieldId,
    pub succeed_count: usize,
    call_count: AtomicUsize,
}

impl FailingPropagator {
    /// Create a propagator that succeeds `succeed_count` times then fails.
    pub fn new(name: impl Into<String>, output: FieldId, succeed_count: usize) -> Self {
        Self {
            name: name.into(),
            output,
            succeed_count,
            call_count: AtomicUsize::new(0),
        }
    }
}

impl Propagator for FailingPropagator {
    fn name(&self) -> &str {
        &self.name
    }

    fn reads(&self) -> FieldSet {
        FieldSet::empty()
    }

    fn writes(&self) -> Vec<(FieldId, WriteMode)> {
        vec![(self.output, WriteMode::Incremental)]
    }

    fn step(&self, ctx: &mut StepContext<'_>) -> Result<(), PropagatorError> {
        let n = self.call_count.fetch_add(1, Ordering::Relaxed);
        // Write before failing so rollback has something to discard.
        if let Some(output) = ctx.writes().write(self.output) {
            output.fill(n as f64 + 1.0);
        }
        if n >= self.succeed_count {
            return Err(PropagatorError::ExecutionFailed {
                reason: format!(
                    "deliberate failure after {} successful calls",
                    self.succeed_count
                ),
            });
        }
        Ok(())
    }
}
