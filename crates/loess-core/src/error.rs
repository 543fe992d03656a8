//! Error types for the Loess simulator.
//!
//! Organized by subsystem: domain construction, step (orchestrator) and
//! propagator errors,
//! plus the non-fatal numeric-domain report that modules emit when a
//! cell's value had to be replaced by zero.

use std::error::Error;
use std::fmt;

use smallvec::SmallVec;

use crate::id::FieldId;

/// Errors from the orchestrator during `step()`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepError {
    /// A propagator returned an error; the step was rolled back.
    PropagatorFailed {
        /// Name of the failing propagator.
        name: String,
        /// The underlying propagator error.
        reason: PropagatorError,
    },
    /// An earlier environmental-flow-only step already terminated the run.
    Terminated,
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PropagatorFailed { name, reason } => {
                write!(f, "propagator '{name}' failed: {reason}")
            }
            Self::Terminated => write!(f, "simulation already terminated"),
        }
    }
}

impl Error for StepError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::PropagatorFailed { reason, .. } => Some(reason),
            Self::Terminated => None,
        }
    }
}

/// Errors from constructing a [`Domain`](crate::Domain).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DomainError {
    /// A waterbody cell is not an active cell.
    WaterbodyOutOfRange {
        /// The offending cell index.
        cell: usize,
        /// Number of active cells.
        cell_count: usize,
    },
    /// A waterbody cell was listed more than once.
    DuplicateWaterbody {
        /// The repeated cell index.
        cell: usize,
    },
    /// The routing sub-step count is zero.
    ZeroSubsteps,
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WaterbodyOutOfRange { cell, cell_count } => {
                write!(
                    f,
                    "waterbody cell {cell} out of range for {cell_count} active cells"
                )
            }
            Self::DuplicateWaterbody { cell } => write!(f, "waterbody cell {cell} listed twice"),
            Self::ZeroSubsteps => write!(f, "routing sub-step count must be at least 1"),
        }
    }
}

impl Error for DomainError {}

/// Errors from individual propagator execution.
///
/// Returned by `Propagator::step()` and wrapped in
/// [`StepError::PropagatorFailed`] by the orchestrator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PropagatorError {
    /// The propagator's step function failed.
    ExecutionFailed {
        /// Human-readable description of the failure.
        reason: String,
    },
    /// A non-finite value was written to a field.
    NonFinite {
        /// The field containing the value.
        field_id: FieldId,
        /// Index of the first offending element, if known.
        index: Option<usize>,
    },
    /// A user-defined constraint was violated.
    ConstraintViolation {
        /// Description of the violated constraint.
        constraint: String,
    },
}

impl PropagatorError {
    /// Shorthand for a field the propagator expected to read.
    pub fn unreadable(field: FieldId) -> Self {
        Self::ExecutionFailed {
            reason: format!("field {field} not readable"),
        }
    }

    /// Shorthand for a field the propagator expected to write.
    pub fn unwritable(field: FieldId) -> Self {
        Self::ExecutionFailed {
            reason: format!("field {field} not writable"),
        }
    }
}

impl fmt::Display for PropagatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExecutionFailed { reason } => write!(f, "execution failed: {reason}"),
            Self::NonFinite { field_id, index } => {
                write!(f, "non-finite value in field {field_id}")?;
                if let Some(idx) = index {
                    write!(f, " at element {idx}")?;
                }
                Ok(())
            }
            Self::ConstraintViolation { constraint } => {
                write!(f, "constraint violation: {constraint}")
            }
        }
    }
}

impl Error for PropagatorError {}

/// Cells whose value could not be brought into a valid numeric domain
/// by clamping and was replaced by zero for the current step.
///
/// Only the first few cell indices are kept; `count` is exact.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NumericDomainIssue {
    /// Field the fallback value was written to.
    pub field_id: FieldId,
    /// Leading offending active-cell indices.
    pub cells: SmallVec<[usize; 8]>,
    /// Total number of offending cells.
    pub count: usize,
}

impl NumericDomainIssue {
    /// Maximum number of cell indices retained.
    pub const MAX_CELLS: usize = 8;

    /// Start an empty report for `field_id`.
    pub fn new(field_id: FieldId) -> Self {
        Self {
            field_id,
            cells: SmallVec::new(),
            count: 0,
        }
    }

    /// Record an offending cell.
    pub fn push(&mut self, cell: usize) {
        if self.cells.len() < Self::MAX_CELLS {
            self.cells.push(cell);
        }
        self.count += 1;
    }

    /// Whether any cell was recorded.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

impl fmt::Display for NumericDomainIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cell(s) of field {} fell back to zero (first: {:?})",
            self.count, self.field_id, self.cells
        )
    }
}
