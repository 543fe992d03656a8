//! Pipeline validation and write planning.
//!
//! [`validate_pipeline`] runs once at simulation startup to check the
//! ordered propagator list for structural errors and build the
//! [`WritePlan`]: the per-propagator table of declared outputs the
//! orchestrator uses to stage writes each step.

use indexmap::IndexMap;
use loess_core::{FieldId, FieldSet};

use crate::propagator::{Propagator, WriteMode};

use std::error::Error;
use std::fmt;

// ── Write plan ─────────────────────────────────────────────────────

/// Precomputed table mapping each propagator to its declared outputs.
#[derive(Debug)]
#[must_use]
pub struct WritePlan {
    write_modes: Vec<IndexMap<FieldId, WriteMode>>,
}

impl WritePlan {
    /// Number of propagators in the plan.
    pub fn len(&self) -> usize {
        self.write_modes.len()
    }

    /// Whether the plan covers zero propagators.
    pub fn is_empty(&self) -> bool {
        self.write_modes.is_empty()
    }

    /// Look up the write mode for a field in a given propagator's context.
    pub fn write_mode(&self, propagator_index: usize, field: FieldId) -> Option<WriteMode> {
        self.write_modes.get(propagator_index)?.get(&field).copied()
    }

    /// All `(field, mode)` pairs for a propagator's writes, in
    /// declaration order.
    pub fn write_modes_for(
        &self,
        propagator_index: usize,
    ) -> Option<&IndexMap<FieldId, WriteMode>> {
        self.write_modes.get(propagator_index)
    }
}

// ── Errors ─────────────────────────────────────────────────────────

/// A field claimed for full overwrite by two propagators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteConflict {
    /// The contested field.
    pub field: FieldId,
    /// The propagator that runs first.
    pub earlier: String,
    /// The propagator that would discard the earlier result.
    pub later: String,
}

/// Structural problems found when a simulation is assembled.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// The step length is zero, negative or not finite.
    InvalidStepLength {
        /// The rejected dt (s).
        dt: f64,
    },

    /// One or more fields are fully overwritten by two propagators.
    WriteConflict(Vec<WriteConflict>),

    /// A propagator lists the same output twice.
    DuplicateWrite {
        /// The propagator.
        propagator: String,
        /// The repeated field.
        field: FieldId,
    },

    /// A propagator names a field missing from the catalogue.
    UnknownField {
        /// The propagator.
        propagator: String,
        /// The unknown field.
        field: FieldId,
    },

    /// A propagator reported a step ceiling that is not a positive number.
    InvalidMaxDt {
        /// The propagator.
        propagator: String,
        /// The value it reported.
        max_dt: f64,
    },

    /// The step length is longer than a propagator supports.
    StepTooLong {
        /// The configured dt (s).
        dt: f64,
        /// The smallest ceiling in the pipeline (s).
        max_dt: f64,
        /// The propagator reporting it.
        propagator: String,
    },
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidStepLength { dt } => {
                write!(f, "step length must be a positive number of seconds, got {dt}")
            }
            Self::WriteConflict(conflicts) => {
                let described: Vec<String> = conflicts
                    .iter()
                    .map(|c| {
                        format!(
                            "'{}' overwrites field {} from '{}'",
                            c.later, c.field, c.earlier
                        )
                    })
                    .collect();
                write!(f, "conflicting full writes: {}", described.join("; "))
            }
            Self::DuplicateWrite { propagator, field } => {
                write!(f, "'{propagator}' declares field {field} more than once")
            }
            Self::UnknownField { propagator, field } => {
                write!(f, "'{propagator}' uses field {field}, which is not in the catalogue")
            }
            Self::InvalidMaxDt { propagator, max_dt } => {
                write!(f, "'{propagator}' reports a step ceiling of {max_dt}")
            }
            Self::StepTooLong {
                dt,
                max_dt,
                propagator,
            } => write!(
                f,
                "step of {dt} s is longer than the {max_dt} s '{propagator}' supports"
            ),
        }
    }
}

impl Error for PipelineError {}

// ── Validation ─────────────────────────────────────────────────────

fn full_write_conflicts(propagators: &[&dyn Propagator]) -> Vec<WriteConflict> {
    let mut owner: IndexMap<FieldId, &str> = IndexMap::new();
    let mut conflicts = Vec::new();
    for prop in propagators {
        let full = prop
            .writes()
            .into_iter()
            .filter(|&(_, mode)| mode == WriteMode::Full);
        for (field, _) in full {
            if let Some(earlier) = owner.insert(field, prop.name()) {
                conflicts.push(WriteConflict {
                    field,
                    earlier: earlier.to_string(),
                    later: prop.name().to_string(),
                });
            }
        }
    }
    conflicts
}

fn check_declarations(prop: &dyn Propagator, catalogue: &FieldSet) -> Result<(), PipelineError> {
    let mut outputs = FieldSet::empty();
    for (field, _) in prop.writes() {
        if outputs.contains(field) {
            return Err(PipelineError::DuplicateWrite {
                propagator: prop.name().to_string(),
                field,
            });
        }
        outputs.insert(field);
    }
    let used = outputs.union(&prop.reads()).union(&prop.reads_previous());
    let unknown = used.iter().find(|&f| !catalogue.contains(f));
    match unknown {
        Some(field) => Err(PipelineError::UnknownField {
            propagator: prop.name().to_string(),
            field,
        }),
        None => Ok(()),
    }
}

/// The smallest `max_dt` in the pipeline and who reports it.
fn step_ceiling(propagators: &[&dyn Propagator]) -> Result<Option<(f64, String)>, PipelineError> {
    let mut ceiling: Option<(f64, String)> = None;
    for prop in propagators {
        let Some(max_dt) = prop.max_dt() else {
            continue;
        };
        if !(max_dt.is_finite() && max_dt > 0.0) {
            return Err(PipelineError::InvalidMaxDt {
                propagator: prop.name().to_string(),
                max_dt,
            });
        }
        if ceiling.as_ref().is_none_or(|(c, _)| max_dt < *c) {
            ceiling = Some((max_dt, prop.name().to_string()));
        }
    }
    Ok(ceiling)
}

/// Validate the ordered pipeline and build its [`WritePlan`].
///
/// Rejects, in order: a non-positive or non-finite `dt`; fields fully
/// overwritten twice; outputs declared twice by one propagator; fields
/// outside `catalogue`; and a `dt` longer than any propagator's
/// `max_dt`. Incremental writers may share a field.
///
/// An empty pipeline is valid: a run with every optional stage disabled
/// still advances time and aggregates storage.
pub fn validate_pipeline(
    propagators: &[&dyn Propagator],
    catalogue: &FieldSet,
    dt: f64,
) -> Result<WritePlan, PipelineError> {
    if !(dt.is_finite() && dt > 0.0) {
        return Err(PipelineError::InvalidStepLength { dt });
    }

    let conflicts = full_write_conflicts(propagators);
    if !conflicts.is_empty() {
        return Err(PipelineError::WriteConflict(conflicts));
    }

    for prop in propagators {
        check_declarations(*prop, catalogue)?;
    }

    if let Some((max_dt, propagator)) = step_ceiling(propagators)? {
        if dt > max_dt {
            return Err(PipelineError::StepTooLong {
                dt,
                max_dt,
                propagator,
            });
        }
    }

    Ok(WritePlan {
        write_modes: propagators
            .iter()
            .map(|prop| prop.writes().into_iter().collect())
            .collect(),
    })
}
