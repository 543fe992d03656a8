//! Shared read/write helpers for propagator step functions.

use loess_core::{FieldId, NumericDomainIssue, PropagatorError};
use loess_propagator::StepContext;

/// Copy a field out of the live store.
///
/// The copy releases the context borrow so outputs can be written.
pub(crate) fn read(ctx: &StepContext<'_>, field: FieldId) -> Result<Vec<f64>, PropagatorError> {
    ctx.reads()
        .read(field)
        .map(<[f64]>::to_vec)
        .ok_or(PropagatorError::unreadable(field))
}

/// Overwrite a staged output with `values`.
pub(crate) fn write(
    ctx: &mut StepContext<'_>,
    field: FieldId,
    values: &[f64],
) -> Result<(), PropagatorError> {
    let out = ctx
        .writes()
        .write(field)
        .ok_or(PropagatorError::unwritable(field))?;
    if out.len() != values.len() {
        return Err(PropagatorError::ExecutionFailed {
            reason: format!(
                "field {field} holds {} values, computed {}",
                out.len(),
                values.len()
            ),
        });
    }
    out.copy_from_slice(values);
    Ok(())
}

/// Fail unless `data` holds exactly `expected` values.
pub(crate) fn expect_len(
    field: FieldId,
    data: &[f64],
    expected: usize,
) -> Result<(), PropagatorError> {
    if data.len() == expected {
        Ok(())
    } else {
        Err(PropagatorError::ExecutionFailed {
            reason: format!(
                "field {field} holds {} values, expected {expected}",
                data.len()
            ),
        })
    }
}

/// Forward a non-empty issue to the step diagnostics.
pub(crate) fn report(ctx: &mut StepContext<'_>, issue: NumericDomainIssue) {
    if !issue.is_empty() {
        ctx.report(issue);
    }
}
