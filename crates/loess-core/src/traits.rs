//! Core abstraction traits for field access.

use crate::id::FieldId;

/// Read-only access to field data within a simulation step.
///
/// Returns `None` if the field is not readable in the current context.
pub trait FieldReader {
    /// Read the data for a field as a flat f64 slice.
    fn read(&self, field: FieldId) -> Option<&[f64]>;
}

/// Mutable access to field data within a simulation step.
///
/// Returns `None` if the field is not writable in the current context
/// (typically because the propagator did not declare it).
pub trait FieldWriter {
    /// Get a mutable slice for writing field data.
    fn write(&mut self, field: FieldId) -> Option<&mut [f64]>;
}
