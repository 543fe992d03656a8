//! Test utilities and mock types for Loess development.
//!
//! Provides mock implementations of core traits ([`FieldReader`],
//! [`FieldWriter`]), collaborator stub propagators, and seeded random
//! catchment generation.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod catchment;
pub mod fixtures;

pub use catchment::CatchmentSample;
pub use fixtures::{ConstPropagator, FailingPropagator, LagPropagator, SeriesPropagator};

use std::collections::HashMap;

use loess_core::{FieldId, FieldReader, FieldWriter};

/// Mock implementation of [`FieldReader`].
///
/// Backed by a `HashMap<FieldId, Vec<f64>>` for flexible test setup.
/// Pre-populate fields with [`set_field`](MockFieldReader::set_field)
/// before passing to code under test.
#[derive(Default)]
pub struct MockFieldReader {
    fields: HashMap<FieldId, Vec<f64>>,
}

impl MockFieldReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a field with data for testing.
    pub fn set_field(&mut self, field: FieldId, data: Vec<f64>) {
        self.fields.insert(field, data);
    }
}

impl FieldReader for MockFieldReader {
    fn read(&self, field: FieldId) -> Option<&[f64]> {
        self.fields.get(&field).map(|v| v.as_slice())
    }
}

/// Mock implementation of [`FieldWriter`].
///
/// Pre-allocate field buffers with [`add_field`](MockFieldWriter::add_field)
/// or [`seed_field`](MockFieldWriter::seed_field), pass to code under
/// test, then inspect with [`get_field`](MockFieldWriter::get_field).
#[derive(Default)]
pub struct MockFieldWriter {
    fields: HashMap<FieldId, Vec<f64>>,
}

impl MockFieldWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-allocate a zeroed field buffer.
    pub fn add_field(&mut self, field: FieldId, size: usize) {
        self.fields.insert(field, vec![0.0; size]);
    }

    /// Pre-allocate a buffer holding `data`, as an incremental write
    /// would be seeded.
    pub fn seed_field(&mut self, field: FieldId, data: Vec<f64>) {
        self.fields.insert(field, data);
    }

    /// Read back the current field data for test assertions.
    pub fn get_field(&self, field: FieldId) -> Option<&[f64]> {
        self.fields.get(&field).map(|v| v.as_slice())
    }
}

impl FieldWriter for MockFieldWriter {
    fn write(&mut self, field: FieldId) -> Option<&mut [f64]> {
        self.fields.get_mut(&field).map(|v| v.as_mut_slice())
    }
}

/// Assert two floats agree to a relative tolerance (absolute near zero).
#[track_caller]
pub fn assert_close(actual: f64, expected: f64, tol: f64) {
    let scale = expected.abs().max(1.0);
    assert!(
        (actual - expected).abs() <= tol * scale,
        "expected {expected}, got {actual} (tol {tol})"
    );
}
