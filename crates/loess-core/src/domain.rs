//! The compressed simulation domain.
//!
//! A [`Domain`] describes the shape every grid field is laid out over:
//! the number of active cells, the subset of active cells that carry a
//! lake or reservoir, and the number of in-channel routing sub-steps per
//! simulated day. Inactive (out-of-catchment) cells are never stored.

use crate::error::DomainError;

/// Shape of the active, compressed grid.
///
/// Waterbody-scoped fields are indexed by position in
/// [`waterbody_cells()`](Domain::waterbody_cells), not by active-cell
/// index. [`compress()`](Domain::compress) and
/// [`expand()`](Domain::expand) convert between the two.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Domain {
    cell_count: usize,
    waterbody_cells: Vec<usize>,
    substeps: u32,
}

impl Domain {
    /// A domain of `cell_count` active cells with no waterbodies and a
    /// single routing sub-step.
    pub fn new(cell_count: usize) -> Self {
        Self {
            cell_count,
            waterbody_cells: Vec::new(),
            substeps: 1,
        }
    }

    /// Register the active cells that hold a lake or reservoir.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::WaterbodyOutOfRange`] or
    /// [`DomainError::DuplicateWaterbody`]; the smallest offending index
    /// is reported.
    pub fn with_waterbodies(mut self, mut cells: Vec<usize>) -> Result<Self, DomainError> {
        cells.sort_unstable();
        if let Some(&cell) = cells.iter().find(|&&c| c >= self.cell_count) {
            return Err(DomainError::WaterbodyOutOfRange {
                cell,
                cell_count: self.cell_count,
            });
        }
        if let Some(pair) = cells.windows(2).find(|w| w[0] == w[1]) {
            return Err(DomainError::DuplicateWaterbody { cell: pair[0] });
        }
        self.waterbody_cells = cells;
        Ok(self)
    }

    /// Set the number of in-channel routing sub-steps per day.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::ZeroSubsteps`] if `substeps` is zero.
    pub fn with_substeps(mut self, substeps: u32) -> Result<Self, DomainError> {
        if substeps == 0 {
            return Err(DomainError::ZeroSubsteps);
        }
        self.substeps = substeps;
        Ok(self)
    }

    /// Number of active cells.
    pub fn cell_count(&self) -> usize {
        self.cell_count
    }

    /// Number of waterbody-bearing cells.
    pub fn waterbody_count(&self) -> usize {
        self.waterbody_cells.len()
    }

    /// Active-cell indices of the waterbody-bearing cells, ascending.
    pub fn waterbody_cells(&self) -> &[usize] {
        &self.waterbody_cells
    }

    /// Number of routing sub-steps per simulated day.
    pub fn substeps(&self) -> u32 {
        self.substeps
    }

    /// Select the waterbody-bearing cells out of a per-cell field.
    pub fn compress(&self, cell_values: &[f64]) -> Vec<f64> {
        self.waterbody_cells
            .iter()
            .map(|&c| cell_values.get(c).copied().unwrap_or(0.0))
            .collect()
    }

    /// Scatter a waterbody-scoped field back onto all active cells,
    /// filling non-waterbody cells with zero.
    pub fn expand(&self, waterbody_values: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; self.cell_count];
        for (&c, &v) in self.waterbody_cells.iter().zip(waterbody_values) {
            out[c] = v;
        }
        out
    }
}
