//! The landcover-fraction dimension.
//!
//! Fractional fields store one value per landcover class for every
//! active cell, cell-major: forest, grassland, irrigated paddy and
//! irrigated non-paddy. Whole-cell totals are obtained with
//! [`area_weighted_sum`], using the cell's landcover area weights.

/// Number of landcover classes carried by fractional fields.
pub const N_LANDCOVER: usize = 4;

/// One value per landcover class, in storage order.
pub type PerLandCover = [f64; N_LANDCOVER];

/// `Σ_f weights[f] * values[f]`.
///
/// Weights are the landcover area fractions of a cell; they sum to at
/// most one, the remainder being landcover that takes no part in runoff
/// erosion (sealed surfaces, open water).
pub fn area_weighted_sum(weights: &PerLandCover, values: &PerLandCover) -> f64 {
    weights.iter().zip(values).map(|(w, v)| w * v).sum()
}

/// Read the landcover row of `cell` from a fractional field.
///
/// # Panics
///
/// Panics if `cell` is outside the field.
pub fn row(data: &[f64], cell: usize) -> PerLandCover {
    let start = cell * N_LANDCOVER;
    let mut out = [0.0; N_LANDCOVER];
    out.copy_from_slice(&data[start..start + N_LANDCOVER]);
    out
}
