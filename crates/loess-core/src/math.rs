//! Guarded arithmetic shared by every module.

/// `numerator / denominator`, or `0.0` when the denominator is zero.
///
/// The quotient is also replaced by `0.0` when it is not finite, so a
/// denominator that underflows the division cannot leak an infinity
/// into the grid state.
#[inline]
pub fn safe_divide(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    let q = numerator / denominator;
    if q.is_finite() {
        q
    } else {
        0.0
    }
}

/// Clamp small negative noise (and NaN) to zero.
#[inline]
pub fn clamp_non_negative(v: f64) -> f64 {
    if v > 0.0 {
        v
    } else {
        0.0
    }
}
