//! Post-step conservation checks.
//!
//! Violations are reported and logged, never raised: small residuals are
//! expected from discretization, so the step is kept either way.

use std::fmt;

use loess_core::FieldReader;
use loess_propagators::fields::{
    CHANNEL_SED, CHANNEL_SED_ABSTRACTED, CHANNEL_SED_DEGRADATION, CHANNEL_SED_DEPOSITION,
    CHANNEL_SED_FLUSHED, GROUNDWATER_STORAGE, SOIL_GROUNDWATER_INFLOW, SOIL_GROUNDWATER_OUTFLOW,
    SOIL_STORAGE,
};

use crate::store::{GridStore, StoreSnapshot};

/// Which balance a violation belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BalanceCheck {
    /// Combined soil and groundwater water storage (m).
    SoilGroundwater,
    /// Active channel sediment mass (kg).
    ChannelSediment,
}

impl fmt::Display for BalanceCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SoilGroundwater => write!(f, "soil/groundwater"),
            Self::ChannelSediment => write!(f, "channel sediment"),
        }
    }
}

/// Cells whose residual exceeded the tolerance.
#[derive(Clone, Debug, PartialEq)]
pub struct BalanceViolation {
    /// The failing balance.
    pub check: BalanceCheck,
    /// Number of cells over tolerance.
    pub cells: usize,
    /// Active-cell index with the largest residual.
    pub worst_cell: usize,
    /// Signed residual at `worst_cell`.
    pub magnitude: f64,
}

/// Outcome of the balance checks of one step.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BalanceReport {
    violations: Vec<BalanceViolation>,
}

impl BalanceReport {
    /// Whether every check passed.
    pub fn is_balanced(&self) -> bool {
        self.violations.is_empty()
    }

    /// All violations, in check order.
    pub fn violations(&self) -> &[BalanceViolation] {
        &self.violations
    }

    /// The violation of `check`, if any.
    pub fn violation(&self, check: BalanceCheck) -> Option<&BalanceViolation> {
        self.violations.iter().find(|v| v.check == check)
    }
}

/// `inflow - outflow - (after - before)` per cell.
pub fn soil_groundwater_residuals(
    inflow: &[f64],
    outflow: &[f64],
    before: &[f64],
    after: &[f64],
) -> Vec<f64> {
    inflow
        .iter()
        .zip(outflow)
        .zip(before.iter().zip(after))
        .map(|((i, o), (b, a))| i - o - (a - b))
        .collect()
}

/// `before + degradation - deposition - abstracted - flushed - after` per cell.
pub fn channel_sediment_residuals(
    before: &[f64],
    after: &[f64],
    deposition: &[f64],
    degradation: &[f64],
    abstracted: &[f64],
    flushed: &[f64],
) -> Vec<f64> {
    (0..before.len().min(after.len()))
        .map(|c| {
            let get = |v: &[f64]| v.get(c).copied().unwrap_or(0.0);
            before[c] + get(degradation) - get(deposition) - get(abstracted) - get(flushed)
                - after[c]
        })
        .collect()
}

/// Flag residuals with `|r| > tolerance * max(1, scale)`.
///
/// `scale` makes the tolerance relative for large stores; pass an empty
/// slice for an absolute tolerance.
pub fn find_violation(
    check: BalanceCheck,
    residuals: &[f64],
    scale: &[f64],
    tolerance: f64,
) -> Option<BalanceViolation> {
    let mut violation: Option<BalanceViolation> = None;
    for (cell, &r) in residuals.iter().enumerate() {
        let bound = tolerance * scale.get(cell).map_or(1.0, |s| s.abs().max(1.0));
        // NaN residuals count as violations.
        if r.abs() <= bound {
            continue;
        }
        let v = violation.get_or_insert(BalanceViolation {
            check,
            cells: 0,
            worst_cell: cell,
            magnitude: r,
        });
        v.cells += 1;
        if r.abs() > v.magnitude.abs() || r.is_nan() {
            v.worst_cell = cell;
            v.magnitude = r;
        }
    }
    violation
}

fn storage_sum(reader: &dyn FieldReader) -> Vec<f64> {
    let soil = reader.read(SOIL_STORAGE).unwrap_or(&[]);
    let ground = reader.read(GROUNDWATER_STORAGE).unwrap_or(&[]);
    soil.iter().zip(ground).map(|(s, g)| s + g).collect()
}

/// Run the checks of one step against its start-of-step snapshot.
pub(crate) fn check_step(
    store: &GridStore,
    previous: &StoreSnapshot,
    sediment_routed: bool,
    tolerance: f64,
) -> BalanceReport {
    let mut report = BalanceReport::default();

    let water = soil_groundwater_residuals(
        &store.column(SOIL_GROUNDWATER_INFLOW),
        &store.column(SOIL_GROUNDWATER_OUTFLOW),
        &storage_sum(previous),
        &storage_sum(store),
    );
    report.violations.extend(find_violation(
        BalanceCheck::SoilGroundwater,
        &water,
        &[],
        tolerance,
    ));

    if sediment_routed {
        let before = previous.read(CHANNEL_SED).unwrap_or(&[]).to_vec();
        let degradation = store.column(CHANNEL_SED_DEGRADATION);
        let sediment = channel_sediment_residuals(
            &before,
            &store.column(CHANNEL_SED),
            &store.column(CHANNEL_SED_DEPOSITION),
            &degradation,
            &store.column(CHANNEL_SED_ABSTRACTED),
            &store.column(CHANNEL_SED_FLUSHED),
        );
        let scale: Vec<f64> = before.iter().zip(&degradation).map(|(b, d)| b + d).collect();
        report.violations.extend(find_violation(
            BalanceCheck::ChannelSediment,
            &sediment,
            &scale,
            tolerance,
        ));
    }

    for v in &report.violations {
        log::warn!(
            "{} balance off by {:e} at cell {} ({} cells over tolerance {:e})",
            v.check,
            v.magnitude,
            v.worst_cell,
            v.cells,
            tolerance
        );
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_water_balance_has_zero_residual() {
        let r = soil_groundwater_residuals(&[0.01], &[0.004], &[0.3], &[0.306]);
        assert!(r[0].abs() < 1e-15);
    }

    #[test]
    fn worst_cell_is_largest_magnitude() {
        let v = find_violation(
            BalanceCheck::SoilGroundwater,
            &[0.0, 1e-3, -5e-3, 2e-3],
            &[],
            1e-6,
        )
        .unwrap();
        assert_eq!(v.cells, 3);
        assert_eq!(v.worst_cell, 2);
        assert_eq!(v.magnitude, -5e-3);
    }

    #[test]
    fn within_tolerance_is_balanced() {
        assert!(find_violation(BalanceCheck::SoilGroundwater, &[1e-9, -1e-9], &[], 1e-6).is_none());
    }

    #[test]
    fn scale_relaxes_tolerance_for_large_masses() {
        let residuals = [1e-3];
        assert!(find_violation(BalanceCheck::ChannelSediment, &residuals, &[1e6], 1e-6).is_none());
        assert!(find_violation(BalanceCheck::ChannelSediment, &residuals, &[1.0], 1e-6).is_some());
    }

    #[test]
    fn nan_residual_is_a_violation() {
        let v = find_violation(BalanceCheck::ChannelSediment, &[0.0, f64::NAN], &[], 1e-6).unwrap();
        assert_eq!(v.worst_cell, 1);
    }

    #[test]
    fn sediment_residual_accounts_every_flux() {
        // 500 kg in, 200 deposited, 10 abstracted, 0.72 degraded.
        let r = channel_sediment_residuals(&[500.0], &[290.72], &[200.0], &[0.72], &[10.0], &[0.0]);
        assert!(r[0].abs() < 1e-9);
        let flushed = channel_sediment_residuals(&[80.0], &[0.0], &[0.0], &[0.0], &[0.0], &[80.0]);
        assert_eq!(flushed, vec![0.0]);
    }
}
