//! MUSLE sediment yield.
//!
//! The Modified Universal Soil Loss Equation drives hillslope sediment
//! yield by runoff volume and peak rate:
//!
//! ```text
//! yield = a * (runoff_mm * qpeak * area)^b * K * C * LS * CFRG
//! ```
//!
//! in units of 1000 kg per day per cell fraction. Whole-cell totals are
//! landcover-weighted sums over the fractions, driven by the
//! [`LANDCOVER_SUMS`] table.

use loess_core::landcover::row;
use loess_core::{
    area_weighted_sum, clamp_non_negative, safe_divide, FieldId, FieldSet, NumericDomainIssue,
    PropagatorError, N_LANDCOVER,
};
use loess_propagator::{Propagator, StepContext, WriteMode};

use crate::field_io;
use crate::fields::{
    CELL_AREA, CHANNEL_TOC, COARSE_FRAGMENT_FACTOR, C_FACTOR, DIRECT_RUNOFF_MM, K_FACTOR,
    LANDCOVER_FRACTION, LS_FACTOR, OVERLAND_TOC, PEAK_RUNOFF, RUNOFF_RATE, SEDIMENT_YIELD,
    SEDIMENT_YIELD_TON_HA, SOIL_DEPTH_TOP, SOIL_LOSS_DEPTH, SUM_CHANNEL_TOC,
    SUM_DIRECT_RUNOFF_MM, SUM_OVERLAND_TOC, SUM_PEAK_RUNOFF, SUM_RUNOFF_RATE,
    SUM_SEDIMENT_YIELD, SUM_SOIL_LOSS_DEPTH, SUM_TIME_OF_CONCENTRATION, TIME_OF_CONCENTRATION,
};

/// `(per-landcover source, whole-cell sum)` pairs reduced every step.
pub const LANDCOVER_SUMS: &[(FieldId, FieldId)] = &[
    (SEDIMENT_YIELD, SUM_SEDIMENT_YIELD),
    (PEAK_RUNOFF, SUM_PEAK_RUNOFF),
    (TIME_OF_CONCENTRATION, SUM_TIME_OF_CONCENTRATION),
    (SOIL_LOSS_DEPTH, SUM_SOIL_LOSS_DEPTH),
    (RUNOFF_RATE, SUM_RUNOFF_RATE),
    (OVERLAND_TOC, SUM_OVERLAND_TOC),
    (CHANNEL_TOC, SUM_CHANNEL_TOC),
    (DIRECT_RUNOFF_MM, SUM_DIRECT_RUNOFF_MM),
];

/// m2 per hectare.
const M2_PER_HA: f64 = 1.0e4;

/// Calibration coefficient and exponent of the yield power law.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct YieldCoefficients {
    /// Coefficient `a`.
    pub a: f64,
    /// Exponent `b`.
    pub b: f64,
}

impl Default for YieldCoefficients {
    fn default() -> Self {
        Self { a: 11.8, b: 0.56 }
    }
}

/// Static erosion factors of one cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ErosionFactors {
    /// Soil erodibility K.
    pub k: f64,
    /// Cover and management C.
    pub c: f64,
    /// Topographic LS.
    pub ls: f64,
    /// Coarse-fragment correction.
    pub cfrg: f64,
}

impl ErosionFactors {
    fn product(&self) -> f64 {
        self.k * self.c * self.ls * self.cfrg
    }

    fn any_negative(&self) -> bool {
        [self.k, self.c, self.ls, self.cfrg].iter().any(|&v| v < 0.0)
    }
}

/// MUSLE yield of one cell fraction (1000 kg/day).
///
/// Runoff depth and peak rate are clamped to zero first, so zero runoff
/// yields exactly zero. Returns `None` if the power-law base is still
/// negative (negative cell area), any erosion factor is negative, or the
/// result is not finite.
pub fn sediment_yield(
    coefficients: &YieldCoefficients,
    runoff_mm: f64,
    qpeak: f64,
    cell_area: f64,
    factors: &ErosionFactors,
) -> Option<f64> {
    let base = clamp_non_negative(runoff_mm) * clamp_non_negative(qpeak) * cell_area;
    if base < 0.0 || factors.any_negative() {
        return None;
    }
    let y = coefficients.a * base.powf(coefficients.b) * factors.product();
    y.is_finite().then_some(y)
}

/// Soil loss depth implied by a fraction's yield: `yield * depth / area`.
pub fn soil_loss_depth(yield_: f64, soil_depth_top: f64, cell_area: f64) -> f64 {
    safe_divide(yield_ * soil_depth_top, cell_area)
}

/// Whole-cell yield per hectare.
pub fn yield_per_hectare(sum_yield: f64, cell_area: f64) -> f64 {
    safe_divide(sum_yield, cell_area / M2_PER_HA)
}

/// Computes MUSLE sediment yield, soil loss depth, the landcover sums and
/// yield per hectare.
///
/// Must run after [`TimeOfConcentration`](crate::TimeOfConcentration).
#[derive(Debug)]
pub struct SedimentYield {
    coefficients: YieldCoefficients,
}

impl SedimentYield {
    /// Create the yield model.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `a` is negative or `b` is not positive, or either
    /// is not finite.
    pub fn new(coefficients: YieldCoefficients) -> Result<Self, String> {
        let YieldCoefficients { a, b } = coefficients;
        if !a.is_finite() || a < 0.0 {
            return Err(format!("yield coefficient a must be finite and >= 0, got {a}"));
        }
        if !b.is_finite() || b <= 0.0 {
            return Err(format!("yield exponent b must be finite and > 0, got {b}"));
        }
        Ok(Self { coefficients })
    }

    /// The yield power-law constants.
    pub fn coefficients(&self) -> YieldCoefficients {
        self.coefficients
    }
}

impl Propagator for SedimentYield {
    fn name(&self) -> &str {
        "SedimentYield"
    }

    fn reads(&self) -> FieldSet {
        let mut set: FieldSet = [
            DIRECT_RUNOFF_MM,
            PEAK_RUNOFF,
            CELL_AREA,
            K_FACTOR,
            C_FACTOR,
            LS_FACTOR,
            COARSE_FRAGMENT_FACTOR,
            SOIL_DEPTH_TOP,
            LANDCOVER_FRACTION,
        ]
        .into_iter()
        .collect();
        for &(source, _) in LANDCOVER_SUMS {
            if source != SEDIMENT_YIELD && source != SOIL_LOSS_DEPTH {
                set.insert(source);
            }
        }
        set
    }

    fn writes(&self) -> Vec<(FieldId, WriteMode)> {
        let mut w = vec![
            (SEDIMENT_YIELD, WriteMode::Full),
            (SOIL_LOSS_DEPTH, WriteMode::Full),
        ];
        w.extend(LANDCOVER_SUMS.iter().map(|&(_, sum)| (sum, WriteMode::Full)));
        w.push((SEDIMENT_YIELD_TON_HA, WriteMode::Full));
        w
    }

    fn step(&self, ctx: &mut StepContext<'_>) -> Result<(), PropagatorError> {
        let cells = ctx.domain().cell_count();

        let runoff_mm = field_io::read(ctx, DIRECT_RUNOFF_MM)?;
        let qpeak = field_io::read(ctx, PEAK_RUNOFF)?;
        let area = field_io::read(ctx, CELL_AREA)?;
        let k = field_io::read(ctx, K_FACTOR)?;
        let c = field_io::read(ctx, C_FACTOR)?;
        let ls = field_io::read(ctx, LS_FACTOR)?;
        let cfrg = field_io::read(ctx, COARSE_FRAGMENT_FACTOR)?;
        let soil_depth = field_io::read(ctx, SOIL_DEPTH_TOP)?;
        let weights = field_io::read(ctx, LANDCOVER_FRACTION)?;
        field_io::expect_len(LANDCOVER_FRACTION, &weights, cells * N_LANDCOVER)?;
        field_io::expect_len(PEAK_RUNOFF, &qpeak, cells * N_LANDCOVER)?;

        let mut yields = vec![0.0; cells * N_LANDCOVER];
        let mut loss = vec![0.0; cells * N_LANDCOVER];
        let mut issue = NumericDomainIssue::new(SEDIMENT_YIELD);

        for cell in 0..cells {
            let factors = ErosionFactors {
                k: k[cell],
                c: c[cell],
                ls: ls[cell],
                cfrg: cfrg[cell],
            };
            let mut bad = false;
            for f in 0..N_LANDCOVER {
                let i = cell * N_LANDCOVER + f;
                let y = match sediment_yield(
                    &self.coefficients,
                    runoff_mm[i],
                    qpeak[i],
                    area[cell],
                    &factors,
                ) {
                    Some(y) => y,
                    None => {
                        bad = true;
                        0.0
                    }
                };
                yields[i] = y;
                loss[i] = soil_loss_depth(y, soil_depth[cell], area[cell]);
            }
            if bad {
                issue.push(cell);
            }
        }

        for &(source, sum) in LANDCOVER_SUMS {
            let owned;
            let values: &[f64] = match source {
                SEDIMENT_YIELD => &yields,
                SOIL_LOSS_DEPTH => &loss,
                other => {
                    owned = field_io::read(ctx, other)?;
                    &owned
                }
            };
            let sums: Vec<f64> = (0..cells)
                .map(|cell| area_weighted_sum(&row(&weights, cell), &row(values, cell)))
                .collect();
            if sum == SUM_SEDIMENT_YIELD {
                let per_ha: Vec<f64> = sums
                    .iter()
                    .zip(&area)
                    .map(|(&s, &a)| yield_per_hectare(s, a))
                    .collect();
                field_io::write(ctx, SEDIMENT_YIELD_TON_HA, &per_ha)?;
            }
            field_io::write(ctx, sum, &sums)?;
        }

        field_io::write(ctx, SEDIMENT_YIELD, &yields)?;
        field_io::write(ctx, SOIL_LOSS_DEPTH, &loss)?;
        field_io::report(ctx, issue);
        Ok(())
    }
}
