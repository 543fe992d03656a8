//! One-off derivation of static erosion parameters.
//!
//! Runs once at initialization, before the first step, and is never part
//! of the per-step pipeline.

use loess_core::{FieldId, FieldSet, PropagatorError};
use loess_propagator::{Propagator, StepContext, WriteMode};

use crate::field_io;
use crate::fields::{COARSE_FRAGMENT_FACTOR, ROCK_FRACTION, TAN_SLOPE};

/// Floor applied to the tangent of the slope.
pub const MIN_TAN_SLOPE: f64 = 1.0e-5;

/// Coarse-fragment correction `exp(-0.053 * rock)` for a rock percentage.
pub fn coarse_fragment_factor(rock_fraction: f64) -> f64 {
    (-0.053 * rock_fraction).exp()
}

/// Derives CFRG from the rock fraction and floors the slope tangent.
#[derive(Debug, Default)]
pub struct ErosionSetup;

impl Propagator for ErosionSetup {
    fn name(&self) -> &str {
        "ErosionSetup"
    }

    fn reads(&self) -> FieldSet {
        [ROCK_FRACTION].into_iter().collect()
    }

    fn writes(&self) -> Vec<(FieldId, WriteMode)> {
        vec![
            (COARSE_FRAGMENT_FACTOR, WriteMode::Full),
            (TAN_SLOPE, WriteMode::Incremental),
        ]
    }

    fn step(&self, ctx: &mut StepContext<'_>) -> Result<(), PropagatorError> {
        let rock = field_io::read(ctx, ROCK_FRACTION)?;
        let cfrg: Vec<f64> = rock.iter().map(|&r| coarse_fragment_factor(r)).collect();
        field_io::write(ctx, COARSE_FRAGMENT_FACTOR, &cfrg)?;

        let slope = ctx
            .writes()
            .write(TAN_SLOPE)
            .ok_or(PropagatorError::unwritable(TAN_SLOPE))?;
        for s in slope.iter_mut() {
            // NaN compares false and is floored too.
            if !(*s >= MIN_TAN_SLOPE) {
                *s = MIN_TAN_SLOPE;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loess_core::{Domain, StepId};
    use loess_propagator::StepDiagnostics;
    use loess_test_utils::{assert_close, MockFieldReader, MockFieldWriter};

    #[test]
    fn no_rock_no_correction() {
        assert_eq!(coarse_fragment_factor(0.0), 1.0);
        assert_close(coarse_fragment_factor(20.0), (-1.06f64).exp(), 1e-12);
    }

    #[test]
    fn setup_derives_cfrg_and_floors_slope() {
        let domain = Domain::new(3);
        let mut reader = MockFieldReader::new();
        reader.set_field(ROCK_FRACTION, vec![0.0, 10.0, 50.0]);
        let mut writer = MockFieldWriter::new();
        writer.add_field(COARSE_FRAGMENT_FACTOR, 3);
        writer.seed_field(TAN_SLOPE, vec![0.0, 0.2, -0.01]);
        let mut diagnostics = StepDiagnostics::new();
        {
            let mut ctx = StepContext::new(
                &reader,
                &reader,
                &mut writer,
                &domain,
                &mut diagnostics,
                "ErosionSetup",
                StepId(0),
                86_400.0,
            );
            ErosionSetup.step(&mut ctx).unwrap();
        }
        assert_eq!(
            writer.get_field(TAN_SLOPE).unwrap(),
            &[MIN_TAN_SLOPE, 0.2, MIN_TAN_SLOPE]
        );
        let cfrg = writer.get_field(COARSE_FRAGMENT_FACTOR).unwrap();
        assert_eq!(cfrg[0], 1.0);
        assert!(cfrg[2] < cfrg[1]);
    }
}
