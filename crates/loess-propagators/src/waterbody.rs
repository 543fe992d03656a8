//! Lake and reservoir sediment settling.
//!
//! Suspended sediment above the equilibrium concentration decays toward
//! it exponentially; the decay is integrated in closed form over the
//! step, so the result does not depend on step length stability:
//!
//! ```text
//! conc_f = (conc_i - conc_eq) * exp(-ks * t * d50) + conc_eq   if conc_i > conc_eq
//! conc_f = conc_i                                              otherwise
//! ```
//!
//! Resuspension is not modelled: settling never raises concentration.

use loess_core::{clamp_non_negative, safe_divide, FieldId, FieldSet, PropagatorError};
use loess_propagator::{Propagator, StepContext, WriteMode};

use crate::field_io;
use crate::fields::{
    CELL_AREA, DETENTION_TIME, WATERBODY_OUTFLOW, WATERBODY_SED, WATERBODY_SED_CONC,
    WATERBODY_SED_SETTLED, WATERBODY_STORAGE,
};

/// Settling decay constant used when none is configured (m3/day).
pub const DEFAULT_KS: f64 = 184.0;
/// Median inflow particle size used when none is configured (µm).
pub const DEFAULT_D50: f64 = 32.0;
/// Equilibrium concentration used when none is configured (mg/l).
pub const DEFAULT_EQ_CONC_MG_L: f64 = 15.0;

/// Settling parameters as configured, in configuration units.
///
/// `None` selects the default. Configured values are converted by
/// [`resolve`](SettlingParams::resolve); the defaults are already in
/// model units.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SettlingParams {
    /// Decay constant (l/day); multiplied by 1000 on resolution.
    pub ks: Option<f64>,
    /// Median particle size (µm).
    pub d50: Option<f64>,
    /// Equilibrium concentration (mg/l); divided by 1000 on resolution.
    pub eq_conc: Option<f64>,
}

impl SettlingParams {
    /// Convert to model units, filling defaults.
    ///
    /// A configured `ks` is multiplied by 1000 while the default of 184 is
    /// used as is. Whether the configured unit is really l/day is an open
    /// question; the conversion is kept unchanged.
    ///
    /// # Errors
    ///
    /// Returns `Err` if a configured value is negative or not finite.
    pub fn resolve(&self) -> Result<SettlingRates, String> {
        let check = |name: &str, v: f64| {
            if v.is_finite() && v >= 0.0 {
                Ok(v)
            } else {
                Err(format!("{name} must be finite and >= 0, got {v}"))
            }
        };
        Ok(SettlingRates {
            ks: match self.ks {
                Some(v) => check("ks_sediment", v)? * 1000.0,
                None => DEFAULT_KS,
            },
            d50: match self.d50 {
                Some(v) => check("d50_sediment", v)?,
                None => DEFAULT_D50,
            },
            eq_conc: check(
                "eq_conc_sediment",
                self.eq_conc.unwrap_or(DEFAULT_EQ_CONC_MG_L),
            )? / 1000.0,
        })
    }
}

/// Settling parameters in model units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SettlingRates {
    /// Decay constant (m3/day).
    pub ks: f64,
    /// Median particle size (µm).
    pub d50: f64,
    /// Equilibrium concentration (kg/m3).
    pub eq_conc: f64,
}

impl Default for SettlingRates {
    fn default() -> Self {
        Self {
            ks: DEFAULT_KS,
            d50: DEFAULT_D50,
            eq_conc: DEFAULT_EQ_CONC_MG_L / 1000.0,
        }
    }
}

/// Outcome of settling one waterbody over one step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Settled {
    /// Mass left in suspension (kg).
    pub mass: f64,
    /// Mass settled (kg).
    pub settled: f64,
    /// Final concentration (kg/m3).
    pub conc: f64,
}

/// Settle a waterbody of `volume` m3 at concentration `conc_i` for
/// `days` days.
pub fn settle(conc_i: f64, rates: &SettlingRates, volume: f64, days: f64) -> Settled {
    let conc_f = if conc_i > rates.eq_conc {
        let decayed =
            (conc_i - rates.eq_conc) * (-rates.ks * days * rates.d50).exp() + rates.eq_conc;
        // Rounding must not push the result outside [conc_eq, conc_i].
        decayed.clamp(rates.eq_conc, conc_i)
    } else {
        conc_i
    };
    Settled {
        mass: conc_f * volume,
        settled: (conc_i - conc_f) * volume,
        conc: conc_f,
    }
}

/// Detention time (s): storage over outflow rate, zero when nothing
/// flows out.
pub fn detention_time(storage: f64, outflow_rate: f64) -> f64 {
    safe_divide(storage, outflow_rate)
}

/// Settles lake and reservoir sediment and reports detention time.
///
/// A waterbody with no water deposits its whole load.
#[derive(Debug)]
pub struct WaterbodySettler {
    rates: SettlingRates,
}

impl WaterbodySettler {
    /// Create a settler with resolved rates.
    pub fn new(rates: SettlingRates) -> Self {
        Self { rates }
    }

    /// The rates in model units.
    pub fn rates(&self) -> &SettlingRates {
        &self.rates
    }
}

impl Propagator for WaterbodySettler {
    fn name(&self) -> &str {
        "WaterbodySettler"
    }

    fn reads(&self) -> FieldSet {
        [WATERBODY_SED, WATERBODY_STORAGE, WATERBODY_OUTFLOW, CELL_AREA]
            .into_iter()
            .collect()
    }

    fn writes(&self) -> Vec<(FieldId, WriteMode)> {
        vec![
            (WATERBODY_SED, WriteMode::Incremental),
            (WATERBODY_SED_CONC, WriteMode::Incremental),
            (WATERBODY_SED_SETTLED, WriteMode::Full),
            (DETENTION_TIME, WriteMode::Full),
        ]
    }

    fn step(&self, ctx: &mut StepContext<'_>) -> Result<(), PropagatorError> {
        let n = ctx.domain().waterbody_count();
        let days = ctx.dt_days();

        let mass = field_io::read(ctx, WATERBODY_SED)?;
        let storage = field_io::read(ctx, WATERBODY_STORAGE)?;
        let outflow = field_io::read(ctx, WATERBODY_OUTFLOW)?;
        let area = ctx.domain().compress(&field_io::read(ctx, CELL_AREA)?);
        field_io::expect_len(WATERBODY_SED, &mass, n)?;
        field_io::expect_len(WATERBODY_STORAGE, &storage, n)?;
        field_io::expect_len(WATERBODY_OUTFLOW, &outflow, n)?;

        let mut out_mass = vec![0.0; n];
        let mut out_conc = vec![0.0; n];
        let mut settled = vec![0.0; n];
        let mut detention = vec![0.0; n];

        for w in 0..n {
            let volume = clamp_non_negative(storage[w]);
            let m = clamp_non_negative(mass[w]);
            if volume > 0.0 {
                let conc_i = safe_divide(m, volume);
                let s = settle(conc_i, &self.rates, volume, days);
                out_mass[w] = s.mass;
                out_conc[w] = s.conc;
                settled[w] = s.settled;
            } else {
                settled[w] = m;
            }
            let outflow_rate = outflow[w] * area[w] / 86_400.0;
            detention[w] = detention_time(storage[w], outflow_rate);
        }

        field_io::write(ctx, WATERBODY_SED, &out_mass)?;
        field_io::write(ctx, WATERBODY_SED_CONC, &out_conc)?;
        field_io::write(ctx, WATERBODY_SED_SETTLED, &settled)?;
        field_io::write(ctx, DETENTION_TIME, &detention)?;
        Ok(())
    }
}
