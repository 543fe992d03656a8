//! Time of concentration and sub-daily peak runoff.
//!
//! Daily direct runoff is turned into a peak runoff rate by estimating
//! how long runoff takes to reach the channel (overland plus in-channel
//! travel) and what share of the day's rain falls inside that window.
//! Everything is evaluated per cell and per landcover fraction.

use loess_core::{
    clamp_non_negative, safe_divide, FieldId, FieldSet, NumericDomainIssue, PropagatorError,
    N_LANDCOVER,
};
use loess_propagator::{Propagator, StepContext, WriteMode};

use crate::field_io;
use crate::fields::{
    CELL_AREA, CHANNEL_TOC, CHANNEL_TRAVEL_TIME, DIRECT_RUNOFF, DIRECT_RUNOFF_MM,
    MANNING_OVERLAND, OVERLAND_TOC, OVERLAND_VELOCITY, PEAK_RUNOFF, RAIN_FRACTION_IN_TOC,
    RUNOFF_RATE, SLOPE_LENGTH, TAN_SLOPE, TIME_OF_CONCENTRATION,
};

/// Largest usable half-hour rain share; `ln(1 - a05)` must stay finite.
pub const MAX_A05: f64 = 1.0 - f64::EPSILON;

/// Per cell-fraction inputs to [`concentration_times`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RunoffInputs {
    /// Direct runoff over the step (m).
    pub direct_runoff: f64,
    /// Cell area (m2).
    pub cell_area: f64,
    /// Overland slope length (m).
    pub slope_length: f64,
    /// Tangent of the slope.
    pub tan_slope: f64,
    /// Overland Manning roughness.
    pub manning: f64,
    /// Channel travel time (s).
    pub travel_time: f64,
}

/// Per cell-fraction outputs of [`concentration_times`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ConcentrationTimes {
    /// Runoff rate (m3/s).
    pub runoff_rate: f64,
    /// Runoff depth (mm).
    pub runoff_mm: f64,
    /// Overland velocity term.
    pub vov: f64,
    /// Overland time of concentration (h).
    pub tov: f64,
    /// Channel time of concentration (h).
    pub tch: f64,
    /// Total time of concentration (h).
    pub tconc: f64,
    /// Share of daily rain falling within `tconc`.
    pub atc: f64,
    /// Peak runoff rate (m3/s).
    pub qpeak: f64,
}

impl ConcentrationTimes {
    fn is_finite(&self) -> bool {
        [
            self.runoff_rate,
            self.runoff_mm,
            self.vov,
            self.tov,
            self.tch,
            self.tconc,
            self.atc,
            self.qpeak,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

/// Clamp the half-hour rain share into `[0, MAX_A05]`.
///
/// NaN clamps to zero.
pub fn clamp_a05(a05: f64) -> f64 {
    if a05 > 0.0 {
        a05.min(MAX_A05)
    } else {
        0.0
    }
}

/// Evaluate the time-of-concentration chain for one cell fraction.
///
/// `a05` must already be clamped with [`clamp_a05`]; negative runoff is
/// clamped to zero here. Returns `None` when an input lies outside the
/// domain clamping can repair (a negative base under a fractional power,
/// or a non-finite result).
pub fn concentration_times(inputs: &RunoffInputs, dt: f64, a05: f64) -> Option<ConcentrationTimes> {
    if inputs.tan_slope < 0.0 || inputs.manning < 0.0 || inputs.cell_area < 0.0 {
        return None;
    }
    let runoff = clamp_non_negative(inputs.direct_runoff);
    let runoff_rate = safe_divide(runoff * inputs.cell_area, dt);
    let runoff_mm = runoff * 1000.0;

    let vov = safe_divide(
        runoff_rate.powf(0.4) * inputs.tan_slope.powf(0.3),
        inputs.manning.powf(0.6),
    );
    let tov = safe_divide(inputs.slope_length, 3600.0 * vov);
    let tch = inputs.travel_time / 3600.0;
    let tconc = tov + tch;

    let atc = 1.0 - (2.0 * tconc * (1.0 - a05).ln()).exp();
    let qpeak = safe_divide(atc * runoff_mm * (inputs.cell_area / 1.0e6), 3.6 * tconc);

    let times = ConcentrationTimes {
        runoff_rate,
        runoff_mm,
        vov,
        tov,
        tch,
        tconc,
        atc,
        qpeak,
    };
    times.is_finite().then_some(times)
}

/// Estimates time of concentration and peak runoff from the day's
/// direct runoff and channel travel time.
#[derive(Debug)]
pub struct TimeOfConcentration {
    a05: f64,
}

impl TimeOfConcentration {
    /// Create the estimator. `a05`, the share of daily rain falling in
    /// the most intense half hour, is clamped into `[0, 1)`.
    pub fn new(a05: f64) -> Self {
        Self {
            a05: clamp_a05(a05),
        }
    }

    /// The clamped half-hour rain share.
    pub fn a05(&self) -> f64 {
        self.a05
    }
}

const OUTPUTS: [FieldId; 8] = [
    RUNOFF_RATE,
    DIRECT_RUNOFF_MM,
    OVERLAND_VELOCITY,
    OVERLAND_TOC,
    CHANNEL_TOC,
    TIME_OF_CONCENTRATION,
    RAIN_FRACTION_IN_TOC,
    PEAK_RUNOFF,
];

impl Propagator for TimeOfConcentration {
    fn name(&self) -> &str {
        "TimeOfConcentration"
    }

    fn reads(&self) -> FieldSet {
        [
            DIRECT_RUNOFF,
            CELL_AREA,
            SLOPE_LENGTH,
            TAN_SLOPE,
            MANNING_OVERLAND,
            CHANNEL_TRAVEL_TIME,
        ]
        .into_iter()
        .collect()
    }

    fn writes(&self) -> Vec<(FieldId, WriteMode)> {
        OUTPUTS.iter().map(|&f| (f, WriteMode::Full)).collect()
    }

    fn step(&self, ctx: &mut StepContext<'_>) -> Result<(), PropagatorError> {
        let cells = ctx.domain().cell_count();
        let dt = ctx.dt();

        let runoff = field_io::read(ctx, DIRECT_RUNOFF)?;
        let area = field_io::read(ctx, CELL_AREA)?;
        let slope_length = field_io::read(ctx, SLOPE_LENGTH)?;
        let tan_slope = field_io::read(ctx, TAN_SLOPE)?;
        let manning = field_io::read(ctx, MANNING_OVERLAND)?;
        let travel_time = field_io::read(ctx, CHANNEL_TRAVEL_TIME)?;
        field_io::expect_len(DIRECT_RUNOFF, &runoff, cells * N_LANDCOVER)?;
        field_io::expect_len(MANNING_OVERLAND, &manning, cells * N_LANDCOVER)?;
        field_io::expect_len(CELL_AREA, &area, cells)?;

        let mut out: [Vec<f64>; 8] = std::array::from_fn(|_| vec![0.0; cells * N_LANDCOVER]);
        let mut issue = NumericDomainIssue::new(PEAK_RUNOFF);

        for cell in 0..cells {
            for f in 0..N_LANDCOVER {
                let i = cell * N_LANDCOVER + f;
                let inputs = RunoffInputs {
                    direct_runoff: runoff[i],
                    cell_area: area[cell],
                    slope_length: slope_length[cell],
                    tan_slope: tan_slope[cell],
                    manning: manning[i],
                    travel_time: travel_time[cell],
                };
                let times = match concentration_times(&inputs, dt, self.a05) {
                    Some(t) => t,
                    None => {
                        issue.push(cell);
                        ConcentrationTimes::default()
                    }
                };
                out[0][i] = times.runoff_rate;
                out[1][i] = times.runoff_mm;
                out[2][i] = times.vov;
                out[3][i] = times.tov;
                out[4][i] = times.tch;
                out[5][i] = times.tconc;
                out[6][i] = times.atc;
                out[7][i] = times.qpeak;
            }
        }

        for (field, values) in OUTPUTS.iter().zip(&out) {
            field_io::write(ctx, *field, values)?;
        }
        field_io::report(ctx, issue);
        Ok(())
    }
}
