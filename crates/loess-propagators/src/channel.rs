//! In-channel sediment routing.
//!
//! Each routing sub-step compares the channel's suspended concentration
//! with a stream-power transport capacity:
//!
//! ```text
//! v_peak    = prf * Q / A
//! capacity  = csp * v_peak^spexp
//! conc > capacity  => deposition  = (conc - capacity) * V
//! otherwise        => degradation = (capacity - conc) * Kch * Cch * V
//! ```
//!
//! and carries mass and concentration forward to the next sub-step.
//! Sub-steps run strictly in increasing order.
//!
//! Constructed via the builder pattern: [`ChannelSedimentRouter::builder`].

use loess_core::{
    clamp_non_negative, safe_divide, FieldId, FieldSet, NumericDomainIssue, PropagatorError,
};
use loess_propagator::{Propagator, StepContext, WriteMode};

use crate::field_io;
use crate::fields::{
    CELL_AREA, CHANNEL_ABSTRACTION, CHANNEL_COVER, CHANNEL_CROSS_SECTION, CHANNEL_DISCHARGE,
    CHANNEL_ERODIBILITY, CHANNEL_SED, CHANNEL_SED_ABSTRACTED, CHANNEL_SED_CONC,
    CHANNEL_SED_DEGRADATION, CHANNEL_SED_DEPOSITION, CHANNEL_SED_FLUSHED, CHANNEL_SED_PREVIOUS,
    CHANNEL_VOLUME, PEAK_RATE_FACTOR,
};

/// Stream-power transport capacity `csp * (prf * Q / A)^spexp` (kg/m3).
///
/// Negative velocities (reverse flow noise) are clamped to zero.
pub fn transport_capacity(prf: f64, discharge: f64, area: f64, csp: f64, spexp: f64) -> f64 {
    let v_peak = clamp_non_negative(safe_divide(prf * discharge, area));
    csp * v_peak.powf(spexp)
}

/// Result of one routing sub-step for one cell.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SubstepFlux {
    /// Mass before the sub-step (kg).
    pub previous_mass: f64,
    /// Mass after the sub-step (kg).
    pub mass: f64,
    /// Concentration after the sub-step (kg/m3).
    pub conc: f64,
    /// Sediment deposited on the bed (kg).
    pub deposition: f64,
    /// Sediment eroded from the bed (kg).
    pub degradation: f64,
    /// Mass carried off because the channel held no water (kg).
    pub flushed: f64,
}

/// Advance one cell by one sub-step.
///
/// Deposition and degradation are mutually exclusive; equality routes to
/// degradation with a zero result. Deposition never exceeds the mass in
/// the channel. With no water (`volume <= 0`) the remaining mass is
/// flushed and concentration set to zero.
pub fn route_substep(
    mass: f64,
    conc: f64,
    capacity: f64,
    volume: f64,
    erodibility: f64,
    cover: f64,
) -> SubstepFlux {
    let volume = clamp_non_negative(volume);
    let (deposition, degradation) = if conc > capacity {
        (((conc - capacity) * volume).min(clamp_non_negative(mass)), 0.0)
    } else {
        (0.0, (capacity - conc) * erodibility * cover * volume)
    };

    let mut next = mass + degradation - deposition;
    let mut flushed = 0.0;
    if volume <= 0.0 {
        flushed = next;
        next = 0.0;
    }

    SubstepFlux {
        previous_mass: mass,
        mass: next,
        conc: safe_divide(next, volume),
        deposition,
        degradation,
        flushed,
    }
}

/// Sediment leaving with abstracted water: `abstraction * area * conc`,
/// clamped into `[0, mass]`.
pub fn abstract_sediment(abstraction: f64, cell_area: f64, conc: f64, mass: f64) -> f64 {
    clamp_non_negative((abstraction * cell_area * conc).min(mass))
}

/// Routes channel sediment through the day's sub-steps.
///
/// Reads sub-step discharge, cross-section and volume from the routing
/// collaborator. Updates [`CHANNEL_SED`] and [`CHANNEL_SED_CONC`] in
/// place and publishes the step's summed fluxes.
#[derive(Debug)]
pub struct ChannelSedimentRouter {
    csp: f64,
    spexp: f64,
    abstraction: bool,
}

/// Builder for [`ChannelSedimentRouter`].
///
/// `csp` is required; `spexp` defaults to 1.5 (Bagnold). Abstraction of
/// sediment with demand water is off unless enabled.
pub struct ChannelSedimentRouterBuilder {
    csp: Option<f64>,
    spexp: f64,
    abstraction: bool,
}

impl ChannelSedimentRouter {
    /// Create a new builder.
    pub fn builder() -> ChannelSedimentRouterBuilder {
        ChannelSedimentRouterBuilder {
            csp: None,
            spexp: 1.5,
            abstraction: false,
        }
    }

    /// Transport capacity coefficient.
    pub fn csp(&self) -> f64 {
        self.csp
    }

    /// Transport capacity exponent.
    pub fn spexp(&self) -> f64 {
        self.spexp
    }
}

impl ChannelSedimentRouterBuilder {
    /// Set the transport capacity coefficient.
    pub fn csp(mut self, csp: f64) -> Self {
        self.csp = Some(csp);
        self
    }

    /// Set the transport capacity exponent (default 1.5).
    pub fn spexp(mut self, spexp: f64) -> Self {
        self.spexp = spexp;
        self
    }

    /// Remove sediment with the water abstracted for demand.
    pub fn abstraction(mut self, enabled: bool) -> Self {
        self.abstraction = enabled;
        self
    }

    /// Build the router.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `csp` is unset, negative or not finite, or
    /// `spexp` is not finite and positive.
    pub fn build(self) -> Result<ChannelSedimentRouter, String> {
        let csp = self.csp.ok_or_else(|| "csp is required".to_string())?;
        if !csp.is_finite() || csp < 0.0 {
            return Err(format!("csp must be finite and >= 0, got {csp}"));
        }
        if !self.spexp.is_finite() || self.spexp <= 0.0 {
            return Err(format!("spexp must be finite and > 0, got {}", self.spexp));
        }
        Ok(ChannelSedimentRouter {
            csp,
            spexp: self.spexp,
            abstraction: self.abstraction,
        })
    }
}

impl Propagator for ChannelSedimentRouter {
    fn name(&self) -> &str {
        "ChannelSedimentRouter"
    }

    fn reads(&self) -> FieldSet {
        let mut set: FieldSet = [
            CHANNEL_SED,
            CHANNEL_SED_CONC,
            CHANNEL_DISCHARGE,
            CHANNEL_CROSS_SECTION,
            CHANNEL_VOLUME,
            PEAK_RATE_FACTOR,
            CHANNEL_ERODIBILITY,
            CHANNEL_COVER,
        ]
        .into_iter()
        .collect();
        if self.abstraction {
            set.insert(CHANNEL_ABSTRACTION);
            set.insert(CELL_AREA);
        }
        set
    }

    fn writes(&self) -> Vec<(FieldId, WriteMode)> {
        vec![
            (CHANNEL_SED, WriteMode::Incremental),
            (CHANNEL_SED_CONC, WriteMode::Incremental),
            (CHANNEL_SED_DEPOSITION, WriteMode::Full),
            (CHANNEL_SED_DEGRADATION, WriteMode::Full),
            (CHANNEL_SED_ABSTRACTED, WriteMode::Full),
            (CHANNEL_SED_FLUSHED, WriteMode::Full),
            (CHANNEL_SED_PREVIOUS, WriteMode::Full),
        ]
    }

    fn step(&self, ctx: &mut StepContext<'_>) -> Result<(), PropagatorError> {
        let cells = ctx.domain().cell_count();
        let substeps = ctx.domain().substeps() as usize;

        let mut mass = field_io::read(ctx, CHANNEL_SED)?;
        let mut conc = field_io::read(ctx, CHANNEL_SED_CONC)?;
        let discharge = field_io::read(ctx, CHANNEL_DISCHARGE)?;
        let cross_section = field_io::read(ctx, CHANNEL_CROSS_SECTION)?;
        let volume = field_io::read(ctx, CHANNEL_VOLUME)?;
        let prf = field_io::read(ctx, PEAK_RATE_FACTOR)?;
        let kch = field_io::read(ctx, CHANNEL_ERODIBILITY)?;
        let cch = field_io::read(ctx, CHANNEL_COVER)?;
        field_io::expect_len(CHANNEL_SED, &mass, cells)?;
        field_io::expect_len(CHANNEL_VOLUME, &volume, cells * substeps)?;

        let previous = mass.clone();
        let mut abstracted = vec![0.0; cells];
        if self.abstraction {
            let water = field_io::read(ctx, CHANNEL_ABSTRACTION)?;
            let area = field_io::read(ctx, CELL_AREA)?;
            for cell in 0..cells {
                let taken = abstract_sediment(water[cell], area[cell], conc[cell], mass[cell]);
                abstracted[cell] = taken;
                mass[cell] -= taken;
            }
        }

        let mut deposition = vec![0.0; cells];
        let mut degradation = vec![0.0; cells];
        let mut flushed = vec![0.0; cells];
        let mut issue = NumericDomainIssue::new(CHANNEL_SED);

        // A negative bed factor would erode negative mass; the cell keeps
        // its sediment untouched for the step.
        let bed_invalid: Vec<bool> = (0..cells)
            .map(|c| kch[c] < 0.0 || cch[c] < 0.0)
            .collect();
        for cell in (0..cells).filter(|&c| bed_invalid[c]) {
            issue.push(cell);
        }

        for s in 0..substeps {
            for cell in 0..cells {
                if bed_invalid[cell] {
                    continue;
                }
                let i = s * cells + cell;
                let capacity = transport_capacity(
                    prf[cell],
                    discharge[i],
                    cross_section[i],
                    self.csp,
                    self.spexp,
                );
                let flux = route_substep(
                    mass[cell],
                    conc[cell],
                    capacity,
                    volume[i],
                    kch[cell],
                    cch[cell],
                );
                let finite = [
                    flux.mass,
                    flux.conc,
                    flux.deposition,
                    flux.degradation,
                    flux.flushed,
                ]
                .iter()
                .all(|v| v.is_finite());
                if !finite {
                    // Zero flux for this cell and sub-step.
                    issue.push(cell);
                    conc[cell] = safe_divide(mass[cell], clamp_non_negative(volume[i]));
                    continue;
                }
                mass[cell] = flux.mass;
                conc[cell] = flux.conc;
                deposition[cell] += flux.deposition;
                degradation[cell] += flux.degradation;
                flushed[cell] += flux.flushed;
            }
        }

        let last = substeps.saturating_sub(1) * cells;
        for cell in (0..cells).filter(|&c| bed_invalid[c]) {
            conc[cell] = safe_divide(mass[cell], clamp_non_negative(volume[last + cell]));
        }

        field_io::write(ctx, CHANNEL_SED, &mass)?;
        field_io::write(ctx, CHANNEL_SED_CONC, &conc)?;
        field_io::write(ctx, CHANNEL_SED_DEPOSITION, &deposition)?;
        field_io::write(ctx, CHANNEL_SED_DEGRADATION, &degradation)?;
        field_io::write(ctx, CHANNEL_SED_ABSTRACTED, &abstracted)?;
        field_io::write(ctx, CHANNEL_SED_FLUSHED, &flushed)?;
        field_io::write(ctx, CHANNEL_SED_PREVIOUS, &previous)?;
        field_io::report(ctx, issue);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loess_core::{Domain, StepId};
    use loess_propagator::StepDiagnostics;
    use loess_test_utils::{assert_close, MockFieldReader, MockFieldWriter};
    use proptest::prelude::*;

    #[test]
    fn deposition_branch() {
        let f = route_substep(500.0, 5.0, 3.0, 100.0, 0.008, 0.9);
        assert_eq!(f.deposition, 200.0);
        assert_eq!(f.degradation, 0.0);
        assert_eq!(f.mass, 300.0);
        assert_eq!(f.previous_mass, 500.0);
        assert_eq!(f.conc, 3.0);
    }

    #[test]
    fn degradation_branch() {
        let f = route_substep(50.0, 1.0, 3.0, 50.0, 0.008, 0.9);
        assert_close(f.degradation, 0.72, 1e-12);
        assert_eq!(f.deposition, 0.0);
        assert_close(f.mass, 50.72, 1e-12);
    }

    #[test]
    fn equality_routes_to_zero_degradation() {
        let f = route_substep(30.0, 3.0, 3.0, 10.0, 0.008, 0.9);
        assert_eq!(f.deposition, 0.0);
        assert_eq!(f.degradation, 0.0);
        assert_eq!(f.mass, 30.0);
    }

    #[test]
    fn dry_channel_flushes_mass() {
        let f = route_substep(12.0, 0.0, 3.0, 0.0, 0.008, 0.9);
        assert_eq!(f.conc, 0.0);
        assert_eq!(f.mass, 0.0);
        assert_eq!(f.flushed, 12.0);
    }

    #[test]
    fn abstraction_clamped_to_mass() {
        assert_eq!(abstract_sediment(0.01, 1.0e6, 2.0, 50.0), 50.0);
        assert_close(abstract_sediment(1e-6, 1.0e6, 2.0, 50.0), 2.0, 1e-12);
        assert_eq!(abstract_sediment(-1.0, 1.0e6, 2.0, 50.0), 0.0);
    }

    #[test]
    fn capacity_guards_zero_area() {
        assert_eq!(transport_capacity(2.0, 10.0, 0.0, 1e-4, 1.5), 0.0);
        let expected = 1e-4 * 4.0f64.powf(1.5);
        assert_close(transport_capacity(2.0, 10.0, 5.0, 1e-4, 1.5), expected, 1e-12);
    }

    #[test]
    fn builder_requires_csp() {
        assert!(ChannelSedimentRouter::builder().build().is_err());
        assert!(ChannelSedimentRouter::builder().csp(-1.0).build().is_err());
        assert!(ChannelSedimentRouter::builder().csp(1e-4).spexp(0.0).build().is_err());
        let r = ChannelSedimentRouter::builder().csp(1e-4).build().unwrap();
        assert_eq!(r.spexp(), 1.5);
        assert!(!r.reads().contains(CHANNEL_ABSTRACTION));
    }

    #[test]
    fn substeps_run_in_order_and_fluxes_accumulate() {
        let domain = Domain::new(1).with_substeps(2).unwrap();
        let mut reader = MockFieldReader::new();
        reader.set_field(CHANNEL_SED, vec![500.0]);
        reader.set_field(CHANNEL_SED_CONC, vec![5.0]);
        // v_peak = 1 * Q / A; capacity = csp * v^1 with csp = 1.
        reader.set_field(CHANNEL_DISCHARGE, vec![3.0, 4.0]);
        reader.set_field(CHANNEL_CROSS_SECTION, vec![1.0, 1.0]);
        reader.set_field(CHANNEL_VOLUME, vec![100.0, 100.0]);
        reader.set_field(PEAK_RATE_FACTOR, vec![1.0]);
        reader.set_field(CHANNEL_ERODIBILITY, vec![0.5]);
        reader.set_field(CHANNEL_COVER, vec![1.0]);
        reader.set_field(CHANNEL_ABSTRACTION, vec![0.0]);
        reader.set_field(CELL_AREA, vec![1.0e6]);

        let prop = ChannelSedimentRouter::builder()
            .csp(1.0)
            .spexp(1.0)
            .abstraction(true)
            .build()
            .unwrap();
        let mut writer = MockFieldWriter::new();
        for (f, _) in prop.writes() {
            writer.add_field(f, 1);
        }
        let mut diagnostics = StepDiagnostics::new();
        {
            let mut ctx = StepContext::new(
                &reader,
                &reader,
                &mut writer,
                &domain,
                &mut diagnostics,
                prop.name(),
                StepId(1),
                86_400.0,
            );
            prop.step(&mut ctx).unwrap();
        }

        // Sub-step 0: conc 5 > 3 deposits 200, conc -> 3.
        // Sub-step 1: conc 3 < 4 erodes (4 - 3) * 0.5 * 100 = 50.
        assert_eq!(writer.get_field(CHANNEL_SED_DEPOSITION).unwrap()[0], 200.0);
        assert_eq!(writer.get_field(CHANNEL_SED_DEGRADATION).unwrap()[0], 50.0);
        assert_eq!(writer.get_field(CHANNEL_SED).unwrap()[0], 350.0);
        assert_eq!(writer.get_field(CHANNEL_SED_CONC).unwrap()[0], 3.5);
        assert_eq!(writer.get_field(CHANNEL_SED_PREVIOUS).unwrap()[0], 500.0);
    }

    #[test]
    fn negative_bed_factor_falls_back_to_no_flux() {
        let domain = Domain::new(2);
        let mut reader = MockFieldReader::new();
        reader.set_field(CHANNEL_SED, vec![100.0, 100.0]);
        reader.set_field(CHANNEL_SED_CONC, vec![1.0, 1.0]);
        reader.set_field(CHANNEL_DISCHARGE, vec![3.0, 3.0]);
        reader.set_field(CHANNEL_CROSS_SECTION, vec![1.0, 1.0]);
        reader.set_field(CHANNEL_VOLUME, vec![100.0, 100.0]);
        reader.set_field(PEAK_RATE_FACTOR, vec![1.0, 1.0]);
        reader.set_field(CHANNEL_ERODIBILITY, vec![-0.5, 0.5]);
        reader.set_field(CHANNEL_COVER, vec![1.0, 1.0]);

        let prop = ChannelSedimentRouter::builder()
            .csp(1.0)
            .spexp(1.0)
            .build()
            .unwrap();
        let mut writer = MockFieldWriter::new();
        for (f, _) in prop.writes() {
            writer.add_field(f, 2);
        }
        let mut diagnostics = StepDiagnostics::new();
        {
            let mut ctx = StepContext::new(
                &reader,
                &reader,
                &mut writer,
                &domain,
                &mut diagnostics,
                prop.name(),
                StepId(1),
                86_400.0,
            );
            prop.step(&mut ctx).unwrap();
        }

        // Cell 0 keeps its mass; cell 1 erodes (3 - 1) * 0.5 * 100 = 100.
        assert_eq!(writer.get_field(CHANNEL_SED).unwrap(), &[100.0, 200.0]);
        assert_eq!(writer.get_field(CHANNEL_SED_DEGRADATION).unwrap(), &[0.0, 100.0]);
        assert_eq!(writer.get_field(CHANNEL_SED_CONC).unwrap(), &[1.0, 2.0]);
        assert_eq!(diagnostics.fallback_cells(), 1);
        assert_eq!(diagnostics.reports()[0].issue.cells.as_slice(), &[0]);
    }

    proptest! {
        #[test]
        fn substep_conserves_and_stays_non_negative(
            mass in 0.0f64..1.0e6,
            conc in 0.0f64..50.0,
            capacity in 0.0f64..50.0,
            volume in prop_oneof![Just(0.0), 0.0f64..1.0e5],
            kch in 0.0f64..0.1,
            cch in 0.0f64..1.0,
        ) {
            let f = route_substep(mass, conc, capacity, volume, kch, cch);
            let expected = mass + f.degradation - f.deposition - f.flushed;
            prop_assert!((f.mass - expected).abs() <= 1e-9 * mass.max(1.0));
            prop_assert!(f.deposition == 0.0 || f.degradation == 0.0);
            prop_assert!(f.mass >= 0.0);
            prop_assert!(f.conc >= 0.0);
            prop_assert!(f.deposition >= 0.0 && f.degradation >= 0.0);
        }

        #[test]
        fn abstraction_never_overdraws(
            water in -1.0f64..1.0,
            conc in 0.0f64..10.0,
            mass in 0.0f64..1.0e4,
        ) {
            let taken = abstract_sediment(water, 1.0e6, conc, mass);
            prop_assert!(taken >= 0.0);
            prop_assert!(taken <= mass);
        }
    }
}
