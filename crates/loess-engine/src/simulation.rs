//! The timestep orchestrator.
//!
//! [`Simulation`] owns the [`GridStore`] and the ordered pipeline of
//! collaborator and core propagators. Each call to
//! [`step()`](Simulation::step) advances one simulated day:
//!
//! 1. Snapshot the store (rollback point and previous-step view) and
//!    reset transient fields.
//! 2. Run the process stages in [`Stage::PROCESS`] order.
//! 3. Recompute storage, evapotranspiration and sediment totals.
//! 4. Check the soil/groundwater and channel-sediment balances.
//! 5. Run environmental flow and output.
//!
//! A propagator error at any point restores the snapshot, so a failed
//! step leaves the store exactly as it was.

use std::fmt;
use std::time::Instant;

use indexmap::IndexMap;
use loess_core::{
    Domain, FieldId, FieldMutability, FieldSet, InitialValue, PropagatorError, StepError,
    StepId,
};
use loess_propagator::{
    validate_pipeline, Propagator, StepContext, StepDiagnostics, WriteMode, WritePlan,
};
use loess_propagators::fields::{CELL_AREA, NON_NEGATIVE_PARAMETERS};
use loess_propagators::{
    catchment_fields, ChannelSedimentRouter, ErosionSetup, SedimentYield, TimeOfConcentration,
    WaterbodySettler,
};
use loess_restart::RestartState;

use crate::aggregate::aggregate;
use crate::balance::{check_step, BalanceReport};
use crate::config::{ConfigError, FeatureFlags, SimulationConfig};
use crate::metrics::StepMetrics;
use crate::stage::Stage;
use crate::store::{GridStore, StoreSnapshot};

/// How a step ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// Every enabled stage ran.
    Completed,
    /// Forcing ingestion and output only.
    CalibrationOnly,
    /// Environmental flow and output ran; the simulation is now terminated.
    EnvironmentalFlowOnly,
}

/// Result of a successful step.
#[derive(Clone, Debug)]
pub struct StepReport {
    /// The step just completed.
    pub step_id: StepId,
    /// Which sequence ran.
    pub outcome: StepOutcome,
    /// Numeric-domain fallbacks raised by propagators.
    pub diagnostics: StepDiagnostics,
    /// Conservation check results. Empty unless the full sequence ran.
    pub balance: BalanceReport,
    /// Timing data.
    pub metrics: StepMetrics,
}

/// A configured catchment simulation.
pub struct Simulation {
    domain: Domain,
    dt: f64,
    flags: FeatureFlags,
    tolerance: f64,
    store: GridStore,
    pipeline: Vec<(Stage, Box<dyn Propagator>)>,
    plan: WritePlan,
    step_id: StepId,
    terminated: bool,
    rollback_events: u64,
    last_metrics: StepMetrics,
}

/// Sediment-core propagators enabled by `config`, tagged with their stage.
fn core_propagators(
    config: &SimulationConfig,
) -> Result<Vec<(Stage, Box<dyn Propagator>)>, ConfigError> {
    let flags = config.flags;
    let params = &config.sediment;
    let mut core: Vec<(Stage, Box<dyn Propagator>)> = Vec::new();
    if !flags.water_quality {
        return Ok(core);
    }
    let invalid = |reason: String| ConfigError::InvalidCalibration { reason };

    let a05 = params.a05.ok_or_else(|| ConfigError::MissingParameter {
        name: "a05".to_string(),
    })?;
    core.push((Stage::WaterQuality, Box::new(TimeOfConcentration::new(a05))));
    core.push((
        Stage::WaterQuality,
        Box::new(SedimentYield::new(params.yield_coefficients).map_err(invalid)?),
    ));

    if flags.routing {
        let csp = params.csp.ok_or_else(|| ConfigError::MissingParameter {
            name: "csp".to_string(),
        })?;
        let router = ChannelSedimentRouter::builder()
            .csp(csp)
            .spexp(params.spexp)
            .abstraction(flags.water_demand)
            .build()
            .map_err(invalid)?;
        core.push((Stage::SedimentRouting, Box::new(router)));
        if flags.waterbodies {
            let rates = params.settling.resolve().map_err(invalid)?;
            core.push((Stage::SedimentRouting, Box::new(WaterbodySettler::new(rates))));
        }
    }
    Ok(core)
}

/// Run one propagator against staged buffers and commit on success.
#[allow(clippy::too_many_arguments)]
fn run_propagator(
    store: &mut GridStore,
    previous: &StoreSnapshot,
    propagator: &dyn Propagator,
    modes: &IndexMap<FieldId, WriteMode>,
    domain: &Domain,
    diagnostics: &mut StepDiagnostics,
    step_id: StepId,
    dt: f64,
) -> Result<(), StepError> {
    let mut staged = store.stage(modes);
    let result = {
        let mut ctx = StepContext::new(
            &*store,
            previous,
            &mut staged,
            domain,
            diagnostics,
            propagator.name(),
            step_id,
            dt,
        );
        propagator.step(&mut ctx)
    };
    result
        .and_then(|()| store.commit(staged))
        .map_err(|reason| StepError::PropagatorFailed {
            name: propagator.name().to_string(),
            reason,
        })
}

impl Simulation {
    /// Build and initialize a simulation.
    ///
    /// Validates the configuration and pipeline, fills fields from the
    /// parameters and the optional restart state, checks that every
    /// required field read by the enabled pipeline was supplied, then
    /// runs the erosion set-up when water quality is enabled.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`]; all are fatal.
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let core = core_propagators(&config)?;
        let SimulationConfig {
            domain,
            dt,
            flags,
            sediment: _,
            parameters,
            collaborators,
            mass_balance_tolerance,
            restart,
        } = config;

        // Collaborators run before the core propagators of their stage.
        let mut entries: Vec<(Stage, bool, Box<dyn Propagator>)> = collaborators
            .into_iter()
            .map(|(stage, p)| (stage, false, p))
            .chain(core.into_iter().map(|(stage, p)| (stage, true, p)))
            .filter(|(stage, _, p)| {
                let enabled = stage.is_enabled(&flags);
                if !enabled {
                    log::debug!("'{}' dropped: stage {} disabled", p.name(), stage.name());
                }
                enabled
            })
            .collect();
        entries.sort_by_key(|(stage, is_core, _)| (*stage, *is_core));
        let pipeline: Vec<(Stage, Box<dyn Propagator>)> =
            entries.into_iter().map(|(stage, _, p)| (stage, p)).collect();

        let defs = catchment_fields();
        for def in &defs {
            def.validate()
                .map_err(|reason| ConfigError::InvalidField { reason })?;
        }
        let defined: FieldSet = (0..defs.len() as u32).map(FieldId).collect();
        let plan = {
            let refs: Vec<&dyn Propagator> = pipeline.iter().map(|(_, p)| p.as_ref()).collect();
            validate_pipeline(&refs, &defined, dt)?
        };
        for (_, p) in &pipeline {
            for (field, _) in p.writes() {
                if let Some(def) = defs.get(field.0 as usize) {
                    if def.mutability == FieldMutability::Static {
                        return Err(ConfigError::StaticFieldWritten {
                            propagator: p.name().to_string(),
                            field: def.name.clone(),
                        });
                    }
                }
            }
        }

        let mut store = GridStore::new(defs, &domain);
        let mut supplied = FieldSet::empty();
        for (name, values) in &parameters {
            let field = store
                .field_id(name)
                .ok_or_else(|| ConfigError::UnknownParameter { name: name.clone() })?;
            if store
                .def(field)
                .is_some_and(|d| d.mutability == FieldMutability::Transient)
            {
                return Err(ConfigError::InvalidField {
                    reason: format!("field '{name}' is recomputed every step"),
                });
            }
            if let Some(index) = values.iter().position(|v| !v.is_finite()) {
                return Err(ConfigError::NonFiniteParameter {
                    name: name.clone(),
                    index,
                });
            }
            if NON_NEGATIVE_PARAMETERS.contains(&field) {
                let negative = values.iter().enumerate().find(|&(_, &v)| v < 0.0);
                if let Some((index, v)) = negative {
                    return Err(ConfigError::InvalidCalibration {
                        reason: format!("'{name}' must not be negative, value {index} is {v}"),
                    });
                }
            }
            let expected = store.get(field).map_or(0, <[f64]>::len);
            let filled = match values.as_slice() {
                [v] => vec![*v; expected],
                _ if values.len() == expected => values.clone(),
                _ => {
                    return Err(ConfigError::ParameterLength {
                        name: name.clone(),
                        expected,
                        got: values.len(),
                    })
                }
            };
            store.set(field, &filled);
            supplied.insert(field);
        }

        let mut step_id = StepId::default();
        if let Some(state) = restart {
            for record in &state.fields {
                let mismatch = |reason: String| ConfigError::RestartMismatch { reason };
                let field = store
                    .field_id(&record.name)
                    .ok_or_else(|| mismatch(format!("unknown field '{}'", record.name)))?;
                if store
                    .def(field)
                    .is_none_or(|d| d.mutability != FieldMutability::Persistent)
                {
                    return Err(mismatch(format!("field '{}' is not persistent", record.name)));
                }
                if record.values.iter().any(|v| !v.is_finite()) {
                    return Err(mismatch(format!("field '{}' is not finite", record.name)));
                }
                if !store.set(field, &record.values) {
                    return Err(mismatch(format!(
                        "field '{}' has {} values, expected {}",
                        record.name,
                        record.values.len(),
                        store.get(field).map_or(0, <[f64]>::len)
                    )));
                }
                supplied.insert(field);
            }
            step_id = state.step_id;
            log::info!(
                "resuming at step {step_id} with {} restored fields",
                state.fields.len()
            );
        }

        let mut needed: FieldSet = [CELL_AREA].into_iter().collect();
        for (_, p) in &pipeline {
            needed = needed.union(&p.reads()).union(&p.reads_previous());
        }
        if flags.water_quality {
            needed = needed.union(&ErosionSetup.reads());
        }
        for field in needed.iter() {
            if let Some(def) = store.def(field) {
                if def.initial == InitialValue::Required && !supplied.contains(field) {
                    return Err(ConfigError::MissingParameter {
                        name: def.name.clone(),
                    });
                }
            }
        }

        if flags.water_quality {
            let modes: IndexMap<FieldId, WriteMode> = ErosionSetup.writes().into_iter().collect();
            let previous = store.snapshot(step_id);
            let mut diagnostics = StepDiagnostics::new();
            run_propagator(
                &mut store,
                &previous,
                &ErosionSetup,
                &modes,
                &domain,
                &mut diagnostics,
                step_id,
                dt,
            )
            .map_err(ConfigError::Setup)?;
        }

        log::debug!(
            "simulation ready: {} cells, {} waterbodies, {} propagators",
            domain.cell_count(),
            domain.waterbody_count(),
            pipeline.len()
        );

        Ok(Self {
            domain,
            dt,
            flags,
            tolerance: mass_balance_tolerance,
            store,
            pipeline,
            plan,
            step_id,
            terminated: false,
            rollback_events: 0,
            last_metrics: StepMetrics::default(),
        })
    }

    /// Advance one simulated day.
    ///
    /// # Errors
    ///
    /// [`StepError::PropagatorFailed`] if any propagator fails or writes a
    /// non-finite value; the store is rolled back to the step start.
    /// [`StepError::Terminated`] after an environmental-flow-only step.
    pub fn step(&mut self) -> Result<StepReport, StepError> {
        if self.terminated {
            return Err(StepError::Terminated);
        }
        let start = Instant::now();
        let step_id = self.step_id.next();
        let previous = self.store.snapshot(self.step_id);
        self.store.reset_transient(&self.domain);

        let outcome = if self.flags.environmental_flow_only {
            StepOutcome::EnvironmentalFlowOnly
        } else if self.flags.calibration {
            StepOutcome::CalibrationOnly
        } else {
            StepOutcome::Completed
        };
        let mut diagnostics = StepDiagnostics::new();
        let mut metrics = StepMetrics::default();
        let result = self.advance(outcome, &previous, step_id, &mut diagnostics, &mut metrics);

        metrics.fallback_cells = diagnostics.fallback_cells();
        match result {
            Ok(balance) => {
                self.step_id = step_id;
                if outcome == StepOutcome::EnvironmentalFlowOnly {
                    self.terminated = true;
                    log::info!("environmental-flow-only run terminated at step {step_id}");
                }
                for report in diagnostics.reports() {
                    log::warn!("{}: {}", report.propagator, report.issue);
                }
                metrics.rollback_events = self.rollback_events;
                metrics.total_us = start.elapsed().as_micros() as u64;
                log::debug!("step {step_id} {outcome:?} in {} us", metrics.total_us);
                self.last_metrics = metrics.clone();
                Ok(StepReport {
                    step_id,
                    outcome,
                    diagnostics,
                    balance,
                    metrics,
                })
            }
            Err(e) => {
                self.store.restore(previous);
                self.rollback_events += 1;
                metrics.rollback_events = self.rollback_events;
                metrics.total_us = start.elapsed().as_micros() as u64;
                self.last_metrics = metrics;
                log::warn!("step {step_id} rolled back: {e}");
                Err(e)
            }
        }
    }

    fn advance(
        &mut self,
        outcome: StepOutcome,
        previous: &StoreSnapshot,
        step_id: StepId,
        diagnostics: &mut StepDiagnostics,
        metrics: &mut StepMetrics,
    ) -> Result<BalanceReport, StepError> {
        match outcome {
            StepOutcome::EnvironmentalFlowOnly => {
                self.run_stages(
                    &Stage::ENVIRONMENTAL_FLOW_ONLY,
                    previous,
                    step_id,
                    diagnostics,
                    metrics,
                )?;
                Ok(BalanceReport::default())
            }
            StepOutcome::CalibrationOnly => {
                self.run_stages(&Stage::CALIBRATION, previous, step_id, diagnostics, metrics)?;
                Ok(BalanceReport::default())
            }
            StepOutcome::Completed => {
                self.run_stages(&Stage::PROCESS, previous, step_id, diagnostics, metrics)?;

                let t = Instant::now();
                aggregate(&mut self.store, &self.domain, &self.flags);
                metrics.aggregation_us = t.elapsed().as_micros() as u64;

                let t = Instant::now();
                let sediment_routed = Stage::SedimentRouting.is_enabled(&self.flags);
                let balance = check_step(&self.store, previous, sediment_routed, self.tolerance);
                metrics.balance_us = t.elapsed().as_micros() as u64;

                self.run_stages(&Stage::FINALIZE, previous, step_id, diagnostics, metrics)?;
                Ok(balance)
            }
        }
    }

    fn run_stages(
        &mut self,
        stages: &[Stage],
        previous: &StoreSnapshot,
        step_id: StepId,
        diagnostics: &mut StepDiagnostics,
        metrics: &mut StepMetrics,
    ) -> Result<(), StepError> {
        for &stage in stages {
            let stage_start = Instant::now();
            for (i, (s, propagator)) in self.pipeline.iter().enumerate() {
                if *s != stage {
                    continue;
                }
                let modes =
                    self.plan
                        .write_modes_for(i)
                        .ok_or_else(|| StepError::PropagatorFailed {
                            name: propagator.name().to_string(),
                            reason: PropagatorError::ExecutionFailed {
                                reason: "no write plan".to_string(),
                            },
                        })?;
                let t = Instant::now();
                run_propagator(
                    &mut self.store,
                    previous,
                    propagator.as_ref(),
                    modes,
                    &self.domain,
                    diagnostics,
                    step_id,
                    self.dt,
                )?;
                metrics
                    .propagator_us
                    .push((propagator.name().to_string(), t.elapsed().as_micros() as u64));
            }
            metrics
                .stage_us
                .push((stage, stage_start.elapsed().as_micros() as u64));
        }
        Ok(())
    }

    /// Persistent fields at the last completed step.
    pub fn restart_state(&self) -> RestartState {
        let mut state = RestartState::new(self.step_id);
        for (name, values) in self.store.persistent() {
            state.push(name, values.to_vec());
        }
        state
    }

    /// The last completed step (`StepId(0)` before the first step of a
    /// fresh run).
    pub fn step_id(&self) -> StepId {
        self.step_id
    }

    /// Whether an environmental-flow-only step has ended the run.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Current contents of `field`.
    pub fn field(&self, field: FieldId) -> Option<&[f64]> {
        self.store.get(field)
    }

    /// Current contents of the field called `name`.
    pub fn field_by_name(&self, name: &str) -> Option<&[f64]> {
        self.store.field_id(name).and_then(|f| self.store.get(f))
    }

    /// The grid state store.
    pub fn store(&self) -> &GridStore {
        &self.store
    }

    /// Owned copy of the current store.
    pub fn snapshot(&self) -> StoreSnapshot {
        self.store.snapshot(self.step_id)
    }

    /// Metrics of the most recent step, completed or rolled back.
    pub fn last_metrics(&self) -> &StepMetrics {
        &self.last_metrics
    }

    /// The simulation domain.
    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    /// Enabled sub-systems.
    pub fn flags(&self) -> &FeatureFlags {
        &self.flags
    }

    /// Step length in seconds.
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Stage and name of every propagator, in execution order.
    pub fn pipeline(&self) -> Vec<(Stage, &str)> {
        self.pipeline.iter().map(|(s, p)| (*s, p.name())).collect()
    }
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("domain", &self.domain)
            .field("dt", &self.dt)
            .field("flags", &self.flags)
            .field("step_id", &self.step_id)
            .field("terminated", &self.terminated)
            .field("pipeline", &self.pipeline())
            .finish()
    }
}
