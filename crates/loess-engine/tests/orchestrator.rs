//! End-to-end tests driving the orchestrator with collaborator stubs.

use loess_bench::catchment_profile;
use loess_core::{Domain, PropagatorError, StepError, StepId};
use loess_engine::{
    BalanceCheck, ConfigError, Simulation, SimulationConfig, Stage, StepOutcome,
};
use loess_propagator::PipelineError;
use loess_propagators::fields::*;
use loess_restart::{read_restart, write_restart, RestartState};
use loess_test_utils::{
    assert_close, CatchmentSample, ConstPropagator, FailingPropagator, LagPropagator,
    SeriesPropagator,
};
use proptest::prelude::*;

/// One cell, one sub-step, water quality and routing on, with unit
/// transport constants so `capacity = Q / A`.
fn one_cell(mass: f64, conc: f64, q: f64, a: f64, v: f64) -> SimulationConfig {
    let mut config = SimulationConfig::new(Domain::new(1))
        .parameter("cell_area", vec![1.0e6])
        .parameter("k_factor", vec![0.03])
        .parameter("c_factor", vec![0.2])
        .parameter("ls_factor", vec![1.5])
        .parameter("rock_fraction", vec![5.0])
        .parameter("tan_slope", vec![0.05])
        .parameter("manning_overland", vec![0.3])
        .parameter("peak_rate_factor", vec![1.0])
        .parameter("soil_depth_top", vec![0.1])
        .parameter("landcover_fraction", vec![0.25])
        .parameter("channel_sed", vec![mass])
        .parameter("channel_sed_conc", vec![conc])
        .parameter("channel_storage", vec![v])
        .collaborator(
            Stage::Routing,
            Box::new(SeriesPropagator::fixed("discharge", CHANNEL_DISCHARGE, vec![q])),
        )
        .collaborator(
            Stage::Routing,
            Box::new(SeriesPropagator::fixed("cross_section", CHANNEL_CROSS_SECTION, vec![a])),
        )
        .collaborator(
            Stage::Routing,
            Box::new(SeriesPropagator::fixed("volume", CHANNEL_VOLUME, vec![v])),
        );
    config.flags.water_quality = true;
    config.sediment.a05 = Some(0.5);
    config.sediment.csp = Some(1.0);
    config.sediment.spexp = 1.0;
    config
}

#[test]
fn deposition_branch_through_orchestrator() {
    let mut sim = Simulation::new(one_cell(500.0, 5.0, 3.0, 1.0, 100.0)).unwrap();
    let report = sim.step().unwrap();
    assert_eq!(report.outcome, StepOutcome::Completed);
    assert_eq!(sim.field(CHANNEL_SED_DEPOSITION).unwrap(), &[200.0]);
    assert_eq!(sim.field(CHANNEL_SED_DEGRADATION).unwrap(), &[0.0]);
    assert_eq!(sim.field(CHANNEL_SED).unwrap(), &[300.0]);
    assert_eq!(sim.field(CHANNEL_SED_CONC).unwrap(), &[3.0]);
    // 300 kg in 100 m3, reported in g/m3.
    assert_close(sim.field(CHANNEL_SED_TOTAL_CONC).unwrap()[0], 3000.0, 1e-12);
    assert!(report.balance.is_balanced());

    // At capacity nothing moves.
    sim.step().unwrap();
    assert_eq!(sim.field(CHANNEL_SED).unwrap(), &[300.0]);
    assert_eq!(sim.field(CHANNEL_SED_DEPOSITION).unwrap(), &[0.0]);
}

#[test]
fn degradation_branch_through_orchestrator() {
    let mut sim = Simulation::new(one_cell(50.0, 1.0, 3.0, 1.0, 50.0)).unwrap();
    sim.step().unwrap();
    assert_close(sim.field(CHANNEL_SED_DEGRADATION).unwrap()[0], 0.72, 1e-12);
    assert_eq!(sim.field(CHANNEL_SED_DEPOSITION).unwrap(), &[0.0]);
    assert_close(sim.field(CHANNEL_SED).unwrap()[0], 50.72, 1e-12);
}

#[test]
fn zero_runoff_yields_nothing() {
    let mut sim = Simulation::new(one_cell(0.0, 0.0, 1.0, 1.0, 10.0)).unwrap();
    sim.step().unwrap();
    assert!(sim.field(PEAK_RUNOFF).unwrap().iter().all(|&q| q == 0.0));
    assert!(sim.field(SEDIMENT_YIELD).unwrap().iter().all(|&y| y == 0.0));
    assert_eq!(sim.field(SUM_SEDIMENT_YIELD).unwrap(), &[0.0]);
}

#[test]
fn runoff_produces_yield() {
    let config = one_cell(0.0, 0.0, 1.0, 1.0, 10.0)
        .collaborator(
            Stage::Soil,
            Box::new(ConstPropagator::new("direct_runoff", DIRECT_RUNOFF, 0.02)),
        )
        .collaborator(
            Stage::Soil,
            Box::new(ConstPropagator::new("travel_time", CHANNEL_TRAVEL_TIME, 3600.0)),
        );
    let mut sim = Simulation::new(config).unwrap();
    sim.step().unwrap();
    assert!(sim.field(SUM_SEDIMENT_YIELD).unwrap()[0] > 0.0);
    assert!(sim.field(SEDIMENT_YIELD_TON_HA).unwrap()[0] > 0.0);
    assert!(sim.field(SUM_PEAK_RUNOFF).unwrap()[0] > 0.0);
}

fn with_abstraction(depth: f64) -> SimulationConfig {
    let mut config = one_cell(500.0, 5.0, 3.0, 1.0, 100.0).collaborator(
        Stage::Routing,
        Box::new(ConstPropagator::new("demand", CHANNEL_ABSTRACTION, depth)),
    );
    config.flags.water_demand = true;
    config
}

#[test]
fn water_demand_abstraction_leaves_the_channel() {
    // 1e-5 m over 1e6 m2 at 5 kg/m3 takes 50 kg before routing.
    let mut sim = Simulation::new(with_abstraction(1.0e-5)).unwrap();
    let before = sim.field(CHANNEL_SED).unwrap()[0];
    let report = sim.step().unwrap();
    assert!(report.balance.is_balanced(), "{:?}", report.balance);

    let abstracted = sim.field(CHANNEL_SED_ABSTRACTED).unwrap()[0];
    let deposition = sim.field(CHANNEL_SED_DEPOSITION).unwrap()[0];
    let degradation = sim.field(CHANNEL_SED_DEGRADATION).unwrap()[0];
    let after = sim.field(CHANNEL_SED).unwrap()[0];
    assert_close(abstracted, 50.0, 1e-9);
    assert_close(deposition, 200.0, 1e-9);
    assert_eq!(degradation, 0.0);
    assert_close(after, before + degradation - deposition - abstracted, 1e-9);
    assert_close(after, 250.0, 1e-9);
}

#[test]
fn water_demand_abstraction_clamped_to_channel_mass() {
    // 1e-3 m would carry 5000 kg; only the 500 kg in the channel leave.
    let mut sim = Simulation::new(with_abstraction(1.0e-3)).unwrap();
    let report = sim.step().unwrap();
    assert!(report.balance.is_balanced(), "{:?}", report.balance);
    assert_eq!(sim.field(CHANNEL_SED_ABSTRACTED).unwrap(), &[500.0]);
    assert_eq!(sim.field(CHANNEL_SED_DEPOSITION).unwrap(), &[0.0]);
    assert_eq!(sim.field(CHANNEL_SED).unwrap(), &[0.0]);
    assert_eq!(sim.field(CHANNEL_SED_CONC).unwrap(), &[0.0]);
}

#[test]
fn abstraction_ignored_without_water_demand() {
    let mut config = with_abstraction(1.0e-5);
    config.flags.water_demand = false;
    let mut sim = Simulation::new(config).unwrap();
    sim.step().unwrap();
    assert_eq!(sim.field(CHANNEL_SED_ABSTRACTED).unwrap(), &[0.0]);
    assert_eq!(sim.field(CHANNEL_SED).unwrap(), &[300.0]);
}

#[test]
fn waterbody_settles_to_equilibrium() {
    let domain = Domain::new(1).with_waterbodies(vec![0]).unwrap();
    let mut config = SimulationConfig::new(domain)
        .parameter("cell_area", vec![1.0e6])
        .parameter("k_factor", vec![0.03])
        .parameter("c_factor", vec![0.2])
        .parameter("ls_factor", vec![1.5])
        .parameter("rock_fraction", vec![0.0])
        .parameter("tan_slope", vec![0.05])
        .parameter("manning_overland", vec![0.3])
        .parameter("peak_rate_factor", vec![1.0])
        .parameter("soil_depth_top", vec![0.1])
        .parameter("landcover_fraction", vec![0.25])
        .parameter("waterbody_storage", vec![1000.0])
        .parameter("waterbody_sed", vec![20.0]);
    config.flags.water_quality = true;
    config.flags.waterbodies = true;
    config.sediment.a05 = Some(0.5);
    config.sediment.csp = Some(1.0e-4);
    config.sediment.settling.eq_conc = Some(10.0);
    let mut sim = Simulation::new(config).unwrap();
    sim.step().unwrap();
    assert_close(sim.field(WATERBODY_SED_CONC).unwrap()[0], 0.01, 1e-12);
    assert_close(sim.field(WATERBODY_SED_SETTLED).unwrap()[0], 10.0, 1e-9);
    assert_close(sim.field(WATERBODY_SED).unwrap()[0], 10.0, 1e-9);
    // No outflow: detention time falls back to zero.
    assert_eq!(sim.field(DETENTION_TIME).unwrap(), &[0.0]);
    assert_close(sim.field(WATERBODY_SED_TOTAL_CONC).unwrap()[0], 10.0, 1e-9);
    assert_close(sim.field(LAKE_RESERVOIR_STORAGE).unwrap()[0], 1000.0, 1e-12);
}

#[test]
fn random_catchments_conserve_channel_sediment() {
    for seed in [1, 2, 3, 5, 8] {
        let sample = CatchmentSample::generate(seed, 24, 3);
        let mut sim = Simulation::new(catchment_profile(&sample).unwrap()).unwrap();
        for _ in 0..5 {
            let report = sim.step().unwrap();
            assert!(
                report.balance.violation(BalanceCheck::ChannelSediment).is_none(),
                "seed {seed}: {:?}",
                report.balance
            );
            let mass = sim.field(CHANNEL_SED).unwrap();
            assert!(mass.iter().all(|&m| m >= 0.0), "seed {seed}: negative mass");
            let conc = sim.field(CHANNEL_SED_CONC).unwrap();
            assert!(conc.iter().all(|&c| c >= 0.0), "seed {seed}: negative conc");
            let deposition = sim.field(CHANNEL_SED_DEPOSITION).unwrap();
            let degradation = sim.field(CHANNEL_SED_DEGRADATION).unwrap();
            assert!(deposition.iter().chain(degradation).all(|&v| v >= 0.0));
            let yield_ = sim.field(SEDIMENT_YIELD).unwrap();
            assert!(yield_.iter().all(|&y| y >= 0.0));
        }
    }
}

#[test]
fn water_balance_violation_is_reported_not_fatal() {
    let config = SimulationConfig::new(Domain::new(2))
        .parameter("cell_area", vec![1.0e6])
        .collaborator(
            Stage::Soil,
            Box::new(SeriesPropagator::fixed("soil", SOIL_STORAGE, vec![0.0, 0.5]).incremental()),
        );
    let mut sim = Simulation::new(config).unwrap();
    let report = sim.step().unwrap();
    let v = report
        .balance
        .violation(BalanceCheck::SoilGroundwater)
        .unwrap();
    assert_eq!(v.cells, 1);
    assert_eq!(v.worst_cell, 1);
    assert_close(v.magnitude, -0.5, 1e-12);
    assert_eq!(sim.field(SOIL_STORAGE).unwrap(), &[0.0, 0.5]);
    assert_close(sim.field(TOTAL_WATER_STORAGE).unwrap()[1], 0.5, 1e-12);
}

#[test]
fn non_finite_write_rolls_back() {
    let config = SimulationConfig::new(Domain::new(2))
        .parameter("cell_area", vec![1.0e6])
        .parameter("soil_storage", vec![0.3])
        .collaborator(
            Stage::Groundwater,
            Box::new(ConstPropagator::new("nan", GROUNDWATER_STORAGE, f64::NAN)),
        );
    let mut sim = Simulation::new(config).unwrap();
    let before = sim.snapshot();
    let err = sim.step().unwrap_err();
    assert_eq!(
        err,
        StepError::PropagatorFailed {
            name: "nan".to_string(),
            reason: PropagatorError::NonFinite {
                field_id: GROUNDWATER_STORAGE,
                index: Some(0),
            },
        }
    );
    assert_eq!(sim.snapshot(), before);
    assert_eq!(sim.step_id(), StepId(0));
}

#[test]
fn environmental_flow_only_terminates() {
    let mut config = SimulationConfig::new(Domain::new(3))
        .parameter("cell_area", vec![1.0e6])
        .collaborator(
            Stage::Soil,
            Box::new(FailingPropagator::new("soil", SOIL_STORAGE, 0)),
        )
        .collaborator(
            Stage::EnvironmentalFlow,
            Box::new(ConstPropagator::new("env_flow", GRIDCELL_STORAGE, 2.0)),
        );
    config.flags.environmental_flow_only = true;
    let mut sim = Simulation::new(config).unwrap();
    let report = sim.step().unwrap();
    assert_eq!(report.outcome, StepOutcome::EnvironmentalFlowOnly);
    assert!(sim.is_terminated());
    assert_eq!(sim.field(GRIDCELL_STORAGE).unwrap(), &[2.0; 3]);
    assert!(matches!(sim.step(), Err(StepError::Terminated)));
}

#[test]
fn calibration_runs_forcing_and_output_only() {
    let mut config = SimulationConfig::new(Domain::new(2))
        .parameter("cell_area", vec![1.0e6])
        .collaborator(
            Stage::Soil,
            Box::new(FailingPropagator::new("soil", SOIL_STORAGE, 0)),
        )
        .collaborator(
            Stage::ReadMeteo,
            Box::new(ConstPropagator::new("meteo", LAND_EVAPOTRANSPIRATION, 0.004)),
        );
    config.flags.calibration = true;
    let mut sim = Simulation::new(config).unwrap();
    for expected in 1..=3 {
        let report = sim.step().unwrap();
        assert_eq!(report.outcome, StepOutcome::CalibrationOnly);
        assert_eq!(report.step_id, StepId(expected));
        assert!(report.balance.is_balanced());
        assert!(report.metrics.stage(Stage::Soil).is_none());
    }
    assert_eq!(sim.field(LAND_EVAPOTRANSPIRATION).unwrap(), &[0.004; 2]);
    assert!(!sim.is_terminated());
}

#[test]
fn missing_erosion_factor_is_fatal() {
    let mut config = SimulationConfig::new(Domain::new(1)).parameter("cell_area", vec![1.0]);
    config.flags.water_quality = true;
    config.sediment.a05 = Some(0.5);
    config.sediment.csp = Some(1.0e-4);
    assert_eq!(
        Simulation::new(config).unwrap_err(),
        ConfigError::MissingParameter {
            name: "k_factor".to_string()
        }
    );
}

#[test]
fn collaborator_step_ceiling_bounds_dt() {
    let hourly = || {
        Box::new(
            SeriesPropagator::fixed("hourly_routing", CHANNEL_DISCHARGE, vec![1.0])
                .with_max_dt(3600.0),
        )
    };
    let config = SimulationConfig::new(Domain::new(1))
        .parameter("cell_area", vec![1.0e6])
        .collaborator(Stage::Routing, hourly());
    assert_eq!(
        Simulation::new(config).unwrap_err(),
        ConfigError::Pipeline(PipelineError::StepTooLong {
            dt: 86_400.0,
            max_dt: 3600.0,
            propagator: "hourly_routing".to_string(),
        })
    );

    let mut config = SimulationConfig::new(Domain::new(1))
        .parameter("cell_area", vec![1.0e6])
        .collaborator(Stage::Routing, hourly());
    config.dt = 3600.0;
    let mut sim = Simulation::new(config).unwrap();
    sim.step().unwrap();
    assert_eq!(sim.dt(), 3600.0);
    assert_eq!(sim.field(CHANNEL_DISCHARGE).unwrap(), &[1.0]);
}

#[test]
fn step_start_view_ignores_same_step_writes() {
    // Storage is updated first; the volume collaborator still sees the
    // value the day started with.
    let config = SimulationConfig::new(Domain::new(1))
        .parameter("cell_area", vec![1.0e6])
        .parameter("channel_storage", vec![100.0])
        .collaborator(
            Stage::Routing,
            Box::new(
                SeriesPropagator::new("storage", CHANNEL_STORAGE, vec![vec![150.0], vec![80.0]])
                    .incremental(),
            ),
        )
        .collaborator(
            Stage::Routing,
            Box::new(LagPropagator::new("volume", CHANNEL_STORAGE, CHANNEL_VOLUME)),
        );
    let mut sim = Simulation::new(config).unwrap();
    sim.step().unwrap();
    assert_eq!(sim.field(CHANNEL_STORAGE).unwrap(), &[150.0]);
    assert_eq!(sim.field(CHANNEL_VOLUME).unwrap(), &[100.0]);
    sim.step().unwrap();
    assert_eq!(sim.field(CHANNEL_STORAGE).unwrap(), &[80.0]);
    assert_eq!(sim.field(CHANNEL_VOLUME).unwrap(), &[150.0]);
}

#[test]
fn restart_resumes_identically() {
    let sample = CatchmentSample::generate(42, 16, 2);
    let mut reference = Simulation::new(catchment_profile(&sample).unwrap()).unwrap();
    for _ in 0..3 {
        reference.step().unwrap();
    }

    let mut bytes = Vec::new();
    write_restart(&mut bytes, &reference.restart_state()).unwrap();
    let state = read_restart(&mut bytes.as_slice()).unwrap();
    assert_eq!(state.step_id, StepId(3));

    let mut config = catchment_profile(&sample).unwrap();
    config.restart = Some(state);
    let mut resumed = Simulation::new(config).unwrap();
    assert_eq!(resumed.step_id(), StepId(3));

    for _ in 0..2 {
        reference.step().unwrap();
        resumed.step().unwrap();
    }
    assert_eq!(resumed.step_id(), StepId(5));
    assert_eq!(resumed.restart_state(), reference.restart_state());
}

#[test]
fn restart_rejects_static_fields() {
    let mut state = RestartState::new(StepId(1));
    state.push("cell_area", vec![1.0]);
    let mut config = SimulationConfig::new(Domain::new(1)).parameter("cell_area", vec![1.0]);
    config.restart = Some(state);
    assert!(matches!(
        Simulation::new(config),
        Err(ConfigError::RestartMismatch { .. })
    ));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn every_step_closes_the_sediment_audit(
        seed in any::<u64>(),
        cells in 1usize..32,
        substeps in 1usize..5,
    ) {
        let sample = CatchmentSample::generate(seed, cells, substeps);
        let mut sim = Simulation::new(catchment_profile(&sample).unwrap()).unwrap();
        for _ in 0..3 {
            let report = sim.step().unwrap();
            prop_assert!(report.balance.is_balanced(), "{:?}", report.balance);
            let deposition = sim.field(CHANNEL_SED_DEPOSITION).unwrap().to_vec();
            let degradation = sim.field(CHANNEL_SED_DEGRADATION).unwrap();
            for (dep, deg) in deposition.iter().zip(degradation) {
                // Summed over sub-steps both can be positive, never negative.
                prop_assert!(*dep >= 0.0 && *deg >= 0.0);
            }
        }
    }
}
