//! The prelude alone is enough to configure, run and resume a simulation.

use loess::prelude::*;
use loess::propagators::fields::SOIL_STORAGE;

#[test]
fn run_save_resume() {
    let config = || {
        SimulationConfig::new(Domain::new(3))
            .parameter("cell_area", vec![2.5e5])
            .parameter("soil_storage", vec![0.1, 0.2, 0.3])
    };
    let mut sim = Simulation::new(config()).unwrap();
    sim.step().unwrap();
    sim.step().unwrap();

    let mut bytes = Vec::new();
    write_restart(&mut bytes, &sim.restart_state()).unwrap();
    let state: RestartState = read_restart(&mut bytes.as_slice()).unwrap();

    let mut resumed_config = config();
    resumed_config.parameters.shift_remove("soil_storage");
    resumed_config.restart = Some(state);
    let resumed = Simulation::new(resumed_config).unwrap();
    assert_eq!(resumed.step_id(), StepId(2));
    assert_eq!(resumed.field(SOIL_STORAGE).unwrap(), &[0.1, 0.2, 0.3]);
}
