//! Benchmark profiles for the Loess catchment sediment simulator.
//!
//! Provides pre-built [`SimulationConfig`] profiles driven by seeded
//! random catchments:
//!
//! - [`catchment_profile`]: any [`CatchmentSample`], water quality and routing on
//! - [`reference_profile`]: 10K cells, 4 routing sub-steps, 1% waterbodies
//! - [`stress_profile`]: 100K cells, same layout

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use loess_core::Domain;
use loess_engine::{ConfigError, SimulationConfig, Stage};
use loess_propagators::fields::{
    CHANNEL_CROSS_SECTION, CHANNEL_DISCHARGE, CHANNEL_TRAVEL_TIME, CHANNEL_VOLUME, DIRECT_RUNOFF,
};
use loess_test_utils::{CatchmentSample, SeriesPropagator};

/// Static fields, runoff and routing collaborators for `sample`.
///
/// Soil supplies direct runoff and channel travel time; routing supplies
/// sub-step discharge, cross-section and volume. Every collaborator
/// repeats the same day, so runs are reproducible across restarts.
///
/// # Errors
///
/// Returns [`ConfigError::Domain`] if the sample has no routing sub-steps.
pub fn catchment_profile(sample: &CatchmentSample) -> Result<SimulationConfig, ConfigError> {
    catchment_profile_on(sample, Domain::new(sample.cells))
}

fn catchment_profile_on(
    sample: &CatchmentSample,
    domain: Domain,
) -> Result<SimulationConfig, ConfigError> {
    let substeps = u32::try_from(sample.substeps).unwrap_or(u32::MAX);
    let domain = domain.with_substeps(substeps)?;
    let collaborator = |name: &str, field, values: &[f64]| {
        Box::new(SeriesPropagator::fixed(name, field, values.to_vec()))
    };
    let mut config = SimulationConfig::new(domain)
        .parameter("cell_area", sample.cell_area.clone())
        .parameter("k_factor", sample.k_factor.clone())
        .parameter("c_factor", sample.c_factor.clone())
        .parameter("ls_factor", sample.ls_factor.clone())
        .parameter("rock_fraction", sample.rock_fraction.clone())
        .parameter("tan_slope", sample.tan_slope.clone())
        .parameter("manning_overland", sample.manning_overland.clone())
        .parameter("peak_rate_factor", sample.peak_rate_factor.clone())
        .parameter("soil_depth_top", sample.soil_depth_top.clone())
        .parameter("landcover_fraction", sample.landcover_fraction.clone())
        .collaborator(
            Stage::Soil,
            collaborator("direct_runoff", DIRECT_RUNOFF, &sample.direct_runoff),
        )
        .collaborator(
            Stage::Soil,
            collaborator("travel_time", CHANNEL_TRAVEL_TIME, &sample.travel_time),
        )
        .collaborator(
            Stage::Routing,
            collaborator("discharge", CHANNEL_DISCHARGE, &sample.discharge),
        )
        .collaborator(
            Stage::Routing,
            collaborator("cross_section", CHANNEL_CROSS_SECTION, &sample.cross_section),
        )
        .collaborator(
            Stage::Routing,
            collaborator("volume", CHANNEL_VOLUME, &sample.channel_volume),
        );
    config.flags.water_quality = true;
    config.sediment.a05 = Some(0.3);
    config.sediment.csp = Some(1.0e-4);
    Ok(config)
}

/// Catchment of `cells` cells and 4 sub-steps with a lake on every
/// hundredth cell.
fn profile(seed: u64, cells: usize) -> Result<SimulationConfig, ConfigError> {
    let sample = CatchmentSample::generate(seed, cells, 4);
    let lakes: Vec<usize> = (0..cells).step_by(100).collect();
    let lake_count = lakes.len();
    let domain = Domain::new(cells).with_waterbodies(lakes)?;
    let mut config = catchment_profile_on(&sample, domain)?
        .parameter("waterbody_storage", vec![5.0e5; lake_count])
        .parameter("waterbody_sed", vec![2.0e4; lake_count]);
    config.flags.waterbodies = true;
    Ok(config)
}

/// Build a reference benchmark profile: 10K cells.
pub fn reference_profile(seed: u64) -> Result<SimulationConfig, ConfigError> {
    profile(seed, 10_000)
}

/// Build a stress benchmark profile: 100K cells.
pub fn stress_profile(seed: u64) -> Result<SimulationConfig, ConfigError> {
    profile(seed, 100_000)
}
