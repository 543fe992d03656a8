//! The fixed per-day stage sequence.

use crate::config::FeatureFlags;

/// One slot in the daily module sequence.
///
/// Collaborator propagators are registered against a stage; the sediment
/// core occupies [`Stage::WaterQuality`] and [`Stage::SedimentRouting`].
/// Within a stage, collaborators run first, in registration order, then
/// the core propagators of that stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    /// Meteorological forcing ingestion.
    ReadMeteo,
    /// Potential evaporation.
    EvaporationPotential,
    /// External inflow hydrographs.
    Inflow,
    /// Lake and reservoir routing (waterbodies only).
    LakesReservoirs,
    /// Snow and frost.
    SnowFrost,
    /// Landcover fraction updates.
    LandCoverFraction,
    /// Capillary rise from groundwater.
    CapillaryRise,
    /// Soil moisture accounting.
    Soil,
    /// Groundwater.
    Groundwater,
    /// Runoff concentration (if enabled).
    RunoffConcentration,
    /// Erosion: time of concentration and sediment yield (water quality only).
    WaterQuality,
    /// Small lakes (if enabled).
    SmallLakes,
    /// Kinematic channel routing (if enabled).
    Routing,
    /// Channel and waterbody sediment transport (water quality and routing).
    SedimentRouting,
    /// Environmental flow.
    EnvironmentalFlow,
    /// Output writing.
    Output,
}

impl Stage {
    /// Every stage, in execution order.
    pub const ORDER: [Stage; 16] = [
        Stage::ReadMeteo,
        Stage::EvaporationPotential,
        Stage::Inflow,
        Stage::LakesReservoirs,
        Stage::SnowFrost,
        Stage::LandCoverFraction,
        Stage::CapillaryRise,
        Stage::Soil,
        Stage::Groundwater,
        Stage::RunoffConcentration,
        Stage::WaterQuality,
        Stage::SmallLakes,
        Stage::Routing,
        Stage::SedimentRouting,
        Stage::EnvironmentalFlow,
        Stage::Output,
    ];

    /// Stages run before end-of-step aggregation in a full step.
    pub const PROCESS: [Stage; 14] = [
        Stage::ReadMeteo,
        Stage::EvaporationPotential,
        Stage::Inflow,
        Stage::LakesReservoirs,
        Stage::SnowFrost,
        Stage::LandCoverFraction,
        Stage::CapillaryRise,
        Stage::Soil,
        Stage::Groundwater,
        Stage::RunoffConcentration,
        Stage::WaterQuality,
        Stage::SmallLakes,
        Stage::Routing,
        Stage::SedimentRouting,
    ];

    /// Stages run after the mass-balance checks in a full step.
    pub const FINALIZE: [Stage; 2] = [Stage::EnvironmentalFlow, Stage::Output];

    /// Stages of a calibration step.
    pub const CALIBRATION: [Stage; 2] = [Stage::ReadMeteo, Stage::Output];

    /// Stages of an environmental-flow-only step.
    pub const ENVIRONMENTAL_FLOW_ONLY: [Stage; 2] = [Stage::EnvironmentalFlow, Stage::Output];

    /// Short name used in logs and metrics.
    pub fn name(self) -> &'static str {
        match self {
            Self::ReadMeteo => "read_meteo",
            Self::EvaporationPotential => "evaporation_potential",
            Self::Inflow => "inflow",
            Self::LakesReservoirs => "lakes_reservoirs",
            Self::SnowFrost => "snow_frost",
            Self::LandCoverFraction => "landcover_fraction",
            Self::CapillaryRise => "capillary_rise",
            Self::Soil => "soil",
            Self::Groundwater => "groundwater",
            Self::RunoffConcentration => "runoff_concentration",
            Self::WaterQuality => "water_quality",
            Self::SmallLakes => "small_lakes",
            Self::Routing => "routing",
            Self::SedimentRouting => "sediment_routing",
            Self::EnvironmentalFlow => "environmental_flow",
            Self::Output => "output",
        }
    }

    /// Whether the stage runs under `flags`.
    pub fn is_enabled(self, flags: &FeatureFlags) -> bool {
        match self {
            Self::LakesReservoirs => flags.waterbodies,
            Self::RunoffConcentration => flags.runoff_concentration,
            Self::WaterQuality => flags.water_quality,
            Self::SmallLakes => flags.small_lakes,
            Self::Routing => flags.routing,
            Self::SedimentRouting => flags.water_quality && flags.routing,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_and_finalize_cover_order() {
        let joined: Vec<Stage> = Stage::PROCESS
            .iter()
            .chain(Stage::FINALIZE.iter())
            .copied()
            .collect();
        assert_eq!(joined, Stage::ORDER.to_vec());
    }

    #[test]
    fn order_is_sorted() {
        assert!(Stage::ORDER.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn sediment_routing_needs_both_flags() {
        let mut flags = FeatureFlags {
            water_quality: true,
            routing: false,
            ..FeatureFlags::default()
        };
        assert!(Stage::WaterQuality.is_enabled(&flags));
        assert!(!Stage::SedimentRouting.is_enabled(&flags));
        flags.routing = true;
        assert!(Stage::SedimentRouting.is_enabled(&flags));
    }

    #[test]
    fn unguarded_stages_always_run() {
        let flags = FeatureFlags {
            routing: false,
            ..FeatureFlags::default()
        };
        for stage in [Stage::ReadMeteo, Stage::Soil, Stage::Output] {
            assert!(stage.is_enabled(&flags));
        }
        assert!(!Stage::Routing.is_enabled(&flags));
        assert!(!Stage::LakesReservoirs.is_enabled(&flags));
    }
}
