//! The catchment field catalogue.
//!
//! Every grid field a Loess simulation allocates, with its [`FieldId`].
//! `FieldId(n)` is the position of the definition in
//! [`catchment_fields()`], so the constants and the list must stay in the
//! same order.

use loess_core::{FieldDef, FieldId, FieldMutability, FieldType, InitialValue};

use FieldMutability::{Persistent, Static, Transient};
use FieldType::{Fractional, Scalar, Substep, Waterbody};
use InitialValue::{Constant, Required, Zero};

// ── Static erosion parameters ──────────────────────────────────────

/// Cell area (m2).
pub const CELL_AREA: FieldId = FieldId(0);
/// USLE soil erodibility factor K.
pub const K_FACTOR: FieldId = FieldId(1);
/// USLE cover and management factor C.
pub const C_FACTOR: FieldId = FieldId(2);
/// USLE topographic factor LS.
pub const LS_FACTOR: FieldId = FieldId(3);
/// Coarse fragments in the first soil layer (%).
pub const ROCK_FRACTION: FieldId = FieldId(4);
/// Coarse-fragment correction CFRG, derived from [`ROCK_FRACTION`].
pub const COARSE_FRAGMENT_FACTOR: FieldId = FieldId(5);
/// Overland slope length (m).
pub const SLOPE_LENGTH: FieldId = FieldId(6);
/// Tangent of the cell slope, floored at
/// [`MIN_TAN_SLOPE`](crate::erosion_setup::MIN_TAN_SLOPE).
pub const TAN_SLOPE: FieldId = FieldId(7);
/// Manning roughness of overland flow, per landcover.
pub const MANNING_OVERLAND: FieldId = FieldId(8);
/// Channel erodibility factor Kch.
pub const CHANNEL_ERODIBILITY: FieldId = FieldId(9);
/// Channel cover factor Cch.
pub const CHANNEL_COVER: FieldId = FieldId(10);
/// Ratio of peak to mean channel discharge.
pub const PEAK_RATE_FACTOR: FieldId = FieldId(11);
/// Depth of the first soil layer (m).
pub const SOIL_DEPTH_TOP: FieldId = FieldId(12);

// ── Collaborator-supplied state ────────────────────────────────────

/// Landcover area fractions of each cell.
pub const LANDCOVER_FRACTION: FieldId = FieldId(13);
/// Daily direct runoff per landcover (m).
pub const DIRECT_RUNOFF: FieldId = FieldId(14);
/// Channel travel time through the cell (s).
pub const CHANNEL_TRAVEL_TIME: FieldId = FieldId(15);
/// Channel discharge per routing sub-step (m3/s).
pub const CHANNEL_DISCHARGE: FieldId = FieldId(16);
/// Wetted channel cross-section per routing sub-step (m2).
pub const CHANNEL_CROSS_SECTION: FieldId = FieldId(17);
/// Channel water volume per routing sub-step (m3).
pub const CHANNEL_VOLUME: FieldId = FieldId(18);
/// Water abstracted from the channel for demand (m over the cell).
pub const CHANNEL_ABSTRACTION: FieldId = FieldId(19);
/// Lake/reservoir storage (m3).
pub const WATERBODY_STORAGE: FieldId = FieldId(20);
/// Lake/reservoir outflow (m over the cell per day).
pub const WATERBODY_OUTFLOW: FieldId = FieldId(21);
/// Groundwater storage (m).
pub const GROUNDWATER_STORAGE: FieldId = FieldId(22);
/// Soil water storage over all layers (m).
pub const SOIL_STORAGE: FieldId = FieldId(23);
/// Channel water storage (m3).
pub const CHANNEL_STORAGE: FieldId = FieldId(24);
/// Small-lake storage (m3).
pub const SMALL_LAKE_STORAGE: FieldId = FieldId(25);
/// Storage in the runoff-concentration reservoir (m).
pub const GRIDCELL_STORAGE: FieldId = FieldId(26);
/// Channel evaporation (m).
pub const CHANNEL_EVAPORATION: FieldId = FieldId(27);
/// Land evapotranspiration (m).
pub const LAND_EVAPOTRANSPIRATION: FieldId = FieldId(28);
/// Lake/reservoir evaporation (m).
pub const WATERBODY_EVAPORATION: FieldId = FieldId(29);
/// Small-lake evaporation (m).
pub const SMALL_LAKE_EVAPORATION: FieldId = FieldId(30);
/// Water entering the soil/groundwater column this step (m).
pub const SOIL_GROUNDWATER_INFLOW: FieldId = FieldId(31);
/// Water leaving the soil/groundwater column this step (m).
pub const SOIL_GROUNDWATER_OUTFLOW: FieldId = FieldId(32);

// ── Time of concentration, per landcover ───────────────────────────

/// Runoff rate (m3/s).
pub const RUNOFF_RATE: FieldId = FieldId(33);
/// Direct runoff depth (mm).
pub const DIRECT_RUNOFF_MM: FieldId = FieldId(34);
/// Overland flow velocity term.
pub const OVERLAND_VELOCITY: FieldId = FieldId(35);
/// Overland time of concentration (h).
pub const OVERLAND_TOC: FieldId = FieldId(36);
/// Channel time of concentration (h).
pub const CHANNEL_TOC: FieldId = FieldId(37);
/// Total time of concentration (h).
pub const TIME_OF_CONCENTRATION: FieldId = FieldId(38);
/// Fraction of daily rain falling within the time of concentration.
pub const RAIN_FRACTION_IN_TOC: FieldId = FieldId(39);
/// Peak runoff rate (m3/s).
pub const PEAK_RUNOFF: FieldId = FieldId(40);

// ── Sediment yield ─────────────────────────────────────────────────

/// MUSLE sediment yield per landcover (1000 kg/day).
pub const SEDIMENT_YIELD: FieldId = FieldId(41);
/// Soil loss depth per landcover (mm).
pub const SOIL_LOSS_DEPTH: FieldId = FieldId(42);
/// Landcover-weighted sediment yield.
pub const SUM_SEDIMENT_YIELD: FieldId = FieldId(43);
/// Landcover-weighted peak runoff.
pub const SUM_PEAK_RUNOFF: FieldId = FieldId(44);
/// Landcover-weighted time of concentration.
pub const SUM_TIME_OF_CONCENTRATION: FieldId = FieldId(45);
/// Landcover-weighted soil loss depth.
pub const SUM_SOIL_LOSS_DEPTH: FieldId = FieldId(46);
/// Landcover-weighted runoff rate.
pub const SUM_RUNOFF_RATE: FieldId = FieldId(47);
/// Landcover-weighted overland time of concentration.
pub const SUM_OVERLAND_TOC: FieldId = FieldId(48);
/// Landcover-weighted channel time of concentration.
pub const SUM_CHANNEL_TOC: FieldId = FieldId(49);
/// Landcover-weighted direct runoff depth.
pub const SUM_DIRECT_RUNOFF_MM: FieldId = FieldId(50);
/// Sediment yield per unit area (t/ha).
pub const SEDIMENT_YIELD_TON_HA: FieldId = FieldId(51);

// ── Channel sediment ───────────────────────────────────────────────

/// Suspended sediment in channel storage (kg).
pub const CHANNEL_SED: FieldId = FieldId(52);
/// Channel sediment concentration (kg/m3).
pub const CHANNEL_SED_CONC: FieldId = FieldId(53);
/// Channel sediment held outside the active pool (kg).
pub const CHANNEL_SED_INACTIVE: FieldId = FieldId(54);
/// Channel deposition summed over the step's sub-steps (kg).
pub const CHANNEL_SED_DEPOSITION: FieldId = FieldId(55);
/// Channel-bed degradation summed over the step's sub-steps (kg).
pub const CHANNEL_SED_DEGRADATION: FieldId = FieldId(56);
/// Sediment abstracted with demand water (kg).
pub const CHANNEL_SED_ABSTRACTED: FieldId = FieldId(57);
/// Sediment carried off by channels that ran dry (kg).
pub const CHANNEL_SED_FLUSHED: FieldId = FieldId(58);
/// Channel sediment at the start of the step (kg).
pub const CHANNEL_SED_PREVIOUS: FieldId = FieldId(59);

// ── Waterbody sediment ─────────────────────────────────────────────

/// Suspended sediment in lakes and reservoirs (kg).
pub const WATERBODY_SED: FieldId = FieldId(60);
/// Waterbody sediment concentration (kg/m3).
pub const WATERBODY_SED_CONC: FieldId = FieldId(61);
/// Waterbody sediment held outside the active pool (kg).
pub const WATERBODY_SED_INACTIVE: FieldId = FieldId(62);
/// Sediment settled this step (kg).
pub const WATERBODY_SED_SETTLED: FieldId = FieldId(63);
/// Waterbody detention time, storage over outflow (s).
pub const DETENTION_TIME: FieldId = FieldId(64);

// ── End-of-step aggregates ─────────────────────────────────────────

/// Total water storage (m).
pub const TOTAL_WATER_STORAGE: FieldId = FieldId(65);
/// Total evapotranspiration (m).
pub const TOTAL_EVAPOTRANSPIRATION: FieldId = FieldId(66);
/// Lake, reservoir and small-lake storage per cell (m3).
pub const LAKE_RESERVOIR_STORAGE: FieldId = FieldId(67);
/// Active plus inactive channel sediment (kg).
pub const CHANNEL_SED_TOTAL: FieldId = FieldId(68);
/// Total channel sediment concentration (g/m3).
pub const CHANNEL_SED_TOTAL_CONC: FieldId = FieldId(69);
/// Active plus inactive waterbody sediment (kg).
pub const WATERBODY_SED_TOTAL: FieldId = FieldId(70);
/// Total waterbody sediment concentration (g/m3).
pub const WATERBODY_SED_TOTAL_CONC: FieldId = FieldId(71);

/// Number of fields in the catalogue.
pub const FIELD_COUNT: usize = 72;

fn def(
    name: &str,
    field_type: FieldType,
    mutability: FieldMutability,
    units: Option<&str>,
    initial: InitialValue,
) -> FieldDef {
    FieldDef {
        name: name.to_string(),
        field_type,
        mutability,
        units: units.map(str::to_string),
        initial,
    }
}

/// Static erosion and channel parameters that must not be negative.
///
/// `tan_slope` is absent: the erosion set-up floors it instead.
pub const NON_NEGATIVE_PARAMETERS: &[FieldId] = &[
    CELL_AREA,
    K_FACTOR,
    C_FACTOR,
    LS_FACTOR,
    ROCK_FRACTION,
    COARSE_FRAGMENT_FACTOR,
    SLOPE_LENGTH,
    MANNING_OVERLAND,
    CHANNEL_ERODIBILITY,
    CHANNEL_COVER,
    PEAK_RATE_FACTOR,
    SOIL_DEPTH_TOP,
];

/// Returns the catalogue's field definitions in [`FieldId`] order.
pub fn catchment_fields() -> Vec<FieldDef> {
    vec![
        def("cell_area", Scalar, Static, Some("m2"), Required),
        def("k_factor", Scalar, Static, None, Required),
        def("c_factor", Scalar, Static, None, Required),
        def("ls_factor", Scalar, Static, None, Required),
        def("rock_fraction", Scalar, Static, Some("%"), Required),
        def("coarse_fragment_factor", Scalar, Static, None, Constant(1.0)),
        def("slope_length", Scalar, Static, Some("m"), Constant(50.0)),
        def("tan_slope", Scalar, Static, None, Required),
        def("manning_overland", Fractional, Static, None, Required),
        def("channel_erodibility", Scalar, Static, None, Constant(0.008)),
        def("channel_cover", Scalar, Static, None, Constant(0.9)),
        def("peak_rate_factor", Scalar, Static, None, Required),
        def("soil_depth_top", Scalar, Static, Some("m"), Required),
        def("landcover_fraction", Fractional, Persistent, None, Required),
        def("direct_runoff", Fractional, Transient, Some("m"), Zero),
        def("channel_travel_time", Scalar, Transient, Some("s"), Zero),
        def("channel_discharge", Substep, Transient, Some("m3/s"), Zero),
        def("channel_cross_section", Substep, Transient, Some("m2"), Zero),
        def("channel_volume", Substep, Transient, Some("m3"), Zero),
        def("channel_abstraction", Scalar, Transient, Some("m"), Zero),
        def("waterbody_storage", Waterbody, Persistent, Some("m3"), Zero),
        def("waterbody_outflow", Waterbody, Transient, Some("m"), Zero),
        def("groundwater_storage", Scalar, Persistent, Some("m"), Zero),
        def("soil_storage", Scalar, Persistent, Some("m"), Zero),
        def("channel_storage", Scalar, Persistent, Some("m3"), Zero),
        def("small_lake_storage", Scalar, Persistent, Some("m3"), Zero),
        def("gridcell_storage", Scalar, Persistent, Some("m"), Zero),
        def("channel_evaporation", Scalar, Transient, Some("m"), Zero),
        def("land_evapotranspiration", Scalar, Transient, Some("m"), Zero),
        def("waterbody_evaporation", Scalar, Transient, Some("m"), Zero),
        def("small_lake_evaporation", Scalar, Transient, Some("m"), Zero),
        def("soil_groundwater_inflow", Scalar, Transient, Some("m"), Zero),
        def("soil_groundwater_outflow", Scalar, Transient, Some("m"), Zero),
        def("runoff_rate", Fractional, Transient, Some("m3/s"), Zero),
        def("direct_runoff_mm", Fractional, Transient, Some("mm"), Zero),
        def("overland_velocity", Fractional, Transient, None, Zero),
        def("overland_toc", Fractional, Transient, Some("h"), Zero),
        def("channel_toc", Fractional, Transient, Some("h"), Zero),
        def("time_of_concentration", Fractional, Transient, Some("h"), Zero),
        def("rain_fraction_in_toc", Fractional, Transient, None, Zero),
        def("peak_runoff", Fractional, Transient, Some("m3/s"), Zero),
        def("sediment_yield", Fractional, Transient, Some("1000 kg"), Zero),
        def("soil_loss_depth", Fractional, Transient, Some("mm"), Zero),
        def("sum_sediment_yield", Scalar, Transient, Some("1000 kg"), Zero),
        def("sum_peak_runoff", Scalar, Transient, Some("m3/s"), Zero),
        def("sum_time_of_concentration", Scalar, Transient, Some("h"), Zero),
        def("sum_soil_loss_depth", Scalar, Transient, Some("mm"), Zero),
        def("sum_runoff_rate", Scalar, Transient, Some("m3/s"), Zero),
        def("sum_overland_toc", Scalar, Transient, Some("h"), Zero),
        def("sum_channel_toc", Scalar, Transient, Some("h"), Zero),
        def("sum_direct_runoff_mm", Scalar, Transient, Some("mm"), Zero),
        def("sediment_yield_ton_ha", Scalar, Transient, Some("t/ha"), Zero),
        def("channel_sed", Scalar, Persistent, Some("kg"), Zero),
        def("channel_sed_conc", Scalar, Persistent, Some("kg/m3"), Zero),
        def("channel_sed_inactive", Scalar, Persistent, Some("kg"), Zero),
        def("channel_sed_deposition", Scalar, Transient, Some("kg"), Zero),
        def("channel_sed_degradation", Scalar, Transient, Some("kg"), Zero),
        def("channel_sed_abstracted", Scalar, Transient, Some("kg"), Zero),
        def("channel_sed_flushed", Scalar, Transient, Some("kg"), Zero),
        def("channel_sed_previous", Scalar, Transient, Some("kg"), Zero),
        def("waterbody_sed", Waterbody, Persistent, Some("kg"), Zero),
        def("waterbody_sed_conc", Waterbody, Persistent, Some("kg/m3"), Zero),
        def("waterbody_sed_inactive", Waterbody, Persistent, Some("kg"), Zero),
        def("waterbody_sed_settled", Waterbody, Transient, Some("kg"), Zero),
        def("detention_time", Waterbody, Transient, Some("s"), Zero),
        def("total_water_storage", Scalar, Transient, Some("m"), Zero),
        def("total_evapotranspiration", Scalar, Transient, Some("m"), Zero),
        def("lake_reservoir_storage", Scalar, Transient, Some("m3"), Zero),
        def("channel_sed_total", Scalar, Transient, Some("kg"), Zero),
        def("channel_sed_total_conc", Scalar, Transient, Some("g/m3"), Zero),
        def("waterbody_sed_total", Waterbody, Transient, Some("kg"), Zero),
        def("waterbody_sed_total_conc", Waterbody, Transient, Some("g/m3"), Zero),
    ]
}

/// Look up a field by catalogue name.
pub fn field_by_name(name: &str) -> Option<FieldId> {
    catchment_fields()
        .iter()
        .position(|d| d.name == name)
        .map(|i| FieldId(i as u32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn catalogue_count_matches() {
        assert_eq!(catchment_fields().len(), FIELD_COUNT);
    }

    #[test]
    fn constants_point_at_matching_definitions() {
        let fields = catchment_fields();
        let spot_checks = [
            (CELL_AREA, "cell_area"),
            (COARSE_FRAGMENT_FACTOR, "coarse_fragment_factor"),
            (MANNING_OVERLAND, "manning_overland"),
            (LANDCOVER_FRACTION, "landcover_fraction"),
            (CHANNEL_VOLUME, "channel_volume"),
            (WATERBODY_OUTFLOW, "waterbody_outflow"),
            (SOIL_GROUNDWATER_OUTFLOW, "soil_groundwater_outflow"),
            (PEAK_RUNOFF, "peak_runoff"),
            (SUM_DIRECT_RUNOFF_MM, "sum_direct_runoff_mm"),
            (SEDIMENT_YIELD_TON_HA, "sediment_yield_ton_ha"),
            (CHANNEL_SED_PREVIOUS, "channel_sed_previous"),
            (DETENTION_TIME, "detention_time"),
            (WATERBODY_SED_TOTAL_CONC, "waterbody_sed_total_conc"),
        ];
        for (id, name) in spot_checks {
            assert_eq!(fields[id.0 as usize].name, name);
            assert_eq!(field_by_name(name), Some(id));
        }
    }

    #[test]
    fn names_unique_and_definitions_valid() {
        let fields = catchment_fields();
        let names: HashSet<_> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names.len(), fields.len());
        for f in &fields {
            f.validate().unwrap();
        }
    }

    #[test]
    fn sediment_state_is_persistent() {
        let fields = catchment_fields();
        for id in [CHANNEL_SED, CHANNEL_SED_CONC, WATERBODY_SED, WATERBODY_SED_CONC] {
            assert_eq!(fields[id.0 as usize].mutability, FieldMutability::Persistent);
        }
        assert_eq!(fields[WATERBODY_SED.0 as usize].field_type, FieldType::Waterbody);
    }

    #[test]
    fn non_negative_parameters_are_static() {
        let fields = catchment_fields();
        for id in NON_NEGATIVE_PARAMETERS {
            assert_eq!(fields[id.0 as usize].mutability, FieldMutability::Static);
        }
    }
}
