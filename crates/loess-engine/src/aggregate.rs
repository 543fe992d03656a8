//! End-of-step storage, evapotranspiration and sediment totals.
//!
//! Runs after every process stage and before the mass-balance checks, in
//! this order: lake/reservoir storage, total water storage, total
//! evapotranspiration, then (water quality only) channel and waterbody
//! sediment totals. Storage contributions of optional sub-systems are
//! only included when the sub-system is enabled.

use loess_core::{safe_divide, Domain};
use loess_propagators::fields::{
    CELL_AREA, CHANNEL_EVAPORATION, CHANNEL_SED, CHANNEL_SED_INACTIVE, CHANNEL_SED_TOTAL,
    CHANNEL_SED_TOTAL_CONC, CHANNEL_STORAGE, GRIDCELL_STORAGE, GROUNDWATER_STORAGE,
    LAKE_RESERVOIR_STORAGE, LAND_EVAPOTRANSPIRATION, SMALL_LAKE_EVAPORATION,
    SMALL_LAKE_STORAGE, SOIL_STORAGE, TOTAL_EVAPOTRANSPIRATION, TOTAL_WATER_STORAGE,
    WATERBODY_EVAPORATION, WATERBODY_SED, WATERBODY_SED_INACTIVE, WATERBODY_SED_TOTAL,
    WATERBODY_SED_TOTAL_CONC, WATERBODY_STORAGE,
};

use crate::config::FeatureFlags;
use crate::store::GridStore;

/// Channel storage below which the total concentration is not defined (m3).
pub const MIN_CHANNEL_STORAGE: f64 = 1.0;

/// Total channel sediment concentration (g/m3) of `total` kg in `storage` m3.
///
/// Zero unless the channel holds more than [`MIN_CHANNEL_STORAGE`].
pub fn channel_total_concentration(total: f64, storage: f64) -> f64 {
    if storage > MIN_CHANNEL_STORAGE {
        safe_divide(total, storage) * 1000.0
    } else {
        0.0
    }
}

/// Waterbody sediment concentration (g/m3) of `total` kg in `storage` m3.
pub fn waterbody_total_concentration(total: f64, storage: f64) -> f64 {
    safe_divide(total, storage) * 1000.0
}

fn add_into(acc: &mut [f64], values: &[f64]) {
    for (a, v) in acc.iter_mut().zip(values) {
        *a += v;
    }
}

fn add_per_area(acc: &mut [f64], volumes: &[f64], area: &[f64]) {
    for ((a, v), ar) in acc.iter_mut().zip(volumes).zip(area) {
        *a += safe_divide(*v, *ar);
    }
}

/// Recompute every aggregate field from the current store.
pub(crate) fn aggregate(store: &mut GridStore, domain: &Domain, flags: &FeatureFlags) {
    let area = store.column(CELL_AREA);
    let cells = domain.cell_count();
    let with_waterbodies = flags.routing && flags.waterbodies;

    // Lake/reservoir storage per cell, in m3.
    let mut lake_storage = vec![0.0; cells];
    if with_waterbodies {
        lake_storage = domain.expand(&store.column(WATERBODY_STORAGE));
        if flags.small_lakes {
            add_into(&mut lake_storage, &store.column(SMALL_LAKE_STORAGE));
        }
    }
    store.set(LAKE_RESERVOIR_STORAGE, &lake_storage);

    let mut tws = store.column(GROUNDWATER_STORAGE);
    add_into(&mut tws, &store.column(SOIL_STORAGE));
    if flags.routing {
        add_per_area(&mut tws, &store.column(CHANNEL_STORAGE), &area);
        if with_waterbodies {
            add_per_area(&mut tws, &lake_storage, &area);
        }
    }
    if flags.runoff_concentration {
        add_into(&mut tws, &store.column(GRIDCELL_STORAGE));
    }
    store.set(TOTAL_WATER_STORAGE, &tws);

    let et = if flags.routing {
        let mut et = store.column(CHANNEL_EVAPORATION);
        if flags.waterbodies {
            add_into(&mut et, &store.column(LAND_EVAPOTRANSPIRATION));
            add_into(&mut et, &store.column(WATERBODY_EVAPORATION));
            if flags.small_lakes {
                add_into(&mut et, &store.column(SMALL_LAKE_EVAPORATION));
            }
        }
        et
    } else {
        store.column(LAND_EVAPOTRANSPIRATION)
    };
    store.set(TOTAL_EVAPOTRANSPIRATION, &et);

    if !flags.water_quality {
        return;
    }

    let mut channel_total = store.column(CHANNEL_SED);
    add_into(&mut channel_total, &store.column(CHANNEL_SED_INACTIVE));
    let channel_conc: Vec<f64> = channel_total
        .iter()
        .zip(store.column(CHANNEL_STORAGE))
        .map(|(&m, s)| channel_total_concentration(m, s))
        .collect();
    store.set(CHANNEL_SED_TOTAL, &channel_total);
    store.set(CHANNEL_SED_TOTAL_CONC, &channel_conc);

    let mut waterbody_total = store.column(WATERBODY_SED);
    add_into(&mut waterbody_total, &store.column(WATERBODY_SED_INACTIVE));
    let waterbody_conc: Vec<f64> = waterbody_total
        .iter()
        .zip(store.column(WATERBODY_STORAGE))
        .map(|(&m, s)| waterbody_total_concentration(m, s))
        .collect();
    store.set(WATERBODY_SED_TOTAL, &waterbody_total);
    store.set(WATERBODY_SED_TOTAL_CONC, &waterbody_conc);
}
