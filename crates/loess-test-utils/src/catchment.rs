//! Seeded random catchments.
//!
//! A [`CatchmentSample`] holds plausible per-cell inputs for the
//! sediment core as plain vectors, laid out the way the grid store lays
//! out the corresponding fields (fractional fields cell-major, sub-step
//! fields sub-step-major). The same seed always produces the same
//! catchment.

use loess_core::N_LANDCOVER;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Plausible random inputs for an `n`-cell catchment.
#[derive(Clone, Debug)]
pub struct CatchmentSample {
    pub cells: usize,
    pub substeps: usize,
    /// m2
    pub cell_area: Vec<f64>,
    pub k_factor: Vec<f64>,
    pub c_factor: Vec<f64>,
    pub ls_factor: Vec<f64>,
    /// Percent of coarse fragments in the topsoil.
    pub rock_fraction: Vec<f64>,
    pub tan_slope: Vec<f64>,
    pub peak_rate_factor: Vec<f64>,
    /// m
    pub soil_depth_top: Vec<f64>,
    /// Fractional.
    pub manning_overland: Vec<f64>,
    /// Fractional; each cell's row sums to at most one.
    pub landcover_fraction: Vec<f64>,
    /// Fractional, m per day.
    pub direct_runoff: Vec<f64>,
    /// s
    pub travel_time: Vec<f64>,
    /// Sub-step fields, m3/s, m2 and m3.
    pub discharge: Vec<f64>,
    pub cross_section: Vec<f64>,
    pub channel_volume: Vec<f64>,
}

impl CatchmentSample {
    /// Draw a catchment of `cells` active cells and `substeps` routing
    /// sub-steps from `seed`.
    pub fn generate(seed: u64, cells: usize, substeps: usize) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let cell_area = draw(&mut rng, cells, 1.0e6, 2.5e7);
        let k_factor = draw(&mut rng, cells, 0.01, 0.06);
        let c_factor = draw(&mut rng, cells, 0.001, 0.5);
        let ls_factor = draw(&mut rng, cells, 0.1, 8.0);
        let rock_fraction = draw(&mut rng, cells, 0.0, 40.0);
        let tan_slope = draw(&mut rng, cells, 0.0, 0.3);
        let peak_rate_factor = draw(&mut rng, cells, 1.0, 3.0);
        let soil_depth_top = draw(&mut rng, cells, 0.05, 0.3);
        let manning_overland = draw(&mut rng, cells * N_LANDCOVER, 0.05, 0.6);

        let mut landcover_fraction = Vec::with_capacity(cells * N_LANDCOVER);
        for _ in 0..cells {
            let raw: Vec<f64> = (0..N_LANDCOVER).map(|_| rng.random::<f64>()).collect();
            // Leave a random share of the cell to non-eroding landcover.
            let covered = rng.random_range(0.5..=1.0);
            let total: f64 = raw.iter().sum::<f64>().max(f64::MIN_POSITIVE);
            landcover_fraction.extend(raw.iter().map(|r| r / total * covered));
        }

        let direct_runoff = (0..cells * N_LANDCOVER)
            .map(|_| {
                // Dry fractions are common.
                if rng.random::<f64>() < 0.3 {
                    0.0
                } else {
                    rng.random_range(0.0..0.05)
                }
            })
            .collect();

        let travel_time = draw(&mut rng, cells, 600.0, 43_200.0);
        let discharge = draw(&mut rng, cells * substeps, 0.0, 200.0);
        let cross_section = draw(&mut rng, cells * substeps, 0.5, 150.0);
        let channel_volume = (0..cells * substeps)
            .map(|_| {
                if rng.random::<f64>() < 0.1 {
                    0.0
                } else {
                    rng.random_range(1.0e3..5.0e6)
                }
            })
            .collect();

        Self {
            cells,
            substeps,
            cell_area,
            k_factor,
            c_factor,
            ls_factor,
            rock_fraction,
            tan_slope,
            peak_rate_factor,
            soil_depth_top,
            manning_overland,
            landcover_fraction,
            direct_runoff,
            travel_time,
            discharge,
            cross_section,
            channel_volume,
        }
    }
}

fn draw(rng: &mut ChaCha8Rng, n: usize, lo: f64, hi: f64) -> Vec<f64> {
    (0..n).map(|_| rng.random_range(lo..hi)).collect()
}
