//! Sediment transport propagators for the Loess catchment simulator.
//!
//! Provides the field catalogue and the propagators of the erosion and
//! sediment core.
//!
//! # Pipeline order (each step, water quality enabled)
//!
//! 1. [`TimeOfConcentration`]: reads(direct runoff, travel time, slope,
//!    roughness) → writes(runoff rate, time of concentration, peak runoff)
//! 2. [`SedimentYield`]: reads(peak runoff, erosion factors, landcover
//!    fractions) → writes(yield, loss depth, landcover sums, t/ha)
//! 3. [`ChannelSedimentRouter`]: reads(sub-step Q, A, V) →
//!    writes(channel sediment, deposition, degradation, abstraction)
//! 4. [`WaterbodySettler`]: reads(waterbody storage, outflow) →
//!    writes(waterbody sediment, settled mass, detention time)
//!
//! [`ErosionSetup`] runs once at initialization.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod channel;
pub mod erosion_setup;
mod field_io;
pub mod fields;
pub mod musle;
pub mod time_of_concentration;
pub mod waterbody;

pub use channel::{ChannelSedimentRouter, ChannelSedimentRouterBuilder};
pub use erosion_setup::ErosionSetup;
pub use fields::{catchment_fields, field_by_name, FIELD_COUNT};
pub use musle::{SedimentYield, YieldCoefficients, LANDCOVER_SUMS};
pub use time_of_concentration::TimeOfConcentration;
pub use waterbody::{SettlingParams, SettlingRates, WaterbodySettler};
