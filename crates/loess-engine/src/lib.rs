//! Grid state store and timestep orchestrator for Loess simulations.
//!
//! A [`Simulation`] is built from a [`SimulationConfig`]: the domain,
//! feature flags, calibration constants, field values and the
//! collaborator propagators that stand in for the hydrological modules
//! (soil, groundwater, routing, lakes). The sediment core is inserted at
//! its fixed stages when water quality is enabled.
//!
//! Each [`step()`](Simulation::step) runs one simulated day through the
//! [`Stage`] sequence, recomputes storage and sediment totals, checks
//! the soil/groundwater and channel-sediment balances, and rolls the
//! whole store back if any propagator fails.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod aggregate;
pub mod balance;
pub mod config;
pub mod metrics;
pub mod simulation;
pub mod stage;
pub mod store;

pub use balance::{BalanceCheck, BalanceReport, BalanceViolation};
pub use config::{ConfigError, FeatureFlags, SedimentParams, SimulationConfig};
pub use metrics::StepMetrics;
pub use simulation::{Simulation, StepOutcome, StepReport};
pub use stage::Stage;
pub use store::{GridStore, StoreSnapshot};
