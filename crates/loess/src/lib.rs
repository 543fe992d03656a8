//! Loess: a catchment sediment transport simulator.
//!
//! This is the top-level facade crate that re-exports the public API from all
//! Loess sub-crates. For most users, adding `loess` as a single dependency is
//! sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use loess::prelude::*;
//! use loess::propagators::fields::{GROUNDWATER_STORAGE, TOTAL_WATER_STORAGE};
//!
//! // A stand-in groundwater module that recharges 1 mm per day.
//! struct Recharge;
//! impl Propagator for Recharge {
//!     fn name(&self) -> &str { "recharge" }
//!     fn reads(&self) -> loess::types::FieldSet { loess::types::FieldSet::empty() }
//!     fn writes(&self) -> Vec<(FieldId, WriteMode)> {
//!         vec![(GROUNDWATER_STORAGE, WriteMode::Incremental)]
//!     }
//!     fn step(&self, ctx: &mut StepContext<'_>) -> Result<(), PropagatorError> {
//!         for v in ctx.writes().write(GROUNDWATER_STORAGE).unwrap() {
//!             *v += 0.001;
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let config = SimulationConfig::new(Domain::new(4))
//!     .parameter("cell_area", vec![1.0e6])
//!     .collaborator(Stage::Groundwater, Box::new(Recharge));
//! let mut sim = Simulation::new(config).unwrap();
//! let report = sim.step().unwrap();
//! assert_eq!(report.step_id, StepId(1));
//! assert!(sim.field(TOTAL_WATER_STORAGE).unwrap()[0] > 0.0);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `loess-core` | IDs, domain, field definitions, landcover rows, core traits |
//! | [`propagator`] | `loess-propagator` | Propagator trait and pipeline validation |
//! | [`propagators`] | `loess-propagators` | Field catalogue and the sediment core |
//! | [`engine`] | `loess-engine` | Grid state store and timestep orchestrator |
//! | [`restart`] | `loess-restart` | Binary restart states |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, traits, and IDs (`loess-core`).
///
/// Contains the [`types::Domain`], field definitions, guarded arithmetic,
/// error types, and the fundamental traits ([`types::FieldReader`],
/// [`types::FieldWriter`]).
pub use loess_core as types;

/// Propagator trait and pipeline validation (`loess-propagator`).
///
/// The [`propagator::Propagator`] trait is the extension point for
/// collaborator modules.
pub use loess_propagator as propagator;

/// Field catalogue and sediment propagators (`loess-propagators`).
///
/// Includes [`propagators::TimeOfConcentration`],
/// [`propagators::SedimentYield`], [`propagators::ChannelSedimentRouter`]
/// and [`propagators::WaterbodySettler`].
pub use loess_propagators as propagators;

/// Grid state store and timestep orchestrator (`loess-engine`).
pub use loess_engine as engine;

/// Binary restart states (`loess-restart`).
///
/// Save with [`restart::write_restart`], resume by passing the decoded
/// state in [`engine::SimulationConfig::restart`].
pub use loess_restart as restart;

/// Common imports for typical Loess usage.
///
/// ```rust
/// use loess::prelude::*;
/// ```
pub mod prelude {
    // Core types and traits
    pub use loess_core::{
        Domain, FieldDef, FieldId, FieldMutability, FieldReader, FieldType, FieldWriter,
        InitialValue, StepId,
    };

    // Errors
    pub use loess_core::{PropagatorError, StepError};

    // Propagator
    pub use loess_propagator::{Propagator, StepContext, WriteMode};

    // Engine
    pub use loess_engine::{
        ConfigError, FeatureFlags, SedimentParams, Simulation, SimulationConfig, Stage,
        StepMetrics, StepOutcome, StepReport,
    };

    // Restart
    pub use loess_restart::{read_restart, write_restart, RestartState};
}
