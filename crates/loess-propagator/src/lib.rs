//! Propagator trait and step context for Loess simulations.
//!
//! The `Propagator` trait defines the `&self` step function with a
//! split-borrow `StepContext` for reads/reads_previous/writes access,
//! plus the per-step diagnostics sink and startup pipeline validation.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod context;
pub mod diagnostics;
pub mod pipeline;
pub mod propagator;

pub use context::StepContext;
pub use diagnostics::{DomainReport, StepDiagnostics};
pub use pipeline::{validate_pipeline, PipelineError, WriteConflict, WritePlan};
pub use propagator::{Propagator, WriteMode};
