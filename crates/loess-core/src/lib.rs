//! Core types and traits for the Loess catchment sediment simulator.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the fundamental abstractions used throughout the Loess workspace:
//! identifiers, field descriptors and layouts, the landcover-fraction
//! dimension, guarded arithmetic, error types, and core traits.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod domain;
pub mod error;
pub mod field;
pub mod id;
pub mod landcover;
pub mod math;
pub mod traits;

pub use domain::Domain;
pub use error::{DomainError, NumericDomainIssue, PropagatorError, StepError};
pub use field::{FieldDef, FieldMutability, FieldSet, FieldType, InitialValue};
pub use id::{FieldId, StepId};
pub use landcover::{area_weighted_sum, PerLandCover, N_LANDCOVER};
pub use math::{clamp_non_negative, safe_divide};
pub use traits::{FieldReader, FieldWriter};
