//! Restart states for Loess simulations.
//!
//! A restart state holds every persistent field of a simulation at a
//! given step, keyed by field name, so a run can be stopped and resumed
//! with identical results.
//!
//! # Format
//!
//! ```text
//! [MAGIC "LOES"] [VERSION u8] [step u64] [field count u32]
//! [name str] [value count u32] [f64 values] ... [FNV-1a checksum u64]
//! ```
//!
//! All integers and floats are little-endian. Strings are length-prefixed
//! with a `u32`. The checksum covers the decoded state, not the raw bytes.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod codec;
pub mod error;
pub mod hash;
pub mod types;

pub use codec::{read_restart, write_restart};
pub use error::RestartError;
pub use hash::state_hash;
pub use types::{FieldRecord, RestartState};

/// Magic bytes at the start of every restart file.
pub const MAGIC: [u8; 4] = *b"LOES";

/// Current binary format version.
pub const FORMAT_VERSION: u8 = 1;
