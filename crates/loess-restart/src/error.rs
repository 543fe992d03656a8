//! Error types for restart encoding and decoding.

use std::fmt;
use std::io;

/// Errors that can occur while writing or reading a restart state.
#[derive(Debug)]
pub enum RestartError {
    /// An I/O error occurred during read or write.
    Io(io::Error),
    /// The data does not start with the expected `b"LOES"` magic bytes.
    InvalidMagic,
    /// The format version is not supported by this build.
    UnsupportedVersion {
        /// The version found in the data.
        found: u8,
    },
    /// The body could not be decoded.
    Malformed {
        /// Human-readable description of what went wrong.
        detail: String,
    },
    /// The stored checksum does not match the decoded contents.
    ChecksumMismatch {
        /// Checksum stored in the data.
        stored: u64,
        /// Checksum recomputed from the decoded state.
        computed: u64,
    },
}

impl fmt::Display for RestartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::InvalidMagic => write!(f, "invalid magic bytes (expected b\"LOES\")"),
            Self::UnsupportedVersion { found } => {
                write!(f, "unsupported restart format version {found}")
            }
            Self::Malformed { detail } => write!(f, "malformed restart state: {detail}"),
            Self::ChecksumMismatch { stored, computed } => {
                write!(
                    f,
                    "restart checksum mismatch: stored={stored:#018x}, computed={computed:#018x}"
                )
            }
        }
    }
}

impl std::error::Error for RestartError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for RestartError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}
