//! Binary encode/decode for restart states.
//!
//! All integers are little-endian. Strings are length-prefixed with a
//! `u32` length. No compression, no alignment padding.

use std::io::{Read, Write};

use loess_core::StepId;

use crate::error::RestartError;
use crate::hash::state_hash;
use crate::types::{FieldRecord, RestartState};
use crate::{FORMAT_VERSION, MAGIC};

// Upper bound on speculative allocation when the declared length comes
// from untrusted bytes.
const MAX_PREALLOC: usize = 1 << 16;

// ── Primitive writers ───────────────────────────────────────────

fn write_u8(w: &mut dyn Write, v: u8) -> Result<(), RestartError> {
    w.write_all(&[v])?;
    Ok(())
}

fn write_u32_le(w: &mut dyn Write, v: u32) -> Result<(), RestartError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn write_u64_le(w: &mut dyn Write, v: u64) -> Result<(), RestartError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn write_len(w: &mut dyn Write, len: usize, what: &str) -> Result<(), RestartError> {
    let len = u32::try_from(len).map_err(|_| RestartError::Malformed {
        detail: format!("{what} length {len} exceeds u32"),
    })?;
    write_u32_le(w, len)
}

fn write_length_prefixed_str(w: &mut dyn Write, s: &str) -> Result<(), RestartError> {
    write_len(w, s.len(), "field name")?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

// ── Primitive readers ───────────────────────────────────────────

fn read_u8(r: &mut dyn Read) -> Result<u8, RestartError> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_u32_le(r: &mut dyn Read) -> Result<u32, RestartError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64_le(r: &mut dyn Read) -> Result<u64, RestartError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_f64_le(r: &mut dyn Read) -> Result<f64, RestartError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

fn read_length_prefixed_str(r: &mut dyn Read) -> Result<String, RestartError> {
    let len = read_u32_le(r)? as usize;
    let mut buf = Vec::with_capacity(len.min(MAX_PREALLOC));
    (&mut *r).take(len as u64).read_to_end(&mut buf)?;
    if buf.len() != len {
        return Err(RestartError::Malformed {
            detail: format!("field name truncated: expected {len} bytes, got {}", buf.len()),
        });
    }
    String::from_utf8(buf).map_err(|e| RestartError::Malformed {
        detail: format!("invalid UTF-8 field name: {e}"),
    })
}

// ── State encode/decode ─────────────────────────────────────────

/// Encode `state` to `w`, followed by its checksum.
///
/// # Errors
///
/// Returns [`RestartError::Io`] on write failure and
/// [`RestartError::Malformed`] if a name or field is too long to encode.
pub fn write_restart(w: &mut dyn Write, state: &RestartState) -> Result<(), RestartError> {
    w.write_all(&MAGIC)?;
    write_u8(w, FORMAT_VERSION)?;
    write_u64_le(w, state.step_id.0)?;
    write_len(w, state.fields.len(), "field table")?;
    for record in &state.fields {
        write_length_prefixed_str(w, &record.name)?;
        write_len(w, record.values.len(), "field")?;
        for v in &record.values {
            w.write_all(&v.to_le_bytes())?;
        }
    }
    write_u64_le(w, state_hash(state))?;
    Ok(())
}

/// Decode a restart state from `r` and verify its checksum.
///
/// # Errors
///
/// Fails on bad magic, an unknown version, truncated or malformed data,
/// or a checksum that does not match the decoded contents.
pub fn read_restart(r: &mut dyn Read) -> Result<RestartState, RestartError> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(RestartError::InvalidMagic);
    }
    let version = read_u8(r)?;
    if version != FORMAT_VERSION {
        return Err(RestartError::UnsupportedVersion { found: version });
    }

    let step_id = StepId(read_u64_le(r)?);
    let field_count = read_u32_le(r)? as usize;
    let mut fields = Vec::with_capacity(field_count.min(MAX_PREALLOC));
    for _ in 0..field_count {
        let name = read_length_prefixed_str(r)?;
        let len = read_u32_le(r)? as usize;
        let mut values = Vec::with_capacity(len.min(MAX_PREALLOC));
        for _ in 0..len {
            values.push(read_f64_le(r)?);
        }
        fields.push(FieldRecord { name, values });
    }
    let state = RestartState { step_id, fields };

    let stored = read_u64_le(r)?;
    let computed = state_hash(&state);
    if stored != computed {
        return Err(RestartError::ChecksumMismatch { stored, computed });
    }
    Ok(state)
}
