//! FNV-1a checksum over a restart state.
//!
//! Not cryptographic. Detects truncation and bit rot, nothing more.

use crate::types::RestartState;

const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x00000100000001B3;

#[inline]
fn fnv1a_bytes(mut hash: u64, bytes: &[u8]) -> u64 {
    for &b in bytes {
        hash = (hash ^ b as u64).wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Hash the step, then each field's name, length, and value bits in order.
///
/// Field order matters; values are hashed via `f64::to_bits()` so `-0.0`
/// and `0.0` differ.
pub fn state_hash(state: &RestartState) -> u64 {
    let mut hash = fnv1a_bytes(FNV_OFFSET, &state.step_id.0.to_le_bytes());
    for record in &state.fields {
        hash = fnv1a_bytes(hash, &(record.name.len() as u32).to_le_bytes());
        hash = fnv1a_bytes(hash, record.name.as_bytes());
        hash = fnv1a_bytes(hash, &(record.values.len() as u32).to_le_bytes());
        for v in &record.values {
            hash = fnv1a_bytes(hash, &v.to_bits().to_le_bytes());
        }
    }
    hash
}
