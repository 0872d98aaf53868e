//! The sync-boundary scanner (§4.2): finds every byte offset at which a valid
//! message frame begins, using a two-stage check to reject sync-like byte
//! patterns occurring inside payloads.

pub const SYNC0: u8 = 0xA3;
pub const SYNC1: u8 = 0x95;

use crate::registry::FormatRegistry;

/// Enumerate valid frame-start offsets in ascending order. Must run after
/// `preload` so the registry already knows every `type_id` used in the file;
/// a sync-looking offset whose `type_id` isn't yet known is rejected here
/// (not warned about — the scanner can't distinguish "garbage" from "a type
/// the bootstrap pass hasn't catalogued", so it simply doesn't accept it).
pub fn find_valid_sync_positions(bytes: &[u8], registry: &FormatRegistry) -> Vec<u64> {
    let mut offsets = Vec::new();
    let len = bytes.len();
    let mut i = 0usize;

    while i + 3 <= len {
        if bytes[i] != SYNC0 || bytes[i + 1] != SYNC1 {
            i += 1;
            continue;
        }
        let type_id = bytes[i + 2];
        let Some(schema) = registry.get(type_id) else {
            i += 1;
            continue;
        };
        let frame_length = schema.frame_length as usize;
        let frame_end = i + frame_length;
        if frame_end > len {
            i += 1;
            continue;
        }
        let next_is_sync_or_eof = frame_end == len || bytes[frame_end] == SYNC0;
        if next_is_sync_or_eof {
            offsets.push(i as u64);
            i += 1;
        } else {
            i += 1;
        }
    }

    offsets
}
