//! Shared test fixtures. Synthesizes small, self-consistent DataFlash byte
//! buffers instead of checking in binary fixtures, per SPEC_FULL.md §2.1.
#![cfg(test)]

use std::sync::Arc;

use crate::registry::FormatRegistry;
use crate::sync_scanner::{SYNC0, SYNC1};

pub const GPS_TYPE: u8 = 1;
pub const IMU_TYPE: u8 = 2;

/// GPS: `TimeUS:u64`. Payload 8 bytes, frame_length 11.
pub fn gps_frame(time_us: u64) -> Vec<u8> {
    let mut frame = vec![SYNC0, SYNC1, GPS_TYPE];
    frame.extend_from_slice(&time_us.to_le_bytes());
    frame
}

/// A GPS frame (type/length match the GPS schema) with caller-supplied raw
/// payload bytes, for sync-scanner false-positive tests.
pub fn gps_frame_with_payload_bytes(payload: &[u8]) -> Vec<u8> {
    assert_eq!(payload.len(), 8, "GPS payload is 8 bytes (format \"Q\")");
    let mut frame = vec![SYNC0, SYNC1, GPS_TYPE];
    frame.extend_from_slice(payload);
    frame
}

/// IMU: `TimeUS:u64, GyrX:i16`. Payload 10 bytes, frame_length 13.
pub fn imu_frame(time_us: u64, gyr_x: i16) -> Vec<u8> {
    let mut frame = vec![SYNC0, SYNC1, IMU_TYPE];
    frame.extend_from_slice(&time_us.to_le_bytes());
    frame.extend_from_slice(&gyr_x.to_le_bytes());
    frame
}

/// A raw FMT frame describing one message schema, as it would appear in a
/// real file's bootstrap region.
pub fn fmt_frame(type_id: u8, name: &str, format: &str, columns_csv: &str) -> Vec<u8> {
    let frame_length = 3 + format.chars().filter_map(crate::field_format::field_width).sum::<usize>();
    let mut frame = vec![SYNC0, SYNC1, crate::schema::FMT_TYPE_ID];
    frame.push(type_id);
    frame.push(frame_length as u8);
    push_ascii_fixed(&mut frame, name, 4);
    push_ascii_fixed(&mut frame, format, 16);
    push_ascii_fixed(&mut frame, columns_csv, 64);
    frame
}

fn push_ascii_fixed(buf: &mut Vec<u8>, s: &str, width: usize) {
    let bytes = s.as_bytes();
    buf.extend_from_slice(&bytes[..bytes.len().min(width)]);
    for _ in bytes.len().min(width)..width {
        buf.push(0);
    }
}

/// Bytes for the two FMT frames describing GPS and IMU, as they'd appear at
/// the start of a real file (after the bootstrap FMT-for-FMT frame, which
/// `preload` hard-codes rather than reading from the file).
pub fn fmt_preamble_bytes() -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend(fmt_frame(GPS_TYPE, "GPS", "Q", "TimeUS"));
    bytes.extend(fmt_frame(IMU_TYPE, "IMU", "Qh", "TimeUS,GyrX"));
    bytes
}

/// A registry preloaded with GPS and IMU, built the same way `preload` would
/// from a real file's bootstrap region.
pub fn registry_with_gps_and_imu() -> Arc<FormatRegistry> {
    let bytes = fmt_preamble_bytes();
    crate::registry::preload(&bytes).expect("bootstrap preload cannot fail for well-formed FMT frames")
}
