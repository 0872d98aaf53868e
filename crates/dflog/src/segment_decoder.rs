//! The Segment Decoder (§4.4): turns one frame-aligned byte range into a
//! file-ordered stream of decoded records.

use std::collections::HashSet;

use crate::config::CancelHandle;
use crate::field_format::{effective_scale, FormatCompiler};
use crate::range_splitter::ByteRange;
use crate::record::{DecodedRecord, FieldValue};
use crate::registry::FormatRegistry;
use crate::sync_scanner::{SYNC0, SYNC1};
use crate::warning::{WarningBuffer, WarningKind};

use indexmap::IndexMap;

/// Result of decoding one segment: the records it produced, in file order,
/// whatever warnings it accumulated (empty if `collect_warnings` is off), and
/// whether it stopped early because `cancel` fired.
pub struct SegmentOutput {
    pub records: Vec<DecodedRecord>,
    pub warnings: Vec<crate::warning::Warning>,
    pub cancelled: bool,
}

/// Decode every frame in `range`, applying `filter` (when present) and
/// `round_floats`. `segment_id` tags every emitted warning. `compiler` is
/// shared across segments so sibling workers reuse each other's compiled
/// formats. `cancel` is checked once per frame (never mid-frame), per the
/// cancellation contract in §5.
#[allow(clippy::too_many_arguments)]
pub fn decode_segment(
    bytes: &[u8],
    range: ByteRange,
    registry: &FormatRegistry,
    compiler: &FormatCompiler,
    filter: Option<&HashSet<String>>,
    round_floats: bool,
    segment_id: u32,
    collect_warnings: bool,
    cancel: &CancelHandle,
) -> SegmentOutput {
    let mut warnings = WarningBuffer::new(segment_id, collect_warnings);
    let mut records = Vec::new();
    let end = range.end.min(bytes.len() as u64) as usize;
    let mut pos = range.start as usize;
    let mut last_time_us: u64 = 0;

    while pos < end {
        if cancel.is_cancelled() {
            return SegmentOutput { records, warnings: warnings.into_vec(), cancelled: true };
        }
        if pos + 3 > end {
            warnings.push(pos as u64, WarningKind::ShortRead, "short read at segment tail");
            break;
        }
        if bytes[pos] != SYNC0 || bytes[pos + 1] != SYNC1 {
            let Some(next) = find_next_sync(bytes, pos + 1, end) else {
                warnings.push(pos as u64, WarningKind::DecodeError, "no further sync marker in segment");
                break;
            };
            pos = next;
            continue;
        }

        let type_id = bytes[pos + 2];
        let Some(schema) = registry.get(type_id) else {
            warnings.push(pos as u64, WarningKind::UnknownType, format!("unknown type_id {type_id}"));
            pos += 3;
            continue;
        };

        let frame_length = schema.frame_length as usize;
        let payload_start = pos + 3;
        let payload_end = pos + frame_length;
        if payload_end > end {
            warnings.push(pos as u64, WarningKind::ShortRead, "short read at segment tail");
            break;
        }
        let payload = &bytes[payload_start..payload_end];

        // FMT (and FMTU/FUNIT, identified by name rather than a fixed
        // type_id) are schema metadata consumed during preload; they never
        // surface as records in the decoded stream. §8's "records emitted ==
        // accepted offsets - filtered - warnings" counts a metadata frame
        // under "filtered", same as a user `message_filter` miss below: both
        // are accepted offsets dropped without a warning.
        if schema.type_id == crate::schema::FMT_TYPE_ID || schema.name == "FMTU" || schema.name == "FUNIT" {
            pos = payload_end;
            continue;
        }

        if let Some(filter) = filter {
            if !filter.contains(&schema.name) {
                pos = payload_end;
                continue;
            }
        }

        let compiled = match compiler.compile(&schema.format_string) {
            Ok(compiled) => compiled,
            Err(code) => {
                warnings.push(pos as u64, WarningKind::BadFormat, format!("unknown format code '{code}'"));
                pos = payload_end;
                continue;
            }
        };

        let Some(decoded_fields) = compiled.decode(payload, &schema.field_names) else {
            warnings.push(pos as u64, WarningKind::DecodeError, "payload decode failed");
            pos = payload_end;
            continue;
        };

        let mut fields = IndexMap::with_capacity(decoded_fields.len());
        for (i, (compiled_field, (name, raw_value))) in compiled.fields.iter().zip(decoded_fields).enumerate() {
            let explicit = schema.scale_factors.get(i).copied().flatten();
            let value = match effective_scale(compiled_field.code, explicit) {
                Some(scale) => raw_value.as_f64().map(|v| FieldValue::F64(v * scale)).unwrap_or(raw_value),
                None => raw_value,
            };
            let value = if round_floats { value.rounded() } else { value };
            fields.insert(name, value);
        }

        let time_us = fields.get("TimeUS").and_then(FieldValue::as_u64);
        if let Some(t) = time_us {
            last_time_us = t;
        }

        records.push(DecodedRecord {
            message_type: schema.name.clone(),
            fields,
            offset: pos as u64,
            merge_key_time_us: time_us.unwrap_or(last_time_us),
        });

        pos = payload_end;
    }

    SegmentOutput { records, warnings: warnings.into_vec(), cancelled: false }
}

fn find_next_sync(bytes: &[u8], from: usize, end: usize) -> Option<usize> {
    (from..end.saturating_sub(1)).find(|&i| bytes[i] == SYNC0 && bytes[i + 1] == SYNC1)
}
