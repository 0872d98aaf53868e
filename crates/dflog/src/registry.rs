//! The Format Registry (§3, §4.1): the schema table built from a file's FMT
//! frames, bootstrapped before any parallel work begins and then handed to
//! workers as a frozen, `Arc`-shared snapshot.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::io_utils::BinaryReader;
use crate::schema::{MessageSchema, FMT_TYPE_ID};
use crate::sync_scanner::{SYNC0, SYNC1};
use crate::warning::{WarningBuffer, WarningKind, NO_SEGMENT};

fn is_multiplier_schema_name(name: &str) -> bool {
    name == "FMTU" || name == "FUNIT"
}

/// The FMT message's own schema, hard-coded rather than read from the file —
/// every DataFlash log is required to describe itself starting from this one
/// fixed point (§3).
fn fmt_schema() -> MessageSchema {
    MessageSchema::new(
        FMT_TYPE_ID,
        "FMT".into(),
        3 + 1 + 1 + 4 + 16 + 64,
        "BBnNZ".into(),
        vec!["Type".into(), "Length".into(), "Name".into(), "Format".into(), "Columns".into()],
        vec![],
    )
    .expect("hard-coded FMT schema is internally consistent")
}

/// Serialized across a process boundary in `RunningMode::Process` (§4.5), so
/// a worker process can rebuild the exact snapshot the parent preloaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatRegistry {
    schemas: HashMap<u8, MessageSchema>,
}

impl FormatRegistry {
    fn empty() -> Self {
        let mut schemas = HashMap::new();
        let fmt = fmt_schema();
        schemas.insert(fmt.type_id, fmt);
        Self { schemas }
    }

    pub fn get(&self, type_id: u8) -> Option<&MessageSchema> {
        self.schemas.get(&type_id)
    }

    pub fn contains(&self, type_id: u8) -> bool {
        self.schemas.contains_key(&type_id)
    }

    fn insert(&mut self, schema: MessageSchema) {
        self.schemas.insert(schema.type_id, schema);
    }

    /// Replace an existing entry's `scale_factors`, per the replace-not-mutate
    /// lifecycle (§3). A FMTU/FUNIT frame naming an unknown `type_id` is a
    /// no-op here; the caller has already emitted a warning for it.
    fn apply_scale(&mut self, type_id: u8, scale_factors: Vec<Option<f64>>) {
        if let Some(existing) = self.schemas.get(&type_id) {
            let updated = existing.with_scale_factors(scale_factors);
            self.schemas.insert(type_id, updated);
        }
    }

    pub fn into_shared(self) -> Arc<FormatRegistry> {
        Arc::new(self)
    }
}

/// Decode one FMT frame's payload into the `MessageSchema` it describes.
/// Returns `None` (and pushes a warning) on anything that doesn't parse as a
/// schema — a FMT frame that's there but garbled is downstream's problem only
/// insofar as the message type it was describing stays undecodable.
fn decode_fmt_payload(payload: &[u8], warnings: &mut WarningBuffer, offset: u64) -> Option<MessageSchema> {
    let mut reader = BinaryReader::new(payload);
    let type_id = reader.read_u8()?;
    let length = reader.read_u8()?;
    let name = reader.read_ascii_fixed(4)?;
    let format_string = reader.read_ascii_fixed(16)?;
    let columns = reader.read_ascii_fixed(64)?;

    let field_names: Vec<String> = if columns.is_empty() {
        Vec::new()
    } else {
        columns.split(',').map(|s| s.to_string()).collect()
    };

    match MessageSchema::new(type_id, name, length, format_string, field_names, vec![]) {
        Ok(schema) => Some(schema),
        Err(err) => {
            warnings.push(offset, WarningKind::BadFormat, err.to_string());
            None
        }
    }
}

/// Decode one FMTU frame's payload into `(target_type_id, scale_factors)`.
/// Wire layout (documented divergence from real ArduPilot UNIT/MULT indirection
/// tables — see SPEC_FULL.md §9): `FmtType: u8` followed by one `f64`
/// multiplier per target field, in declared field order.
fn decode_fmtu_payload(payload: &[u8]) -> Option<(u8, Vec<Option<f64>>)> {
    let mut reader = BinaryReader::new(payload);
    let target_type_id = reader.read_u8()?;
    let mut scale_factors = Vec::new();
    while reader.remaining() >= 8 {
        scale_factors.push(Some(reader.read_f64()?));
    }
    Some((target_type_id, scale_factors))
}

/// Scan `bytes` for FMT frames (and, once a FMT frame has named some
/// `type_id` as `"FMTU"` or `"FUNIT"`, frames of that same `type_id`) and
/// build the registry they describe. This is the bootstrap pass (§3): it
/// runs once, single-threaded, before the sync scanner and before any range
/// splitting, since every other stage depends on a complete schema table.
///
/// FMTU/FUNIT aren't a fixed type_id (ArduPilot logs are free to assign
/// either name to whatever type_id their own FMT frame declares) — a
/// type_id only becomes a multiplier frame once its FMT frame has been seen
/// and named one of the two (§4.1).
pub fn preload(bytes: &[u8]) -> Result<Arc<FormatRegistry>, crate::error::DecodeError> {
    let mut registry = FormatRegistry::empty();
    let mut warnings = WarningBuffer::new(NO_SEGMENT, false);
    let mut fmtu_type_ids: HashSet<u8> = HashSet::new();
    let mut fmtu_frames: Vec<(u64, u8, Vec<Option<f64>>)> = Vec::new();

    let len = bytes.len();
    let mut i = 0usize;
    while i + 3 <= len {
        if bytes[i] != SYNC0 || bytes[i + 1] != SYNC1 {
            i += 1;
            continue;
        }
        let type_id = bytes[i + 2];
        let is_fmt = type_id == FMT_TYPE_ID;
        let is_fmtu = fmtu_type_ids.contains(&type_id);
        if !is_fmt && !is_fmtu {
            i += 1;
            continue;
        }

        // Both branches require the frame's own schema to already be known:
        // FMT's shape is hard-coded, FMTU/FUNIT's shape came from its own
        // earlier FMT frame (which is what populated `fmtu_type_ids`).
        let Some(frame_length) = registry.get(type_id).map(|s| s.frame_length as usize) else {
            i += 1;
            continue;
        };

        let frame_end = i + frame_length;
        if frame_end > len {
            i += 1;
            continue;
        }
        let payload = &bytes[i + 3..frame_end];

        if is_fmt {
            if let Some(schema) = decode_fmt_payload(payload, &mut warnings, i as u64) {
                if is_multiplier_schema_name(&schema.name) {
                    fmtu_type_ids.insert(schema.type_id);
                }
                registry.insert(schema);
            }
        } else if let Some((target_type_id, scale_factors)) = decode_fmtu_payload(payload) {
            fmtu_frames.push((i as u64, target_type_id, scale_factors));
        }

        i = frame_end;
    }

    for (offset, target_type_id, scale_factors) in fmtu_frames {
        if registry.contains(target_type_id) {
            registry.apply_scale(target_type_id, scale_factors);
        } else {
            warnings.push(
                offset,
                WarningKind::UnknownType,
                format!("FMTU names unknown type_id {target_type_id}"),
            );
        }
    }

    Ok(registry.into_shared())
}
