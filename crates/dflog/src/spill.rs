//! Per-segment spill files (§4.5, §9): each worker writes its decoded records
//! and warnings to disk rather than holding them in memory, decoupling
//! producer speed from the final merge's memory footprint.

use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use bincode::config::standard;
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::record::DecodedRecord;
use crate::warning::Warning;

/// One segment's spilled output: its records (already in file order) plus
/// the warnings it accumulated. Serialized as a single `bincode` blob rather
/// than a streaming format, since a segment's full output is bounded and
/// known once decoding finishes.
#[derive(Serialize, Deserialize)]
struct SpillPayload {
    records: Vec<DecodedRecord>,
    warnings: Vec<SerializableWarning>,
}

/// `Warning` itself isn't `Serialize` (it never needs to be on the wire in
/// thread mode); process-mode spill files need it, so this mirrors its shape.
#[derive(Serialize, Deserialize)]
struct SerializableWarning {
    segment_id: Option<u32>,
    offset: u64,
    kind: u8,
    detail: String,
}

fn kind_to_u8(kind: crate::warning::WarningKind) -> u8 {
    use crate::warning::WarningKind::*;
    match kind {
        UnknownType => 0,
        ShortRead => 1,
        BadFormat => 2,
        DecodeError => 3,
    }
}

fn kind_from_u8(v: u8) -> crate::warning::WarningKind {
    use crate::warning::WarningKind::*;
    match v {
        0 => UnknownType,
        1 => ShortRead,
        2 => BadFormat,
        _ => DecodeError,
    }
}

impl From<&Warning> for SerializableWarning {
    fn from(w: &Warning) -> Self {
        Self { segment_id: w.segment_id, offset: w.offset, kind: kind_to_u8(w.kind), detail: w.detail.clone() }
    }
}

impl From<SerializableWarning> for Warning {
    fn from(w: SerializableWarning) -> Self {
        Warning { segment_id: w.segment_id, offset: w.offset, kind: kind_from_u8(w.kind), detail: w.detail }
    }
}

/// The on-disk path for a segment's spill file, keyed by segment index.
pub fn spill_path(spill_dir: &Path, segment_id: u32) -> PathBuf {
    spill_dir.join(format!("segment-{segment_id:08}.spill"))
}

/// Write one segment's decoded output to its spill file.
pub fn write_spill(
    spill_dir: &Path,
    segment_id: u32,
    records: Vec<DecodedRecord>,
    warnings: Vec<Warning>,
) -> Result<(), DecodeError> {
    let path = spill_path(spill_dir, segment_id);
    let file = std::fs::File::create(&path)?;
    let payload = SpillPayload { records, warnings: warnings.iter().map(SerializableWarning::from).collect() };
    bincode::serde::encode_into_std_write(&payload, &mut BufWriter::new(file), standard()).map_err(|e| {
        DecodeError::Spill { segment_id, reason: e.to_string() }
    })?;
    Ok(())
}

/// Read one segment's spill file back, in file order.
pub fn read_spill(spill_dir: &Path, segment_id: u32) -> Result<(Vec<DecodedRecord>, Vec<Warning>), DecodeError> {
    let path = spill_path(spill_dir, segment_id);
    let file = std::fs::File::open(&path)?;
    let payload: SpillPayload =
        bincode::serde::decode_from_std_read(&mut BufReader::new(file), standard()).map_err(|e| {
            DecodeError::Spill { segment_id, reason: e.to_string() }
        })?;
    Ok((payload.records, payload.warnings.into_iter().map(Warning::from).collect()))
}
