//! The format-string compiler (§4.1): turns one ArduPilot format-code
//! alphabet string (e.g. `"QBIccC"`) into an ordered list of fixed-width field
//! decoders, cached by format string so schemas that share a format string
//! share the compiled decoder.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::io_utils::BinaryReader;
use crate::record::FieldValue;

/// Byte width of one format code, or `None` if the code isn't in the known
/// alphabet (§4.1 table).
pub fn field_width(code: char) -> Option<usize> {
    match code {
        'b' | 'B' | 'M' => Some(1),
        'h' | 'H' | 'c' | 'C' => Some(2),
        'i' | 'I' | 'n' | 'e' | 'E' | 'L' | 'f' => Some(4),
        'q' | 'Q' | 'd' => Some(8),
        'N' => Some(16),
        'Z' | 'a' => Some(64),
        _ => None,
    }
}

/// Implicit per-code scale (§4.1 table); `None` means no implicit scaling.
pub fn implicit_scale(code: char) -> Option<f64> {
    match code {
        'c' | 'C' | 'e' | 'E' => Some(0.01),
        'L' => Some(1e-7),
        _ => None,
    }
}

/// A single compiled field: its name, byte offset/width within the payload,
/// and the decode + scale behavior for its format code.
#[derive(Debug, Clone)]
pub struct CompiledField {
    pub code: char,
    pub offset: usize,
    pub width: usize,
}

impl CompiledField {
    fn decode_raw(&self, reader: &mut BinaryReader) -> Option<FieldValue> {
        debug_assert_eq!(reader.position(), self.offset);
        match self.code {
            'b' => reader.read_i8().map(FieldValue::I8),
            'B' | 'M' => reader.read_u8().map(FieldValue::U8),
            'h' | 'c' => reader.read_i16().map(FieldValue::I16),
            'H' | 'C' => reader.read_u16().map(FieldValue::U16),
            'i' | 'e' | 'L' => reader.read_i32().map(FieldValue::I32),
            'I' | 'E' => reader.read_u32().map(FieldValue::U32),
            'q' => reader.read_i64().map(FieldValue::I64),
            'Q' => reader.read_u64().map(FieldValue::U64),
            'f' => reader.read_f32().map(FieldValue::F32),
            'd' => reader.read_f64().map(FieldValue::F64),
            'n' => reader.read_ascii_fixed(4).map(FieldValue::Text),
            'N' => reader.read_ascii_fixed(16).map(FieldValue::Text),
            'Z' => reader.read_ascii_fixed(64).map(FieldValue::Text),
            'a' => reader.read_i16_array(32).map(|v| {
                FieldValue::Int16Array(v.try_into().expect("read_i16_array(32) returns 32 elements"))
            }),
            _ => None,
        }
    }
}

/// One schema's compiled decoder: a fixed, ordered list of field decoders and
/// the total payload width they consume.
#[derive(Debug, Clone)]
pub struct CompiledFormat {
    pub fields: Vec<CompiledField>,
    pub payload_width: usize,
}

impl CompiledFormat {
    fn compile(format_string: &str) -> Result<Self, char> {
        let mut fields = Vec::new();
        let mut offset = 0usize;
        for code in format_string.chars() {
            let width = field_width(code).ok_or(code)?;
            fields.push(CompiledField { code, offset, width });
            offset += width;
        }
        Ok(Self { fields, payload_width: offset })
    }

    /// Decode a payload slice into an ordered list of (field, raw value)
    /// pairs, one per compiled field, applying `field_names` positionally.
    /// Returns `None` on a short payload (caller turns this into a
    /// `decode-error` warning) — this should not happen for frames accepted
    /// by the sync scanner, since `payload.len()` is always
    /// `schema.payload_len()`.
    pub fn decode(&self, payload: &[u8], field_names: &[String]) -> Option<Vec<(String, FieldValue)>> {
        let mut reader = BinaryReader::new(payload);
        let mut out = Vec::with_capacity(self.fields.len());
        for (field, name) in self.fields.iter().zip(field_names) {
            let value = field.decode_raw(&mut reader)?;
            out.push((name.clone(), value));
        }
        Some(out)
    }
}

/// Process-wide cache of compiled formats, keyed by raw format string.
/// Compilation only ever inserts, never replaces, so the read path can use a
/// cheap read lock and only takes the write lock on a cache miss.
#[derive(Default)]
pub struct FormatCompiler {
    cache: RwLock<HashMap<String, Arc<CompiledFormat>>>,
}

impl FormatCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile (or fetch the cached compilation of) a format string. The
    /// `Err` carries the first unrecognized code, for a `bad-format` warning.
    pub fn compile(&self, format_string: &str) -> Result<Arc<CompiledFormat>, char> {
        if let Some(hit) = self.cache.read().expect("format cache lock poisoned").get(format_string) {
            return Ok(Arc::clone(hit));
        }
        let compiled = Arc::new(CompiledFormat::compile(format_string)?);
        self.cache
            .write()
            .expect("format cache lock poisoned")
            .entry(format_string.to_string())
            .or_insert_with(|| Arc::clone(&compiled));
        Ok(compiled)
    }
}

/// Effective scale for one field: an explicit schema-level override (from
/// FMTU/FUNIT) takes precedence over the code's implicit scale; it never
/// compounds with it (SPEC_FULL.md §9, Open Question resolution 1).
pub fn effective_scale(code: char, explicit: Option<f64>) -> Option<f64> {
    explicit.or_else(|| implicit_scale(code))
}
