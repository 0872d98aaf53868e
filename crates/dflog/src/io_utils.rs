//! Binary reading utilities for parsing DataFlash frame payloads.

use byteorder::{ByteOrder, LittleEndian};

/// A bounds-checked cursor over a byte slice, used to decode one frame's
/// fixed-width payload. Every read is checked against `remaining()`; short
/// reads return `None` rather than panicking so callers can turn them into a
/// `short-read` warning instead of a crash.
pub struct BinaryReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BinaryReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if self.remaining() < n {
            return None;
        }
        let s = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Some(s)
    }

    pub fn read_u8(&mut self) -> Option<u8> {
        self.take(1).map(|s| s[0])
    }

    pub fn read_i8(&mut self) -> Option<i8> {
        self.take(1).map(|s| s[0] as i8)
    }

    pub fn read_u16(&mut self) -> Option<u16> {
        self.take(2).map(LittleEndian::read_u16)
    }

    pub fn read_i16(&mut self) -> Option<i16> {
        self.take(2).map(LittleEndian::read_i16)
    }

    pub fn read_u32(&mut self) -> Option<u32> {
        self.take(4).map(LittleEndian::read_u32)
    }

    pub fn read_i32(&mut self) -> Option<i32> {
        self.take(4).map(LittleEndian::read_i32)
    }

    pub fn read_u64(&mut self) -> Option<u64> {
        self.take(8).map(LittleEndian::read_u64)
    }

    pub fn read_i64(&mut self) -> Option<i64> {
        self.take(8).map(LittleEndian::read_i64)
    }

    pub fn read_f32(&mut self) -> Option<f32> {
        self.take(4).map(LittleEndian::read_f32)
    }

    pub fn read_f64(&mut self) -> Option<f64> {
        self.take(8).map(LittleEndian::read_f64)
    }

    /// Read a fixed-width, NUL-padded ASCII string and trim trailing NULs.
    pub fn read_ascii_fixed(&mut self, len: usize) -> Option<String> {
        let bytes = self.take(len)?;
        let trimmed = match bytes.iter().position(|&b| b == 0) {
            Some(idx) => &bytes[..idx],
            None => bytes,
        };
        Some(trimmed.iter().map(|&b| b as char).collect())
    }

    /// Read `count` little-endian i16 values.
    pub fn read_i16_array(&mut self, count: usize) -> Option<Vec<i16>> {
        let bytes = self.take(count * 2)?;
        Some(bytes.chunks_exact(2).map(LittleEndian::read_i16).collect())
    }
}
