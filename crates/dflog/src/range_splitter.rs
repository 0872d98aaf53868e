//! The Range Splitter (§4.3): partitions valid frame-start offsets into up to
//! `N` contiguous, frame-aligned byte ranges for parallel consumption.

/// A half-open `[start, end)` byte range, frame-aligned by construction:
/// `start` is always a valid offset from the Sync Scanner, `end` is either
/// EOF or another valid offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

/// Split `offsets` (ascending, as returned by the Sync Scanner) into up to
/// `num_workers` ranges of roughly equal offset count, each ending at the
/// start of the next chunk (or at `file_len` for the last one). Empty chunks
/// are dropped, so a short file with few frames and a large `num_workers`
/// yields fewer ranges than requested rather than empty ones.
pub fn split_ranges(offsets: &[u64], num_workers: usize, file_len: u64) -> Vec<ByteRange> {
    assert!(num_workers >= 1, "num_workers must be positive");
    if offsets.is_empty() {
        return Vec::new();
    }

    let num_workers = num_workers.min(offsets.len());
    let chunk_size = offsets.len().div_ceil(num_workers);

    let mut ranges = Vec::with_capacity(num_workers);
    let mut chunk_starts: Vec<usize> = (0..offsets.len()).step_by(chunk_size).collect();
    chunk_starts.push(offsets.len());

    for pair in chunk_starts.windows(2) {
        let (first_idx, next_first_idx) = (pair[0], pair[1]);
        if first_idx == next_first_idx {
            continue;
        }
        let start = offsets[first_idx];
        let end = if next_first_idx < offsets.len() { offsets[next_first_idx] } else { file_len };
        ranges.push(ByteRange { start, end });
    }

    ranges
}
