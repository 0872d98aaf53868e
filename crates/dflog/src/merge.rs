//! The final k-way merge (§4.5, §5): combines each segment's file-ordered
//! records into one stream ordered by `(merge_key_time_us, segment_id,
//! offset)`.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::record::DecodedRecord;

#[derive(Eq, PartialEq)]
struct HeapEntry {
    time_us: u64,
    segment_id: u32,
    offset: u64,
    segment_idx: usize,
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.time_us, self.segment_id, self.offset).cmp(&(other.time_us, other.segment_id, other.offset))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Merge `segments` (each already in file order, as produced by the Segment
/// Decoder and read back from its spill file) into one sequence ordered by
/// `TimeUS` ascending, ties broken by segment index then byte offset. Each
/// inner vector's index in `segments` is its segment id for tie-breaking.
pub fn merge_segments(segments: Vec<(u32, Vec<DecodedRecord>)>) -> Vec<DecodedRecord> {
    let mut cursors: Vec<std::vec::IntoIter<DecodedRecord>> = Vec::with_capacity(segments.len());
    let mut segment_ids = Vec::with_capacity(segments.len());
    for (segment_id, records) in segments {
        segment_ids.push(segment_id);
        cursors.push(records.into_iter());
    }

    let mut heap = BinaryHeap::with_capacity(cursors.len());
    let mut pending: Vec<Option<DecodedRecord>> = vec![None; cursors.len()];

    for idx in 0..cursors.len() {
        if let Some(record) = cursors[idx].next() {
            heap.push(Reverse(HeapEntry {
                time_us: record.merge_key_time_us,
                segment_id: segment_ids[idx],
                offset: record.offset,
                segment_idx: idx,
            }));
            pending[idx] = Some(record);
        }
    }

    let mut out = Vec::new();
    while let Some(Reverse(entry)) = heap.pop() {
        let record = pending[entry.segment_idx].take().expect("heap entry always has a pending record");
        out.push(record);

        if let Some(next) = cursors[entry.segment_idx].next() {
            heap.push(Reverse(HeapEntry {
                time_us: next.merge_key_time_us,
                segment_id: segment_ids[entry.segment_idx],
                offset: next.offset,
                segment_idx: entry.segment_idx,
            }));
            pending[entry.segment_idx] = Some(next);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn record(time_us: u64, offset: u64) -> DecodedRecord {
        DecodedRecord { message_type: "GPS".into(), fields: IndexMap::new(), offset, merge_key_time_us: time_us }
    }

    #[test]
    fn merges_two_segments_by_time() {
        let seg_a = vec![record(50, 0), record(200, 11)];
        let seg_b = vec![record(100, 0)];
        let merged = merge_segments(vec![(0, seg_a), (1, seg_b)]);
        let times: Vec<u64> = merged.iter().map(|r| r.merge_key_time_us).collect();
        assert_eq!(times, vec![50, 100, 200]);
    }

    #[test]
    fn ties_break_by_segment_then_offset() {
        let seg_a = vec![record(10, 20)];
        let seg_b = vec![record(10, 5)];
        let merged = merge_segments(vec![(0, seg_a), (1, seg_b)]);
        assert_eq!(merged[0].offset, 20);
        assert_eq!(merged[1].offset, 5);
    }

    #[test]
    fn single_segment_preserves_its_own_order() {
        let seg = vec![record(5, 0), record(5, 10), record(6, 20)];
        let merged = merge_segments(vec![(0, seg)]);
        let offsets: Vec<u64> = merged.iter().map(|r| r.offset).collect();
        assert_eq!(offsets, vec![0, 10, 20]);
    }

    #[test]
    fn empty_segments_yield_empty_output() {
        assert!(merge_segments(vec![(0, vec![]), (1, vec![])]).is_empty());
    }
}
