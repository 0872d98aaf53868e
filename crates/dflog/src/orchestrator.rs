//! The Parallel Orchestrator (§4.5): drives preload, scanning, splitting,
//! per-segment decoding, and the final merge, in either thread or process
//! mode.

use std::path::{Path, PathBuf};

use bincode::config::standard;
use memmap2::Mmap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{DecoderConfig, RunningMode};
use crate::error::DecodeError;
use crate::field_format::FormatCompiler;
use crate::range_splitter::{self, ByteRange};
use crate::record::DecodedRecord;
use crate::registry::{self, FormatRegistry};
use crate::segment_decoder;
use crate::spill;
use crate::sync_scanner;
use crate::warning::Warning;

/// Memory-map `path` read-only. Every worker, thread-mode or process-mode,
/// opens its own mapping rather than sharing one across a process boundary
/// (mappings aren't inherited portably, §9); `Mmap` derefs to `[u8]` so
/// downstream code never needs to know the file wasn't just read into a
/// `Vec`.
fn open_mapped(path: &Path) -> Result<Mmap, DecodeError> {
    let file = std::fs::File::open(path)?;
    // SAFETY: the file is treated as read-only for the lifetime of this run;
    // DataFlash logs are immutable inputs in scope here (§1 Non-goals exclude
    // modifying or re-emitting them).
    let mmap = unsafe { Mmap::map(&file)? };
    Ok(mmap)
}

/// The outcome of a completed run: the merged records and the (possibly
/// empty) collected warnings.
pub struct RunOutput {
    pub records: Vec<DecodedRecord>,
    pub warnings: Vec<Warning>,
}

/// Arguments for one process-mode worker invocation, serialized to a temp
/// file and passed via `--dflog-worker-segment <args-file>` (§4.5).
#[derive(Serialize, Deserialize)]
pub struct WorkerArgs {
    pub file_path: PathBuf,
    pub range: (u64, u64),
    pub registry_path: PathBuf,
    pub message_filter: Option<Vec<String>>,
    pub round_floats: bool,
    pub collect_warnings: bool,
    pub segment_id: u32,
    pub spill_dir: PathBuf,
}

/// Run a complete decode of `config.file_path`, per §4.5's seven steps.
pub fn run(config: &DecoderConfig) -> Result<RunOutput, DecodeError> {
    config.validate()?;

    let data = open_mapped(&config.file_path)?;
    let registry = registry::preload(&data)?;
    let offsets = sync_scanner::find_valid_sync_positions(&data, &registry);
    let ranges = range_splitter::split_ranges(&offsets, config.num_workers, data.len() as u64);

    std::fs::create_dir_all(&config.spill_dir)?;

    // Both modes spill each segment to disk (§4.5 step 5) rather than handing
    // decoded records back in memory; the rayon/process join point only ever
    // carries a segment id, never its records.
    let segment_ids: Vec<u32> = match config.running_mode {
        RunningMode::Thread => run_thread_mode(&data, &registry, &ranges, config)?,
        RunningMode::Process => run_process_mode(&registry, &ranges, config)?,
    };

    if config.cancel.is_cancelled() {
        return Err(DecodeError::Cancelled);
    }

    // Step 6: open the spill files in parallel and merge.
    let segment_outputs: Vec<(u32, Vec<DecodedRecord>, Vec<Warning>)> = segment_ids
        .into_par_iter()
        .map(|segment_id| -> Result<(u32, Vec<DecodedRecord>, Vec<Warning>), DecodeError> {
            let (records, warnings) = spill::read_spill(&config.spill_dir, segment_id)?;
            Ok((segment_id, records, warnings))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut warnings = Vec::new();
    let segments: Vec<(u32, Vec<DecodedRecord>)> = segment_outputs
        .into_iter()
        .map(|(segment_id, records, segment_warnings)| {
            warnings.extend(segment_warnings);
            (segment_id, records)
        })
        .collect();

    let records = crate::merge::merge_segments(segments);
    Ok(RunOutput { records, warnings })
}

fn run_thread_mode(
    data: &[u8],
    registry: &FormatRegistry,
    ranges: &[ByteRange],
    config: &DecoderConfig,
) -> Result<Vec<u32>, DecodeError> {
    let compiler = FormatCompiler::new();
    let cancel = config.cancel.clone();

    ranges
        .par_iter()
        .enumerate()
        .map(|(idx, range)| -> Result<u32, DecodeError> {
            let segment_id = idx as u32;
            let output = segment_decoder::decode_segment(
                data,
                *range,
                registry,
                &compiler,
                config.message_filter.as_ref(),
                config.round_floats,
                segment_id,
                config.collect_warnings,
                &cancel,
            );
            if output.cancelled {
                return Err(DecodeError::Cancelled);
            }
            spill::write_spill(&config.spill_dir, segment_id, output.records, output.warnings)?;
            Ok(segment_id)
        })
        .collect()
}

fn run_process_mode(
    registry: &FormatRegistry,
    ranges: &[ByteRange],
    config: &DecoderConfig,
) -> Result<Vec<u32>, DecodeError> {
    let worker_exe = config
        .worker_exe
        .as_ref()
        .ok_or_else(|| DecodeError::InvalidConfig("worker_exe is required in process running mode".into()))?;

    let registry_path = config.spill_dir.join("registry.bincode");
    let registry_file = std::fs::File::create(&registry_path)?;
    bincode::serde::encode_into_std_write(registry, &mut std::io::BufWriter::new(registry_file), standard())
        .map_err(|e| DecodeError::InvalidConfig(format!("failed to serialize registry snapshot: {e}")))?;

    let mut outputs = Vec::with_capacity(ranges.len());
    for (idx, range) in ranges.iter().enumerate() {
        if config.cancel.is_cancelled() {
            return Err(DecodeError::Cancelled);
        }
        let segment_id = idx as u32;
        let args = WorkerArgs {
            file_path: config.file_path.clone(),
            range: (range.start, range.end),
            registry_path: registry_path.clone(),
            message_filter: config.message_filter.as_ref().map(|s| s.iter().cloned().collect()),
            round_floats: config.round_floats,
            collect_warnings: config.collect_warnings,
            segment_id,
            spill_dir: config.spill_dir.clone(),
        };

        let args_path = config.spill_dir.join(format!("worker-args-{segment_id:08}.bincode"));
        let args_file = std::fs::File::create(&args_path)?;
        bincode::serde::encode_into_std_write(&args, &mut std::io::BufWriter::new(args_file), standard())
            .map_err(|e| DecodeError::WorkerFailed { segment_id, reason: e.to_string() })?;

        let status = std::process::Command::new(worker_exe)
            .arg("--dflog-worker-segment")
            .arg(&args_path)
            .status()
            .map_err(|e| DecodeError::WorkerFailed { segment_id, reason: e.to_string() })?;

        if !status.success() {
            return Err(DecodeError::WorkerFailed {
                segment_id,
                reason: format!("worker process exited with {status}"),
            });
        }

        outputs.push(segment_id);
    }

    Ok(outputs)
}

/// Decode exactly one segment and write its spill file. The library-side half
/// of process mode; recognizing `--dflog-worker-segment` on argv and calling
/// this is `dflog-cli`'s job (§4.5).
pub fn run_worker_segment(args: &WorkerArgs) -> Result<(), DecodeError> {
    let data = open_mapped(&args.file_path)?;
    let registry_file = std::fs::File::open(&args.registry_path)?;
    let registry: FormatRegistry =
        bincode::serde::decode_from_std_read(&mut std::io::BufReader::new(registry_file), standard())
            .map_err(|e| DecodeError::WorkerFailed { segment_id: args.segment_id, reason: e.to_string() })?;

    let compiler = FormatCompiler::new();
    let filter = args.message_filter.as_ref().map(|names| names.iter().cloned().collect());
    let range = ByteRange { start: args.range.0, end: args.range.1 };

    // A process-mode worker has no channel back to the parent's cancel flag;
    // cancellation here is the parent simply not spawning further segments.
    let output = segment_decoder::decode_segment(
        &data,
        range,
        &registry,
        &compiler,
        filter.as_ref(),
        args.round_floats,
        args.segment_id,
        args.collect_warnings,
        &crate::config::CancelHandle::new(),
    );

    spill::write_spill(&args.spill_dir, args.segment_id, output.records, output.warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CancelHandle;
    use crate::test_support::*;
    use std::io::Write;

    fn write_log(dir: &Path, bytes: &[u8]) -> PathBuf {
        let path = dir.join("log.bin");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(bytes).unwrap();
        path
    }

    fn config(file_path: PathBuf, spill_dir: PathBuf, num_workers: usize) -> DecoderConfig {
        DecoderConfig {
            file_path,
            num_workers,
            running_mode: RunningMode::Thread,
            round_floats: false,
            message_filter: None,
            collect_warnings: true,
            spill_dir,
            worker_exe: None,
            cancel: CancelHandle::new(),
        }
    }

    #[test]
    fn scenario_two_out_of_order_gps_frames_merge_by_time() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = fmt_preamble_bytes();
        bytes.extend(gps_frame(100));
        bytes.extend(gps_frame(50));
        let path = write_log(dir.path(), &bytes);

        let cfg = config(path, dir.path().join("spill"), 2);
        let output = run(&cfg).unwrap();
        let times: Vec<u64> = output.records.iter().map(|r| r.time_us().unwrap()).collect();
        assert_eq!(times, vec![50, 100]);
    }

    #[test]
    fn scenario_unknown_type_between_known_frames_emits_one_warning() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = fmt_preamble_bytes();
        bytes.extend(imu_frame(10, 1));
        bytes.extend(vec![sync_scanner::SYNC0, sync_scanner::SYNC1, 0x42, 0, 0]);
        bytes.extend(imu_frame(20, 2));
        let path = write_log(dir.path(), &bytes);

        let cfg = config(path, dir.path().join("spill"), 1);
        let output = run(&cfg).unwrap();
        assert_eq!(output.records.len(), 2);
        assert_eq!(output.warnings.len(), 1);
    }

    #[test]
    fn scenario_message_filter_restricts_to_matching_type() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = fmt_preamble_bytes();
        bytes.extend(gps_frame(5));
        bytes.extend(imu_frame(5, 1));
        bytes.extend(gps_frame(6));
        let path = write_log(dir.path(), &bytes);

        let mut cfg = config(path, dir.path().join("spill"), 2);
        cfg.message_filter = Some(["GPS".to_string()].into_iter().collect());
        let output = run(&cfg).unwrap();
        assert_eq!(output.records.len(), 2);
        assert!(output.records.iter().all(|r| r.message_type == "GPS"));
    }

    #[test]
    fn num_workers_one_and_many_yield_the_same_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = fmt_preamble_bytes();
        for t in [30, 10, 50, 20, 40, 60, 5, 15] {
            bytes.extend(gps_frame(t));
        }
        let path = write_log(dir.path(), &bytes);

        let single = run(&config(path.clone(), dir.path().join("spill1"), 1)).unwrap();
        let many = run(&config(path, dir.path().join("spill4"), 4)).unwrap();

        let single_times: Vec<u64> = single.records.iter().map(|r| r.time_us().unwrap()).collect();
        let many_times: Vec<u64> = many.records.iter().map(|r| r.time_us().unwrap()).collect();
        assert_eq!(single_times, many_times);
    }

    #[test]
    fn bootstrap_only_file_yields_no_records_or_warnings() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_log(dir.path(), &fmt_preamble_bytes());

        let cfg = config(path, dir.path().join("spill"), 2);
        let output = run(&cfg).unwrap();
        assert!(output.records.is_empty());
        assert!(output.warnings.is_empty());
    }

    #[test]
    fn pre_cancelled_run_fails_with_cancelled_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = fmt_preamble_bytes();
        bytes.extend(gps_frame(1));
        let path = write_log(dir.path(), &bytes);

        let mut cfg = config(path, dir.path().join("spill"), 1);
        cfg.cancel.cancel();
        assert!(matches!(run(&cfg), Err(DecodeError::Cancelled)));
    }
}
