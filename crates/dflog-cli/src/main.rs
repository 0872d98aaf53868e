use std::collections::HashSet;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dflog::{CancelHandle, DecodeError, DecoderConfig, RunningMode};
use serde::Deserialize;

/// Prefix recognized at the very top of `main`, before clap ever sees argv:
/// a process-mode worker invocation (§4.5 of SPEC_FULL.md). This has to live
/// outside the normal subcommand tree since the worker process is spawned by
/// `dflog` itself, not typed by a user.
const WORKER_SEGMENT_FLAG: &str = "--dflog-worker-segment";

#[derive(Parser)]
#[command(name = "dflog", about = "Parallel decoder for ArduPilot DataFlash (.BIN) flight logs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a DataFlash log and print the merged record stream.
    Decode {
        file: PathBuf,

        /// Optional TOML file with any `CliConfig` fields; CLI flags win on overlap.
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long)]
        num_workers: Option<usize>,

        /// "thread" (default) or "process".
        #[arg(long)]
        running_mode: Option<String>,

        #[arg(long)]
        round_floats: bool,

        /// Restrict output to these message types. Repeat for multiple: --message-filter GPS --message-filter IMU
        #[arg(long)]
        message_filter: Vec<String>,

        #[arg(long)]
        collect_warnings: bool,

        #[arg(long)]
        spill_dir: Option<PathBuf>,

        /// "human" (default) or "json" (one JSON object per record, newline-delimited).
        #[arg(long, default_value = "human")]
        format: String,

        /// Write records to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Decode only the bootstrap FMT/FMTU/FUNIT region and print the discovered schemas.
    Schemas {
        file: PathBuf,
    },
}

/// The on-disk overlay for `--config`: every field optional, since any subset
/// may be supplied and the rest fall back to CLI flags or hard-coded
/// defaults (§2.1 of SPEC_FULL.md).
#[derive(Debug, Default, Deserialize)]
struct CliConfig {
    num_workers: Option<usize>,
    running_mode: Option<String>,
    round_floats: Option<bool>,
    message_filter: Option<Vec<String>>,
    collect_warnings: Option<bool>,
    spill_dir: Option<PathBuf>,
}

fn load_cli_config(path: &PathBuf) -> anyhow::Result<CliConfig> {
    let text = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&text)?)
}

fn parse_running_mode(s: &str) -> anyhow::Result<RunningMode> {
    match s {
        "thread" => Ok(RunningMode::Thread),
        "process" => Ok(RunningMode::Process),
        other => anyhow::bail!("unknown running_mode '{other}' (expected \"thread\" or \"process\")"),
    }
}

/// Merge a `CliConfig` overlay with the CLI flags actually passed, flags
/// winning on any field present in both (§2.1: "merged with CLI flags (flags
/// win)").
#[allow(clippy::too_many_arguments)]
fn build_decoder_config(
    file: PathBuf,
    file_config: Option<CliConfig>,
    num_workers: Option<usize>,
    running_mode: Option<String>,
    round_floats: bool,
    message_filter: Vec<String>,
    collect_warnings: bool,
    spill_dir: Option<PathBuf>,
) -> anyhow::Result<DecoderConfig> {
    let file_config = file_config.unwrap_or_default();

    let num_workers = num_workers
        .or(file_config.num_workers)
        .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1));

    let running_mode_str = running_mode.or(file_config.running_mode).unwrap_or_else(|| "thread".to_string());
    let running_mode = parse_running_mode(&running_mode_str)?;

    let round_floats = round_floats || file_config.round_floats.unwrap_or(false);
    let collect_warnings = collect_warnings || file_config.collect_warnings.unwrap_or(false);

    let filter_names = if !message_filter.is_empty() { Some(message_filter) } else { file_config.message_filter };
    let message_filter: Option<HashSet<String>> = filter_names.map(|names| names.into_iter().collect());

    let spill_dir = spill_dir
        .or(file_config.spill_dir)
        .unwrap_or_else(|| std::env::temp_dir().join(format!("dflog-spill-{}", std::process::id())));

    let worker_exe = match running_mode {
        RunningMode::Process => Some(std::env::current_exe()?),
        RunningMode::Thread => None,
    };

    Ok(DecoderConfig {
        file_path: file,
        num_workers,
        running_mode,
        round_floats,
        message_filter,
        collect_warnings,
        spill_dir,
        worker_exe,
        cancel: CancelHandle::new(),
    })
}

fn field_value_json(value: &dflog::FieldValue) -> serde_json::Value {
    use dflog::FieldValue::*;
    match value {
        I8(v) => serde_json::json!(v),
        U8(v) => serde_json::json!(v),
        I16(v) => serde_json::json!(v),
        U16(v) => serde_json::json!(v),
        I32(v) => serde_json::json!(v),
        U32(v) => serde_json::json!(v),
        I64(v) => serde_json::json!(v),
        U64(v) => serde_json::json!(v),
        F32(v) => serde_json::json!(v),
        F64(v) => serde_json::json!(v),
        Text(v) => serde_json::json!(v),
        Int16Array(v) => serde_json::json!(v.to_vec()),
    }
}

fn record_json(record: &dflog::DecodedRecord) -> serde_json::Value {
    let fields: serde_json::Map<String, serde_json::Value> =
        record.fields.iter().map(|(name, value)| (name.clone(), field_value_json(value))).collect();
    serde_json::json!({
        "message_type": record.message_type,
        "__offset__": record.offset,
        "fields": fields,
    })
}

fn print_record_human(writer: &mut dyn std::io::Write, record: &dflog::DecodedRecord) -> std::io::Result<()> {
    write!(writer, "{:<6} offset={:<10}", record.message_type, record.offset)?;
    for (name, value) in &record.fields {
        write!(writer, " {name}={}", field_value_json(value))?;
    }
    writeln!(writer)
}

#[allow(clippy::too_many_arguments)]
fn run_decode(
    file: PathBuf,
    config: Option<PathBuf>,
    num_workers: Option<usize>,
    running_mode: Option<String>,
    round_floats: bool,
    message_filter: Vec<String>,
    collect_warnings: bool,
    spill_dir: Option<PathBuf>,
    format: String,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let file_config = config.as_ref().map(load_cli_config).transpose()?;
    let decoder_config = build_decoder_config(
        file,
        file_config,
        num_workers,
        running_mode,
        round_floats,
        message_filter,
        collect_warnings,
        spill_dir,
    )?;

    let result = dflog::run(&decoder_config)?;

    let mut writer: Box<dyn std::io::Write> =
        if let Some(path) = output { Box::new(std::io::BufWriter::new(std::fs::File::create(path)?)) } else { Box::new(std::io::stdout()) };

    match format.as_str() {
        "json" => {
            for record in &result.records {
                writeln!(writer, "{}", serde_json::to_string(&record_json(record))?)?;
            }
        }
        _ => {
            for record in &result.records {
                print_record_human(&mut writer, record)?;
            }
        }
    }
    writer.flush()?;

    eprintln!("decoded {} record(s), {} warning(s)", result.records.len(), result.warnings.len());
    for warning in &result.warnings {
        eprintln!(
            "warning: segment={:?} offset={} kind={} detail={}",
            warning.segment_id,
            warning.offset,
            warning.kind.as_str(),
            warning.detail
        );
    }

    Ok(())
}

fn run_schemas(file: PathBuf) -> anyhow::Result<()> {
    let data = std::fs::read(&file)?;
    let registry = dflog::registry::preload(&data)?;
    let offsets = dflog::sync_scanner::find_valid_sync_positions(&data, &registry);
    println!("{} frame(s) found in {}", offsets.len(), file.display());
    Ok(())
}

fn main() -> anyhow::Result<()> {
    // Recognize the hidden process-mode worker convention before clap ever
    // parses argv: `dflog-cli --dflog-worker-segment <args-file>` (§4.5).
    let mut argv = std::env::args();
    let exe = argv.next();
    if let (Some(flag), Some(args_path)) = (argv.next(), argv.next()) {
        if flag == WORKER_SEGMENT_FLAG {
            return run_worker_segment(PathBuf::from(args_path));
        }
    }
    let _ = exe;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Decode {
            file,
            config,
            num_workers,
            running_mode,
            round_floats,
            message_filter,
            collect_warnings,
            spill_dir,
            format,
            output,
        } => run_decode(
            file,
            config,
            num_workers,
            running_mode,
            round_floats,
            message_filter,
            collect_warnings,
            spill_dir,
            format,
            output,
        ),
        Commands::Schemas { file } => run_schemas(file),
    }
}

fn run_worker_segment(args_path: PathBuf) -> anyhow::Result<()> {
    let file = std::fs::File::open(&args_path)?;
    let args: dflog::WorkerArgs =
        bincode::serde::decode_from_std_read(&mut std::io::BufReader::new(file), bincode::config::standard())
            .map_err(|e| DecodeError::WorkerFailed { segment_id: u32::MAX, reason: e.to_string() })?;
    dflog::run_worker_segment(&args)?;
    Ok(())
}
