use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use glob::glob;
use he6daq_core::calibration::{
    CalibrationConfig, CoreCalibrationEngine, SimulatedAdc, SimulatedAdcConfig, TuningConfig,
    ZdokSlot,
};
use he6daq_core::source::{DatagramSource, UdpSocketSource};
use he6daq_core::{InputFormat, InspectOptions};
use serde::Serialize;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (commit ",
    env!("HE6DAQ_BUILD_COMMIT"),
    ", ",
    env!("HE6DAQ_BUILD_DATE"),
    ")"
);

const DEFAULT_ITERATIONS: u32 = 10;
const DEFAULT_TOLERANCE: f64 = 0.005;
const DEFAULT_GROUPS: usize = 8;

#[derive(Parser, Debug)]
#[command(name = "he6daq")]
#[command(version, long_version = LONG_VERSION)]
#[command(
    about = "Packet capture, inspection and ADC core calibration for the He6 DAQ digitizer.",
    long_about = None,
    after_help = "Examples:\n  he6daq packets capture --count 1000 -o run.bin\n  he6daq packets inspect run.bin --stdout --pretty\n  he6daq calibrate simulate --core-offsets 0.8,-2,1.2,0 --stdout"
)]
struct Cli {
    /// Only log warnings and errors; suppress status lines
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Digitizer UDP packets: live capture and offline inspection.
    Packets {
        #[command(subcommand)]
        command: PacketsCommands,
    },
    /// ADC core offset/gain calibration.
    Calibrate {
        #[command(subcommand)]
        command: CalibrateCommands,
    },
}

#[derive(Subcommand, Debug)]
enum PacketsCommands {
    /// Receive packets from the digitizer and append them to a record file.
    Capture {
        /// Local address to bind
        #[arg(long, default_value = "0.0.0.0:4001")]
        bind: String,

        /// Number of datagrams to receive
        #[arg(long)]
        count: u64,

        /// Output record file
        #[arg(short = 'o', long)]
        output: PathBuf,

        /// Stop when no datagram arrives within this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Decode a capture or record file and generate a JSON report.
    #[command(
        after_help = "Examples:\n  he6daq packets inspect run.bin -o report.json\n  he6daq packets inspect capture.pcapng --port 4001 --stdout --packets"
    )]
    Inspect {
        /// Path to a .pcap, .pcapng or raw record (.bin, .dat, .raw) file
        input: PathBuf,

        #[command(flatten)]
        output: OutputArgs,

        /// Compact JSON output (default)
        #[arg(long, conflicts_with = "pretty")]
        compact: bool,

        /// Include per-packet header summaries
        #[arg(long)]
        packets: bool,

        /// Only decode capture traffic sent to this UDP port
        #[arg(long)]
        port: Option<u16>,

        /// Exit with a non-zero code if any datagram was rejected
        #[arg(long)]
        strict: bool,
    },
}

#[derive(Subcommand, Debug)]
enum CalibrateCommands {
    /// Run offset and gain calibration against a simulated ADC.
    Simulate(SimulateArgs),
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// Output report path (JSON)
    #[arg(short = 'o', long, required_unless_present = "stdout")]
    report: Option<PathBuf>,

    /// Write JSON to stdout
    #[arg(long, conflicts_with = "report")]
    stdout: bool,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,
}

#[derive(Args, Debug)]
struct SimulateArgs {
    /// Calibration config (JSON); flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// ZDOK slot of the ADC
    #[arg(long)]
    slot: Option<u8>,

    #[arg(long)]
    offset_iterations: Option<u32>,

    #[arg(long)]
    offset_tolerance: Option<f64>,

    #[arg(long)]
    gain_iterations: Option<u32>,

    #[arg(long)]
    gain_tolerance: Option<f64>,

    /// Snapshot groups per measurement
    #[arg(long)]
    groups: Option<usize>,

    /// Simulated per-core offset mismatch in mV
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    core_offsets: Option<Vec<f64>>,

    /// Simulated per-core gain mismatch in percent
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    core_gains: Option<Vec<f64>>,

    #[command(flatten)]
    output: OutputArgs,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.quiet);

    let quiet = cli.quiet;
    let result = match cli.command {
        Commands::Packets { command } => match command {
            PacketsCommands::Capture {
                bind,
                count,
                output,
                timeout_ms,
            } => cmd_packets_capture(&bind, count, output, timeout_ms, quiet),
            PacketsCommands::Inspect {
                input,
                output,
                compact: _,
                packets,
                port,
                strict,
            } => cmd_packets_inspect(input, output, packets, port, strict, quiet),
        },
        Commands::Calibrate { command } => match command {
            CalibrateCommands::Simulate(args) => cmd_calibrate_simulate(args, quiet),
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err.message);
            if let Some(hint) = err.hint {
                eprintln!("hint: {}", hint);
            }
            ExitCode::from(2)
        }
    }
}

fn init_tracing(quiet: bool) {
    let default = if quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[derive(Debug)]
struct CliError {
    message: String,
    hint: Option<String>,
}

impl CliError {
    fn new(message: impl Into<String>, hint: Option<String>) -> Self {
        Self {
            message: message.into(),
            hint,
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::new(format!("{err:#}"), None)
    }
}

fn cmd_packets_capture(
    bind: &str,
    count: u64,
    output: PathBuf,
    timeout_ms: Option<u64>,
    quiet: bool,
) -> Result<(), CliError> {
    if count == 0 {
        return Err(CliError::new(
            "--count must be at least 1",
            Some("pass the number of datagrams to receive".to_string()),
        ));
    }
    let mut source = UdpSocketSource::bind(bind)
        .and_then(|source| source.with_timeout(timeout_ms.map(Duration::from_millis)))
        .map_err(|err| {
            CliError::new(
                format!("cannot listen on {bind}: {err}"),
                Some("check the address and that the port is free".to_string()),
            )
        })?;

    ensure_parent_dir(&output)?;
    let file = File::create(&output)
        .with_context(|| format!("Failed to create output file: {}", output.display()))?;
    let mut writer = BufWriter::new(file);

    let mut received = 0u64;
    let mut written = 0u64;
    while received < count {
        let Some(datagram) = source.next_datagram().context("UDP receive failed")? else {
            tracing::warn!(received, "receive timed out, stopping early");
            break;
        };
        received += 1;
        match he6daq_core::decode(&datagram.payload) {
            Ok(packet) => {
                tracing::debug!(
                    unix_time = packet.unix_time,
                    packet_index = packet.packet_index,
                    digital_id = packet.digital_id,
                    "packet"
                );
                writer
                    .write_all(&datagram.payload)
                    .with_context(|| format!("Failed to write record: {}", output.display()))?;
                written += 1;
            }
            Err(err) => {
                tracing::warn!(src = ?datagram.src, %err, "rejected datagram");
            }
        }
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write record: {}", output.display()))?;

    if !quiet {
        eprintln!(
            "OK: {written} packets captured ({} rejected) -> {}",
            received - written,
            output.display()
        );
    }
    Ok(())
}

fn cmd_packets_inspect(
    input: PathBuf,
    output: OutputArgs,
    packets: bool,
    port: Option<u16>,
    strict: bool,
    quiet: bool,
) -> Result<(), CliError> {
    let resolved_input = resolve_input_path(&input)?;
    validate_input_file(&resolved_input)?;
    let input_abs = fs::canonicalize(&resolved_input)
        .with_context(|| format!("Failed to resolve input path: {}", resolved_input.display()))?;
    if let Some(report_path) = output.report.as_ref() {
        ensure_distinct_from_input(report_path, &input_abs)?;
    }

    let options = InspectOptions { port, packets };
    let rep = he6daq_core::inspect_file(&resolved_input, &options)
        .context("packet inspection failed")?;
    emit_json(&rep, &output, quiet)?;

    if strict && rep.datagrams_rejected > 0 {
        return Err(CliError::new(
            format!("{} datagrams rejected", rep.datagrams_rejected),
            Some("see the rejects section of the report".to_string()),
        ));
    }
    Ok(())
}

fn cmd_calibrate_simulate(args: SimulateArgs, quiet: bool) -> Result<(), CliError> {
    let mut config = match args.config.as_ref() {
        Some(path) => load_calibration_config(path)?,
        None => default_calibration_config(),
    };
    if let Some(slot) = args.slot {
        config.slot = ZdokSlot(slot);
    }
    if let Some(iterations) = args.offset_iterations {
        config.offset.max_iterations = iterations;
    }
    if let Some(tolerance) = args.offset_tolerance {
        config.offset.tolerance = tolerance;
    }
    if let Some(iterations) = args.gain_iterations {
        config.gain.max_iterations = iterations;
    }
    if let Some(tolerance) = args.gain_tolerance {
        config.gain.tolerance = tolerance;
    }
    if let Some(groups) = args.groups {
        config.groups = groups;
    }
    config.validate().map_err(|err| {
        CliError::new(
            format!("invalid calibration config: {err}"),
            Some("check --groups and the tolerance flags".to_string()),
        )
    })?;

    let mut adc_config = SimulatedAdcConfig::default();
    if let Some(offsets) = args.core_offsets {
        adc_config.core_offsets_mv = per_core("--core-offsets", &offsets)?;
    }
    if let Some(gains) = args.core_gains {
        adc_config.core_gains_pct = per_core("--core-gains", &gains)?;
    }

    let mut adc = SimulatedAdc::new(adc_config);
    let result = CoreCalibrationEngine::new(&mut adc)
        .run(&config)
        .context("calibration failed")?;
    tracing::info!(
        acquisitions = adc.acquisitions(),
        writes = adc.register_writes().len(),
        "simulated run finished"
    );
    emit_json(&result, &args.output, quiet)
}

fn default_calibration_config() -> CalibrationConfig {
    let tuning = TuningConfig {
        max_iterations: DEFAULT_ITERATIONS,
        tolerance: DEFAULT_TOLERANCE,
    };
    CalibrationConfig {
        slot: ZdokSlot(0),
        offset: tuning,
        gain: tuning,
        phase: tuning,
        groups: DEFAULT_GROUPS,
    }
}

fn load_calibration_config(path: &Path) -> Result<CalibrationConfig, CliError> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    serde_json::from_str(&text).map_err(|err| {
        CliError::new(
            format!("invalid config file {}: {err}", path.display()),
            Some("expected slot, offset, gain, phase and groups fields".to_string()),
        )
    })
}

fn per_core(flag: &str, values: &[f64]) -> Result<[f64; 4], CliError> {
    <[f64; 4]>::try_from(values).map_err(|_| {
        CliError::new(
            format!("{flag} takes 4 values, got {}", values.len()),
            Some(format!("e.g. {flag} 0,0.4,-0.8,0")),
        )
    })
}

fn emit_json<T: Serialize>(value: &T, output: &OutputArgs, quiet: bool) -> Result<(), CliError> {
    let json = if output.pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .context("JSON serialization failed")?;

    if output.stdout {
        print!("{}", json);
        return Ok(());
    }

    let report = output.report.as_ref().ok_or_else(|| {
        CliError::new(
            "missing output path",
            Some("use -o/--report or --stdout".to_string()),
        )
    })?;
    ensure_parent_dir(report)?;
    fs::write(report, json)
        .with_context(|| format!("Failed to write report: {}", report.display()))?;
    if !quiet {
        eprintln!("OK: report written -> {}", report.display());
    }
    Ok(())
}

fn ensure_parent_dir(path: &Path) -> Result<(), CliError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create output directory: {}", parent.display())
            })?;
        }
    }
    Ok(())
}

fn ensure_distinct_from_input(report_path: &Path, input_abs: &Path) -> Result<(), CliError> {
    let parent = match report_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    // A report directory that does not exist yet cannot hold the input.
    let Ok(report_dir) = fs::canonicalize(parent) else {
        return Ok(());
    };
    let file_name = report_path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("Invalid report path"))?;
    if report_dir.join(file_name) == input_abs {
        return Err(CliError::new(
            format!(
                "report path must differ from input: {}",
                report_path.display()
            ),
            Some("choose a different output path".to_string()),
        ));
    }
    Ok(())
}

fn validate_input_file(input: &Path) -> Result<(), CliError> {
    if !input.exists() {
        return Err(CliError::new(
            format!("input file not found: {}", input.display()),
            Some(supported_inputs_hint()),
        ));
    }
    if !input.is_file() {
        return Err(CliError::new(
            format!("input is not a file: {}", input.display()),
            Some(supported_inputs_hint()),
        ));
    }
    if InputFormat::from_path(input).is_none() {
        return Err(CliError::new(
            format!("unsupported input format '{}'", input.display()),
            Some(supported_inputs_hint()),
        ));
    }
    Ok(())
}

fn supported_inputs_hint() -> String {
    let extensions = InputFormat::EXTENSIONS
        .iter()
        .map(|ext| format!(".{ext}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("expected one of {extensions}")
}

fn resolve_input_path(input: &Path) -> Result<PathBuf, CliError> {
    let pattern = input.to_string_lossy();
    if !is_glob_pattern(&pattern) {
        return Ok(input.to_path_buf());
    }

    let paths = glob(&pattern).map_err(|err| {
        CliError::new(
            format!("invalid input pattern '{}'", pattern),
            Some(format!("pattern error: {}", err.msg)),
        )
    })?;
    let mut matches = Vec::new();
    for entry in paths {
        let path = entry.map_err(|err| {
            CliError::new(
                format!("invalid input pattern '{}'", pattern),
                Some(format!("pattern error: {}", err)),
            )
        })?;
        if path.is_file() {
            matches.push(path);
        }
    }

    match matches.len() {
        0 => Err(CliError::new(
            format!("no files match pattern '{}'", pattern),
            Some(format!(
                "check the path or quote the pattern; {}",
                supported_inputs_hint()
            )),
        )),
        1 => Ok(matches.remove(0)),
        n => {
            let mut listed = matches
                .iter()
                .take(3)
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            if n > 3 {
                listed.push_str(", ...");
            }
            Err(CliError::new(
                format!("multiple files match pattern '{pattern}' ({n} matches); matches: {listed}"),
                Some("pass a single input file, or run once per file".to_string()),
            ))
        }
    }
}

fn is_glob_pattern(input: &str) -> bool {
    input.contains('*') || input.contains('?') || input.contains('[')
}
