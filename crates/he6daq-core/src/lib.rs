//! He6 DAQ core library.
//!
//! Two independent pieces live here:
//! - [`packet`] decodes (and encodes) the fixed 8224-byte UDP packets
//!   streamed by the ROACH2 digitizer firmware.
//! - [`calibration`] runs the closed-loop offset/gain calibration of the four
//!   interleaved ADC cores, against any hardware behind the
//!   [`calibration::RegisterInterface`] and [`calibration::SnapshotSource`]
//!   traits.
//!
//! The [`source`] and [`analysis`] modules glue the codec to live sockets and
//! capture files and aggregate the decoded stream into a [`CaptureReport`].
//! All I/O is kept in `source`; decoding and calibration math are pure.
//!
//! # Examples
//! ```no_run
//! use std::path::Path;
//!
//! use he6daq_core::{InspectOptions, inspect_file};
//!
//! let report = inspect_file(Path::new("capture.pcapng"), &InspectOptions::default())?;
//! println!("decoded {} packets", report.packets_decoded);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use serde::{Deserialize, Serialize};

pub mod analysis;
pub mod calibration;
pub mod packet;
pub mod source;

pub use analysis::{AnalysisError, InputFormat, InspectOptions, inspect_file, summarize_source};
pub use packet::{FormatError, Packet, PacketHeader, decode, encode};
pub use source::{
    Datagram, DatagramSource, PcapFileSource, RecordFileSource, SourceError, UdpSocketSource,
};

/// Current report schema version.
pub const REPORT_VERSION: u32 = 1;
/// Used for `generated_at` when no packet carried a timestamp.
pub const DEFAULT_GENERATED_AT: &str = "1970-01-01T00:00:00Z";

/// Deterministic summary of a decoded packet stream.
///
/// `generated_at` is derived from packet timestamps, never from the wall
/// clock, so the same input always produces the same report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureReport {
    /// Report schema version (not the binary version).
    pub report_version: u32,
    pub tool: ToolInfo,
    pub generated_at: String,
    pub input: InputInfo,
    /// Datagrams read from the source, decodable or not.
    pub datagrams_total: u64,
    pub packets_decoded: u64,
    pub datagrams_rejected: u64,
    /// Earliest packet `unix_time`, RFC 3339.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_start: Option<String>,
    /// Latest packet `unix_time`, RFC 3339.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_end: Option<String>,
    /// One entry per (digital id, interface id), sorted by that pair.
    pub streams: Vec<StreamSummary>,
    /// Rejected datagrams grouped by length, sorted by length.
    pub rejects: Vec<RejectSummary>,
    /// Per-packet detail, only when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub packets: Option<Vec<PacketSummary>>,
}

/// Tool metadata embedded in reports.
///
/// # Examples
/// ```
/// use he6daq_core::ToolInfo;
///
/// let tool = ToolInfo::current();
/// assert_eq!(tool.name, "he6daq");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub version: String,
}

impl ToolInfo {
    pub fn current() -> Self {
        Self {
            name: "he6daq".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputInfo {
    /// Input path as provided to the analyzer.
    pub path: String,
    pub bytes: u64,
    pub format: InputFormat,
}

/// Packet statistics for one digitizer channel on one interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamSummary {
    pub digital_id: u8,
    pub interface_id: u8,
    pub packets: u64,
    /// Distinct `unix_time` batches seen, counted on each change.
    pub batches: u64,
    /// Packet indexes skipped within a batch.
    pub index_gaps: u64,
    /// Packets whose index went backwards within a batch.
    pub out_of_order: u64,
    pub time_domain: u64,
    pub freq_domain: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectSummary {
    pub length: usize,
    pub count: u64,
}

/// Header fields of one decoded packet plus payload statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacketSummary {
    /// Zero-based position of the datagram in the source.
    pub datagram: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<f64>,
    #[serde(flatten)]
    pub header: PacketHeader,
    pub payload_min: i8,
    pub payload_max: i8,
    pub payload_mean: f64,
}

/// Build a report with base fields filled and empty aggregates.
///
/// # Examples
/// ```
/// use he6daq_core::{InputFormat, make_stub_report};
///
/// let report = make_stub_report("capture.bin", 8224, InputFormat::Record);
/// assert_eq!(report.report_version, he6daq_core::REPORT_VERSION);
/// assert!(report.streams.is_empty());
/// ```
pub fn make_stub_report(input_path: &str, input_bytes: u64, format: InputFormat) -> CaptureReport {
    CaptureReport {
        report_version: REPORT_VERSION,
        tool: ToolInfo::current(),
        generated_at: DEFAULT_GENERATED_AT.to_string(),
        input: InputInfo {
            path: input_path.to_string(),
            bytes: input_bytes,
            format,
        },
        datagrams_total: 0,
        packets_decoded: 0,
        datagrams_rejected: 0,
        time_start: None,
        time_end: None,
        streams: Vec::new(),
        rejects: Vec::new(),
        packets: None,
    }
}
