//! Drives a datagram source through the packet decoder and aggregates a
//! [`CaptureReport`].

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::packet::{self, Packet};
use crate::source::{DatagramSource, PcapFileSource, RecordFileSource, SourceError};
use crate::{CaptureReport, DEFAULT_GENERATED_AT, PacketSummary, RejectSummary, make_stub_report};

mod streams;

use streams::{StreamKey, StreamStats, add_packet, build_stream_summaries};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Source error: {0}")]
    Source(#[from] SourceError),
    #[error("unsupported input format '{0}'")]
    UnsupportedInput(String),
}

/// Container format of an input file, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    Pcap,
    Pcapng,
    /// Back-to-back raw packet records.
    Record,
}

impl InputFormat {
    pub const EXTENSIONS: [&'static str; 5] = ["pcap", "pcapng", "bin", "dat", "raw"];

    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pcap" => Some(Self::Pcap),
            "pcapng" => Some(Self::Pcapng),
            "bin" | "dat" | "raw" => Some(Self::Record),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InspectOptions {
    /// Keep only capture datagrams sent to this UDP port. Ignored for records.
    pub port: Option<u16>,
    /// Include one [`PacketSummary`] per decoded packet.
    pub packets: bool,
}

/// Open `path` with the source matching its extension and summarize it.
pub fn inspect_file(path: &Path, options: &InspectOptions) -> Result<CaptureReport, AnalysisError> {
    let format = InputFormat::from_path(path)
        .ok_or_else(|| AnalysisError::UnsupportedInput(path.display().to_string()))?;
    let mut report = match format {
        InputFormat::Pcap | InputFormat::Pcapng => {
            let mut source = PcapFileSource::open(path)?;
            if let Some(port) = options.port {
                source = source.with_port(port);
            }
            summarize_source(source, options.packets)?
        }
        InputFormat::Record => summarize_source(RecordFileSource::open(path)?, options.packets)?,
    };
    report.input.path = path.display().to_string();
    report.input.bytes = path.metadata()?.len();
    report.input.format = format;
    Ok(report)
}

/// Decode every datagram of `source`; undecodable ones are counted, logged
/// and skipped.
///
/// The returned report has empty input metadata; callers that know where the
/// datagrams came from fill it in.
#[tracing::instrument(level = "debug", skip_all)]
pub fn summarize_source<S: DatagramSource>(
    mut source: S,
    with_packets: bool,
) -> Result<CaptureReport, AnalysisError> {
    let mut datagrams_total = 0u64;
    let mut packets_decoded = 0u64;
    let mut first_time: Option<u32> = None;
    let mut last_time: Option<u32> = None;
    let mut stream_stats: BTreeMap<StreamKey, StreamStats> = BTreeMap::new();
    let mut rejects: BTreeMap<usize, u64> = BTreeMap::new();
    let mut packets = Vec::new();

    while let Some(datagram) = source.next_datagram()? {
        let ordinal = datagrams_total;
        datagrams_total += 1;
        let packet = match packet::decode(&datagram.payload) {
            Ok(packet) => packet,
            Err(err) => {
                tracing::warn!(datagram = ordinal, src = ?datagram.src, %err, "rejected datagram");
                *rejects.entry(datagram.payload.len()).or_default() += 1;
                continue;
            }
        };
        packets_decoded += 1;
        first_time = Some(first_time.map_or(packet.unix_time, |t| t.min(packet.unix_time)));
        last_time = Some(last_time.map_or(packet.unix_time, |t| t.max(packet.unix_time)));
        add_packet(&mut stream_stats, &packet.header());
        if with_packets {
            packets.push(summarize_packet(ordinal, datagram.ts, &packet));
        }
    }

    tracing::info!(datagrams_total, packets_decoded, "source drained");

    let mut report = make_stub_report("", 0, InputFormat::Record);
    report.datagrams_total = datagrams_total;
    report.packets_decoded = packets_decoded;
    report.datagrams_rejected = datagrams_total - packets_decoded;
    report.time_start = unix_to_rfc3339(first_time);
    report.time_end = unix_to_rfc3339(last_time);
    report.generated_at = report
        .time_end
        .clone()
        .unwrap_or_else(|| DEFAULT_GENERATED_AT.to_string());
    report.streams = build_stream_summaries(stream_stats);
    report.rejects = rejects
        .into_iter()
        .map(|(length, count)| RejectSummary { length, count })
        .collect();
    report.packets = with_packets.then_some(packets);
    Ok(report)
}

fn summarize_packet(datagram: u64, ts: Option<f64>, packet: &Packet) -> PacketSummary {
    let samples = packet.samples();
    let (min, max, sum) = samples.iter().fold((i8::MAX, i8::MIN, 0i64), |(lo, hi, sum), &s| {
        (lo.min(s), hi.max(s), sum + i64::from(s))
    });
    PacketSummary {
        datagram,
        ts,
        header: packet.header(),
        payload_min: min,
        payload_max: max,
        payload_mean: sum as f64 / samples.len() as f64,
    }
}

fn unix_to_rfc3339(seconds: Option<u32>) -> Option<String> {
    OffsetDateTime::from_unix_timestamp(i64::from(seconds?))
        .ok()
        .and_then(|dt| dt.format(&Rfc3339).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{PAYLOAD_LEN, PacketHeader, encode};
    use crate::source::Datagram;
    use std::collections::VecDeque;

    struct VecSource(VecDeque<Vec<u8>>);

    impl DatagramSource for VecSource {
        fn next_datagram(&mut self) -> Result<Option<Datagram>, SourceError> {
            Ok(self.0.pop_front().map(|payload| Datagram {
                ts: None,
                src: None,
                payload,
            }))
        }
    }

    fn packet_bytes(unix_time: u32, packet_index: u32, fill: i8) -> Vec<u8> {
        let header = PacketHeader {
            unix_time,
            packet_index,
            digital_id: 3,
            interface_id: 1,
            user_data_0: 0,
            user_data_1: 0,
            reserved_0: 0,
            reserved_1: 0,
            freq_not_time: false,
        };
        encode(&Packet::from_parts(header, [fill; PAYLOAD_LEN]))
    }

    #[test]
    fn counts_decoded_and_rejected_datagrams() {
        let source = VecSource(VecDeque::from(vec![
            packet_bytes(1_600_000_000, 0, 1),
            vec![0u8; 100],
            packet_bytes(1_600_000_002, 0, 1),
            vec![0u8; 100],
        ]));
        let report = summarize_source(source, false).unwrap();

        assert_eq!(report.datagrams_total, 4);
        assert_eq!(report.packets_decoded, 2);
        assert_eq!(report.datagrams_rejected, 2);
        assert_eq!(report.rejects, vec![RejectSummary { length: 100, count: 2 }]);
        assert_eq!(report.time_start.as_deref(), Some("2020-09-13T12:26:40Z"));
        assert_eq!(report.time_end.as_deref(), Some("2020-09-13T12:26:42Z"));
        assert_eq!(report.generated_at, "2020-09-13T12:26:42Z");
        assert!(report.packets.is_none());
    }

    #[test]
    fn packet_summaries_follow_datagram_order() {
        let source = VecSource(VecDeque::from(vec![
            vec![0u8; 8],
            packet_bytes(5, 0, -2),
            packet_bytes(5, 2, 7),
        ]));
        let report = summarize_source(source, true).unwrap();
        let packets = report.packets.unwrap();

        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].datagram, 1);
        assert_eq!(packets[0].payload_min, -2);
        assert_eq!(packets[0].payload_mean, -2.0);
        assert_eq!(packets[1].header.packet_index, 2);
        assert_eq!(report.streams[0].index_gaps, 1);
        assert_eq!(report.streams[0].digital_id, 3);
    }

    #[test]
    fn empty_source_keeps_default_timestamp() {
        let report = summarize_source(VecSource(VecDeque::new()), false).unwrap();
        assert_eq!(report.datagrams_total, 0);
        assert_eq!(report.generated_at, DEFAULT_GENERATED_AT);
        assert!(report.time_start.is_none());
    }

    #[test]
    fn input_format_follows_extension() {
        assert_eq!(InputFormat::from_path(Path::new("a.PCAPNG")), Some(InputFormat::Pcapng));
        assert_eq!(InputFormat::from_path(Path::new("a.raw")), Some(InputFormat::Record));
        assert_eq!(InputFormat::from_path(Path::new("a.txt")), None);
        assert_eq!(InputFormat::from_path(Path::new("noext")), None);
    }
}
