mod common;

use std::fs;

use common::{
    DAQ_PORT, ethernet_udp_frame, header, legacy_pcap_bytes, pcapng_bytes, ramp_packet,
};
use he6daq_core::packet::{PACKET_LEN, decode, encode};
use he6daq_core::{
    DatagramSource, InputFormat, InspectOptions, PcapFileSource, RecordFileSource, SourceError,
    inspect_file,
};
use tempfile::TempDir;

fn drain<S: DatagramSource>(mut source: S) -> Vec<Vec<u8>> {
    let mut payloads = Vec::new();
    while let Some(datagram) = source.next_datagram().unwrap() {
        payloads.push(datagram.payload);
    }
    payloads
}

#[test]
fn pcapng_source_yields_encoded_packets() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("capture.pcapng");
    let first = encode(&ramp_packet(header(1, 1_700_000_000, 0)));
    let second = encode(&ramp_packet(header(1, 1_700_000_000, 1)));
    fs::write(
        &path,
        pcapng_bytes(&[
            (1_500_000, ethernet_udp_frame(&first, DAQ_PORT)),
            (2_000_000, ethernet_udp_frame(&second, DAQ_PORT)),
        ]),
    )
    .unwrap();

    let mut source = PcapFileSource::open(&path).unwrap();
    let datagram = source.next_datagram().unwrap().unwrap();
    assert_eq!(datagram.ts, Some(1.5));
    assert_eq!(datagram.src.unwrap().port(), 4000);
    assert_eq!(datagram.payload, first);
    assert_eq!(decode(&datagram.payload).unwrap().packet_index, 0);

    let rest = drain(source);
    assert_eq!(rest, vec![second]);
}

#[test]
fn pcap_port_filter_drops_other_traffic() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("capture.pcap");
    let packet = encode(&ramp_packet(header(2, 10, 0)));
    fs::write(
        &path,
        legacy_pcap_bytes(&[
            (0, ethernet_udp_frame(b"noise", 5353)),
            (1, ethernet_udp_frame(&packet, DAQ_PORT)),
        ]),
    )
    .unwrap();

    let unfiltered = drain(PcapFileSource::open(&path).unwrap());
    assert_eq!(unfiltered.len(), 2);

    let filtered = drain(PcapFileSource::open(&path).unwrap().with_port(DAQ_PORT));
    assert_eq!(filtered, vec![packet]);
}

#[test]
fn truncated_capture_is_io_error() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("short.pcapng");
    fs::write(&path, [0x0a, 0x0d, 0x0d]).unwrap();

    let err = match PcapFileSource::open(&path) {
        Ok(_) => panic!("expected truncated file to be rejected"),
        Err(err) => err,
    };
    assert!(matches!(err, SourceError::Io(_)));
}

#[test]
fn record_file_source_yields_encoded_packets() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("run.bin");
    let mut bytes = encode(&ramp_packet(header(0, 1, 0)));
    bytes.extend(encode(&ramp_packet(header(0, 1, 1))));
    fs::write(&path, &bytes).unwrap();

    let payloads = drain(RecordFileSource::open(&path).unwrap());
    assert_eq!(payloads.len(), 2);
    assert!(payloads.iter().all(|p| p.len() == PACKET_LEN));
    assert_eq!(decode(&payloads[1]).unwrap().packet_index, 1);
}

#[test]
fn inspect_record_file_reports_gaps_and_partial_tail() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("run.dat");
    let mut bytes = Vec::new();
    for index in [0, 1, 3] {
        bytes.extend(encode(&ramp_packet(header(4, 1_700_000_000, index))));
    }
    bytes.extend([0u8; 10]);
    fs::write(&path, &bytes).unwrap();

    let report = inspect_file(&path, &InspectOptions::default()).unwrap();
    assert_eq!(report.input.format, InputFormat::Record);
    assert_eq!(report.input.bytes, bytes.len() as u64);
    assert_eq!(report.datagrams_total, 4);
    assert_eq!(report.packets_decoded, 3);
    assert_eq!(report.datagrams_rejected, 1);
    assert_eq!(report.rejects[0].length, 10);
    assert_eq!(report.streams.len(), 1);
    assert_eq!(report.streams[0].digital_id, 4);
    assert_eq!(report.streams[0].index_gaps, 1);
}

#[test]
fn inspect_pcapng_with_packet_details() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("capture.pcapng");
    let packet = encode(&ramp_packet(header(1, 1_700_000_000, 0)));
    fs::write(&path, pcapng_bytes(&[(3_000_000, ethernet_udp_frame(&packet, DAQ_PORT))])).unwrap();

    let options = InspectOptions {
        port: Some(DAQ_PORT),
        packets: true,
    };
    let report = inspect_file(&path, &options).unwrap();
    assert_eq!(report.input.format, InputFormat::Pcapng);
    let packets = report.packets.unwrap();
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].ts, Some(3.0));
    assert_eq!(packets[0].payload_min, -128);
    assert_eq!(packets[0].payload_max, 127);
    assert_eq!(packets[0].header.user_data_0, 0xDEAD_BEEF);
}

#[test]
fn inspect_rejects_unknown_extension() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("capture.txt");
    fs::write(&path, b"hello").unwrap();
    assert!(inspect_file(&path, &InspectOptions::default()).is_err());
}
