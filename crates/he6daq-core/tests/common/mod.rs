#![allow(dead_code)]

use etherparse::PacketBuilder;
use he6daq_core::packet::{PAYLOAD_LEN, Packet, PacketHeader};

pub const DAQ_PORT: u16 = 4001;

pub fn header(digital_id: u8, unix_time: u32, packet_index: u32) -> PacketHeader {
    PacketHeader {
        unix_time,
        packet_index,
        digital_id,
        interface_id: 0,
        user_data_0: 0xDEAD_BEEF,
        user_data_1: 7,
        reserved_0: 0,
        reserved_1: 0,
        freq_not_time: false,
    }
}

/// Payload ramp so each sample position is distinguishable.
pub fn ramp_packet(header: PacketHeader) -> Packet {
    let mut payload = [0i8; PAYLOAD_LEN];
    for (i, sample) in payload.iter_mut().enumerate() {
        *sample = (i % 256) as u8 as i8;
    }
    Packet::from_parts(header, payload)
}

pub fn ethernet_udp_frame(payload: &[u8], dst_port: u16) -> Vec<u8> {
    let builder = PacketBuilder::ethernet2([0x02, 0, 0, 0, 0, 0x10], [0x02, 0, 0, 0, 0, 0x01])
        .ipv4([192, 168, 40, 10], [192, 168, 40, 1], 64)
        .udp(4000, dst_port);
    let mut frame = Vec::with_capacity(builder.size(payload.len()));
    builder
        .write(&mut frame, payload)
        .expect("frame serialization");
    frame
}

/// Minimal PCAPNG: one section, one Ethernet interface, enhanced packet blocks.
pub fn pcapng_bytes(frames: &[(u64, Vec<u8>)]) -> Vec<u8> {
    let mut output = Vec::new();
    output.extend(pcapng_block(0x0A0D_0D0A, &section_header_body()));
    output.extend(pcapng_block(1, &interface_desc_body()));
    for (ts_us, data) in frames {
        output.extend(pcapng_block(6, &enhanced_packet_body(*ts_us, data)));
    }
    output
}

/// Classic little-endian microsecond PCAP with an Ethernet linktype.
pub fn legacy_pcap_bytes(frames: &[(u64, Vec<u8>)]) -> Vec<u8> {
    let mut output = Vec::new();
    output.extend(0xA1B2_C3D4u32.to_le_bytes());
    output.extend(2u16.to_le_bytes());
    output.extend(4u16.to_le_bytes());
    output.extend(0i32.to_le_bytes());
    output.extend(0u32.to_le_bytes());
    output.extend(65535u32.to_le_bytes());
    output.extend(1u32.to_le_bytes());
    for (ts_us, data) in frames {
        output.extend(((ts_us / 1_000_000) as u32).to_le_bytes());
        output.extend(((ts_us % 1_000_000) as u32).to_le_bytes());
        output.extend((data.len() as u32).to_le_bytes());
        output.extend((data.len() as u32).to_le_bytes());
        output.extend(data);
    }
    output
}

fn pcapng_block(block_type: u32, body: &[u8]) -> Vec<u8> {
    let total_len = (8 + body.len() + 4) as u32;
    let mut block = Vec::with_capacity(total_len as usize);
    block.extend(block_type.to_be_bytes());
    block.extend(total_len.to_be_bytes());
    block.extend_from_slice(body);
    block.extend(total_len.to_be_bytes());
    block
}

fn section_header_body() -> Vec<u8> {
    let mut body = Vec::new();
    body.extend(0x1A2B_3C4Du32.to_be_bytes());
    body.extend(1u16.to_be_bytes());
    body.extend(0u16.to_be_bytes());
    body.extend((-1i64).to_be_bytes());
    body
}

fn interface_desc_body() -> Vec<u8> {
    let mut body = Vec::new();
    body.extend(1u16.to_be_bytes());
    body.extend(0u16.to_be_bytes());
    body.extend(65535u32.to_be_bytes());
    body
}

fn enhanced_packet_body(ts_us: u64, data: &[u8]) -> Vec<u8> {
    let cap_len = data.len() as u32;
    let mut body = Vec::new();
    body.extend(0u32.to_be_bytes());
    body.extend(((ts_us >> 32) as u32).to_be_bytes());
    body.extend((ts_us as u32).to_be_bytes());
    body.extend(cap_len.to_be_bytes());
    body.extend(cap_len.to_be_bytes());
    body.extend_from_slice(data);
    body.resize(body.len() + (4 - data.len() % 4) % 4, 0);
    body
}
