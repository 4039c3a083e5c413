use serde::{Deserialize, Serialize};

use super::error::FormatError;
use super::layout;
use super::reader::{PacketReader, field};

/// Header fields of one data packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PacketHeader {
    /// Seconds timestamp of the start of the batch.
    pub unix_time: u32,
    /// Sequence number within the batch (20 bits).
    pub packet_index: u32,
    /// Source channel identifier (6 bits).
    pub digital_id: u8,
    /// Physical interface identifier (6 bits).
    pub interface_id: u8,
    pub user_data_0: u32,
    pub user_data_1: u32,
    pub reserved_0: u64,
    /// Low 63 bits of header word 3.
    pub reserved_1: u64,
    /// Payload holds frequency-domain data when set, time-domain otherwise.
    pub freq_not_time: bool,
}

/// One decoded data packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub unix_time: u32,
    pub packet_index: u32,
    pub digital_id: u8,
    pub interface_id: u8,
    pub user_data_0: u32,
    pub user_data_1: u32,
    pub reserved_0: u64,
    pub reserved_1: u64,
    pub freq_not_time: bool,
    pub payload: Box<[i8; layout::PAYLOAD_LEN]>,
}

impl Packet {
    pub fn header(&self) -> PacketHeader {
        PacketHeader {
            unix_time: self.unix_time,
            packet_index: self.packet_index,
            digital_id: self.digital_id,
            interface_id: self.interface_id,
            user_data_0: self.user_data_0,
            user_data_1: self.user_data_1,
            reserved_0: self.reserved_0,
            reserved_1: self.reserved_1,
            freq_not_time: self.freq_not_time,
        }
    }

    pub fn samples(&self) -> &[i8] {
        &self.payload[..]
    }

    /// Build a packet from header fields and a payload.
    pub fn from_parts(header: PacketHeader, payload: [i8; layout::PAYLOAD_LEN]) -> Self {
        Self {
            unix_time: header.unix_time,
            packet_index: header.packet_index,
            digital_id: header.digital_id,
            interface_id: header.interface_id,
            user_data_0: header.user_data_0,
            user_data_1: header.user_data_1,
            reserved_0: header.reserved_0,
            reserved_1: header.reserved_1,
            freq_not_time: header.freq_not_time,
            payload: Box::new(payload),
        }
    }
}

/// Decode one wire buffer into a [`Packet`].
///
/// The buffer must be exactly [`layout::PACKET_LEN`] bytes long.
///
/// # Errors
/// Returns [`FormatError::LengthMismatch`] for any other length.
pub fn decode(buffer: &[u8]) -> Result<Packet, FormatError> {
    let reader = PacketReader::new(buffer);
    reader.require_exact_len(layout::PACKET_LEN)?;

    let header = decode_header(&reader.read_header_words()?);
    let payload = reader.read_payload_samples()?;
    Ok(Packet::from_parts(header, payload))
}

fn decode_header(words: &[u64; layout::HEADER_WORDS]) -> PacketHeader {
    let timing = words[layout::TIMING_WORD];
    let user = words[layout::USER_DATA_WORD];
    let mode = words[layout::MODE_WORD];

    PacketHeader {
        unix_time: field(timing, layout::UNIX_TIME_SHIFT, layout::UNIX_TIME_MASK) as u32,
        packet_index: field(timing, layout::PACKET_INDEX_SHIFT, layout::PACKET_INDEX_MASK) as u32,
        digital_id: field(timing, layout::DIGITAL_ID_SHIFT, layout::DIGITAL_ID_MASK) as u8,
        interface_id: field(timing, layout::INTERFACE_ID_SHIFT, layout::INTERFACE_ID_MASK) as u8,
        user_data_1: field(user, layout::USER_DATA_1_SHIFT, layout::USER_DATA_1_MASK) as u32,
        user_data_0: field(user, layout::USER_DATA_0_SHIFT, layout::USER_DATA_0_MASK) as u32,
        reserved_0: words[layout::RESERVED_0_WORD],
        freq_not_time: mode & layout::FREQ_NOT_TIME_BIT != 0,
        reserved_1: mode & layout::RESERVED_1_MASK,
    }
}
