use super::layout;
use super::parser::Packet;

/// Encode a packet into its wire form.
///
/// Field values wider than their wire width are truncated to it.
pub fn encode(packet: &Packet) -> Vec<u8> {
    let mut buffer = vec![0u8; layout::PACKET_LEN];
    for (index, word) in header_words(packet).iter().enumerate() {
        buffer[layout::header_word_range(index)].copy_from_slice(&word.to_be_bytes());
    }

    // Most significant byte of each big-endian word is the first sample, so
    // the samples land on the wire in their own order.
    let payload = &mut buffer[layout::PAYLOAD_RANGE];
    for (byte, sample) in payload.iter_mut().zip(packet.payload.iter()) {
        *byte = *sample as u8;
    }
    buffer
}

fn header_words(packet: &Packet) -> [u64; layout::HEADER_WORDS] {
    let timing = pack(packet.unix_time as u64, layout::UNIX_TIME_SHIFT, layout::UNIX_TIME_MASK)
        | pack(
            packet.packet_index as u64,
            layout::PACKET_INDEX_SHIFT,
            layout::PACKET_INDEX_MASK,
        )
        | pack(
            packet.digital_id as u64,
            layout::DIGITAL_ID_SHIFT,
            layout::DIGITAL_ID_MASK,
        )
        | pack(
            packet.interface_id as u64,
            layout::INTERFACE_ID_SHIFT,
            layout::INTERFACE_ID_MASK,
        );
    let user = pack(
        packet.user_data_1 as u64,
        layout::USER_DATA_1_SHIFT,
        layout::USER_DATA_1_MASK,
    ) | pack(
        packet.user_data_0 as u64,
        layout::USER_DATA_0_SHIFT,
        layout::USER_DATA_0_MASK,
    );
    let mut mode = packet.reserved_1 & layout::RESERVED_1_MASK;
    if packet.freq_not_time {
        mode |= layout::FREQ_NOT_TIME_BIT;
    }

    let mut words = [0u64; layout::HEADER_WORDS];
    words[layout::TIMING_WORD] = timing;
    words[layout::USER_DATA_WORD] = user;
    words[layout::RESERVED_0_WORD] = packet.reserved_0;
    words[layout::MODE_WORD] = mode;
    words
}

fn pack(value: u64, shift: u32, mask: u64) -> u64 {
    (value & mask) << shift
}

#[cfg(test)]
mod tests {
    use super::encode;
    use crate::packet::layout;
    use crate::packet::parser::{Packet, PacketHeader, decode};

    fn header() -> PacketHeader {
        PacketHeader {
            unix_time: 1_537_000_000,
            packet_index: 0xF_FFFF,
            digital_id: 0x3F,
            interface_id: 7,
            user_data_0: 0xCAFE,
            user_data_1: 0xBEEF,
            reserved_0: u64::MAX,
            reserved_1: 42,
            freq_not_time: true,
        }
    }

    #[test]
    fn encode_then_decode_preserves_packet() {
        let mut payload = [0i8; layout::PAYLOAD_LEN];
        for (index, sample) in payload.iter_mut().enumerate() {
            *sample = (index % 256) as u8 as i8;
        }
        let packet = Packet::from_parts(header(), payload);
        let decoded = decode(&encode(&packet)).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn encode_truncates_wide_fields() {
        let mut wide = header();
        wide.packet_index = 0x12_3456;
        wide.digital_id = 0xFF;
        wide.reserved_1 = u64::MAX;
        let packet = Packet::from_parts(wide, [0; layout::PAYLOAD_LEN]);
        let decoded = decode(&encode(&packet)).unwrap();
        assert_eq!(decoded.packet_index, 0x2_3456);
        assert_eq!(decoded.digital_id, 0x3F);
        assert_eq!(decoded.interface_id, 7);
        assert_eq!(decoded.reserved_1, layout::RESERVED_1_MASK);
        assert!(decoded.freq_not_time);
    }

    #[test]
    fn encode_writes_payload_bytes_in_wire_order() {
        let mut payload = [0i8; layout::PAYLOAD_LEN];
        payload[..8].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, -1]);
        let packet = Packet::from_parts(header(), payload);
        let wire = encode(&packet);
        assert_eq!(
            &wire[layout::HEADER_LEN..layout::HEADER_LEN + 8],
            &[1, 2, 3, 4, 5, 6, 7, 0xFF]
        );
    }
}
