//! Wire layout of an He6 data packet.
//!
//! The header is four big-endian 64-bit words. Field positions are given as
//! a word index plus a shift and mask applied to that word.

pub const WORD_LEN: usize = 8;

pub const HEADER_LEN: usize = 32;
pub const PAYLOAD_LEN: usize = 8192;
pub const PACKET_LEN: usize = HEADER_LEN + PAYLOAD_LEN;

pub const HEADER_WORDS: usize = HEADER_LEN / WORD_LEN;
pub const PAYLOAD_WORDS: usize = PAYLOAD_LEN / WORD_LEN;

pub const HEADER_RANGE: std::ops::Range<usize> = 0..HEADER_LEN;
pub const PAYLOAD_RANGE: std::ops::Range<usize> = HEADER_LEN..PACKET_LEN;

// Word 0
pub const TIMING_WORD: usize = 0;
pub const UNIX_TIME_SHIFT: u32 = 0;
pub const UNIX_TIME_MASK: u64 = 0xFFFF_FFFF;
pub const PACKET_INDEX_SHIFT: u32 = 32;
pub const PACKET_INDEX_MASK: u64 = 0xF_FFFF;
pub const DIGITAL_ID_SHIFT: u32 = 52;
pub const DIGITAL_ID_MASK: u64 = 0x3F;
pub const INTERFACE_ID_SHIFT: u32 = 58;
pub const INTERFACE_ID_MASK: u64 = 0x3F;

// Word 1
pub const USER_DATA_WORD: usize = 1;
pub const USER_DATA_1_SHIFT: u32 = 0;
pub const USER_DATA_1_MASK: u64 = 0xFFFF_FFFF;
pub const USER_DATA_0_SHIFT: u32 = 32;
pub const USER_DATA_0_MASK: u64 = 0xFFFF_FFFF;

// Word 2
pub const RESERVED_0_WORD: usize = 2;

// Word 3
pub const MODE_WORD: usize = 3;
pub const FREQ_NOT_TIME_BIT: u64 = 0x8000_0000_0000_0000;
pub const RESERVED_1_MASK: u64 = 0x7FFF_FFFF_FFFF_FFFF;

/// Byte range of header word `index`.
pub const fn header_word_range(index: usize) -> std::ops::Range<usize> {
    index * WORD_LEN..(index + 1) * WORD_LEN
}
