//! He6 data packet codec.
//!
//! Layered like the other wire decoders in this crate:
//! - `layout`: byte ranges, shifts and masks (source of truth)
//! - `reader`: fixed-width big-endian reads and payload word unpacking
//! - `parser`: domain-level decoding into [`Packet`]
//! - `encoder`: the symmetric wire encoder, used for fixtures and tests
//! - `error`: explicit decode errors
//!
//! A packet is exactly 8224 bytes: a 32-byte header of four big-endian
//! 64-bit words followed by 8192 payload bytes. The payload is carried as
//! 1024 big-endian 64-bit words; each word is split into eight signed
//! samples, most significant byte first.
//!
//! Decoding is pure and holds no state, so it can run on any number of
//! threads at once.

pub mod encoder;
pub mod error;
pub mod layout;
pub mod parser;
pub mod reader;

pub use encoder::encode;
pub use error::FormatError;
pub use layout::{HEADER_LEN, PACKET_LEN, PAYLOAD_LEN};
pub use parser::{Packet, PacketHeader, decode};
