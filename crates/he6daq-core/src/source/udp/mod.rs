//! UDP extraction from link-layer frames.

pub mod error;
pub mod parser;

pub use parser::parse_udp_packet;
