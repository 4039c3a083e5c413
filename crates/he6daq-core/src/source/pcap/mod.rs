//! PCAP/PCAPNG source implementation.
//!
//! Reads link-layer frames from a capture file, keeps the UDP ones and
//! yields their payloads, optionally restricted to one destination port.

pub mod error;
pub mod layout;
pub mod parser;
pub mod reader;

pub use parser::PcapFileSource;
