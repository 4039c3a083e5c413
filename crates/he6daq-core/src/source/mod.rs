//! Datagram sources feeding the packet codec.
//!
//! Every source yields UDP payloads in arrival order; none of them decode.
//! - [`UdpSocketSource`]: live capture from a bound socket
//! - [`PcapFileSource`]: UDP payloads extracted from PCAP/PCAPNG captures
//! - [`RecordFileSource`]: files of back-to-back raw packet records

mod pcap;
mod record;
mod socket;
mod udp;

pub use pcap::PcapFileSource;
pub use record::RecordFileSource;
pub use socket::UdpSocketSource;

use std::net::SocketAddr;

use thiserror::Error;

/// One received UDP payload.
#[derive(Debug, Clone)]
pub struct Datagram {
    /// Capture timestamp in seconds, when the source records one.
    pub ts: Option<f64>,
    /// Sender address, when known.
    pub src: Option<SocketAddr>,
    pub payload: Vec<u8>,
}

pub trait DatagramSource {
    /// Next datagram, or `None` once the source is exhausted.
    fn next_datagram(&mut self) -> Result<Option<Datagram>, SourceError>;
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PCAP parse error: {0}")]
    Pcap(String),
}

impl From<pcap::error::PcapSourceError> for SourceError {
    fn from(value: pcap::error::PcapSourceError) -> Self {
        match value {
            pcap::error::PcapSourceError::Io(err) => SourceError::Io(err),
            pcap::error::PcapSourceError::Pcap { context, message } => {
                SourceError::Pcap(format!("{context}: {message}"))
            }
        }
    }
}
