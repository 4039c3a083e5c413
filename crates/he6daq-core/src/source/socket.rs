use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use crate::packet::PACKET_LEN;

use super::{Datagram, DatagramSource, SourceError};

// One byte of headroom so oversized datagrams are seen as oversized
// instead of being silently truncated to a valid length.
const RECV_BUFFER_LEN: usize = PACKET_LEN + 1;

/// Blocking receiver bound to a local UDP address.
///
/// With a read timeout set, a quiet socket ends the stream (`Ok(None)`)
/// rather than blocking forever.
pub struct UdpSocketSource {
    socket: UdpSocket,
    buffer: Vec<u8>,
}

impl UdpSocketSource {
    pub fn bind<A: ToSocketAddrs>(addr: A) -> Result<Self, SourceError> {
        let socket = UdpSocket::bind(addr)?;
        tracing::info!(local = ?socket.local_addr().ok(), "udp socket bound");
        Ok(Self {
            socket,
            buffer: vec![0u8; RECV_BUFFER_LEN],
        })
    }

    pub fn with_timeout(self, timeout: Option<Duration>) -> Result<Self, SourceError> {
        self.socket.set_read_timeout(timeout)?;
        Ok(self)
    }

    pub fn local_addr(&self) -> Result<SocketAddr, SourceError> {
        Ok(self.socket.local_addr()?)
    }
}

impl DatagramSource for UdpSocketSource {
    fn next_datagram(&mut self) -> Result<Option<Datagram>, SourceError> {
        match self.socket.recv_from(&mut self.buffer) {
            Ok((len, src)) => Ok(Some(Datagram {
                ts: None,
                src: Some(src),
                payload: self.buffer[..len].to_vec(),
            })),
            Err(err)
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                tracing::debug!("udp read timed out");
                Ok(None)
            }
            Err(err) => Err(SourceError::Io(err)),
        }
    }
}
