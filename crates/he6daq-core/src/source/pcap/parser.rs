use std::fs::File;
use std::net::SocketAddr;
use std::path::Path;

use pcap_parser::{
    Block, LegacyPcapReader, Linktype, PcapBlockOwned, PcapNGReader, traits::PcapReaderIterator,
};

use crate::source::udp::parse_udp_packet;
use crate::source::{Datagram, DatagramSource, SourceError};

use super::error::PcapSourceError;
use super::layout;
use super::reader::{
    is_pcapng_magic, linktype_for_interface, pcapng_ts_to_seconds, read_magic_and_rewind,
};

pub struct PcapFileSource {
    inner: PcapReader,
    port: Option<u16>,
}

enum PcapReader {
    Legacy {
        reader: LegacyPcapReader<File>,
        linktype: Option<Linktype>,
    },
    Ng {
        reader: PcapNGReader<File>,
        linktypes: Vec<Linktype>,
    },
}

struct Frame {
    ts: f64,
    linktype: Linktype,
    data: Vec<u8>,
}

impl PcapFileSource {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let file = File::open(path).map_err(SourceError::from)?;
        let inner = create_reader(file).map_err(SourceError::from)?;
        Ok(Self { inner, port: None })
    }

    /// Only yield datagrams sent to this UDP port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }
}

impl DatagramSource for PcapFileSource {
    fn next_datagram(&mut self) -> Result<Option<Datagram>, SourceError> {
        while let Some(frame) = next_frame(&mut self.inner).map_err(SourceError::from)? {
            let udp = match parse_udp_packet(frame.linktype, &frame.data) {
                Ok(Some(udp)) => udp,
                Ok(None) => continue,
                Err(err) => {
                    tracing::debug!(ts = frame.ts, %err, "skipping undecodable frame");
                    continue;
                }
            };
            if self.port.is_some_and(|port| port != udp.dst_port) {
                continue;
            }
            return Ok(Some(Datagram {
                ts: Some(frame.ts),
                src: Some(SocketAddr::new(udp.src_ip, udp.src_port)),
                payload: udp.payload.to_vec(),
            }));
        }
        Ok(None)
    }
}

fn create_reader(file: File) -> Result<PcapReader, PcapSourceError> {
    let mut file = file;
    let magic = read_magic_and_rewind(&mut file)?;

    if is_pcapng_magic(&magic) {
        let reader = PcapNGReader::new(layout::PCAP_READER_BUFFER_SIZE, file).map_err(|e| {
            PcapSourceError::Pcap {
                context: "pcapng reader init",
                message: e.to_string(),
            }
        })?;
        Ok(PcapReader::Ng {
            reader,
            linktypes: Vec::new(),
        })
    } else {
        let reader = LegacyPcapReader::new(layout::PCAP_READER_BUFFER_SIZE, file).map_err(|e| {
            PcapSourceError::Pcap {
                context: "pcap reader init",
                message: e.to_string(),
            }
        })?;
        Ok(PcapReader::Legacy {
            reader,
            linktype: None,
        })
    }
}

fn next_frame(reader: &mut PcapReader) -> Result<Option<Frame>, PcapSourceError> {
    loop {
        match reader {
            PcapReader::Legacy { reader, linktype } => match reader.next() {
                Ok((offset, block)) => {
                    let frame = match block {
                        PcapBlockOwned::LegacyHeader(header) => {
                            *linktype = Some(header.network);
                            None
                        }
                        PcapBlockOwned::Legacy(packet) => Some(Frame {
                            ts: packet.ts_sec as f64 + (packet.ts_usec as f64 * 1e-6),
                            linktype: linktype.unwrap_or(Linktype::ETHERNET),
                            data: packet.data.to_vec(),
                        }),
                        _ => None,
                    };
                    reader.consume(offset);
                    if frame.is_some() {
                        return Ok(frame);
                    }
                }
                Err(pcap_parser::PcapError::Eof) => return Ok(None),
                Err(pcap_parser::PcapError::Incomplete(_)) => {
                    reader.refill().map_err(|e| PcapSourceError::Pcap {
                        context: "pcap reader refill",
                        message: e.to_string(),
                    })?;
                }
                Err(e) => {
                    return Err(PcapSourceError::Pcap {
                        context: "pcap reader next",
                        message: e.to_string(),
                    });
                }
            },
            PcapReader::Ng { reader, linktypes } => match reader.next() {
                Ok((offset, block)) => {
                    let frame = match block {
                        PcapBlockOwned::NG(Block::InterfaceDescription(intf)) => {
                            linktypes.push(intf.linktype);
                            None
                        }
                        PcapBlockOwned::NG(Block::EnhancedPacket(packet)) => Some(Frame {
                            ts: pcapng_ts_to_seconds(packet.ts_high, packet.ts_low),
                            linktype: linktype_for_interface(linktypes, packet.if_id),
                            data: packet.data.to_vec(),
                        }),
                        _ => None,
                    };
                    reader.consume(offset);
                    if frame.is_some() {
                        return Ok(frame);
                    }
                }
                Err(pcap_parser::PcapError::Eof) => return Ok(None),
                Err(pcap_parser::PcapError::Incomplete(_)) => {
                    reader.refill().map_err(|e| PcapSourceError::Pcap {
                        context: "pcapng reader refill",
                        message: e.to_string(),
                    })?;
                }
                Err(e) => {
                    return Err(PcapSourceError::Pcap {
                        context: "pcapng reader next",
                        message: e.to_string(),
                    });
                }
            },
        }
    }
}
