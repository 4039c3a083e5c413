use std::net::IpAddr;

use etherparse::{NetSlice, SlicedPacket, TransportSlice};
use pcap_parser::Linktype;

use super::error::UdpError;

/// UDP payload borrowed from a captured frame, with its endpoints.
pub struct UdpDatagram<'a> {
    pub src_ip: IpAddr,
    pub src_port: u16,
    pub dst_port: u16,
    pub payload: &'a [u8],
}

/// Slice a link-layer frame down to its UDP payload.
///
/// Frames of other link types or transports yield `Ok(None)`.
pub fn parse_udp_packet(
    linktype: Linktype,
    data: &[u8],
) -> Result<Option<UdpDatagram<'_>>, UdpError> {
    let sliced = match linktype {
        Linktype::ETHERNET => SlicedPacket::from_ethernet(data),
        Linktype::RAW => SlicedPacket::from_ip(data),
        _ => return Ok(None),
    }
    .map_err(|e| UdpError::Slice(e.to_string()))?;

    let net = sliced.net.ok_or(UdpError::MissingNetworkLayer)?;
    let Some(TransportSlice::Udp(udp)) = sliced.transport else {
        return Ok(None);
    };

    let src_ip = match net {
        NetSlice::Ipv4(ref ipv4) => IpAddr::V4(ipv4.header().source_addr()),
        NetSlice::Ipv6(ref ipv6) => IpAddr::V6(ipv6.header().source_addr()),
    };

    Ok(Some(UdpDatagram {
        src_ip,
        src_port: udp.source_port(),
        dst_port: udp.destination_port(),
        payload: udp.payload(),
    }))
}
