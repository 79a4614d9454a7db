//! Link/IP/UDP dissection of one captured frame and in-place payload
//! replacement.

use std::net::{IpAddr, SocketAddr};

use byteorder::{BigEndian, ByteOrder};
use etherparse::{
    IpNumber, Ipv4HeaderSlice, LaxNetSlice, LaxSlicedPacket, NetSlice, SlicedPacket,
    TransportSlice, UdpHeader, UdpHeaderSlice,
};
use pcap_file::DataLink;

use crate::capture::capture_error::CaptureError;

/// BSD loopback / NULL encapsulation: a 4-byte address family in host order.
const NULL_HEADER_LEN: usize = 4;

/// Linux "cooked" capture header in front of the IP packet.
const LINUX_SLL_HEADER_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportProtocol {
    Udp,
    Tcp,
}

/// Addresses and ports of a captured TCP or UDP packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transport {
    pub src: SocketAddr,
    pub dst: SocketAddr,
    pub protocol: TransportProtocol,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IpLayout {
    V4 { offset: usize },
    V6 { offset: usize },
}

/// Byte offsets of the headers a payload replacement has to touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct UdpLayout {
    pub ip: IpLayout,
    pub udp_offset: usize,
    pub payload_offset: usize,
    /// Captured payload bytes, which is less than the datagram carried when
    /// `truncated` is set.
    pub payload_len: usize,
    /// The frame only parsed leniently, usually because the capture snaplen
    /// cut it short. Such a datagram is never rewritten.
    pub truncated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Dissection {
    pub transport: Transport,
    /// Present for UDP only.
    pub udp: Option<UdpLayout>,
}

fn offset_in(base: &[u8], part: &[u8]) -> usize {
    part.as_ptr() as usize - base.as_ptr() as usize
}

/// Returns `None` for link types we do not decode, non-IP frames, IP
/// fragments and anything that is neither TCP nor UDP.
///
/// Frames that fail strict slicing get a second, lenient pass so a UDP
/// datagram cut short by the snaplen still yields its addresses and the
/// payload bytes that were captured.
pub(crate) fn dissect(link_type: DataLink, data: &[u8]) -> Option<Dissection> {
    let strict = match link_type {
        DataLink::ETHERNET => SlicedPacket::from_ethernet(data).ok(),
        DataLink::RAW | DataLink::IPV4 | DataLink::IPV6 => SlicedPacket::from_ip(data).ok(),
        DataLink::LINUX_SLL => SlicedPacket::from_linux_sll(data).ok(),
        DataLink::NULL | DataLink::LOOP => data
            .get(NULL_HEADER_LEN..)
            .and_then(|ip| SlicedPacket::from_ip(ip).ok()),
        _ => return None,
    };

    match strict {
        Some(sliced) => dissect_sliced(data, &sliced),
        None => dissect_truncated(link_type, data),
    }
}

fn dissect_sliced(data: &[u8], sliced: &SlicedPacket<'_>) -> Option<Dissection> {
    let (src_ip, dst_ip, ip): (IpAddr, IpAddr, IpLayout) = match sliced.net.as_ref()? {
        NetSlice::Ipv4(v4) => {
            let h = v4.header();
            (
                h.source_addr().into(),
                h.destination_addr().into(),
                IpLayout::V4 {
                    offset: offset_in(data, h.slice()),
                },
            )
        }
        NetSlice::Ipv6(v6) => {
            let h = v6.header();
            (
                h.source_addr().into(),
                h.destination_addr().into(),
                IpLayout::V6 {
                    offset: offset_in(data, h.slice()),
                },
            )
        }
        #[allow(unreachable_patterns)]
        _ => return None,
    };

    match sliced.transport.as_ref()? {
        TransportSlice::Udp(udp) => Some(Dissection {
            transport: Transport {
                src: SocketAddr::new(src_ip, udp.source_port()),
                dst: SocketAddr::new(dst_ip, udp.destination_port()),
                protocol: TransportProtocol::Udp,
            },
            udp: Some(UdpLayout {
                ip,
                udp_offset: offset_in(data, udp.slice()),
                payload_offset: offset_in(data, udp.payload()),
                payload_len: udp.payload().len(),
                truncated: false,
            }),
        }),
        TransportSlice::Tcp(tcp) => Some(Dissection {
            transport: Transport {
                src: SocketAddr::new(src_ip, tcp.source_port()),
                dst: SocketAddr::new(dst_ip, tcp.destination_port()),
                protocol: TransportProtocol::Tcp,
            },
            udp: None,
        }),
        _ => None,
    }
}

/// Lenient pass for frames strict slicing rejected. Only an unfragmented UDP
/// datagram with its full 8-byte header captured is recovered.
fn dissect_truncated(link_type: DataLink, data: &[u8]) -> Option<Dissection> {
    let lax = match link_type {
        DataLink::ETHERNET => LaxSlicedPacket::from_ethernet(data).ok()?,
        DataLink::RAW | DataLink::IPV4 | DataLink::IPV6 => LaxSlicedPacket::from_ip(data).ok()?,
        DataLink::LINUX_SLL => {
            LaxSlicedPacket::from_ip(data.get(LINUX_SLL_HEADER_LEN..)?).ok()?
        }
        DataLink::NULL | DataLink::LOOP => {
            LaxSlicedPacket::from_ip(data.get(NULL_HEADER_LEN..)?).ok()?
        }
        _ => return None,
    };

    let (src_ip, dst_ip, ip, ip_payload): (IpAddr, IpAddr, IpLayout, _) = match lax.net.as_ref()?
    {
        LaxNetSlice::Ipv4(v4) => {
            let h = v4.header();
            (
                h.source_addr().into(),
                h.destination_addr().into(),
                IpLayout::V4 {
                    offset: offset_in(data, h.slice()),
                },
                v4.payload(),
            )
        }
        LaxNetSlice::Ipv6(v6) => {
            let h = v6.header();
            (
                h.source_addr().into(),
                h.destination_addr().into(),
                IpLayout::V6 {
                    offset: offset_in(data, h.slice()),
                },
                v6.payload(),
            )
        }
        #[allow(unreachable_patterns)]
        _ => return None,
    };
    if ip_payload.ip_number != IpNumber::UDP || ip_payload.fragmented {
        return None;
    }

    let udp = UdpHeaderSlice::from_slice(ip_payload.payload).ok()?;
    let udp_offset = offset_in(data, udp.slice());
    let captured = ip_payload.payload.len() - UdpHeader::LEN;
    let declared = usize::from(udp.length()).saturating_sub(UdpHeader::LEN);

    Some(Dissection {
        transport: Transport {
            src: SocketAddr::new(src_ip, udp.source_port()),
            dst: SocketAddr::new(dst_ip, udp.destination_port()),
            protocol: TransportProtocol::Udp,
        },
        udp: Some(UdpLayout {
            ip,
            udp_offset,
            payload_offset: udp_offset + UdpHeader::LEN,
            payload_len: captured.min(declared),
            truncated: true,
        }),
    })
}

/// Swaps the UDP payload of `data` for `payload` and fixes every length and
/// checksum that covers it. Link-layer bytes and any trailer are kept.
pub(crate) fn replace_udp_payload(
    data: &[u8],
    layout: &UdpLayout,
    payload: &[u8],
) -> Result<Vec<u8>, CaptureError> {
    if layout.truncated {
        return Err(CaptureError::Rewrite("UDP datagram is truncated"));
    }
    let old_end = layout.payload_offset + layout.payload_len;
    let mut out = Vec::with_capacity(data.len() - layout.payload_len + payload.len());
    out.extend_from_slice(&data[..layout.payload_offset]);
    out.extend_from_slice(payload);
    out.extend_from_slice(&data[old_end..]);

    let udp_len = u16::try_from(UdpHeader::LEN + payload.len())
        .map_err(|_| CaptureError::Rewrite("UDP length overflows 16 bits"))?;
    let u = layout.udp_offset;
    BigEndian::write_u16(&mut out[u + 4..u + 6], udp_len);
    let old_checksum = BigEndian::read_u16(&out[u + 6..u + 8]);
    BigEndian::write_u16(&mut out[u + 6..u + 8], 0);

    let header = UdpHeader {
        source_port: BigEndian::read_u16(&out[u..u + 2]),
        destination_port: BigEndian::read_u16(&out[u + 2..u + 4]),
        length: udp_len,
        checksum: 0,
    };

    let checksum = match layout.ip {
        IpLayout::V4 { offset } => {
            let ip_header_len = (out[offset] & 0x0F) as usize * 4;
            let total_len = u16::try_from(ip_header_len + udp_len as usize)
                .map_err(|_| CaptureError::Rewrite("IPv4 total length overflows 16 bits"))?;
            BigEndian::write_u16(&mut out[offset + 2..offset + 4], total_len);

            let ip = Ipv4HeaderSlice::from_slice(&out[offset..])
                .map_err(|_| CaptureError::Rewrite("IPv4 header no longer parses"))?
                .to_header();
            BigEndian::write_u16(&mut out[offset + 10..offset + 12], ip.calc_header_checksum());

            // A zero UDP checksum over IPv4 means "not computed"; keep it that way.
            if old_checksum == 0 {
                0
            } else {
                header
                    .calc_checksum_ipv4_raw(ip.source, ip.destination, payload)
                    .map_err(|_| CaptureError::Rewrite("UDP payload too large to checksum"))?
            }
        }
        IpLayout::V6 { offset } => {
            let ext_len = u - (offset + 40);
            let payload_len = u16::try_from(ext_len + udp_len as usize)
                .map_err(|_| CaptureError::Rewrite("IPv6 payload length overflows 16 bits"))?;
            BigEndian::write_u16(&mut out[offset + 4..offset + 6], payload_len);

            let mut source = [0u8; 16];
            let mut destination = [0u8; 16];
            source.copy_from_slice(&out[offset + 8..offset + 24]);
            destination.copy_from_slice(&out[offset + 24..offset + 40]);
            header
                .calc_checksum_ipv6_raw(source, destination, payload)
                .map_err(|_| CaptureError::Rewrite("UDP payload too large to checksum"))?
        }
    };
    BigEndian::write_u16(&mut out[u + 6..u + 8], checksum);

    Ok(out)
}
