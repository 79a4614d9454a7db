use std::time::Duration;

use pcap_file::DataLink;
use pcap_file::pcapng::blocks::enhanced_packet::EnhancedPacketOption;

use crate::capture::capture_error::CaptureError;
use crate::capture::frame::{self, Dissection, Transport, TransportProtocol};

/// Container record a packet came from, kept so it can be written back the
/// same way.
#[derive(Debug, Clone, PartialEq)]
pub enum Framing {
    /// Legacy pcap record.
    Pcap,
    /// pcapng Enhanced Packet Block.
    Enhanced {
        interface_id: u32,
        options: Vec<EnhancedPacketOption<'static>>,
    },
    /// pcapng Simple Packet Block (always interface 0, no timestamp).
    Simple,
}

/// One captured frame plus the 5-tuple dissected from it.
///
/// Everything except the UDP payload (and the length/checksum fields that
/// cover it) is carried through untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedPacket {
    pub timestamp: Duration,
    pub orig_len: u32,
    pub link_type: DataLink,
    pub framing: Framing,
    data: Vec<u8>,
    dissection: Option<Dissection>,
}

impl CapturedPacket {
    pub fn new(
        timestamp: Duration,
        orig_len: u32,
        link_type: DataLink,
        framing: Framing,
        data: Vec<u8>,
    ) -> Self {
        let dissection = frame::dissect(link_type, &data);
        Self {
            timestamp,
            orig_len,
            link_type,
            framing,
            data,
            dissection,
        }
    }

    /// Full captured bytes, link layer included.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn transport(&self) -> Option<&Transport> {
        self.dissection.as_ref().map(|d| &d.transport)
    }

    pub fn is_udp(&self) -> bool {
        self.transport()
            .is_some_and(|t| t.protocol == TransportProtocol::Udp)
    }

    /// UDP payload, or `None` for anything that is not a complete UDP datagram.
    pub fn payload(&self) -> Option<&[u8]> {
        self.captured_payload().filter(|_| !self.is_truncated())
    }

    /// Whatever UDP payload bytes the capture holds, complete or not.
    pub fn captured_payload(&self) -> Option<&[u8]> {
        let udp = self.dissection.as_ref()?.udp.as_ref()?;
        self.data
            .get(udp.payload_offset..udp.payload_offset + udp.payload_len)
    }

    /// A UDP datagram the capture cut short.
    pub fn is_truncated(&self) -> bool {
        self.dissection
            .as_ref()
            .and_then(|d| d.udp.as_ref())
            .is_some_and(|udp| udp.truncated)
    }

    /// Copy of this packet with its UDP payload replaced.
    ///
    /// IP and UDP lengths and checksums are recomputed, and the captured and
    /// original lengths shrink or grow by the payload difference.
    pub fn with_payload(&self, payload: &[u8]) -> Result<Self, CaptureError> {
        let udp = self
            .dissection
            .as_ref()
            .and_then(|d| d.udp.as_ref())
            .ok_or(CaptureError::Rewrite("packet has no UDP payload"))?;

        let data = frame::replace_udp_payload(&self.data, udp, payload)?;
        let delta = payload.len() as i64 - udp.payload_len as i64;
        let orig_len = u32::try_from((self.orig_len as i64 + delta).max(data.len() as i64))
            .map_err(|_| CaptureError::Rewrite("original length overflows 32 bits"))?;

        Ok(Self::new(
            self.timestamp,
            orig_len,
            self.link_type,
            self.framing.clone(),
            data,
        ))
    }
}
