/// What a UDP payload looks like on a demultiplexed RTP/RTCP port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Rtp,
    Rtcp,
    Unknown,
}

impl PacketKind {
    /// Classifies by the first two bytes (RFC 7983 first-byte ranges, RFC 5761
    /// payload-type split).
    ///
    /// Version 2 is required. Second bytes 192..=223 are RTCP packet types
    /// 192-223; 64..=95 would be RTP payload types 64-95 without the marker,
    /// which collide with RTCP types 192-223 with the marker set, so they are
    /// left `Unknown`.
    pub fn classify(payload: &[u8]) -> Self {
        let [b0, b1, ..] = payload else {
            return PacketKind::Unknown;
        };
        if !(128..=191).contains(b0) {
            return PacketKind::Unknown;
        }
        match *b1 {
            192..=223 => PacketKind::Rtcp,
            64..=95 => PacketKind::Unknown,
            _ => PacketKind::Rtp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rtp_payload_types() {
        assert_eq!(PacketKind::classify(&[0x80, 0x60, 0, 1]), PacketKind::Rtp);
        assert_eq!(PacketKind::classify(&[0x90, 0x00]), PacketKind::Rtp);
        // marker bit set on PT 111
        assert_eq!(PacketKind::classify(&[0x80, 0xEF]), PacketKind::Rtp);
    }

    #[test]
    fn rtcp_packet_types() {
        for pt in [200u8, 201, 202, 203, 204, 205, 206, 207] {
            assert_eq!(PacketKind::classify(&[0x81, pt, 0, 7]), PacketKind::Rtcp);
        }
    }

    #[test]
    fn ambiguous_or_foreign_payloads_are_unknown() {
        // STUN binding request
        assert_eq!(PacketKind::classify(&[0x00, 0x01, 0x00, 0x00]), PacketKind::Unknown);
        // DTLS handshake record
        assert_eq!(PacketKind::classify(&[0x16, 0xFE, 0xFD]), PacketKind::Unknown);
        // RTP version 1
        assert_eq!(PacketKind::classify(&[0x40, 0x60]), PacketKind::Unknown);
        // PT 72 without marker collides with RTCP SR
        assert_eq!(PacketKind::classify(&[0x80, 72]), PacketKind::Unknown);
        assert_eq!(PacketKind::classify(&[0x80]), PacketKind::Unknown);
        assert_eq!(PacketKind::classify(&[]), PacketKind::Unknown);
    }
}
