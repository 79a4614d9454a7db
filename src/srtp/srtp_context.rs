use byteorder::{BigEndian, ByteOrder};
use hmac::Mac;

use crate::srtp::SrtpEndpointKeys;
use crate::srtp::constants::{
    RTCP_HEADER_LEN, RTP_HEADER_LEN, SRTCP_AUTH_TAG_LEN, SRTCP_E_FLAG, SRTCP_INDEX_LEN,
    SRTCP_INDEX_MASK,
};
use crate::srtp::profile::SrtpProfile;
use crate::srtp::rollover::RtpIndexTracker;
use crate::srtp::session_keys::{SessionKeys, SrtpSessionKeys};
use crate::srtp::srtp_error::CryptoError;
use crate::srtp::utils::{apply_keystream, get_rtp_header_len, tags_equal};

/// Cryptographic state of one SSRC inside one stream.
///
/// Every packet is authenticated before any byte of it is decrypted, and the
/// rollover counter / SRTCP index only move after a packet authenticates.
#[derive(Debug, Clone)]
pub struct CryptoContext {
    ssrc: u32,
    profile: SrtpProfile,
    keys: SrtpSessionKeys,
    rtp_index: RtpIndexTracker,
    rtcp_index: Option<u32>,
}

impl CryptoContext {
    /// Fresh context (roc = 0) over already derived session keys.
    pub fn new(ssrc: u32, profile: SrtpProfile, keys: SrtpSessionKeys) -> Self {
        Self {
            ssrc,
            profile,
            keys,
            rtp_index: RtpIndexTracker::new(),
            rtcp_index: None,
        }
    }

    /// Derives the session keys from `master` and returns a fresh context.
    pub fn derive(
        master: &SrtpEndpointKeys,
        profile: SrtpProfile,
        ssrc: u32,
    ) -> Result<Self, CryptoError> {
        Ok(Self::new(ssrc, profile, SrtpSessionKeys::derive(master)?))
    }

    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    pub fn profile(&self) -> SrtpProfile {
        self.profile
    }

    pub fn roc(&self) -> u32 {
        self.rtp_index.roc()
    }

    pub fn highest_sequence_number(&self) -> u16 {
        self.rtp_index.highest_sequence_number()
    }

    /// Highest SRTCP index accepted so far, if any.
    pub fn rtcp_index(&self) -> Option<u32> {
        self.rtcp_index
    }

    /// Authenticates and decrypts one SRTP packet, returning header + plaintext
    /// without the tag.
    pub fn decrypt_rtp(&mut self, packet: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let tag_len = self.profile.rtp_auth_tag_len();
        if packet.len() < RTP_HEADER_LEN + tag_len {
            return Err(CryptoError::MalformedPacket(
                "too short for an RTP header and auth tag",
            ));
        }

        let tag_start = packet.len() - tag_len;
        let (content, received_tag) = packet.split_at(tag_start);
        let header_len = get_rtp_header_len(content)?;

        let ssrc = BigEndian::read_u32(&content[8..12]);
        if ssrc != self.ssrc {
            return Err(CryptoError::MalformedPacket("SSRC does not match the context"));
        }
        let seq = BigEndian::read_u16(&content[2..4]);
        let candidate = self.rtp_index.estimate(seq);

        if !verify_tag(&self.keys.rtp, &[content, &candidate.roc.to_be_bytes()], received_tag) {
            return Err(CryptoError::AuthFailure {
                ssrc,
                index: candidate.index,
            });
        }

        let mut out = content.to_vec();
        apply_keystream(
            &self.keys.rtp.enc_key,
            &self.keys.rtp.salt,
            ssrc,
            candidate.index,
            &mut out[header_len..],
        );

        self.rtp_index.commit(candidate);
        Ok(out)
    }

    /// Authenticates and, when the E flag is set, decrypts one SRTCP packet.
    ///
    /// The returned compound packet has the E||index word and the tag removed.
    pub fn decrypt_rtcp(&mut self, packet: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if packet.len() < RTCP_HEADER_LEN + SRTCP_INDEX_LEN + SRTCP_AUTH_TAG_LEN {
            return Err(CryptoError::MalformedPacket(
                "too short for an RTCP header, SRTCP index and auth tag",
            ));
        }

        let tag_start = packet.len() - SRTCP_AUTH_TAG_LEN;
        let idx_start = tag_start - SRTCP_INDEX_LEN;
        let (authenticated, received_tag) = packet.split_at(tag_start);

        let ssrc = BigEndian::read_u32(&packet[4..8]);
        if ssrc != self.ssrc {
            return Err(CryptoError::MalformedPacket("SSRC does not match the context"));
        }
        let e_and_index = BigEndian::read_u32(&packet[idx_start..tag_start]);
        let encrypted = e_and_index & SRTCP_E_FLAG != 0;
        let index = e_and_index & SRTCP_INDEX_MASK;

        if !verify_tag(&self.keys.rtcp, &[authenticated], received_tag) {
            return Err(CryptoError::AuthFailure {
                ssrc,
                index: index as u64,
            });
        }

        let mut out = packet[..idx_start].to_vec();
        if encrypted {
            apply_keystream(
                &self.keys.rtcp.enc_key,
                &self.keys.rtcp.salt,
                ssrc,
                index as u64,
                &mut out[RTCP_HEADER_LEN..],
            );
        }

        self.rtcp_index = Some(self.rtcp_index.map_or(index, |prev| prev.max(index)));
        Ok(out)
    }

    /// Encrypts and tags a plain RTP packet as it would have been sent with
    /// rollover counter `roc`. Does not touch the receive state.
    pub fn protect_rtp(&self, packet: &[u8], roc: u32) -> Result<Vec<u8>, CryptoError> {
        let header_len = get_rtp_header_len(packet)?;
        let ssrc = BigEndian::read_u32(&packet[8..12]);
        let seq = BigEndian::read_u16(&packet[2..4]);
        let index = ((roc as u64) << 16) | seq as u64;

        let mut out = packet.to_vec();
        apply_keystream(
            &self.keys.rtp.enc_key,
            &self.keys.rtp.salt,
            ssrc,
            index,
            &mut out[header_len..],
        );

        let tag = compute_tag(&self.keys.rtp, &[out.as_slice(), &roc.to_be_bytes()]);
        out.extend_from_slice(&tag[..self.profile.rtp_auth_tag_len()]);
        Ok(out)
    }

    /// Builds an SRTCP packet with the given 31-bit index. With `encrypt`
    /// unset the E flag is cleared and the body is only authenticated.
    pub fn protect_rtcp(
        &self,
        packet: &[u8],
        index: u32,
        encrypt: bool,
    ) -> Result<Vec<u8>, CryptoError> {
        if packet.len() < RTCP_HEADER_LEN {
            return Err(CryptoError::MalformedPacket("shorter than an RTCP header"));
        }
        let ssrc = BigEndian::read_u32(&packet[4..8]);
        let index = index & SRTCP_INDEX_MASK;

        let mut out = packet.to_vec();
        let mut e_and_index = index;
        if encrypt {
            apply_keystream(
                &self.keys.rtcp.enc_key,
                &self.keys.rtcp.salt,
                ssrc,
                index as u64,
                &mut out[RTCP_HEADER_LEN..],
            );
            e_and_index |= SRTCP_E_FLAG;
        }
        out.extend_from_slice(&e_and_index.to_be_bytes());

        let tag = compute_tag(&self.keys.rtcp, &[out.as_slice()]);
        out.extend_from_slice(&tag[..SRTCP_AUTH_TAG_LEN]);
        Ok(out)
    }
}

fn compute_tag(keys: &SessionKeys, parts: &[&[u8]]) -> [u8; 20] {
    let mut mac = keys.mac.clone();
    for part in parts {
        mac.update(part);
    }
    let mut tag = [0u8; 20];
    tag.copy_from_slice(&mac.finalize().into_bytes());
    tag
}

fn verify_tag(keys: &SessionKeys, parts: &[&[u8]], received: &[u8]) -> bool {
    let full = compute_tag(keys, parts);
    tags_equal(&full[..received.len()], received)
}
