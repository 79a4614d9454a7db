pub(super) type HmacSha1 = Hmac<Sha1>;
pub(super) type Aes128Ctr = Ctr128BE<Aes128>;

use aes::Aes128;
use aes::cipher::{KeyIvInit, StreamCipher};
use byteorder::{BigEndian, ByteOrder};
use ctr::Ctr128BE;
use hmac::Hmac;
use sha1::Sha1;
use subtle::ConstantTimeEq;

use crate::srtp::constants::{
    MASTER_KEY_LEN, MASTER_SALT_LEN, RTCP_HEADER_LEN, RTP_HEADER_LEN, SESSION_KEY_LEN,
    SESSION_SALT_LEN,
};
use crate::srtp::srtp_error::CryptoError;

/// Tag comparison that does not leak the position of the first mismatch.
pub(super) fn tags_equal(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && bool::from(a.ct_eq(b))
}

/// AES-CM PRF of RFC 3711 §4.3.3 with a key derivation rate of zero.
///
/// The label is XORed into byte 7 of the zero-padded master salt, which is
/// the low 56 bits of the 112-bit salt shifted left by 16; the remaining two
/// bytes are the block counter.
pub(super) fn aes_cm_prf(
    master_key: &[u8; MASTER_KEY_LEN],
    master_salt: &[u8; MASTER_SALT_LEN],
    label: u8,
    out: &mut [u8],
) {
    let mut iv = [0u8; 16];
    iv[..MASTER_SALT_LEN].copy_from_slice(master_salt);
    iv[7] ^= label;

    let mut cipher = Aes128Ctr::new(&(*master_key).into(), &iv.into());
    out.fill(0);
    cipher.apply_keystream(out);
}

/// Counter-mode IV: (salt << 16) XOR (ssrc << 64) XOR (index << 16).
///
/// `index` is the 48-bit SRTP packet index or the 31-bit SRTCP index.
pub(super) fn compute_iv(session_salt: &[u8; SESSION_SALT_LEN], ssrc: u32, index: u64) -> [u8; 16] {
    let mut iv = [0u8; 16];
    iv[..SESSION_SALT_LEN].copy_from_slice(session_salt);

    let ssrc_bytes = ssrc.to_be_bytes();
    for i in 0..4 {
        iv[4 + i] ^= ssrc_bytes[i];
    }

    let idx_full = index.to_be_bytes();
    for i in 0..6 {
        iv[8 + i] ^= idx_full[2 + i];
    }
    iv
}

/// XORs the AES-CM keystream for (ssrc, index) into `data`.
pub(super) fn apply_keystream(
    enc_key: &[u8; SESSION_KEY_LEN],
    session_salt: &[u8; SESSION_SALT_LEN],
    ssrc: u32,
    index: u64,
    data: &mut [u8],
) {
    let iv = compute_iv(session_salt, ssrc, index);
    let mut cipher = Aes128Ctr::new(&(*enc_key).into(), &iv.into());
    cipher.apply_keystream(data);
}

/// Fixed header + CSRC list + header extension.
pub(super) fn get_rtp_header_len(packet: &[u8]) -> Result<usize, CryptoError> {
    if packet.len() < RTP_HEADER_LEN {
        return Err(CryptoError::MalformedPacket("shorter than an RTP header"));
    }
    let v_p_x_cc = packet[0];
    let cc = v_p_x_cc & 0x0F;
    let x = (v_p_x_cc & 0x10) != 0;

    let mut len = RTP_HEADER_LEN + (cc as usize * 4);

    if x {
        if packet.len() < len + 4 {
            return Err(CryptoError::MalformedPacket(
                "too short for the RTP extension header",
            ));
        }
        let ext_len = BigEndian::read_u16(&packet[len + 2..len + 4]);
        len += 4 + (ext_len as usize * 4);
    }

    if packet.len() < len {
        return Err(CryptoError::MalformedPacket(
            "RTP header runs past the end of the packet",
        ));
    }
    Ok(len)
}

pub(crate) fn rtp_ssrc(packet: &[u8]) -> Result<u32, CryptoError> {
    if packet.len() < RTP_HEADER_LEN {
        return Err(CryptoError::MalformedPacket("shorter than an RTP header"));
    }
    Ok(BigEndian::read_u32(&packet[8..12]))
}

pub(crate) fn rtcp_ssrc(packet: &[u8]) -> Result<u32, CryptoError> {
    if packet.len() < RTCP_HEADER_LEN {
        return Err(CryptoError::MalformedPacket("shorter than an RTCP header"));
    }
    Ok(BigEndian::read_u32(&packet[4..8]))
}
