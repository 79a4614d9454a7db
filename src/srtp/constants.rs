// Key derivation labels (RFC 3711 §4.3.2)
pub const SRTP_LABEL_ENCRYPTION: u8 = 0x00;
pub const SRTP_LABEL_AUTH: u8 = 0x01;
pub const SRTP_LABEL_SALT: u8 = 0x02;
pub const SRTCP_LABEL_ENCRYPTION: u8 = 0x03;
pub const SRTCP_LABEL_AUTH: u8 = 0x04;
pub const SRTCP_LABEL_SALT: u8 = 0x05;

// AES_CM_128 master material (RFC 5764 §4.1.2, both HMAC_SHA1 profiles)
pub const MASTER_KEY_LEN: usize = 16; // 128 bits
pub const MASTER_SALT_LEN: usize = 14; // 112 bits

// Session material
pub const SESSION_KEY_LEN: usize = 16; // 128 bits
pub const SESSION_AUTH_LEN: usize = 20; // 160 bits (SHA1)
pub const SESSION_SALT_LEN: usize = 14; // 112 bits

// Authentication tags, truncated HMAC-SHA1
pub const AUTH_TAG_LEN_80: usize = 10;
pub const AUTH_TAG_LEN_32: usize = 4;
/// SRTCP always carries the 80-bit tag, whatever the SRTP profile.
pub const SRTCP_AUTH_TAG_LEN: usize = AUTH_TAG_LEN_80;

// Wire layout
pub const RTP_HEADER_LEN: usize = 12;
pub const RTCP_HEADER_LEN: usize = 8; // common header + sender SSRC
pub const SRTCP_INDEX_LEN: usize = 4;
pub const SRTCP_E_FLAG: u32 = 0x8000_0000;
pub const SRTCP_INDEX_MASK: u32 = 0x7FFF_FFFF;

/// Half of the 16-bit sequence space; the rollover decision threshold.
pub const SEQ_NUM_MEDIAN: i32 = 1 << 15;
