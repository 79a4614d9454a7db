use std::fmt;
use std::str::FromStr;

use crate::srtp::constants::{
    AUTH_TAG_LEN_32, AUTH_TAG_LEN_80, MASTER_KEY_LEN, MASTER_SALT_LEN, SRTCP_AUTH_TAG_LEN,
};

/// DTLS-SRTP protection profile negotiated for the captured session.
///
/// Only the AES counter-mode profiles are supported; one profile applies to
/// the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SrtpProfile {
    /// SRTP_AES128_CM_HMAC_SHA1_80 (0x0001)
    #[default]
    Aes128CmSha180,
    /// SRTP_AES128_CM_HMAC_SHA1_32 (0x0002)
    Aes128CmSha132,
}

impl SrtpProfile {
    /// IANA DTLS-SRTP protection profile identifier.
    pub fn id(self) -> u16 {
        match self {
            SrtpProfile::Aes128CmSha180 => 0x0001,
            SrtpProfile::Aes128CmSha132 => 0x0002,
        }
    }

    pub fn master_key_len(self) -> usize {
        MASTER_KEY_LEN
    }

    pub fn master_salt_len(self) -> usize {
        MASTER_SALT_LEN
    }

    /// Length of the exporter output holding both directions' key and salt.
    pub fn keying_material_len(self) -> usize {
        2 * (self.master_key_len() + self.master_salt_len())
    }

    pub fn rtp_auth_tag_len(self) -> usize {
        match self {
            SrtpProfile::Aes128CmSha180 => AUTH_TAG_LEN_80,
            SrtpProfile::Aes128CmSha132 => AUTH_TAG_LEN_32,
        }
    }

    pub fn rtcp_auth_tag_len(self) -> usize {
        SRTCP_AUTH_TAG_LEN
    }
}

impl fmt::Display for SrtpProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SrtpProfile::Aes128CmSha180 => f.write_str("SRTP_AES128_CM_HMAC_SHA1_80"),
            SrtpProfile::Aes128CmSha132 => f.write_str("SRTP_AES128_CM_HMAC_SHA1_32"),
        }
    }
}

impl FromStr for SrtpProfile {
    type Err = String;

    /// Accepts the RFC name, the short kebab form, or the numeric profile id.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_lowercase().replace('_', "-");
        match norm.as_str() {
            "srtp-aes128-cm-hmac-sha1-80" | "aes128-cm-sha1-80" | "aes128-cm-hmac-sha1-80"
            | "0x0001" | "1" => Ok(SrtpProfile::Aes128CmSha180),
            "srtp-aes128-cm-hmac-sha1-32" | "aes128-cm-sha1-32" | "aes128-cm-hmac-sha1-32"
            | "0x0002" | "2" => Ok(SrtpProfile::Aes128CmSha132),
            _ => Err(format!("unsupported SRTP profile '{}'", s.trim())),
        }
    }
}
