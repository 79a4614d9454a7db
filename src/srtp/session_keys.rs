use std::fmt;

use hmac::Mac;

use crate::srtp::SrtpEndpointKeys;
use crate::srtp::constants::{
    SESSION_AUTH_LEN, SESSION_KEY_LEN, SESSION_SALT_LEN, SRTCP_LABEL_AUTH,
    SRTCP_LABEL_ENCRYPTION, SRTCP_LABEL_SALT, SRTP_LABEL_AUTH, SRTP_LABEL_ENCRYPTION,
    SRTP_LABEL_SALT,
};
use crate::srtp::srtp_error::CryptoError;
use crate::srtp::utils::{HmacSha1, aes_cm_prf};

/// Session encryption key, authentication key and salt for one of RTP or RTCP.
///
/// The HMAC is keyed once here and cloned per packet.
#[derive(Clone)]
pub struct SessionKeys {
    pub(crate) enc_key: [u8; SESSION_KEY_LEN],
    pub(crate) salt: [u8; SESSION_SALT_LEN],
    pub(crate) mac: HmacSha1,
}

/// Which half of the label space a derivation uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPurpose {
    Rtp,
    Rtcp,
}

impl KeyPurpose {
    fn labels(self) -> (u8, u8, u8) {
        match self {
            KeyPurpose::Rtp => (SRTP_LABEL_ENCRYPTION, SRTP_LABEL_AUTH, SRTP_LABEL_SALT),
            KeyPurpose::Rtcp => (SRTCP_LABEL_ENCRYPTION, SRTCP_LABEL_AUTH, SRTCP_LABEL_SALT),
        }
    }
}

impl SessionKeys {
    pub fn derive(master: &SrtpEndpointKeys, purpose: KeyPurpose) -> Result<Self, CryptoError> {
        let (enc_label, auth_label, salt_label) = purpose.labels();

        let mut enc_key = [0u8; SESSION_KEY_LEN];
        let mut auth_key = [0u8; SESSION_AUTH_LEN];
        let mut salt = [0u8; SESSION_SALT_LEN];

        aes_cm_prf(&master.master_key, &master.master_salt, enc_label, &mut enc_key);
        aes_cm_prf(&master.master_key, &master.master_salt, auth_label, &mut auth_key);
        aes_cm_prf(&master.master_key, &master.master_salt, salt_label, &mut salt);

        let mac =
            HmacSha1::new_from_slice(&auth_key).map_err(|_| CryptoError::InvalidKeyLength)?;

        Ok(Self {
            enc_key,
            salt,
            mac,
        })
    }
}

impl fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKeys")
            .field("enc_key", &"<redacted>")
            .field("auth_key", &"<redacted>")
            .field("salt", &format_args!("{:02x?}", &self.salt))
            .finish()
    }
}

/// RTP and RTCP session keys derived from one master key/salt.
///
/// With a key derivation rate of zero the result does not depend on the SSRC
/// or packet index, so a stream derives this once and copies it into every
/// per-SSRC context.
#[derive(Clone, Debug)]
pub struct SrtpSessionKeys {
    pub rtp: SessionKeys,
    pub rtcp: SessionKeys,
}

impl SrtpSessionKeys {
    pub fn derive(master: &SrtpEndpointKeys) -> Result<Self, CryptoError> {
        Ok(Self {
            rtp: SessionKeys::derive(master, KeyPurpose::Rtp)?,
            rtcp: SessionKeys::derive(master, KeyPurpose::Rtcp)?,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    fn master() -> SrtpEndpointKeys {
        SrtpEndpointKeys::new([0x11; 16], [0x22; 14])
    }

    #[test]
    fn rtp_and_rtcp_keys_differ() {
        let keys = SrtpSessionKeys::derive(&master()).unwrap();
        assert_ne!(keys.rtp.enc_key, keys.rtcp.enc_key);
        assert_ne!(
            keys.rtp.mac.clone().finalize().into_bytes(),
            keys.rtcp.mac.clone().finalize().into_bytes()
        );
        assert_ne!(keys.rtp.salt, keys.rtcp.salt);
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = SessionKeys::derive(&master(), KeyPurpose::Rtp).unwrap();
        let b = SessionKeys::derive(&master(), KeyPurpose::Rtp).unwrap();
        assert_eq!(a.enc_key, b.enc_key);
        assert_eq!(
            a.mac.clone().finalize().into_bytes(),
            b.mac.clone().finalize().into_bytes()
        );
        assert_eq!(a.salt, b.salt);
    }

    #[test]
    fn debug_output_hides_keys() {
        let keys = SessionKeys::derive(&master(), KeyPurpose::Rtp).unwrap();
        let dbg = format!("{keys:?}");
        assert!(dbg.contains("<redacted>"));
    }
}
