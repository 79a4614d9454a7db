use std::fmt;

use crate::srtp::constants::{MASTER_KEY_LEN, MASTER_SALT_LEN};

/// One direction's master key and salt, as exported by DTLS-SRTP.
#[derive(Clone, PartialEq, Eq)]
pub struct SrtpEndpointKeys {
    pub master_key: [u8; MASTER_KEY_LEN],
    pub master_salt: [u8; MASTER_SALT_LEN],
}

impl SrtpEndpointKeys {
    pub fn new(master_key: [u8; MASTER_KEY_LEN], master_salt: [u8; MASTER_SALT_LEN]) -> Self {
        Self {
            master_key,
            master_salt,
        }
    }
}

// Key bytes stay out of `{:?}` output; only the salt prefix is shown so runs
// can be told apart in logs.
impl fmt::Debug for SrtpEndpointKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SrtpEndpointKeys")
            .field("master_key", &"<redacted>")
            .field("master_salt", &format_args!("{:02x?}..", &self.master_salt[..4]))
            .finish()
    }
}
