use thiserror::Error;

/// Per-packet failures of the SRTP/SRTCP transforms.
///
/// None of these ever produces plaintext: a packet that fails here is handed
/// to the pipeline's malformed policy untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Too short for the header, tag or SRTCP index, or the authenticated
    /// header is internally inconsistent.
    #[error("malformed packet: {0}")]
    MalformedPacket(&'static str),

    /// Tag mismatch: the packet is not authentic under this stream's keys.
    #[error("authentication failed for SSRC {ssrc:#010x} at index {index}")]
    AuthFailure { ssrc: u32, index: u64 },

    /// Session key setup rejected the derived key material.
    #[error("invalid session key length")]
    InvalidKeyLength,
}

impl CryptoError {
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, CryptoError::AuthFailure { .. })
    }
}
