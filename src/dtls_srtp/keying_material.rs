use std::{fmt, fs, path::Path, str::FromStr};

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};

use crate::dtls_srtp::keying_error::KeyingError;
use crate::srtp::{SrtpEndpointKeys, SrtpProfile};
use crate::srtp::constants::{MASTER_KEY_LEN, MASTER_SALT_LEN};

/// Which side of the DTLS handshake the capturing host played.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DtlsRole {
    #[default]
    Client,
    Server,
}

impl fmt::Display for DtlsRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DtlsRole::Client => f.write_str("client"),
            DtlsRole::Server => f.write_str("server"),
        }
    }
}

impl FromStr for DtlsRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "client" => Ok(DtlsRole::Client),
            "server" => Ok(DtlsRole::Server),
            other => Err(format!("unknown DTLS role '{other}' (expected client or server)")),
        }
    }
}

/// Master key/salt of both directions, split out of a DTLS-SRTP exporter blob.
///
/// `local` protects what the capturing host sent, `remote` what it received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyingMaterial {
    profile: SrtpProfile,
    local: SrtpEndpointKeys,
    remote: SrtpEndpointKeys,
}

impl KeyingMaterial {
    pub fn new(profile: SrtpProfile, local: SrtpEndpointKeys, remote: SrtpEndpointKeys) -> Self {
        Self {
            profile,
            local,
            remote,
        }
    }

    /// Splits raw exporter output laid out as
    /// `client_key | server_key | client_salt | server_salt` (RFC 5764 §4.2).
    pub fn from_exporter(
        km: &[u8],
        profile: SrtpProfile,
        role: DtlsRole,
    ) -> Result<Self, KeyingError> {
        let expected = profile.keying_material_len();
        if km.len() != expected {
            return Err(KeyingError::MalformedKeyMaterial {
                expected,
                actual: km.len(),
            });
        }

        let mut offset = 0;
        let client_mk = &km[offset..offset + MASTER_KEY_LEN];
        offset += MASTER_KEY_LEN;
        let server_mk = &km[offset..offset + MASTER_KEY_LEN];
        offset += MASTER_KEY_LEN;
        let client_ms = &km[offset..offset + MASTER_SALT_LEN];
        offset += MASTER_SALT_LEN;
        let server_ms = &km[offset..offset + MASTER_SALT_LEN];

        let client = endpoint_keys(client_mk, client_ms);
        let server = endpoint_keys(server_mk, server_ms);

        let (local, remote) = match role {
            DtlsRole::Client => (client, server),
            DtlsRole::Server => (server, client),
        };

        Ok(Self {
            profile,
            local,
            remote,
        })
    }

    /// Decodes hex or base64 text and splits it with [`from_exporter`](Self::from_exporter).
    ///
    /// Whitespace is ignored and a leading `0x` is allowed on hex input.
    /// Whichever of hex or standard base64 (padded or not) decodes to exactly
    /// the exporter length is used, hex first.
    pub fn parse(
        encoded: &[u8],
        profile: SrtpProfile,
        role: DtlsRole,
    ) -> Result<Self, KeyingError> {
        let bytes = decode(encoded, profile.keying_material_len())?;
        Self::from_exporter(&bytes, profile, role)
    }

    pub fn from_file(
        path: impl AsRef<Path>,
        profile: SrtpProfile,
        role: DtlsRole,
    ) -> Result<Self, KeyingError> {
        let path = path.as_ref();
        let raw = fs::read(path).map_err(|source| KeyingError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw, profile, role)
    }

    pub fn profile(&self) -> SrtpProfile {
        self.profile
    }

    pub fn local(&self) -> &SrtpEndpointKeys {
        &self.local
    }

    pub fn remote(&self) -> &SrtpEndpointKeys {
        &self.remote
    }
}

fn endpoint_keys(key: &[u8], salt: &[u8]) -> SrtpEndpointKeys {
    let mut master_key = [0u8; MASTER_KEY_LEN];
    let mut master_salt = [0u8; MASTER_SALT_LEN];
    master_key.copy_from_slice(key);
    master_salt.copy_from_slice(salt);
    SrtpEndpointKeys::new(master_key, master_salt)
}

fn decode(encoded: &[u8], expected_len: usize) -> Result<Vec<u8>, KeyingError> {
    let text = std::str::from_utf8(encoded).map_err(|_| KeyingError::InvalidEncoding)?;
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(KeyingError::InvalidEncoding);
    }

    let hex_text = compact
        .strip_prefix("0x")
        .or_else(|| compact.strip_prefix("0X"))
        .unwrap_or(&compact);
    let from_hex = hex::decode(hex_text).ok();
    let from_base64 = STANDARD
        .decode(&compact)
        .or_else(|_| STANDARD_NO_PAD.decode(&compact))
        .ok();

    // An exact-length decode wins; otherwise valid hex of the wrong size is
    // reported by its length before base64 is.
    match (from_hex, from_base64) {
        (Some(hex), _) if hex.len() == expected_len => Ok(hex),
        (_, Some(b64)) if b64.len() == expected_len => Ok(b64),
        (Some(hex), _) => Ok(hex),
        (None, Some(b64)) => Ok(b64),
        (None, None) => Err(KeyingError::InvalidEncoding),
    }
}
