use std::{io, path::PathBuf};

use thiserror::Error;

/// Failures turning exported keying material into per-direction master keys.
#[derive(Debug, Error)]
pub enum KeyingError {
    /// The input is neither hex nor base64.
    #[error("keying material is neither hex nor base64 encoded")]
    InvalidEncoding,

    /// Decoded fine, but not to the exporter length of the profile.
    #[error("keying material must be {expected} bytes, got {actual}")]
    MalformedKeyMaterial { expected: usize, actual: usize },

    #[error("could not read keying material from {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
