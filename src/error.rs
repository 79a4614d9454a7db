use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::capture::CaptureError;
use crate::config::ConfigError;
use crate::dtls_srtp::KeyingError;
use crate::pipeline::PipelineError;
use crate::srtp::CryptoError;

/// Anything that ends a run early.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Keying(#[from] KeyingError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("cannot open {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
