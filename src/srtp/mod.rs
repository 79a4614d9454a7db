pub mod constants;
pub mod profile;
pub mod rollover;
pub mod session_keys;
pub mod srtp_context;
pub mod srtp_endpoint_keys;
pub mod srtp_error;
pub(crate) mod utils;

pub use profile::SrtpProfile;
pub use rollover::{IndexCandidate, RtpIndexTracker};
pub use session_keys::{SessionKeys, SrtpSessionKeys};
pub use srtp_context::CryptoContext;
pub use srtp_endpoint_keys::SrtpEndpointKeys;
pub use srtp_error::CryptoError;
