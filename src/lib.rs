//! srtp-decrypt turns a captured DTLS-SRTP call back into cleartext RTP/RTCP.
//!
//! Given the keying material a DTLS endpoint exported for the call, it reads a
//! pcap or pcapng capture, decrypts every SRTP/SRTCP packet it can attribute
//! to a stream, and writes a capture with the same framing and the payloads
//! replaced by plaintext.
//!
//! The library is split by concern; [`run`] wires them together for one
//! offline pass and the `srtp-decrypt` binary puts a command line on top.

/// pcap / pcapng record reading and writing, link/IP/UDP dissection.
pub mod capture;
/// INI-style configuration file and the typed run configuration.
pub mod config;
/// Parsing of DTLS-SRTP exported keying material.
pub mod dtls_srtp;
/// Crate-level error type.
pub mod error;
/// Leveled logging through a background worker.
pub mod log;
/// Packet classification, policies and the lazy decrypt pipeline.
pub mod pipeline;
/// One offline decryption run.
pub mod run;
/// SRTP/SRTCP key derivation, rollover tracking and authenticated decryption.
pub mod srtp;
/// Directional streams owning per-SSRC crypto state.
pub mod stream;

pub use error::{Error, Result};
