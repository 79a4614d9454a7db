use std::io;

use pcap_file::PcapError;
use thiserror::Error;

use crate::capture::CaptureFormat;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture I/O failed")]
    Io(#[from] io::Error),

    #[error("capture codec error")]
    Pcap(#[from] PcapError),

    /// First four bytes are not a pcap magic number or a pcapng section header.
    #[error("input is neither pcap nor pcapng (leading bytes {0:#010x})")]
    UnknownFormat(u32),

    #[error("cannot write a {record} record to a {format} capture")]
    FormatMismatch {
        record: &'static str,
        format: CaptureFormat,
    },

    /// Payload replacement would not fit the IP/UDP length fields.
    #[error("cannot rewrite packet headers: {0}")]
    Rewrite(&'static str),
}
