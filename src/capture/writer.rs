use std::{borrow::Cow, io::Write};

use pcap_file::pcap::{PcapPacket, PcapWriter};
use pcap_file::pcapng::blocks::enhanced_packet::EnhancedPacketBlock;
use pcap_file::pcapng::blocks::simple_packet::SimplePacketBlock;
use pcap_file::pcapng::{Block, PcapNgWriter};

use crate::capture::capture_error::CaptureError;
use crate::capture::captured_packet::{CapturedPacket, Framing};
use crate::capture::reader::{CaptureFormat, CaptureHeader, CaptureRecord};

enum WriterKind<W: Write> {
    Pcap(PcapWriter<W>),
    PcapNg(PcapNgWriter<W>),
}

/// Writes records in the container format and header they were read with.
pub struct CaptureWriter<W: Write> {
    kind: WriterKind<W>,
}

impl<W: Write> CaptureWriter<W> {
    /// Emits the global/section header immediately.
    pub fn new(output: W, header: CaptureHeader) -> Result<Self, CaptureError> {
        let kind = match header {
            CaptureHeader::Pcap(h) => WriterKind::Pcap(PcapWriter::with_header(output, h)?),
            CaptureHeader::PcapNg(shb) => {
                WriterKind::PcapNg(PcapNgWriter::with_section_header(output, shb)?)
            }
        };
        Ok(Self { kind })
    }

    pub fn format(&self) -> CaptureFormat {
        match self.kind {
            WriterKind::Pcap(_) => CaptureFormat::Pcap,
            WriterKind::PcapNg(_) => CaptureFormat::PcapNg,
        }
    }

    pub fn write_record(&mut self, record: &CaptureRecord) -> Result<(), CaptureError> {
        match record {
            CaptureRecord::Packet(p) => self.write_packet(p),
            CaptureRecord::Block(block) => match &mut self.kind {
                WriterKind::PcapNg(w) => {
                    w.write_block(block)?;
                    Ok(())
                }
                WriterKind::Pcap(_) => Err(CaptureError::FormatMismatch {
                    record: "pcapng block",
                    format: CaptureFormat::Pcap,
                }),
            },
        }
    }

    pub fn write_packet(&mut self, packet: &CapturedPacket) -> Result<(), CaptureError> {
        match (&mut self.kind, &packet.framing) {
            (WriterKind::Pcap(w), Framing::Pcap) => {
                w.write_packet(&PcapPacket::new(
                    packet.timestamp,
                    packet.orig_len,
                    packet.data(),
                ))?;
            }
            (
                WriterKind::PcapNg(w),
                Framing::Enhanced {
                    interface_id,
                    options,
                },
            ) => {
                let epb = EnhancedPacketBlock {
                    interface_id: *interface_id,
                    timestamp: packet.timestamp,
                    original_len: packet.orig_len,
                    data: Cow::Borrowed(packet.data()),
                    options: options.clone(),
                };
                w.write_block(&Block::EnhancedPacket(epb))?;
            }
            (WriterKind::PcapNg(w), Framing::Simple) => {
                let spb = SimplePacketBlock {
                    original_len: packet.orig_len,
                    data: Cow::Borrowed(packet.data()),
                };
                w.write_block(&Block::SimplePacket(spb))?;
            }
            (kind, _) => {
                let format = match kind {
                    WriterKind::Pcap(_) => CaptureFormat::Pcap,
                    WriterKind::PcapNg(_) => CaptureFormat::PcapNg,
                };
                let record = match packet.framing {
                    Framing::Pcap => "pcap packet",
                    _ => "pcapng packet",
                };
                return Err(CaptureError::FormatMismatch { record, format });
            }
        }
        Ok(())
    }

    /// Hands back the sink; the caller flushes it.
    pub fn into_inner(self) -> W {
        match self.kind {
            WriterKind::Pcap(w) => w.into_writer(),
            WriterKind::PcapNg(w) => w.into_inner(),
        }
    }
}
