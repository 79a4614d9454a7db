use std::{
    fmt,
    io::{BufRead, BufReader, Read},
    time::Duration,
};

use byteorder::{BigEndian, ByteOrder};
use pcap_file::pcap::{PcapHeader, PcapReader, RawPcapPacket};
use pcap_file::{DataLink, PcapError, TsResolution};
use pcap_file::pcapng::blocks::section_header::SectionHeaderBlock;
use pcap_file::pcapng::{Block, PcapNgReader};

use crate::capture::capture_error::CaptureError;
use crate::capture::captured_packet::{CapturedPacket, Framing};

const PCAP_MAGIC_MICROS: u32 = 0xA1B2_C3D4;
const PCAP_MAGIC_NANOS: u32 = 0xA1B2_3C4D;
const PCAPNG_SECTION_HEADER: u32 = 0x0A0D_0D0A;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureFormat {
    Pcap,
    PcapNg,
}

impl fmt::Display for CaptureFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureFormat::Pcap => f.write_str("pcap"),
            CaptureFormat::PcapNg => f.write_str("pcapng"),
        }
    }
}

/// One record of a capture, in file order.
#[derive(Debug, Clone)]
pub enum CaptureRecord {
    Packet(CapturedPacket),
    /// pcapng block that carries no packet (section/interface headers,
    /// statistics, name resolution, ...). Written back verbatim.
    Block(Block<'static>),
}

/// Container-level header the writer needs to reproduce the input.
#[derive(Debug, Clone)]
pub enum CaptureHeader {
    Pcap(PcapHeader),
    PcapNg(SectionHeaderBlock<'static>),
}

enum ReaderKind<R: Read> {
    Pcap(PcapReader<R>),
    PcapNg(PcapNgReader<R>),
}

/// Lazy, single-pass reader over a pcap or pcapng stream.
///
/// The format is picked from the first four bytes; iteration yields records
/// in capture order and stops after the first error.
pub struct CaptureReader<R: Read> {
    kind: ReaderKind<BufReader<R>>,
    failed: bool,
}

impl<R: Read> CaptureReader<R> {
    pub fn new(input: R) -> Result<Self, CaptureError> {
        let mut input = BufReader::new(input);
        let head = input.fill_buf()?;
        if head.len() < 4 {
            return Err(CaptureError::UnknownFormat(0));
        }
        let magic = BigEndian::read_u32(&head[..4]);

        let kind = match magic {
            PCAPNG_SECTION_HEADER => ReaderKind::PcapNg(PcapNgReader::new(input)?),
            m if [PCAP_MAGIC_MICROS, PCAP_MAGIC_NANOS].contains(&m)
                || [PCAP_MAGIC_MICROS, PCAP_MAGIC_NANOS].contains(&m.swap_bytes()) =>
            {
                ReaderKind::Pcap(PcapReader::new(input)?)
            }
            other => return Err(CaptureError::UnknownFormat(other)),
        };

        Ok(Self {
            kind,
            failed: false,
        })
    }

    pub fn format(&self) -> CaptureFormat {
        match self.kind {
            ReaderKind::Pcap(_) => CaptureFormat::Pcap,
            ReaderKind::PcapNg(_) => CaptureFormat::PcapNg,
        }
    }

    /// Global header (pcap) or first section header (pcapng).
    pub fn header(&self) -> CaptureHeader {
        match &self.kind {
            ReaderKind::Pcap(r) => CaptureHeader::Pcap(r.header()),
            ReaderKind::PcapNg(r) => CaptureHeader::PcapNg(r.section().clone()),
        }
    }

    pub fn next_record(&mut self) -> Option<Result<CaptureRecord, CaptureError>> {
        match &mut self.kind {
            ReaderKind::Pcap(reader) => {
                let header = reader.header();
                let raw = match reader.next_raw_packet()? {
                    Ok(p) => p,
                    Err(e) => return Some(Err(e.into())),
                };
                Some(pcap_record(&header, raw).map(CaptureRecord::Packet))
            }
            ReaderKind::PcapNg(reader) => {
                let block = match reader.next_block()? {
                    Ok(b) => b.into_owned(),
                    Err(e) => return Some(Err(e.into())),
                };
                Some(Ok(ng_record(ng_link_type(reader, &block), block)))
            }
        }
    }
}

/// Builds a packet from a legacy pcap record.
///
/// A capture taken with a snaplen stores `orig_len` larger than the snaplen,
/// so only the stored length is checked against it.
fn pcap_record(
    header: &PcapHeader,
    raw: RawPcapPacket<'_>,
) -> Result<CapturedPacket, CaptureError> {
    if raw.incl_len > header.snaplen {
        return Err(PcapError::InvalidField("PacketHeader incl_len > snap_len").into());
    }
    let nanos = match header.ts_resolution {
        TsResolution::MicroSecond => raw.ts_frac.checked_mul(1_000),
        TsResolution::NanoSecond => Some(raw.ts_frac),
    }
    .filter(|&n| n < 1_000_000_000)
    .ok_or(PcapError::InvalidField("PacketHeader ts_frac out of range"))?;

    Ok(CapturedPacket::new(
        Duration::new(u64::from(raw.ts_sec), nanos),
        raw.orig_len,
        header.datalink,
        Framing::Pcap,
        raw.data.into_owned(),
    ))
}

/// Link type of the interface a pcapng packet block was captured on.
fn ng_link_type<R: Read>(reader: &PcapNgReader<R>, block: &Block<'_>) -> DataLink {
    let id = match block {
        Block::EnhancedPacket(epb) => epb.interface_id as usize,
        _ => 0,
    };
    reader
        .interfaces()
        .get(id)
        .map(|i| i.linktype)
        .unwrap_or(DataLink::Unknown(u32::MAX))
}

fn ng_record(link_type: DataLink, block: Block<'static>) -> CaptureRecord {
    match block {
        Block::EnhancedPacket(epb) => CaptureRecord::Packet(CapturedPacket::new(
            epb.timestamp,
            epb.original_len,
            link_type,
            Framing::Enhanced {
                interface_id: epb.interface_id,
                options: epb.options,
            },
            epb.data.into_owned(),
        )),
        Block::SimplePacket(spb) => CaptureRecord::Packet(CapturedPacket::new(
            Duration::ZERO,
            spb.original_len,
            link_type,
            Framing::Simple,
            spb.data.into_owned(),
        )),
        other => CaptureRecord::Block(other),
    }
}

impl<R: Read> Iterator for CaptureReader<R> {
    type Item = Result<CaptureRecord, CaptureError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.next_record();
        if matches!(item, Some(Err(_))) {
            self.failed = true;
        }
        item
    }
}
