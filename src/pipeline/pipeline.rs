use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::capture::{CaptureError, CaptureRecord, CapturedPacket};
use crate::log::LogSink;
use crate::pipeline::packet_kind::PacketKind;
use crate::pipeline::policy::{MalformedPolicy, Policies, StreamlessPolicy, UnknownPolicy};
use crate::srtp::CryptoError;
use crate::stream::{Stream, candidate_streams};
use crate::{sink_error, sink_trace, sink_warn};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// The malformed policy is `raise` and packet `packet` failed to decrypt.
    #[error("packet {packet} could not be decrypted, aborting")]
    Aborted {
        packet: u64,
        #[source]
        source: CryptoError,
    },
}

/// Counters for one pass over a capture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub packets: u64,
    /// pcapng blocks that carry no packet.
    pub blocks: u64,
    pub decrypted_rtp: u64,
    pub decrypted_rtcp: u64,
    pub unknown_passed: u64,
    pub unknown_dropped: u64,
    pub streamless_passed: u64,
    pub streamless_dropped: u64,
    pub malformed_passed: u64,
    pub malformed_dropped: u64,
}

impl RunSummary {
    pub fn decrypted(&self) -> u64 {
        self.decrypted_rtp + self.decrypted_rtcp
    }

    pub fn dropped(&self) -> u64 {
        self.unknown_dropped + self.streamless_dropped + self.malformed_dropped
    }

    /// Packets emitted unchanged.
    pub fn passed(&self) -> u64 {
        self.unknown_passed + self.streamless_passed + self.malformed_passed
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} packets: {} decrypted ({} rtp, {} rtcp), {} passed, {} dropped \
             (unknown {}/{}, streamless {}/{}, malformed {}/{} passed/dropped), {} other blocks",
            self.packets,
            self.decrypted(),
            self.decrypted_rtp,
            self.decrypted_rtcp,
            self.passed(),
            self.dropped(),
            self.unknown_passed,
            self.unknown_dropped,
            self.streamless_passed,
            self.streamless_dropped,
            self.malformed_passed,
            self.malformed_dropped,
            self.blocks,
        )
    }
}

/// Pull-based decryptor over a sequence of capture records.
///
/// Each input record yields at most one output record, in input order.
/// Non-packet records pass straight through. After an error the iterator is
/// fused.
pub struct DecryptPipeline<I> {
    records: I,
    streams: Vec<Stream>,
    policies: Policies,
    logger: Arc<dyn LogSink>,
    summary: RunSummary,
    finished: bool,
}

impl<I> DecryptPipeline<I>
where
    I: Iterator<Item = Result<CaptureRecord, CaptureError>>,
{
    pub fn new(
        records: impl IntoIterator<IntoIter = I>,
        streams: Vec<Stream>,
        policies: Policies,
        logger: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            records: records.into_iter(),
            streams,
            policies,
            logger,
            summary: RunSummary::default(),
            finished: false,
        }
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    pub fn streams(&self) -> &[Stream] {
        &self.streams
    }

    /// `Ok(None)` means the packet was dropped by policy.
    fn process(&mut self, packet: CapturedPacket) -> Result<Option<CapturedPacket>, PipelineError> {
        self.summary.packets += 1;
        let n = self.summary.packets;

        // A datagram cut short by the snaplen is classified on what was captured.
        let classified = match (packet.transport(), packet.captured_payload()) {
            (Some(t), Some(payload)) => Some((*t, PacketKind::classify(payload))),
            _ => None,
        };
        let (transport, kind) = match classified {
            Some((t, kind)) if kind != PacketKind::Unknown => (t, kind),
            _ => return Ok(self.on_unknown(n, packet)),
        };

        let candidates = candidate_streams(&self.streams, &transport);
        if candidates.is_empty() {
            return Ok(self.on_streamless(n, packet));
        }
        if packet.is_truncated() {
            let err = CryptoError::MalformedPacket("datagram truncated by the capture snaplen");
            return self.on_malformed(n, packet, err);
        }

        let payload = packet.payload().unwrap_or_default();
        let mut first_err = None;
        for idx in candidates {
            match self.streams[idx].decrypt_as(kind, payload) {
                Ok(plain) => {
                    match kind {
                        PacketKind::Rtcp => self.summary.decrypted_rtcp += 1,
                        _ => self.summary.decrypted_rtp += 1,
                    }
                    sink_trace!(
                        self.logger,
                        "[Pipeline] packet {} {:?} {} -> {} decrypted by {} stream",
                        n,
                        kind,
                        transport.src,
                        transport.dst,
                        self.streams[idx].direction()
                    );
                    return Ok(Some(packet.with_payload(&plain)?));
                }
                Err(e) => {
                    first_err.get_or_insert(e);
                }
            }
        }

        let err = first_err.unwrap_or(CryptoError::MalformedPacket("no stream tried the packet"));
        self.on_malformed(n, packet, err)
    }

    fn on_unknown(&mut self, n: u64, packet: CapturedPacket) -> Option<CapturedPacket> {
        match self.policies.unknown {
            UnknownPolicy::Pass => {
                self.summary.unknown_passed += 1;
                Some(packet)
            }
            UnknownPolicy::Drop => {
                sink_trace!(self.logger, "[Pipeline] packet {} not RTP/RTCP, dropped", n);
                self.summary.unknown_dropped += 1;
                None
            }
        }
    }

    fn on_streamless(&mut self, n: u64, packet: CapturedPacket) -> Option<CapturedPacket> {
        match self.policies.streamless {
            StreamlessPolicy::Pass => {
                self.summary.streamless_passed += 1;
                Some(packet)
            }
            StreamlessPolicy::Drop => {
                sink_trace!(self.logger, "[Pipeline] packet {} matches no stream, dropped", n);
                self.summary.streamless_dropped += 1;
                None
            }
        }
    }

    fn on_malformed(
        &mut self,
        n: u64,
        packet: CapturedPacket,
        err: CryptoError,
    ) -> Result<Option<CapturedPacket>, PipelineError> {
        match self.policies.malformed {
            MalformedPolicy::Pass => {
                sink_warn!(self.logger, "[Pipeline] packet {}: {} (passed through)", n, err);
                self.summary.malformed_passed += 1;
                Ok(Some(packet))
            }
            MalformedPolicy::Drop => {
                sink_warn!(self.logger, "[Pipeline] packet {}: {} (dropped)", n, err);
                self.summary.malformed_dropped += 1;
                Ok(None)
            }
            MalformedPolicy::Raise => {
                sink_error!(self.logger, "[Pipeline] packet {}: {} (aborting)", n, err);
                Err(PipelineError::Aborted {
                    packet: n,
                    source: err,
                })
            }
        }
    }
}

impl<I> Iterator for DecryptPipeline<I>
where
    I: Iterator<Item = Result<CaptureRecord, CaptureError>>,
{
    type Item = Result<CaptureRecord, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            let record = match self.records.next() {
                None => {
                    self.finished = true;
                    return None;
                }
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(e.into()));
                }
                Some(Ok(record)) => record,
            };

            match record {
                CaptureRecord::Block(block) => {
                    self.summary.blocks += 1;
                    return Some(Ok(CaptureRecord::Block(block)));
                }
                CaptureRecord::Packet(packet) => match self.process(packet) {
                    Ok(Some(out)) => return Some(Ok(CaptureRecord::Packet(out))),
                    Ok(None) => continue,
                    Err(e) => {
                        self.finished = true;
                        return Some(Err(e));
                    }
                },
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::capture::Framing;
    use crate::log::NoopLogSink;
    use crate::srtp::{CryptoContext, SrtpEndpointKeys, SrtpProfile};
    use crate::stream::Direction;
    use etherparse::PacketBuilder;
    use pcap_file::DataLink;
    use pcap_file::pcapng::Block;
    use pcap_file::pcapng::blocks::interface_description::InterfaceDescriptionBlock;
    use std::time::Duration;

    const SSRC: u32 = 0x1234_5678;
    const CALLEE: ([u8; 4], u16) = ([192, 168, 121, 234], 60401);
    const CALLER: ([u8; 4], u16) = ([10, 0, 0, 9], 5000);

    fn keys(byte: u8) -> SrtpEndpointKeys {
        SrtpEndpointKeys::new([byte; 16], [byte; 14])
    }

    fn stream(byte: u8, filter: &str) -> Stream {
        Stream::new(
            Direction::Inbound,
            &keys(byte),
            SrtpProfile::default(),
            filter.parse().unwrap(),
            Arc::new(NoopLogSink),
        )
        .unwrap()
    }

    fn rtp(seq: u16) -> Vec<u8> {
        let mut p = vec![0x80, 0x6F];
        p.extend_from_slice(&seq.to_be_bytes());
        p.extend_from_slice(&[0, 0, 1, 0]);
        p.extend_from_slice(&SSRC.to_be_bytes());
        p.extend_from_slice(b"twenty bytes of opus");
        p
    }

    fn protected(byte: u8, seq: u16) -> Vec<u8> {
        CryptoContext::derive(&keys(byte), SrtpProfile::default(), SSRC)
            .unwrap()
            .protect_rtp(&rtp(seq), 0)
            .unwrap()
    }

    fn udp(src: ([u8; 4], u16), dst: ([u8; 4], u16), payload: &[u8]) -> CaptureRecord {
        let builder = PacketBuilder::ethernet2([2; 6], [4; 6])
            .ipv4(src.0, dst.0, 64)
            .udp(src.1, dst.1);
        let mut frame = Vec::new();
        builder.write(&mut frame, payload).unwrap();
        let len = frame.len() as u32;
        CaptureRecord::Packet(CapturedPacket::new(
            Duration::from_millis(20),
            len,
            DataLink::ETHERNET,
            Framing::Pcap,
            frame,
        ))
    }

    /// `record` as a capture with the given snaplen would have stored it.
    fn snapped(record: CaptureRecord, snaplen: usize) -> CaptureRecord {
        match record {
            CaptureRecord::Packet(p) => CaptureRecord::Packet(CapturedPacket::new(
                p.timestamp,
                p.orig_len,
                p.link_type,
                p.framing.clone(),
                p.data()[..snaplen].to_vec(),
            )),
            other => other,
        }
    }

    fn run(
        records: Vec<CaptureRecord>,
        streams: Vec<Stream>,
        policies: Policies,
    ) -> (Vec<Result<CaptureRecord, PipelineError>>, RunSummary) {
        let mut pipeline = DecryptPipeline::new(
            records.into_iter().map(Ok::<_, CaptureError>),
            streams,
            policies,
            Arc::new(NoopLogSink),
        );
        let out: Vec<_> = pipeline.by_ref().collect();
        (out, *pipeline.summary())
    }

    fn payload_of(record: &Result<CaptureRecord, PipelineError>) -> Vec<u8> {
        match record {
            Ok(CaptureRecord::Packet(p)) => p.payload().unwrap().to_vec(),
            other => panic!("expected a packet, got {other:?}"),
        }
    }

    #[test]
    fn decrypts_matching_packets_in_order() {
        let records = vec![
            udp(CALLER, CALLEE, &protected(1, 10)),
            udp(CALLER, CALLEE, &protected(1, 11)),
        ];
        let streams = vec![stream(1, "192.168.121.234:60401")];
        let (out, summary) = run(records, streams, Policies::default());
        assert_eq!(out.len(), 2);
        assert_eq!(payload_of(&out[0]), rtp(10));
        assert_eq!(payload_of(&out[1]), rtp(11));
        assert_eq!(summary.decrypted_rtp, 2);
        assert_eq!(summary.packets, 2);
    }

    #[test]
    fn streamless_policy_decides_unmatched_packets() {
        let records = || {
            vec![
                udp(CALLER, CALLEE, &protected(1, 1)),
                udp(CALLEE, CALLER, &protected(2, 1)),
            ]
        };
        let streams = || vec![stream(1, "192.168.121.234:60401")];

        let drop = Policies {
            streamless: StreamlessPolicy::Drop,
            ..Policies::default()
        };
        let (out, summary) = run(records(), streams(), drop);
        assert_eq!(out.len(), 1);
        assert_eq!(payload_of(&out[0]), rtp(1));
        assert_eq!(summary.streamless_dropped, 1);

        let (out, summary) = run(records(), streams(), Policies::default());
        assert_eq!(out.len(), 2);
        assert_eq!(payload_of(&out[1]), protected(2, 1));
        assert_eq!(summary.streamless_passed, 1);
    }

    #[test]
    fn unknown_payloads_follow_unknown_policy() {
        let stun = [0x00, 0x01, 0x00, 0x00, 0x21, 0x12, 0xA4, 0x42];
        let records = || vec![udp(CALLER, CALLEE, &stun)];

        let (out, summary) = run(records(), vec![stream(1, "*")], Policies::default());
        assert_eq!(payload_of(&out[0]), stun);
        assert_eq!(summary.unknown_passed, 1);

        let drop = Policies {
            unknown: UnknownPolicy::Drop,
            ..Policies::default()
        };
        let (out, summary) = run(records(), vec![stream(1, "*")], drop);
        assert!(out.is_empty());
        assert_eq!(summary.unknown_dropped, 1);
    }

    #[test]
    fn malformed_packets_are_dropped_by_default() {
        let mut bad = protected(1, 2);
        bad[14] ^= 0x01;
        let records = vec![
            udp(CALLER, CALLEE, &protected(1, 1)),
            udp(CALLER, CALLEE, &bad),
            udp(CALLER, CALLEE, &protected(1, 3)),
        ];
        let (out, summary) = run(records, vec![stream(1, "*")], Policies::default());
        assert_eq!(out.len(), 2);
        assert_eq!(payload_of(&out[1]), rtp(3));
        assert_eq!(summary.malformed_dropped, 1);
    }

    #[test]
    fn malformed_pass_keeps_ciphertext() {
        let records = vec![udp(CALLER, CALLEE, &protected(9, 1))];
        let pass = Policies {
            malformed: MalformedPolicy::Pass,
            ..Policies::default()
        };
        let (out, summary) = run(records, vec![stream(1, "*")], pass);
        assert_eq!(payload_of(&out[0]), protected(9, 1));
        assert_eq!(summary.malformed_passed, 1);
    }

    #[test]
    fn malformed_packets_are_logged_as_warnings() {
        let sink = Arc::new(crate::log::MemoryLogSink::new());
        let mut pipeline = DecryptPipeline::new(
            vec![Ok::<_, CaptureError>(udp(CALLER, CALLEE, &protected(9, 1)))],
            vec![stream(1, "*")],
            Policies::default(),
            sink.clone(),
        );
        assert!(pipeline.next().is_none());
        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].0, crate::log::LogLevel::Warn);
        assert!(lines[0].1.contains("packet 1"));
    }

    #[test]
    fn raise_aborts_and_fuses() {
        let records = vec![
            udp(CALLER, CALLEE, &protected(1, 1)),
            udp(CALLER, CALLEE, &protected(9, 2)),
            udp(CALLER, CALLEE, &protected(1, 3)),
        ];
        let raise = Policies {
            malformed: MalformedPolicy::Raise,
            ..Policies::default()
        };
        let (out, summary) = run(records, vec![stream(1, "*")], raise);
        assert_eq!(out.len(), 2);
        assert_eq!(payload_of(&out[0]), rtp(1));
        match &out[1] {
            Err(PipelineError::Aborted { packet, source }) => {
                assert_eq!(*packet, 2);
                assert!(source.is_auth_failure());
            }
            other => panic!("expected abort, got {other:?}"),
        }
        assert_eq!(summary.packets, 2);
    }

    #[test]
    fn snaplen_cut_packets_follow_the_malformed_policy() {
        let cut = || vec![snapped(udp(CALLER, CALLEE, &protected(1, 1)), 60)];
        let raise = Policies {
            malformed: MalformedPolicy::Raise,
            unknown: UnknownPolicy::Drop,
            ..Policies::default()
        };
        let (out, summary) = run(cut(), vec![stream(1, "*")], raise);
        assert_eq!(out.len(), 1);
        match &out[0] {
            Err(PipelineError::Aborted { packet, source }) => {
                assert_eq!(*packet, 1);
                assert!(matches!(source, CryptoError::MalformedPacket(_)));
            }
            other => panic!("expected abort, got {other:?}"),
        }
        assert_eq!(summary.unknown_dropped, 0);

        let (out, summary) = run(cut(), vec![stream(1, "*")], Policies::default());
        assert_eq!(summary.malformed_dropped, 1);
        assert!(out.is_empty());
    }

    #[test]
    fn passed_snaplen_cut_packets_are_untouched() {
        let original = match snapped(udp(CALLER, CALLEE, &protected(1, 4)), 60) {
            CaptureRecord::Packet(p) => p,
            other => panic!("expected a packet, got {other:?}"),
        };
        let pass = Policies {
            malformed: MalformedPolicy::Pass,
            ..Policies::default()
        };
        let (out, summary) = run(
            vec![CaptureRecord::Packet(original.clone())],
            vec![stream(1, "*")],
            pass,
        );
        match &out[0] {
            Ok(CaptureRecord::Packet(p)) => assert_eq!(p, &original),
            other => panic!("expected a packet, got {other:?}"),
        }
        assert_eq!(summary.malformed_passed, 1);
    }

    #[test]
    fn snaplen_cut_packets_without_a_stream_are_streamless() {
        let records = vec![snapped(udp(CALLEE, CALLER, &protected(1, 1)), 60)];
        let streams = vec![stream(1, "192.168.121.234:60401")];
        let (out, summary) = run(records, streams, Policies::default());
        assert_eq!(out.len(), 1);
        assert_eq!(summary.streamless_passed, 1);
        assert_eq!(summary.malformed_dropped, 0);
    }

    #[test]
    fn tied_streams_are_settled_by_authentication() {
        let records = vec![udp(CALLER, CALLEE, &protected(2, 7))];
        let (out, summary) = run(records, vec![stream(1, "*"), stream(2, "*")], Policies::default());
        assert_eq!(payload_of(&out[0]), rtp(7));
        assert_eq!(summary.decrypted_rtp, 1);
        assert_eq!(summary.malformed_dropped, 0);
    }

    #[test]
    fn failed_candidate_keeps_its_state() {
        let streams = vec![stream(1, "*"), stream(2, "*")];
        let mut pipeline = DecryptPipeline::new(
            vec![Ok::<_, CaptureError>(udp(CALLER, CALLEE, &protected(2, 7)))],
            streams,
            Policies::default(),
            Arc::new(NoopLogSink),
        );
        assert!(pipeline.next().unwrap().is_ok());
        let first = pipeline.streams()[0].context(SSRC).unwrap();
        assert_eq!(first.highest_sequence_number(), 0);
        let second = pipeline.streams()[1].context(SSRC).unwrap();
        assert_eq!(second.highest_sequence_number(), 7);
    }

    #[test]
    fn blocks_pass_through_and_capture_errors_fuse() {
        let idb = Block::InterfaceDescription(InterfaceDescriptionBlock {
            linktype: DataLink::ETHERNET,
            snaplen: 0,
            options: vec![],
        });
        let records = vec![
            Ok(CaptureRecord::Block(idb)),
            Err(CaptureError::UnknownFormat(7)),
            Ok(udp(CALLER, CALLEE, &protected(1, 1))),
        ];
        let mut pipeline = DecryptPipeline::new(
            records,
            vec![stream(1, "*")],
            Policies::default(),
            Arc::new(NoopLogSink),
        );
        assert!(matches!(pipeline.next(), Some(Ok(CaptureRecord::Block(_)))));
        assert!(matches!(pipeline.next(), Some(Err(PipelineError::Capture(_)))));
        assert!(pipeline.next().is_none());
        assert_eq!(pipeline.summary().blocks, 1);
        assert_eq!(pipeline.summary().packets, 0);
    }
}
