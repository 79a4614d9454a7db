#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use etherparse::{Ipv4HeaderSlice, PacketBuilder, SlicedPacket, TransportSlice};
use pcap_file::DataLink;
use pcap_file::pcap::{PcapHeader, PcapPacket, PcapWriter};
use pcap_file::pcapng::blocks::enhanced_packet::EnhancedPacketBlock;
use pcap_file::pcapng::blocks::interface_description::InterfaceDescriptionBlock;
use pcap_file::pcapng::{Block, PcapNgWriter};

use srtp_decrypt::Error;
use srtp_decrypt::capture::{CaptureReader, CaptureRecord};
use srtp_decrypt::config::RunConfig;
use srtp_decrypt::dtls_srtp::{DtlsRole, KeyingMaterial};
use srtp_decrypt::log::{LogLevel, MemoryLogSink, NoopLogSink};
use srtp_decrypt::pipeline::{MalformedPolicy, PipelineError, StreamlessPolicy};
use srtp_decrypt::run::{decrypt_capture, run};
use srtp_decrypt::srtp::{CryptoContext, SrtpEndpointKeys, SrtpProfile};

const CLIENT_KEY: [u8; 16] = [0x11; 16];
const SERVER_KEY: [u8; 16] = [0x22; 16];
const CLIENT_SALT: [u8; 14] = [0x33; 14];
const SERVER_SALT: [u8; 14] = [0x44; 14];

const SSRC: u32 = 0x5EED_0001;
/// Our (DTLS client) receiving endpoint.
const LOCAL: ([u8; 4], u16) = ([192, 168, 121, 234], 60401);
const PEER: ([u8; 4], u16) = ([192, 168, 121, 1], 50000);
const ELSEWHERE: ([u8; 4], u16) = ([10, 9, 8, 7], 4000);

fn exporter() -> Vec<u8> {
    [&CLIENT_KEY[..], &SERVER_KEY, &CLIENT_SALT, &SERVER_SALT].concat()
}

fn keying() -> KeyingMaterial {
    KeyingMaterial::from_exporter(&exporter(), SrtpProfile::default(), DtlsRole::Client).unwrap()
}

/// What the peer (DTLS server) uses to protect what it sends us.
fn peer_sender() -> CryptoContext {
    CryptoContext::derive(
        &SrtpEndpointKeys::new(SERVER_KEY, SERVER_SALT),
        SrtpProfile::default(),
        SSRC,
    )
    .unwrap()
}

fn rtp(seq: u16) -> Vec<u8> {
    let mut p = vec![0x80, 0x60];
    p.extend_from_slice(&seq.to_be_bytes());
    p.extend_from_slice(&(u32::from(seq) * 960).to_be_bytes());
    p.extend_from_slice(&SSRC.to_be_bytes());
    p.extend_from_slice(&[seq as u8; 48]);
    p
}

fn srtp(seq: u16, roc: u32) -> Vec<u8> {
    peer_sender().protect_rtp(&rtp(seq), roc).unwrap()
}

fn frame(src: ([u8; 4], u16), dst: ([u8; 4], u16), payload: &[u8]) -> Vec<u8> {
    let builder = PacketBuilder::ethernet2([0x02; 6], [0x04; 6])
        .ipv4(src.0, dst.0, 64)
        .udp(src.1, dst.1);
    let mut v = Vec::new();
    builder.write(&mut v, payload).unwrap();
    v
}

fn pcap(frames: &[Vec<u8>]) -> Vec<u8> {
    let header = PcapHeader {
        datalink: DataLink::ETHERNET,
        ..Default::default()
    };
    let mut w = PcapWriter::with_header(Vec::new(), header).unwrap();
    for (i, f) in frames.iter().enumerate() {
        let ts = Duration::from_millis(1_700_000_000_000 + 20 * i as u64);
        w.write_packet(&PcapPacket::new(ts, f.len() as u32, f)).unwrap();
    }
    w.into_writer()
}

fn decrypt(input: &[u8], config: &RunConfig) -> (Vec<u8>, Result<srtp_decrypt::pipeline::RunSummary, Error>) {
    let mut out = Vec::new();
    let result = decrypt_capture(input, &mut out, &keying(), config, Arc::new(NoopLogSink));
    (out, result)
}

fn packets(capture: &[u8]) -> Vec<srtp_decrypt::capture::CapturedPacket> {
    CaptureReader::new(capture)
        .unwrap()
        .filter_map(|r| match r.unwrap() {
            CaptureRecord::Packet(p) => Some(p),
            CaptureRecord::Block(_) => None,
        })
        .collect()
}

fn inbound_only(streamless: StreamlessPolicy) -> RunConfig {
    let mut config = RunConfig::default();
    config.inbound = "192.168.121.234:60401".parse().unwrap();
    config.direction = "in".parse().unwrap();
    config.policies.streamless = streamless;
    config
}

#[test]
fn streamless_drop_leaves_exactly_the_decrypted_packet() {
    let input = pcap(&[frame(PEER, LOCAL, &srtp(1, 0)), frame(PEER, ELSEWHERE, &srtp(2, 0))]);

    let (out, summary) = decrypt(&input, &inbound_only(StreamlessPolicy::Drop));
    let summary = summary.unwrap();

    let out = packets(&out);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].payload().unwrap(), rtp(1).as_slice());
    assert_eq!(summary.decrypted_rtp, 1);
    assert_eq!(summary.streamless_dropped, 1);
}

#[test]
fn streamless_pass_keeps_the_unmatched_packet_untouched() {
    let unmatched = frame(PEER, ELSEWHERE, &srtp(2, 0));
    let input = pcap(&[frame(PEER, LOCAL, &srtp(1, 0)), unmatched.clone()]);

    let (out, summary) = decrypt(&input, &inbound_only(StreamlessPolicy::Pass));
    assert_eq!(summary.unwrap().streamless_passed, 1);

    let in_packets = packets(&input);
    let out = packets(&out);
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].payload().unwrap(), rtp(1).as_slice());
    assert_eq!(out[1].data(), unmatched.as_slice());
    assert_eq!(out[1].timestamp, in_packets[1].timestamp);
}

#[test]
fn raise_stops_output_at_the_corrupted_packet() {
    let mut corrupted = srtp(2, 0);
    let last = corrupted.len() - 1;
    corrupted[last] ^= 0x80;
    let input = pcap(&[
        frame(PEER, LOCAL, &srtp(1, 0)),
        frame(PEER, LOCAL, &corrupted),
        frame(PEER, LOCAL, &srtp(3, 0)),
    ]);

    let mut config = inbound_only(StreamlessPolicy::Pass);
    config.policies.malformed = MalformedPolicy::Raise;
    let (out, result) = decrypt(&input, &config);

    match result {
        Err(Error::Pipeline(PipelineError::Aborted { packet, source })) => {
            assert_eq!(packet, 2);
            assert!(source.is_auth_failure());
        }
        other => panic!("expected an abort, got {other:?}"),
    }
    let out = packets(&out);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].payload().unwrap(), rtp(1).as_slice());
}

#[test]
fn rerunning_gives_identical_bytes() {
    let input = pcap(&[
        frame(PEER, LOCAL, &srtp(7, 0)),
        frame(PEER, ELSEWHERE, &[0x00, 0x01, 0x00, 0x00]),
        frame(PEER, LOCAL, &srtp(8, 0)),
    ]);
    let config = inbound_only(StreamlessPolicy::Pass);

    let (first, r1) = decrypt(&input, &config);
    let (second, r2) = decrypt(&input, &config);
    assert_eq!(r1.unwrap(), r2.unwrap());
    assert_eq!(first, second);
}

#[test]
fn rollover_within_a_capture() {
    let seqs: [(u16, u32); 5] = [(65533, 0), (65534, 0), (65535, 0), (0, 1), (1, 1)];
    let frames: Vec<_> = seqs
        .iter()
        .map(|&(seq, roc)| frame(PEER, LOCAL, &srtp(seq, roc)))
        .collect();

    let (out, summary) = decrypt(&pcap(&frames), &RunConfig::default());
    assert_eq!(summary.unwrap().decrypted_rtp, 5);
    let out = packets(&out);
    for (p, &(seq, _)) in out.iter().zip(&seqs) {
        assert_eq!(p.payload().unwrap(), rtp(seq).as_slice());
    }
}

#[test]
fn outbound_packets_use_the_local_keys() {
    let local_sender = CryptoContext::derive(
        &SrtpEndpointKeys::new(CLIENT_KEY, CLIENT_SALT),
        SrtpProfile::default(),
        SSRC,
    )
    .unwrap();
    let input = pcap(&[
        frame(LOCAL, PEER, &local_sender.protect_rtp(&rtp(40), 0).unwrap()),
        frame(PEER, LOCAL, &srtp(41, 0)),
    ]);

    let mut config = RunConfig::default();
    config.inbound = "192.168.121.234:60401".parse().unwrap();
    config.outbound = "192.168.121.1:50000".parse().unwrap();
    let (out, summary) = decrypt(&input, &config);

    assert_eq!(summary.unwrap().decrypted_rtp, 2);
    let out = packets(&out);
    assert_eq!(out[0].payload().unwrap(), rtp(40).as_slice());
    assert_eq!(out[1].payload().unwrap(), rtp(41).as_slice());
}

#[test]
fn pcapng_srtcp_is_decrypted_and_headers_fixed() {
    let mut sr = vec![0x80, 0xC8, 0x00, 0x06];
    sr.extend_from_slice(&SSRC.to_be_bytes());
    sr.extend_from_slice(&[0xAB; 20]);
    let protected = peer_sender().protect_rtcp(&sr, 5, true).unwrap();
    let data = frame(PEER, LOCAL, &protected);

    let mut w = PcapNgWriter::new(Vec::new()).unwrap();
    w.write_block(&Block::InterfaceDescription(InterfaceDescriptionBlock {
        linktype: DataLink::ETHERNET,
        snaplen: 0xFFFF,
        options: vec![],
    }))
    .unwrap();
    w.write_block(&Block::EnhancedPacket(EnhancedPacketBlock {
        interface_id: 0,
        timestamp: Duration::from_micros(1_700_000_000_000_000),
        original_len: data.len() as u32,
        data: Cow::Borrowed(&data),
        options: vec![],
    }))
    .unwrap();
    let input = w.into_inner();

    let (out, summary) = decrypt(&input, &RunConfig::default());
    let summary = summary.unwrap();
    assert_eq!(summary.decrypted_rtcp, 1);
    assert_eq!(summary.blocks, 1);

    let out = packets(&out);
    let p = &out[0];
    assert_eq!(p.payload().unwrap(), sr.as_slice());
    assert_eq!(p.data().len(), data.len() - 14);
    assert_eq!(p.orig_len as usize, data.len() - 14);

    let sliced = SlicedPacket::from_ethernet(p.data()).unwrap();
    match sliced.transport {
        Some(TransportSlice::Udp(udp)) => {
            assert_eq!(udp.length() as usize, 8 + sr.len());
        }
        other => panic!("expected UDP, got {other:?}"),
    }
    let ip = Ipv4HeaderSlice::from_slice(&p.data()[14..]).unwrap();
    assert_eq!(ip.total_len() as usize, 20 + 8 + sr.len());
    assert_eq!(ip.header_checksum(), ip.to_header().calc_header_checksum());
}

#[test]
fn file_run_with_hex_keys_and_logging() {
    let dir = std::env::temp_dir().join(format!("srtp_decrypt_e2e_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let keys_path = dir.join("call.keys");
    let input_path = dir.join("call.pcap");
    let output_path = dir.join("call.decrypted.pcap");

    std::fs::write(&keys_path, format!("{}\n", hex::encode(exporter()))).unwrap();
    std::fs::write(
        &input_path,
        pcap(&[frame(PEER, LOCAL, &srtp(1, 0)), frame(PEER, LOCAL, &srtp(2, 0))]),
    )
    .unwrap();

    let sink = Arc::new(MemoryLogSink::new());
    let summary = run(
        &keys_path,
        &input_path,
        &output_path,
        &RunConfig::default(),
        sink.clone(),
    )
    .unwrap();
    assert_eq!(summary.decrypted_rtp, 2);

    let out = packets(&std::fs::read(&output_path).unwrap());
    assert_eq!(out.len(), 2);
    assert_eq!(out[1].payload().unwrap(), rtp(2).as_slice());

    let lines = sink.lines();
    assert!(
        lines
            .iter()
            .any(|(level, msg)| *level == LogLevel::Info && msg.contains("2 decrypted"))
    );
}
