use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use crate::capture::{Transport, TransportProtocol};
use crate::dtls_srtp::KeyingMaterial;
use crate::log::LogSink;
use crate::pipeline::PacketKind;
use crate::srtp::utils::{rtcp_ssrc, rtp_ssrc};
use crate::srtp::{CryptoContext, CryptoError, SrtpEndpointKeys, SrtpProfile, SrtpSessionKeys};
use crate::stream::{Direction, EndpointFilter};
use crate::{sink_debug, sink_trace};

/// One direction of the captured session: a master key/salt, the endpoint
/// its packets are addressed to, and the crypto state of every SSRC seen.
///
/// The stream is the only owner of its contexts.
pub struct Stream {
    direction: Direction,
    filter: EndpointFilter,
    profile: SrtpProfile,
    session_keys: SrtpSessionKeys,
    contexts: HashMap<u32, CryptoContext>,
    logger: Arc<dyn LogSink>,
}

impl Stream {
    pub fn new(
        direction: Direction,
        master: &SrtpEndpointKeys,
        profile: SrtpProfile,
        filter: EndpointFilter,
        logger: Arc<dyn LogSink>,
    ) -> Result<Self, CryptoError> {
        let session_keys = SrtpSessionKeys::derive(master)?;
        sink_debug!(
            logger,
            "[Stream] {} stream for {} ready ({}, master {:?})",
            direction,
            filter,
            profile,
            master
        );
        Ok(Self {
            direction,
            filter,
            profile,
            session_keys,
            contexts: HashMap::new(),
            logger,
        })
    }

    /// Inbound streams use the remote key pair, outbound ones the local pair.
    pub fn from_keying_material(
        keys: &KeyingMaterial,
        direction: Direction,
        filter: EndpointFilter,
        logger: Arc<dyn LogSink>,
    ) -> Result<Self, CryptoError> {
        let master = match direction {
            Direction::Inbound => keys.remote(),
            Direction::Outbound => keys.local(),
        };
        Self::new(direction, master, keys.profile(), filter, logger)
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn filter(&self) -> &EndpointFilter {
        &self.filter
    }

    /// UDP packets whose destination satisfies the filter.
    pub fn matches(&self, transport: &Transport) -> bool {
        transport.protocol == TransportProtocol::Udp && self.filter.matches(&transport.dst)
    }

    /// Existing context for `ssrc`, or a fresh one (roc = 0) keyed with this
    /// stream's session keys.
    pub fn context_for(&mut self, ssrc: u32) -> &mut CryptoContext {
        match self.contexts.entry(ssrc) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => {
                sink_debug!(
                    self.logger,
                    "[Stream] {} new SSRC {:#010x}",
                    self.direction,
                    ssrc
                );
                e.insert(CryptoContext::new(
                    ssrc,
                    self.profile,
                    self.session_keys.clone(),
                ))
            }
        }
    }

    pub fn context(&self, ssrc: u32) -> Option<&CryptoContext> {
        self.contexts.get(&ssrc)
    }

    pub fn ssrc_count(&self) -> usize {
        self.contexts.len()
    }

    /// Classifies `payload` and decrypts it on the context of its SSRC.
    pub fn decrypt(&mut self, payload: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.decrypt_as(PacketKind::classify(payload), payload)
    }

    /// Decrypts a payload the caller has already classified.
    pub fn decrypt_as(&mut self, kind: PacketKind, payload: &[u8]) -> Result<Vec<u8>, CryptoError> {
        match kind {
            PacketKind::Rtp => {
                let ssrc = rtp_ssrc(payload)?;
                let direction = self.direction;
                let ctx = self.context_for(ssrc);
                let roc_before = ctx.roc();
                let plain = ctx.decrypt_rtp(payload)?;
                let roc_after = ctx.roc();
                let seq = ctx.highest_sequence_number();
                if roc_after != roc_before {
                    sink_debug!(
                        self.logger,
                        "[Stream] {} SSRC {:#010x} rolled over to ROC {} (seq {})",
                        direction,
                        ssrc,
                        roc_after,
                        seq
                    );
                }
                sink_trace!(
                    self.logger,
                    "[Stream] {} SRTP ok SSRC={:#010x} len={}",
                    direction,
                    ssrc,
                    plain.len()
                );
                Ok(plain)
            }
            PacketKind::Rtcp => {
                let ssrc = rtcp_ssrc(payload)?;
                let plain = self.context_for(ssrc).decrypt_rtcp(payload)?;
                sink_trace!(
                    self.logger,
                    "[Stream] {} SRTCP ok SSRC={:#010x} len={}",
                    self.direction,
                    ssrc,
                    plain.len()
                );
                Ok(plain)
            }
            PacketKind::Unknown => Err(CryptoError::MalformedPacket(
                "neither an SRTP nor an SRTCP packet",
            )),
        }
    }
}

/// Streams that should try `transport`, best first.
///
/// Only the streams with the most specific matching filter are returned, in
/// configuration order; the caller settles a tie by whichever authenticates
/// first.
pub fn candidate_streams(streams: &[Stream], transport: &Transport) -> Vec<usize> {
    let best = streams
        .iter()
        .filter(|s| s.matches(transport))
        .map(|s| s.filter().specificity())
        .max();

    match best {
        None => Vec::new(),
        Some(best) => streams
            .iter()
            .enumerate()
            .filter(|(_, s)| s.matches(transport) && s.filter().specificity() == best)
            .map(|(i, _)| i)
            .collect(),
    }
}
