use crate::srtp::constants::SEQ_NUM_MEDIAN;

/// Index guessed for one incoming RTP packet, not yet applied to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexCandidate {
    pub roc: u32,
    pub seq: u16,
    /// 48-bit SRTP packet index, `roc << 16 | seq`.
    pub index: u64,
}

/// Rollover counter and highest sequence number of one SSRC (RFC 3711 §3.3.1).
///
/// Estimation never mutates; the caller applies a candidate with
/// [`commit`](Self::commit) once the packet has authenticated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RtpIndexTracker {
    roc: u32,
    highest_seq: u16,
    seen: bool,
}

impl RtpIndexTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn roc(&self) -> u32 {
        self.roc
    }

    pub fn highest_sequence_number(&self) -> u16 {
        self.highest_seq
    }

    /// RFC 3711 Appendix A guess for `seq` relative to the current state.
    pub fn estimate(&self, seq: u16) -> IndexCandidate {
        let roc = if !self.seen {
            0
        } else {
            let s_l = self.highest_seq as i32;
            let s = seq as i32;
            if s_l < SEQ_NUM_MEDIAN {
                if s - s_l > SEQ_NUM_MEDIAN {
                    self.roc.saturating_sub(1)
                } else {
                    self.roc
                }
            } else if s_l - SEQ_NUM_MEDIAN > s {
                self.roc.wrapping_add(1)
            } else {
                self.roc
            }
        };

        IndexCandidate {
            roc,
            seq,
            index: ((roc as u64) << 16) | seq as u64,
        }
    }

    /// Applies an authenticated candidate. Returns `true` if the ROC moved.
    pub fn commit(&mut self, c: IndexCandidate) -> bool {
        if !self.seen {
            self.seen = true;
            self.roc = c.roc;
            self.highest_seq = c.seq;
            return false;
        }

        if c.roc == self.roc.wrapping_add(1) {
            self.roc = c.roc;
            self.highest_seq = c.seq;
            true
        } else {
            if c.roc == self.roc && c.seq > self.highest_seq {
                self.highest_seq = c.seq;
            }
            false
        }
    }
}
