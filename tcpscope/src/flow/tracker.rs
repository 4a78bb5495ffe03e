//! Sequence and acknowledgement tracking for one direction of a connection.
//!
//! The tracker follows the sequence numbers a sender uses and the acknowledgements its peer
//! returns. It does not emulate TCP. It looks for the traces of loss and of an incomplete capture:
//! segments that reuse old sequence space, gaps between consecutive segments, acknowledgements and
//! selective acknowledgements that do not fit what was sent.
//!
//! All of these are counted in [`SeqStats`]. None of them is an error of the analysis itself,
//! and every method always completes.
//!
//! [`SeqStats`]: struct.SeqStats.html
use core::fmt;

use crate::flow::histogram::LogHistogram;
use crate::flow::matcher::{AckMatcher, Sent};
use crate::time::{Duration, Instant};
use crate::wire::{InvalidDelta, SackBlock, TcpSeqNumber as SeqNumber};

/// Counters of one tracked direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SeqStats {
    /// Segments passed to `on_seq`.
    pub packets: u64,
    /// Segments carrying SYN or FIN.
    pub syn_fin: u64,
    /// Sequence space sent, retransmissions included.
    pub sent_bytes: u64,
    /// Segments reusing sequence space that was already sent.
    pub retransmit_packets: u64,
    /// Bytes of such segments.
    pub retransmit_bytes: u64,
    /// Segments not starting where the previous one ended.
    pub missing_packets: u64,
    /// Sequence or acknowledgement numbers too far from the expected values.
    pub bad_deltas: u64,
    /// Acknowledgements advancing the acknowledged point.
    pub acks: u64,
    /// Acknowledgements on segments without data.
    pub only_acks: u64,
    /// Bytes acknowledged in total.
    pub acked_bytes: u64,
    /// Selective acknowledgement blocks.
    pub sacks: u64,
    /// Blocks that were not consistent with the sent sequence space.
    pub bad_sacks: u64,
    /// Bytes covered by all blocks.
    pub sack_bytes: u64,
    /// Acknowledgements before any sent segment was seen.
    pub other_errors: u64,
    /// The largest distance of a segment from the acknowledged point.
    pub max_gap: u32,
}

/// How a segment relates to what was sent before.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqKind {
    /// The first segment of the direction.
    First,
    /// The segment starts where the previous one ended.
    Next,
    /// The segment starts at some other point after the previous one.
    ///
    /// Contains the distance to the expected sequence number, negative if overlapping.
    Gap(i64),
    /// The segment starts before the previous one.
    Retransmit,
    /// The sequence number is unrelated to the previous one.
    BadDelta(InvalidDelta),
}

/// The result of tracking a sent segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeqOutcome {
    /// Sequence space sent but not acknowledged, after the segment.
    pub in_flight: i32,
    /// How the segment continued the sequence space.
    pub kind: SeqKind,
}

/// A sent segment identified by an acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckMatch {
    /// Capture index of the acknowledged segment.
    pub packet: usize,
    /// Capture time of the acknowledged segment.
    pub sent: Instant,
    /// Time from the segment to its acknowledgement.
    pub rtt: Duration,
}

/// The result of tracking an acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// The acknowledgement is unrelated to the acknowledged point, which jumps to it regardless.
    BadDelta(InvalidDelta),
    /// The acknowledgement was within range.
    Acked {
        /// Distance from the previous acknowledged point. Negative for stale acknowledgements.
        delta: i32,
        /// The segment this acknowledgement answers, if it was remembered.
        matched: Option<AckMatch>,
    },
}

/// Why a selective acknowledgement block was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SackError {
    /// The block is empty, inverted, or reaches past everything sent.
    Invalid,
    /// The block starts before the acknowledged point.
    Late,
}

/// Sequence state of the sending side of one direction.
#[derive(Debug, Clone)]
pub struct Tracker {
    initialized: bool,
    start_time: Instant,
    seq: SeqNumber,
    last_data_length: u32,
    send_una: SeqNumber,
    send_una_time: Instant,
    matcher: AckMatcher,
    rtt: LogHistogram,
    stats: SeqStats,
}

impl SeqOutcome {
    /// Whether the segment was a retransmission.
    pub fn is_retransmit(&self) -> bool {
        self.kind == SeqKind::Retransmit
    }
}

impl AckOutcome {
    /// The round trip time sample, if the acknowledgement matched a segment.
    pub fn rtt(&self) -> Option<Duration> {
        match self {
            AckOutcome::Acked { matched: Some(matched), .. } => Some(matched.rtt),
            _ => None,
        }
    }
}

impl Tracker {
    /// Create a tracker collecting round trip times in `rtt`.
    ///
    /// At most `capacity` unacknowledged segments are remembered for matching.
    pub fn new(rtt: LogHistogram, capacity: usize) -> Self {
        Tracker {
            initialized: false,
            start_time: Instant::default(),
            seq: SeqNumber::default(),
            last_data_length: 0,
            send_una: SeqNumber::default(),
            send_una_time: Instant::default(),
            matcher: AckMatcher::new(capacity),
            rtt,
            stats: SeqStats::default(),
        }
    }

    /// Track a segment sent in this direction.
    ///
    /// `length` is the amount of payload of the segment. A SYN or FIN occupies one more unit of
    /// sequence space.
    pub fn on_seq(
        &mut self,
        packet: usize,
        time: Instant,
        seq: SeqNumber,
        length: u32,
        syn_or_fin: bool,
    ) -> SeqOutcome {
        self.stats.packets += 1;
        let first = !self.initialized;
        if first {
            self.initialized = true;
            self.start_time = time;
            self.seq = seq;
            self.send_una = seq;
            self.send_una_time = time;
        }

        let in_flight = self.in_flight();
        let delta = match seq.diff(self.seq) {
            Ok(delta) => delta,
            Err(err) => {
                self.stats.bad_deltas += 1;
                return SeqOutcome { in_flight, kind: SeqKind::BadDelta(err) };
            },
        };

        if delta < 0 {
            self.stats.sent_bytes += u64::from(length);
            self.stats.retransmit_packets += 1;
            self.stats.retransmit_bytes += u64::from(length);
            return SeqOutcome { in_flight, kind: SeqKind::Retransmit };
        }

        let kind = if first {
            SeqKind::First
        } else if delta as u32 != self.last_data_length {
            self.stats.missing_packets += 1;
            SeqKind::Gap(i64::from(delta) - i64::from(self.last_data_length))
        } else {
            SeqKind::Next
        };

        if syn_or_fin {
            self.stats.syn_fin += 1;
            self.last_data_length = length.wrapping_add(1);
        } else {
            self.last_data_length = length;
        }
        self.stats.sent_bytes += u64::from(length);
        self.seq = seq;
        self.matcher.add(Sent { seq, packet, time });

        if let Ok(gap) = self.seq.diff(self.send_una) {
            self.stats.max_gap = self.stats.max_gap.max(gap.max(0) as u32);
        }

        SeqOutcome { in_flight: self.in_flight(), kind }
    }

    /// Track an acknowledgement for this direction, sent by the peer.
    ///
    /// A matched segment contributes its round trip time to the histogram.
    pub fn on_ack(&mut self, time: Instant, ack: SeqNumber, with_data: bool) -> AckOutcome {
        if !self.initialized {
            self.stats.other_errors += 1;
        }

        let delta = match ack.diff(self.send_una) {
            Ok(delta) => delta,
            Err(err) => {
                self.stats.bad_deltas += 1;
                self.send_una = ack;
                self.send_una_time = time;
                return AckOutcome::BadDelta(err);
            },
        };

        if delta > 0 {
            self.stats.acked_bytes += delta as u64;
            self.stats.acks += 1;
        }
        if !with_data {
            self.stats.only_acks += 1;
        }

        let matched = self.matcher.take(ack).map(|sent| {
            let rtt = time.saturating_duration_since(sent.time);
            self.rtt.add(rtt.as_secs_f64());
            AckMatch { packet: sent.packet, sent: sent.time, rtt }
        });

        if delta >= 0 {
            self.send_una = ack;
            self.send_una_time = time;
        }

        AckOutcome::Acked { delta, matched }
    }

    /// Track a selective acknowledgement block for this direction, sent by the peer.
    ///
    /// Rejected blocks are counted as bad, but their width is still added to the SACK bytes.
    pub fn on_sack(&mut self, block: SackBlock) -> Result<(), SackError> {
        if !self.initialized {
            self.stats.other_errors += 1;
        }

        self.stats.sacks += 1;
        if let Ok(width) = block.right.diff(block.left) {
            self.stats.sack_bytes += width.max(0) as u64;
        }

        let result = self.check_sack(block);
        if result.is_err() {
            self.stats.bad_sacks += 1;
        }
        result
    }

    fn check_sack(&self, block: SackBlock) -> Result<(), SackError> {
        match block.right.diff(block.left) {
            Ok(width) if width > 0 => {},
            _ => return Err(SackError::Invalid),
        }
        match self.send_next().diff(block.right) {
            Ok(overlap) if overlap >= 0 => {},
            _ => return Err(SackError::Invalid),
        }
        match block.left.diff(self.send_una) {
            Ok(late) if late >= 0 => Ok(()),
            _ => Err(SackError::Late),
        }
    }

    /// The sequence number following the last new segment.
    pub fn send_next(&self) -> SeqNumber {
        self.seq + self.last_data_length
    }

    /// The highest acknowledged sequence number.
    pub fn send_una(&self) -> SeqNumber {
        self.send_una
    }

    /// The capture time at which the acknowledged point last advanced.
    pub fn send_una_time(&self) -> Instant {
        self.send_una_time
    }

    /// The start of the last new segment.
    pub fn seq(&self) -> SeqNumber {
        self.seq
    }

    /// Whether any segment was tracked yet.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// The capture time of the first segment.
    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    /// Sequence space sent but not yet acknowledged.
    pub fn in_flight(&self) -> i32 {
        match self.send_next().diff(self.send_una) {
            Ok(delta) | Err(InvalidDelta(delta)) => delta,
        }
    }

    /// The counters.
    pub fn stats(&self) -> &SeqStats {
        &self.stats
    }

    /// The round trip times of all matched acknowledgements, in seconds.
    pub fn rtt(&self) -> &LogHistogram {
        &self.rtt
    }

    /// Segments forgotten before they could be matched.
    pub fn evicted(&self) -> u64 {
        self.matcher.evicted()
    }
}

impl fmt::Display for SackError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SackError::Invalid => write!(f, "invalid SACK block"),
            SackError::Late => write!(f, "SACK block before the acknowledged point"),
        }
    }
}

impl std::error::Error for SackError { }

#[cfg(test)]
mod test {
    use super::*;

    fn tracker() -> Tracker {
        Tracker::new(LogHistogram::new(0.00001, 10.0, 6.0).unwrap(), 64)
    }

    fn at(micros: i64) -> Instant {
        Instant::from_micros(micros)
    }

    #[test]
    fn contiguous_send_next() {
        let mut tracker = tracker();
        let mut seq = SeqNumber(u32::max_value() - 3000);
        for (i, &length) in [1000u32, 1448, 0, 1448, 17, 0, 0, 1000].iter().enumerate() {
            let outcome = tracker.on_seq(i, at(i as i64), seq, length, false);
            assert!(!outcome.is_retransmit());
            assert_eq!(tracker.send_next(), seq + length);
            seq = seq + length;
        }
        assert_eq!(tracker.stats().missing_packets, 0);
        assert_eq!(tracker.stats().sent_bytes, 4913);
    }

    #[test]
    fn first_segment() {
        let mut tracker = tracker();
        let outcome = tracker.on_seq(0, at(0), SeqNumber(5000), 0, true);
        assert_eq!(outcome, SeqOutcome { in_flight: 1, kind: SeqKind::First });
        assert_eq!(tracker.send_una(), SeqNumber(5000));
        assert_eq!(tracker.send_next(), SeqNumber(5001));
        assert_eq!(tracker.stats().syn_fin, 1);
        assert_eq!(tracker.stats().bad_deltas, 0);
    }

    #[test]
    fn syn_with_maximal_length() {
        let mut tracker = tracker();
        let outcome = tracker.on_seq(0, at(0), SeqNumber(10), u32::max_value(), true);
        assert_eq!(outcome.kind, SeqKind::First);
        // The sequence space wraps around completely.
        assert_eq!(tracker.send_next(), SeqNumber(10));
        assert_eq!(tracker.stats().sent_bytes, u64::from(u32::max_value()));
        let outcome = tracker.on_seq(1, at(1), SeqNumber(10), 0, false);
        assert_eq!(outcome.kind, SeqKind::Next);
    }

    #[test]
    fn retransmit_keeps_state() {
        let mut tracker = tracker();
        tracker.on_seq(0, at(0), SeqNumber(1000), 100, false);
        tracker.on_seq(1, at(1), SeqNumber(1100), 100, false);
        let outcome = tracker.on_seq(2, at(2), SeqNumber(1000), 100, false);
        assert!(outcome.is_retransmit());
        assert_eq!(tracker.seq(), SeqNumber(1100));
        assert_eq!(tracker.send_next(), SeqNumber(1200));
        assert_eq!(tracker.stats().retransmit_packets, 1);
        assert_eq!(tracker.stats().retransmit_bytes, 100);

        // Continuing after the retransmit is not a gap.
        let outcome = tracker.on_seq(3, at(3), SeqNumber(1200), 100, false);
        assert_eq!(outcome.kind, SeqKind::Next);
    }

    #[test]
    fn gap_is_counted() {
        let mut tracker = tracker();
        tracker.on_seq(0, at(0), SeqNumber(1000), 100, false);
        let outcome = tracker.on_seq(1, at(1), SeqNumber(1300), 100, false);
        assert_eq!(outcome.kind, SeqKind::Gap(200));
        assert_eq!(tracker.stats().missing_packets, 1);
        assert_eq!(tracker.send_next(), SeqNumber(1400));
        assert_eq!(outcome.in_flight, 400);
    }

    #[test]
    fn bad_sequence_delta() {
        let mut tracker = tracker();
        tracker.on_seq(0, at(0), SeqNumber(1000), 100, false);
        let outcome = tracker.on_seq(1, at(1), SeqNumber(1000 + (1 << 31)), 100, false);
        assert!(matches!(outcome.kind, SeqKind::BadDelta(_)));
        assert_eq!(tracker.stats().bad_deltas, 1);
        assert_eq!(tracker.seq(), SeqNumber(1000));
    }

    #[test]
    fn ack_rtt() {
        let mut tracker = tracker();
        tracker.on_seq(0, at(1_000), SeqNumber(1), 0, true);
        tracker.on_seq(2, at(1_500), SeqNumber(2), 1000, false);
        tracker.on_seq(3, at(1_600), SeqNumber(1002), 1000, false);

        let outcome = tracker.on_ack(at(1_250), SeqNumber(2), false);
        assert_eq!(outcome, AckOutcome::Acked {
            delta: 1,
            matched: Some(AckMatch { packet: 2, sent: at(1_500), rtt: Duration::from_nanos(0) }),
        });

        let outcome = tracker.on_ack(at(31_600), SeqNumber(1002), false);
        assert_eq!(outcome.rtt(), Some(Duration::from_micros(30_000)));
        assert_eq!(tracker.send_una(), SeqNumber(1002));
        assert_eq!(tracker.in_flight(), 1000);
        assert_eq!(tracker.rtt().total(), 2);

        // The final ack matches nothing that starts there.
        let outcome = tracker.on_ack(at(40_000), SeqNumber(2002), false);
        assert_eq!(outcome.rtt(), None);
        assert_eq!(tracker.stats().acks, 3);
        assert_eq!(tracker.stats().acked_bytes, 2001);
        assert_eq!(tracker.stats().only_acks, 3);
    }

    #[test]
    fn ack_rtt_equals_time_difference() {
        let mut tracker = tracker();
        tracker.on_seq(0, at(100), SeqNumber(7), 10, false);
        tracker.on_seq(1, at(350), SeqNumber(17), 10, false);
        let outcome = tracker.on_ack(at(900), SeqNumber(17), true);
        assert_eq!(outcome.rtt(), Some(at(900) - at(350)));
        assert_eq!(tracker.stats().only_acks, 0);
    }

    #[test]
    fn bad_ack_moves_send_una() {
        let mut tracker = tracker();
        tracker.on_seq(0, at(0), SeqNumber(1000), 100, false);
        let outcome = tracker.on_ack(at(1), SeqNumber(1000 + (1 << 30)), false);
        assert!(matches!(outcome, AckOutcome::BadDelta(_)));
        assert_eq!(outcome.rtt(), None);
        assert_eq!(tracker.send_una(), SeqNumber(1000 + (1 << 30)));
        assert_eq!(tracker.stats().bad_deltas, 1);
    }

    #[test]
    fn stale_ack_keeps_send_una() {
        let mut tracker = tracker();
        tracker.on_seq(0, at(0), SeqNumber(1000), 100, false);
        tracker.on_seq(1, at(1), SeqNumber(1100), 100, false);
        tracker.on_ack(at(2), SeqNumber(1100), false);
        let outcome = tracker.on_ack(at(3), SeqNumber(1050), false);
        assert_eq!(outcome, AckOutcome::Acked { delta: -50, matched: None });
        assert_eq!(tracker.send_una(), SeqNumber(1100));
    }

    #[test]
    fn ack_before_seq() {
        let mut tracker = tracker();
        tracker.on_ack(at(0), SeqNumber(10), false);
        assert_eq!(tracker.stats().other_errors, 1);
    }

    #[test]
    fn sack_validation() {
        let mut tracker = tracker();
        tracker.on_seq(0, at(0), SeqNumber(1000), 1000, false);
        tracker.on_seq(1, at(1), SeqNumber(2000), 1000, false);
        tracker.on_ack(at(2), SeqNumber(1500), false);

        let block = |left, right| SackBlock { left: SeqNumber(left), right: SeqNumber(right) };
        assert_eq!(tracker.on_sack(block(2000, 2500)), Ok(()));
        assert_eq!(tracker.stats().sack_bytes, 500);

        // Empty
        assert_eq!(tracker.on_sack(block(2200, 2200)), Err(SackError::Invalid));
        assert_eq!(tracker.stats().sack_bytes, 500);
        // Inverted
        assert_eq!(tracker.on_sack(block(2500, 2000)), Err(SackError::Invalid));
        // Beyond send_next
        assert_eq!(tracker.on_sack(block(2500, 3001)), Err(SackError::Invalid));
        // Before send_una, still counted as bytes.
        assert_eq!(tracker.on_sack(block(1400, 1600)), Err(SackError::Late));

        assert_eq!(tracker.stats().sacks, 5);
        assert_eq!(tracker.stats().bad_sacks, 4);
        assert_eq!(tracker.stats().sack_bytes, 500 + 501 + 200);
    }

    #[test]
    fn max_gap() {
        let mut tracker = tracker();
        tracker.on_seq(0, at(0), SeqNumber(0), 100, false);
        tracker.on_seq(1, at(1), SeqNumber(100), 100, false);
        tracker.on_seq(2, at(2), SeqNumber(200), 100, false);
        assert_eq!(tracker.stats().max_gap, 200);
    }
}
