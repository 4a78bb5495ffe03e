use std::collections::VecDeque;

use crate::time::Instant;
use crate::wire::TcpSeqNumber as SeqNumber;

/// A sent sequence number, remembered until it is acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sent {
    /// The sequence number of the segment start.
    pub seq: SeqNumber,
    /// Index of the packet within the capture.
    pub packet: usize,
    /// Capture time of the packet.
    pub time: Instant,
}

/// Correlates acknowledgements with the segments they acknowledge.
///
/// Entries are kept in sequence order in a ring of fixed capacity. When a long capture produces
/// more unacknowledged segments than that, the oldest entries are dropped and only counted.
#[derive(Debug, Clone)]
pub struct AckMatcher {
    sent: VecDeque<Sent>,
    capacity: usize,
    evicted: u64,
}

impl AckMatcher {
    /// Create a matcher retaining at most `capacity` outstanding segments.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        AckMatcher {
            sent: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            evicted: 0,
        }
    }

    /// The number of outstanding entries.
    pub fn len(&self) -> usize {
        self.sent.len()
    }

    /// Whether no segment is outstanding.
    pub fn is_empty(&self) -> bool {
        self.sent.is_empty()
    }

    /// The number of entries dropped due to the capacity.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    /// Remember a sent segment.
    ///
    /// Ignored unless the sequence number is strictly after the last one remembered.
    pub fn add(&mut self, sent: Sent) {
        if let Some(last) = self.sent.back() {
            match sent.seq.diff(last.seq) {
                Ok(delta) if delta > 0 => {},
                _ => return,
            }
        }

        if self.sent.len() == self.capacity {
            self.sent.pop_front();
            self.evicted += 1;
        }
        self.sent.push_back(sent);
    }

    /// Find the segment starting exactly at `ack`.
    ///
    /// Every entry up to the match is discarded, the matched one included: those segments are
    /// covered by the cumulative acknowledgement. Without a match only the entries before `ack` are
    /// discarded.
    pub fn take(&mut self, ack: SeqNumber) -> Option<Sent> {
        while let Some(front) = self.sent.front() {
            match front.seq.diff(ack) {
                Ok(delta) if delta > 0 => return None,
                Ok(0) => return self.sent.pop_front(),
                Ok(_) => { self.sent.pop_front(); },
                // Too far apart to be related, the ack is bogus and changes nothing.
                Err(_) => return None,
            }
        }
        None
    }
}
