//! Reporting of individual events while a capture is processed.
//!
//! The counters of a [`Summary`] tell how often something happened. An [`Observer`] is told
//! *where*: it receives the capture index of every packet that failed to decode and of every
//! anomaly found in the segment stream. The default methods do nothing, so an implementation only
//! overrides what it is interested in.
//!
//! [`Summary`]: ../struct.Summary.html
//! [`Observer`]: trait.Observer.html
use core::fmt;
use std::net::IpAddr;

use crate::flow::tracker::SackError;
use crate::wire::{Error, InvalidDelta, IpProtocol};

/// One of the two endpoints of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Side {
    /// The source of the first TCP segment.
    Left,
    /// The destination of the first TCP segment.
    Right,
}

/// Something unexpected in an otherwise well formed segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anomaly {
    /// The segment reused sequence space.
    Retransmit {
        /// Payload length of the segment.
        bytes: u32,
    },
    /// The segment did not start where the previous one ended.
    MissingPacket {
        /// Distance to the expected sequence number.
        gap: i64,
    },
    /// A sequence or acknowledgement number far from the expected one.
    BadDelta(InvalidDelta),
    /// A selective acknowledgement block of the peer was rejected.
    BadSack(SackError),
    /// The segment ended beyond the window the peer advertised.
    SendLimitExceeded {
        /// Sequence space beyond the limit.
        by: i32,
    },
    /// The TTL differs from the first one of the side.
    TtlChange {
        /// The first TTL seen.
        first: u8,
        /// The TTL of this segment.
        now: u8,
    },
    /// The source address belongs to neither side.
    UnknownAddress(IpAddr),
    /// A port differs from the one first seen for the side.
    PortMismatch {
        /// The port recorded for the side.
        expected: u16,
        /// The port of this segment.
        found: u16,
    },
    /// The IPv6 header chain contained unregistered extension headers.
    UnknownExtension {
        /// The number of such headers.
        count: u8,
        /// The last of them.
        last: Option<IpProtocol>,
    },
    /// The options of the segment could not be parsed completely.
    BadOption,
}

/// Receives events as a capture is processed.
pub trait Observer {
    /// A packet was skipped, or the capture ended, because of a structural error.
    fn decode_error(&mut self, packet: usize, error: &Error) {
        let _ = (packet, error);
    }

    /// An anomaly was found in a packet.
    ///
    /// The side is `None` for packets that could not be attributed to either side.
    fn anomaly(&mut self, packet: usize, side: Option<Side>, anomaly: Anomaly) {
        let _ = (packet, side, anomaly);
    }
}

/// Discards all events.
impl Observer for () { }

impl<O: Observer + ?Sized> Observer for &'_ mut O {
    fn decode_error(&mut self, packet: usize, error: &Error) {
        (**self).decode_error(packet, error)
    }

    fn anomaly(&mut self, packet: usize, side: Option<Side>, anomaly: Anomaly) {
        (**self).anomaly(packet, side, anomaly)
    }
}

/// Writes all events to the `log` facade.
///
/// Decode errors are logged at debug level, anomalies at trace level. Without the `log` feature
/// this observer does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn decode_error(&mut self, packet: usize, error: &Error) {
        net_debug!("packet {}: {}", packet, error);
    }

    fn anomaly(&mut self, packet: usize, side: Option<Side>, anomaly: Anomaly) {
        match side {
            Some(side) => net_trace!("packet {} ({}): {}", packet, side, anomaly),
            None => net_trace!("packet {}: {}", packet, anomaly),
        }
    }
}

/// Forwards only every n-th event to another observer.
///
/// Decode errors and anomalies are sampled separately. The first event of each kind is always
/// forwarded.
#[derive(Debug, Clone)]
pub struct Sampled<O> {
    inner: O,
    every: u64,
    errors: u64,
    anomalies: u64,
}

impl<O> Sampled<O> {
    /// Forward the first and then every `every`-th event to `inner`.
    ///
    /// A rate of zero is treated as one, forwarding everything.
    pub fn new(inner: O, every: u64) -> Self {
        Sampled {
            inner,
            every: every.max(1),
            errors: 0,
            anomalies: 0,
        }
    }

    /// A reference to the wrapped observer.
    pub fn inner(&self) -> &O {
        &self.inner
    }

    /// Return the wrapped observer.
    pub fn into_inner(self) -> O {
        self.inner
    }
}

fn sample(counter: &mut u64, every: u64) -> bool {
    let hit = *counter % every == 0;
    *counter += 1;
    hit
}

impl<O: Observer> Observer for Sampled<O> {
    fn decode_error(&mut self, packet: usize, error: &Error) {
        if sample(&mut self.errors, self.every) {
            self.inner.decode_error(packet, error);
        }
    }

    fn anomaly(&mut self, packet: usize, side: Option<Side>, anomaly: Anomaly) {
        if sample(&mut self.anomalies, self.every) {
            self.inner.anomaly(packet, side, anomaly);
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Side::Left => write!(f, "left"),
            Side::Right => write!(f, "right"),
        }
    }
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Anomaly::Retransmit { bytes } =>
                write!(f, "retransmit of {} bytes", bytes),
            Anomaly::MissingPacket { gap } =>
                write!(f, "sequence gap of {}", gap),
            Anomaly::BadDelta(delta) =>
                write!(f, "bad delta: {}", delta),
            Anomaly::BadSack(err) =>
                write!(f, "{}", err),
            Anomaly::SendLimitExceeded { by } =>
                write!(f, "send limit exceeded by {}", by),
            Anomaly::TtlChange { first, now } =>
                write!(f, "TTL changed from {} to {}", first, now),
            Anomaly::UnknownAddress(addr) =>
                write!(f, "unknown source address {}", addr),
            Anomaly::PortMismatch { expected, found } =>
                write!(f, "port {} instead of {}", found, expected),
            Anomaly::UnknownExtension { count, last: Some(last) } =>
                write!(f, "{} unknown IPv6 extension headers, last {}", count, last),
            Anomaly::UnknownExtension { count, last: None } =>
                write!(f, "{} unknown IPv6 extension headers", count),
            Anomaly::BadOption =>
                write!(f, "malformed TCP option"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Default)]
    struct Record {
        errors: Vec<(usize, Error)>,
        anomalies: Vec<(usize, Option<Side>, Anomaly)>,
    }

    impl Observer for Record {
        fn decode_error(&mut self, packet: usize, error: &Error) {
            self.errors.push((packet, *error));
        }

        fn anomaly(&mut self, packet: usize, side: Option<Side>, anomaly: Anomaly) {
            self.anomalies.push((packet, side, anomaly));
        }
    }

    #[test]
    fn sampled() {
        let mut sampled = Sampled::new(Record::default(), 3);
        for packet in 0..10 {
            sampled.anomaly(packet, Some(Side::Left), Anomaly::BadOption);
        }
        sampled.decode_error(10, &Error::NoIpLayer);
        sampled.decode_error(11, &Error::NoIpLayer);

        let record = sampled.into_inner();
        let packets: Vec<_> = record.anomalies.iter().map(|event| event.0).collect();
        assert_eq!(packets, [0, 3, 6, 9]);
        assert_eq!(record.errors, [(10, Error::NoIpLayer)]);
    }

    #[test]
    fn sampled_zero_forwards_all() {
        let mut sampled = Sampled::new(Record::default(), 0);
        for packet in 0..4 {
            sampled.anomaly(packet, None, Anomaly::BadOption);
        }
        assert_eq!(sampled.inner().anomalies.len(), 4);
    }

    #[test]
    fn by_reference() {
        let mut record = Record::default();
        {
            let mut observer: &mut dyn Observer = &mut record;
            (&mut observer).decode_error(1, &Error::BadOption);
            ().anomaly(2, None, Anomaly::BadOption);
        }
        assert_eq!(record.errors, [(1, Error::BadOption)]);
        assert!(record.anomalies.is_empty());
    }

    #[test]
    fn display() {
        let anomaly = Anomaly::TtlChange { first: 64, now: 63 };
        assert_eq!(anomaly.to_string(), "TTL changed from 64 to 63");
        assert_eq!(Side::Right.to_string(), "right");
        let anomaly = Anomaly::PortMismatch { expected: 80, found: 81 };
        assert_eq!(anomaly.to_string(), "port 81 instead of 80");
    }
}
