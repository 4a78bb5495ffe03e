//! The state of one endpoint of a connection.
use std::net::IpAddr;

use crate::flow::Config;
use crate::flow::histogram::Percentiles;
use crate::flow::jitter::{JitterSummary, JitterTracker};
use crate::flow::observer::{Anomaly, Observer, Side};
use crate::flow::tracker::{SeqKind, SeqOutcome, SeqStats, Tracker};
use crate::time::Instant;
use crate::wire::{tcp_packet as tcp, TcpSeqNumber as SeqNumber};

/// The largest shift allowed for the window scale option.
const MAX_WINDOW_SCALE: u8 = 14;

/// Counters of the segments sent by one endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Stats {
    /// How often each option kind below 16 was sent.
    pub option_counts: [u64; 16],
    /// Segments with the ECN echo flag.
    pub ece_count: u64,
    /// Changes of the advertised window.
    pub window_changes: u64,
    /// Segments ending beyond the window the peer advertised.
    pub send_next_exceeded_limit: u64,
    /// Segments with a TTL other than the first one.
    pub ttl_changes: u64,
    /// Segments from this endpoint with an unexpected source port.
    pub src_port_errors: u64,
    /// Segments to this endpoint with an unexpected destination port.
    pub dst_port_errors: u64,
    /// Segments whose options could not be parsed.
    pub bad_options: u64,
}

/// State of one endpoint, built from the segments it sent and the ones it received.
#[derive(Debug, Clone)]
pub struct EndpointState {
    side: Side,
    addr: IpAddr,
    port: u16,
    ttl: Option<u8>,
    window_scale: Option<u8>,
    mss: Option<u16>,
    window: Option<u16>,
    limit: Option<SeqNumber>,
    tracker: Tracker,
    jitter: JitterTracker,
    stats: Stats,
}

/// Both endpoints of a connection.
#[derive(Debug, Clone)]
pub(crate) struct Endpoints {
    pub(crate) left: EndpointState,
    pub(crate) right: EndpointState,
}

/// The summary of one endpoint.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Direction {
    /// The endpoint address.
    pub addr: IpAddr,
    /// The endpoint port.
    pub port: u16,
    /// The first TTL seen on segments from the endpoint.
    pub ttl: Option<u8>,
    /// The window scale announced by the endpoint.
    pub window_scale: Option<u8>,
    /// The maximum segment size announced by the endpoint.
    pub mss: Option<u16>,
    /// Counters of the endpoint.
    pub stats: Stats,
    /// Sequence counters of the data sent by the endpoint.
    pub seq: SeqStats,
    /// Round trip times of the data sent by the endpoint.
    pub rtt: Option<Percentiles>,
    /// Jitter of the endpoint's timestamp clock.
    pub jitter: JitterSummary,
    /// Sent segments forgotten before an acknowledgement could match them.
    pub matcher_evicted: u64,
}

impl EndpointState {
    /// Create the state of an endpoint not yet seen sending.
    pub fn new(side: Side, addr: IpAddr, port: u16, config: &Config) -> Self {
        EndpointState {
            side,
            addr,
            port,
            ttl: None,
            window_scale: None,
            mss: None,
            window: None,
            limit: None,
            tracker: Tracker::new(config.histogram.empty(), config.matcher_capacity),
            jitter: JitterTracker::new(config.histogram.empty()),
            stats: Stats::default(),
        }
    }

    /// Which side of the connection this is.
    pub fn side(&self) -> Side {
        self.side
    }

    /// The address of the endpoint.
    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    /// The port of the endpoint.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The limit of the sequence space the peer allowed, if known.
    pub fn limit(&self) -> Option<SeqNumber> {
        self.limit
    }

    /// The sequence tracker of the data sent by this endpoint.
    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    /// The counters.
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub(crate) fn tracker_mut(&mut self) -> &mut Tracker {
        &mut self.tracker
    }

    pub(crate) fn jitter_mut(&mut self) -> &mut JitterTracker {
        &mut self.jitter
    }

    fn anomaly(&self, observer: &mut dyn Observer, packet: usize, anomaly: Anomaly) {
        observer.anomaly(packet, Some(self.side), anomaly);
    }

    /// Compare the TTL of a sent segment with the first one.
    pub(crate) fn observe_ttl(&mut self, packet: usize, ttl: u8, observer: &mut dyn Observer) {
        match self.ttl {
            None => self.ttl = Some(ttl),
            Some(first) if first != ttl => {
                self.stats.ttl_changes += 1;
                self.anomaly(observer, packet, Anomaly::TtlChange { first, now: ttl });
            },
            Some(_) => {},
        }
    }

    /// Check the source port of a segment sent by this endpoint.
    pub(crate) fn check_src_port(&mut self, packet: usize, port: u16, observer: &mut dyn Observer) {
        if port != self.port {
            self.stats.src_port_errors += 1;
            self.anomaly(observer, packet, Anomaly::PortMismatch { expected: self.port, found: port });
        }
    }

    /// Check the destination port of a segment sent to this endpoint.
    pub(crate) fn check_dst_port(&mut self, packet: usize, port: u16, observer: &mut dyn Observer) {
        if port != self.port {
            self.stats.dst_port_errors += 1;
            self.anomaly(observer, packet, Anomaly::PortMismatch { expected: self.port, found: port });
        }
    }

    /// Track a segment sent by this endpoint.
    pub(crate) fn send(
        &mut self,
        packet: usize,
        time: Instant,
        segment: &tcp,
        data_len: u32,
        observer: &mut dyn Observer,
    ) -> SeqOutcome {
        let flags = segment.flags();
        let outcome = self.tracker.on_seq(
            packet, time, segment.seq_number(), data_len, flags.is_syn_or_fin());

        match outcome.kind {
            SeqKind::Retransmit =>
                self.anomaly(observer, packet, Anomaly::Retransmit { bytes: data_len }),
            SeqKind::Gap(gap) =>
                self.anomaly(observer, packet, Anomaly::MissingPacket { gap }),
            SeqKind::BadDelta(delta) =>
                self.anomaly(observer, packet, Anomaly::BadDelta(delta)),
            SeqKind::First | SeqKind::Next => {},
        }

        if let (false, Some(limit)) = (flags.syn(), self.limit) {
            match limit.diff(self.tracker.send_next()) {
                Ok(remaining) if remaining < 0 => {
                    self.stats.send_next_exceeded_limit += 1;
                    self.anomaly(observer, packet, Anomaly::SendLimitExceeded { by: -remaining });
                },
                _ => {},
            }
        }

        if flags.ece() {
            self.stats.ece_count += 1;
        }

        let window = segment.window_len();
        if self.window.map_or(false, |old| old != window) {
            self.stats.window_changes += 1;
        }
        self.window = Some(window);

        outcome
    }

    /// The window last advertised by this endpoint, in bytes.
    ///
    /// Scaling applies once both endpoints announced a window scale, but never to the window of a
    /// SYN segment itself.
    pub(crate) fn scaled_window(&self, peer: &EndpointState, syn: bool) -> u32 {
        let window = u32::from(self.window.unwrap_or(0));
        match (syn, self.window_scale, peer.window_scale) {
            (false, Some(shift), Some(_)) => window << shift.min(MAX_WINDOW_SCALE),
            _ => window,
        }
    }

    /// Recompute the limit from the acknowledged point and the window the peer advertised.
    pub(crate) fn update_limit(&mut self, window: u32) {
        self.limit = Some(self.tracker.send_una() + window);
    }

    /// Record an option count. Kinds of 16 and above are not counted.
    pub(crate) fn count_option(&mut self, kind: u8) {
        if let Some(count) = self.stats.option_counts.get_mut(usize::from(kind)) {
            *count += 1;
        }
    }

    pub(crate) fn set_mss(&mut self, mss: u16) {
        self.mss = Some(mss);
    }

    pub(crate) fn set_window_scale(&mut self, shift: u8) {
        self.window_scale = Some(shift);
    }

    pub(crate) fn bad_option(&mut self, packet: usize, observer: &mut dyn Observer) {
        self.stats.bad_options += 1;
        self.anomaly(observer, packet, Anomaly::BadOption);
    }

    /// Summarize the endpoint.
    pub fn direction(&self) -> Direction {
        Direction {
            addr: self.addr,
            port: self.port,
            ttl: self.ttl,
            window_scale: self.window_scale,
            mss: self.mss,
            stats: self.stats,
            seq: *self.tracker.stats(),
            rtt: self.tracker.rtt().percentiles(),
            jitter: self.jitter.summary(),
            matcher_evicted: self.tracker.evicted(),
        }
    }
}

impl Endpoints {
    pub(crate) fn new(
        src: (IpAddr, u16),
        dst: (IpAddr, u16),
        config: &Config,
    ) -> Self {
        Endpoints {
            left: EndpointState::new(Side::Left, src.0, src.1, config),
            right: EndpointState::new(Side::Right, dst.0, dst.1, config),
        }
    }

    /// Find the side that sent a segment.
    ///
    /// When both sides share one address, as on a loopback interface, the source port decides.
    pub(crate) fn classify(&self, addr: IpAddr, port: u16) -> Option<Side> {
        let left = addr == self.left.addr;
        let right = addr == self.right.addr;
        match (left, right) {
            (true, true) if port == self.right.port && port != self.left.port => Some(Side::Right),
            (true, _) => Some(Side::Left),
            (false, true) => Some(Side::Right),
            (false, false) => None,
        }
    }

    /// Split into the sender and the receiver of a segment from `from`.
    pub(crate) fn split(&mut self, from: Side) -> (&mut EndpointState, &mut EndpointState) {
        match from {
            Side::Left => (&mut self.left, &mut self.right),
            Side::Right => (&mut self.right, &mut self.left),
        }
    }
}

#[cfg(test)]
mod test {
    use std::net::Ipv4Addr;
    use super::*;

    fn endpoints() -> Endpoints {
        let config = Config::default();
        Endpoints::new(
            (Ipv4Addr::new(10, 0, 0, 1).into(), 40000),
            (Ipv4Addr::new(10, 0, 0, 2).into(), 443),
            &config)
    }

    #[test]
    fn classify() {
        let endpoints = endpoints();
        assert_eq!(endpoints.classify(Ipv4Addr::new(10, 0, 0, 1).into(), 40000), Some(Side::Left));
        assert_eq!(endpoints.classify(Ipv4Addr::new(10, 0, 0, 2).into(), 443), Some(Side::Right));
        // The port does not matter for distinct addresses.
        assert_eq!(endpoints.classify(Ipv4Addr::new(10, 0, 0, 2).into(), 1), Some(Side::Right));
        assert_eq!(endpoints.classify(Ipv4Addr::new(10, 0, 0, 3).into(), 443), None);
    }

    #[test]
    fn classify_loopback() {
        let config = Config::default();
        let local = IpAddr::from(Ipv4Addr::LOCALHOST);
        let endpoints = Endpoints::new((local, 5000), (local, 6000), &config);
        assert_eq!(endpoints.classify(local, 5000), Some(Side::Left));
        assert_eq!(endpoints.classify(local, 6000), Some(Side::Right));
    }

    #[test]
    fn ttl_changes() {
        let mut endpoints = endpoints();
        let (left, _) = endpoints.split(Side::Left);
        left.observe_ttl(0, 64, &mut ());
        left.observe_ttl(1, 64, &mut ());
        left.observe_ttl(2, 63, &mut ());
        left.observe_ttl(3, 64, &mut ());
        assert_eq!(left.stats().ttl_changes, 1);
        assert_eq!(left.direction().ttl, Some(64));
    }

    #[test]
    fn option_counts() {
        let mut endpoints = endpoints();
        let (_, right) = endpoints.split(Side::Left);
        right.count_option(2);
        right.count_option(8);
        right.count_option(8);
        right.count_option(16);
        right.count_option(254);
        assert_eq!(right.side(), Side::Right);
        assert_eq!(right.stats().option_counts[2], 1);
        assert_eq!(right.stats().option_counts[8], 2);
        assert_eq!(right.stats().option_counts.iter().sum::<u64>(), 3);
    }

    #[test]
    fn window_scaling() {
        let mut endpoints = endpoints();
        endpoints.left.window = Some(1000);
        assert_eq!(endpoints.left.scaled_window(&endpoints.right, false), 1000);
        endpoints.left.set_window_scale(7);
        // The peer did not agree to scaling.
        assert_eq!(endpoints.left.scaled_window(&endpoints.right, false), 1000);
        endpoints.right.set_window_scale(2);
        assert_eq!(endpoints.left.scaled_window(&endpoints.right, false), 128_000);
        assert_eq!(endpoints.left.scaled_window(&endpoints.right, true), 1000);
    }

    #[test]
    fn port_errors() {
        let mut endpoints = endpoints();
        let (left, right) = endpoints.split(Side::Left);
        left.check_src_port(0, 40000, &mut ());
        right.check_dst_port(0, 443, &mut ());
        left.check_src_port(1, 40001, &mut ());
        right.check_dst_port(1, 444, &mut ());
        assert_eq!(left.stats().src_port_errors, 1);
        assert_eq!(right.stats().dst_port_errors, 1);
        assert_eq!(left.stats().dst_port_errors, 0);
    }
}
