//! Aggregation of all packets of one capture into a connection summary.
use core::fmt;

use crate::flow::{Config, ErrorPolicy};
use crate::flow::endpoint::{Direction, EndpointState, Endpoints};
use crate::flow::observer::{Anomaly, Observer, Side};
use crate::flow::tracker::AckOutcome;
use crate::time::{Duration, Instant};
use crate::wire::{Error, Headers, Ip, Result, TcpOption};
use crate::wire::{tcp_packet as tcp, pcap};

/// Packets skipped because a header could not be decoded, by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DecodeErrors {
    /// Frames shorter than an Ethernet header.
    pub truncated_ethernet_header: u64,
    /// Packets shorter than their IP header or extension headers.
    pub truncated_ip_header: u64,
    /// Segments shorter than their TCP header.
    pub truncated_tcp_header: u64,
    /// Frames with neither IPv4 nor IPv6.
    pub unknown_ether_type: u64,
    /// Frames whose IP version does not match the EtherType.
    pub no_ip_layer: u64,
    /// Malformed options found while decoding.
    pub bad_option: u64,
}

/// The result of processing a capture.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Summary {
    /// Records in the capture, including those that could not be decoded.
    pub packets: u64,
    /// Time of the first record.
    pub first_time: Option<Instant>,
    /// Time of the last record.
    pub last_time: Option<Instant>,
    /// Index of the first SYN without ACK.
    pub syn_packet: Option<usize>,
    /// Time of the first SYN without ACK.
    pub syn_time: Option<Instant>,
    /// Index of the first SYN with ACK.
    pub syn_ack_packet: Option<usize>,
    /// Time of the first SYN with ACK.
    pub syn_ack_time: Option<Instant>,
    /// TCP segments from an address belonging to neither side.
    pub ip_addr_errors: u64,
    /// IP packets without a TCP segment.
    pub without_tcp_layer: u64,
    /// IPv6 extension headers of an unregistered type.
    pub unknown_ipv6_extensions: u64,
    /// Sum of the IP payload lengths of all tracked segments.
    pub payload_bytes: u64,
    /// Undecodable packets.
    pub decode_errors: DecodeErrors,
    /// Whether the capture ended within a record.
    pub truncated_capture: bool,
    /// The source of the first TCP segment.
    pub left: Option<Direction>,
    /// The destination of the first TCP segment.
    pub right: Option<Direction>,
}

/// Accumulates the packets of one connection.
///
/// Packets must be added in capture order. The state of both endpoints is created from the first
/// TCP segment, its source becomes the left side.
#[derive(Debug, Clone)]
pub struct Connection {
    config: Config,
    packets: u64,
    first_time: Option<Instant>,
    last_time: Option<Instant>,
    syn: Option<(usize, Instant)>,
    syn_ack: Option<(usize, Instant)>,
    ip_addr_errors: u64,
    without_tcp_layer: u64,
    unknown_ipv6_extensions: u64,
    payload_bytes: u64,
    decode_errors: DecodeErrors,
    truncated_capture: bool,
    endpoints: Option<Endpoints>,
}

impl DecodeErrors {
    /// Count a header error. Errors of the capture container are not counted here.
    pub fn count(&mut self, error: Error) {
        let counter = match error {
            Error::TruncatedEthernetHeader => &mut self.truncated_ethernet_header,
            Error::TruncatedIpHeader => &mut self.truncated_ip_header,
            Error::TruncatedTcpHeader => &mut self.truncated_tcp_header,
            Error::UnknownEtherType => &mut self.unknown_ether_type,
            Error::NoIpLayer => &mut self.no_ip_layer,
            Error::BadOption => &mut self.bad_option,
            Error::TruncatedCapture | Error::UnsupportedMagicNumber => return,
        };
        *counter += 1;
    }

    /// The number of skipped packets.
    pub fn total(&self) -> u64 {
        self.truncated_ethernet_header
            + self.truncated_ip_header
            + self.truncated_tcp_header
            + self.unknown_ether_type
            + self.no_ip_layer
            + self.bad_option
    }

    /// Packets with a header cut short by the capture.
    pub fn truncated(&self) -> u64 {
        self.truncated_ethernet_header + self.truncated_ip_header + self.truncated_tcp_header
    }
}

impl Connection {
    /// Create an empty connection.
    pub fn new(config: &Config) -> Self {
        Connection {
            config: config.clone(),
            packets: 0,
            first_time: None,
            last_time: None,
            syn: None,
            syn_ack: None,
            ip_addr_errors: 0,
            without_tcp_layer: 0,
            unknown_ipv6_extensions: 0,
            payload_bytes: 0,
            decode_errors: DecodeErrors::default(),
            truncated_capture: false,
            endpoints: None,
        }
    }

    /// The number of packets added so far.
    pub fn packets(&self) -> u64 {
        self.packets
    }

    /// The state of one endpoint, once the first segment was seen.
    pub fn endpoint(&self, side: Side) -> Option<&EndpointState> {
        let endpoints = self.endpoints.as_ref()?;
        Some(match side {
            Side::Left => &endpoints.left,
            Side::Right => &endpoints.right,
        })
    }

    /// Note that the capture ended within a record.
    pub fn set_truncated(&mut self) {
        self.truncated_capture = true;
    }

    /// Process the next packet of the capture.
    ///
    /// A packet whose headers can not be decoded is counted and its error returned. The
    /// connection remains usable: whether to continue with the next packet is up to the caller.
    pub fn add(&mut self, packet: &pcap::RawPacket, observer: &mut dyn Observer) -> Result<()> {
        self.packets += 1;
        if self.first_time.is_none() {
            self.first_time = Some(packet.time);
        }
        self.last_time = Some(packet.time);

        let headers = match Headers::parse(packet.data) {
            Ok(headers) => headers,
            Err(err) => {
                self.decode_errors.count(err);
                observer.decode_error(packet.index, &err);
                return Err(err);
            },
        };

        if let Ip::V6 { chain, .. } = headers.ip() {
            if chain.unknown > 0 {
                self.unknown_ipv6_extensions += u64::from(chain.unknown);
                observer.anomaly(packet.index, None, Anomaly::UnknownExtension {
                    count: chain.unknown,
                    last: chain.last_unknown,
                });
            }
        }

        let segment = match headers.tcp() {
            Some(segment) => segment,
            None => {
                self.without_tcp_layer += 1;
                return Ok(());
            },
        };

        let config = &self.config;
        let endpoints = self.endpoints.get_or_insert_with(|| {
            net_debug!("connection {}:{} -> {}:{}",
                headers.src_addr(), segment.src_port(), headers.dst_addr(), segment.dst_port());
            Endpoints::new(
                (headers.src_addr(), segment.src_port()),
                (headers.dst_addr(), segment.dst_port()),
                config)
        });

        let from = match endpoints.classify(headers.src_addr(), segment.src_port()) {
            Some(side) => side,
            None => {
                self.ip_addr_errors += 1;
                observer.anomaly(packet.index, None, Anomaly::UnknownAddress(headers.src_addr()));
                return Ok(());
            },
        };

        self.payload_bytes += headers.payload_len() as u64;
        let flags = segment.flags();
        if flags.syn() && !flags.ack() && self.syn.is_none() {
            self.syn = Some((packet.index, packet.time));
        }
        if flags.syn() && flags.ack() && self.syn_ack.is_none() {
            self.syn_ack = Some((packet.index, packet.time));
        }

        let data_len = headers.tcp_data_len().unwrap_or(0) as u32;
        let (sender, receiver) = endpoints.split(from);
        let segment = Segment {
            index: packet.index,
            time: packet.time,
            ttl: headers.hop_limit(),
            tcp: segment,
            data_len,
        };
        segment.process(sender, receiver, observer);
        Ok(())
    }

    /// Summarize everything added so far.
    pub fn summary(&self) -> Summary {
        Summary {
            packets: self.packets,
            first_time: self.first_time,
            last_time: self.last_time,
            syn_packet: self.syn.map(|(index, _)| index),
            syn_time: self.syn.map(|(_, time)| time),
            syn_ack_packet: self.syn_ack.map(|(index, _)| index),
            syn_ack_time: self.syn_ack.map(|(_, time)| time),
            ip_addr_errors: self.ip_addr_errors,
            without_tcp_layer: self.without_tcp_layer,
            unknown_ipv6_extensions: self.unknown_ipv6_extensions,
            payload_bytes: self.payload_bytes,
            decode_errors: self.decode_errors,
            truncated_capture: self.truncated_capture,
            left: self.endpoint(Side::Left).map(EndpointState::direction),
            right: self.endpoint(Side::Right).map(EndpointState::direction),
        }
    }

    /// Finish the connection.
    pub fn finish(self) -> Summary {
        self.summary()
    }
}

/// A segment attributed to its sender.
struct Segment<'a> {
    index: usize,
    time: Instant,
    ttl: u8,
    tcp: &'a tcp,
    data_len: u32,
}

impl Segment<'_> {
    fn process(
        &self,
        sender: &mut EndpointState,
        receiver: &mut EndpointState,
        observer: &mut dyn Observer,
    ) {
        let index = self.index;
        sender.observe_ttl(index, self.ttl, observer);
        sender.check_src_port(index, self.tcp.src_port(), observer);
        receiver.check_dst_port(index, self.tcp.dst_port(), observer);

        let outcome = sender.send(index, self.time, self.tcp, self.data_len, observer);

        let flags = self.tcp.flags();
        if flags.ack() {
            let ack = receiver.tracker_mut()
                .on_ack(self.time, self.tcp.ack_number(), self.data_len > 0);
            if let AckOutcome::BadDelta(delta) = ack {
                observer.anomaly(index, Some(receiver.side()), Anomaly::BadDelta(delta));
            }
            let window = sender.scaled_window(receiver, flags.syn());
            receiver.update_limit(window);
        }

        for option in self.tcp.options() {
            let option = match option {
                Ok(option) => option,
                Err(_) => {
                    sender.bad_option(index, observer);
                    break;
                },
            };

            sender.count_option(option.kind());
            match option {
                TcpOption::MaxSegmentSize(mss) => sender.set_mss(mss),
                TcpOption::WindowScale(shift) => sender.set_window_scale(shift),
                TcpOption::Sack(blocks) => for block in blocks {
                    // The blocks describe data the receiver of this segment sent.
                    if let Err(err) = receiver.tracker_mut().on_sack(block) {
                        observer.anomaly(index, Some(receiver.side()), Anomaly::BadSack(err));
                    }
                },
                TcpOption::Timestamps { value, echo } => {
                    if value != 0 && !outcome.is_retransmit() {
                        sender.jitter_mut().add(value, self.time);
                    }
                    if echo != 0 {
                        receiver.jitter_mut().add_echo(echo, self.time);
                    }
                },
                _ => {},
            }
        }
    }
}

impl Summary {
    /// The time from the first to the last record.
    pub fn duration(&self) -> Option<Duration> {
        Some(self.last_time?.saturating_duration_since(self.first_time?))
    }

    /// The direction of one side.
    pub fn direction(&self, side: Side) -> Option<&Direction> {
        match side {
            Side::Left => self.left.as_ref(),
            Side::Right => self.right.as_ref(),
        }
    }
}

/// Summarize a capture held in memory.
///
/// Undecodable packets are handled according to `config.on_error`. An unreadable file header is
/// always an error.
pub fn summarize(data: &[u8], config: &Config, observer: &mut dyn Observer) -> Result<Summary> {
    let capture = pcap::Capture::new(data)?;
    let mut connection = Connection::new(config);

    for record in capture {
        let result = match record {
            Ok(packet) => connection.add(&packet, observer),
            Err(err) => {
                observer.decode_error(connection.packets() as usize, &err);
                connection.set_truncated();
                Err(err)
            },
        };

        if let (Err(err), ErrorPolicy::Abort) = (result, config.on_error) {
            return Err(err);
        }
    }

    Ok(connection.finish())
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let seq = &self.seq;
        let stats = &self.stats;
        write!(f, "{} port {}", self.addr, self.port)?;
        if let Some(ttl) = self.ttl {
            write!(f, " ttl {}", ttl)?;
        }
        if let Some(mss) = self.mss {
            write!(f, " mss {}", mss)?;
        }
        if let Some(shift) = self.window_scale {
            write!(f, " wscale {}", shift)?;
        }
        writeln!(f)?;
        writeln!(f, "    sent {} segments, {} bytes, {} retransmits ({} bytes), {} missing",
                 seq.packets, seq.sent_bytes, seq.retransmit_packets, seq.retransmit_bytes,
                 seq.missing_packets)?;
        writeln!(f, "    acked {} bytes in {} acks, {} sacks ({} bad, {} bytes), {} bad deltas",
                 seq.acked_bytes, seq.acks, seq.sacks, seq.bad_sacks, seq.sack_bytes,
                 seq.bad_deltas)?;
        writeln!(f, "    limit exceeded {}, ttl changes {}, port errors {}/{}, bad options {}, ece {}",
                 stats.send_next_exceeded_limit, stats.ttl_changes, stats.src_port_errors,
                 stats.dst_port_errors, stats.bad_options, stats.ece_count)?;
        match &self.rtt {
            Some(rtt) => writeln!(f, "    rtt {}", rtt)?,
            None => writeln!(f, "    rtt unknown")?,
        }
        write!(f, "    jitter {}", self.jitter)
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} packets", self.packets)?;
        if let (Some(first), Some(duration)) = (self.first_time, self.duration()) {
            write!(f, " from {} over {:.6}s", first, duration.as_secs_f64())?;
        }
        if self.truncated_capture {
            write!(f, " (truncated)")?;
        }
        writeln!(f)?;

        if let (Some(packet), Some(time)) = (self.syn_packet, self.syn_time) {
            writeln!(f, "  syn at packet {} ({})", packet, time)?;
        }
        if let (Some(packet), Some(time)) = (self.syn_ack_packet, self.syn_ack_time) {
            writeln!(f, "  syn-ack at packet {} ({})", packet, time)?;
        }
        write!(f, "  payload {} bytes, {} decode errors, {} unknown addresses, {} without tcp",
               self.payload_bytes, self.decode_errors.total(), self.ip_addr_errors,
               self.without_tcp_layer)?;
        if self.unknown_ipv6_extensions > 0 {
            write!(f, ", {} unknown ipv6 extensions", self.unknown_ipv6_extensions)?;
        }

        if let Some(left) = &self.left {
            write!(f, "\n  left  {}", left)?;
        }
        if let Some(right) = &self.right {
            write!(f, "\n  right {}", right)?;
        }
        Ok(())
    }
}
