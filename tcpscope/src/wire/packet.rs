use std::net::IpAddr;

use super::{Error, EtherType, IpProtocol, Ipv6Chain, Result, IPV6_HEADER_LEN};
use super::{ethernet_frame as ethernet, ipv4_packet as ipv4, ipv6_packet as ipv6, tcp_packet as tcp};

/// The network layer of a decoded frame.
#[derive(Debug, Clone, Copy)]
pub enum Ip<'a> {
    /// An IPv4 packet.
    V4(&'a ipv4),
    /// An IPv6 packet, with its walked extension chain.
    V6 {
        /// The fixed header and everything following it.
        packet: &'a ipv6,
        /// The extension headers up to the upper layer protocol.
        chain: Ipv6Chain,
    },
}

/// The headers of one captured frame, from Ethernet down to TCP.
///
/// This is a view: all accessors read from the frame bytes it was parsed from, and it can not
/// outlive them.
#[derive(Debug, Clone, Copy)]
pub struct Headers<'a> {
    frame: &'a ethernet,
    ip: Ip<'a>,
    tcp: Option<&'a tcp>,
}

impl<'a> Ip<'a> {
    /// The IP version, 4 or 6.
    pub fn version(&self) -> u8 {
        match self {
            Ip::V4(packet) => packet.version(),
            Ip::V6 { packet, .. } => packet.version(),
        }
    }

    /// Return the source address.
    pub fn src_addr(&self) -> IpAddr {
        match self {
            Ip::V4(packet) => packet.src_addr().into(),
            Ip::V6 { packet, .. } => packet.src_addr().into(),
        }
    }

    /// Return the destination address.
    pub fn dst_addr(&self) -> IpAddr {
        match self {
            Ip::V4(packet) => packet.dst_addr().into(),
            Ip::V6 { packet, .. } => packet.dst_addr().into(),
        }
    }

    /// The TTL or hop limit.
    pub fn hop_limit(&self) -> u8 {
        match self {
            Ip::V4(packet) => packet.hop_limit(),
            Ip::V6 { packet, .. } => packet.hop_limit(),
        }
    }

    /// The payload length declared by the header.
    ///
    /// For IPv6 this is the raw header field, which includes extension headers.
    pub fn payload_len(&self) -> usize {
        match self {
            Ip::V4(packet) => packet.payload_len(),
            Ip::V6 { packet, .. } => usize::from(packet.payload_len()),
        }
    }

    /// The length of all network layer headers.
    pub fn header_len(&self) -> usize {
        match self {
            Ip::V4(packet) => packet.header_len(),
            Ip::V6 { chain, .. } => chain.header_len,
        }
    }

    /// The declared length of the upper layer segment.
    pub fn segment_len(&self) -> usize {
        match self {
            Ip::V4(packet) => packet.payload_len(),
            Ip::V6 { packet, chain } => usize::from(packet.payload_len())
                .saturating_sub(chain.header_len - IPV6_HEADER_LEN),
        }
    }

    /// The upper layer protocol.
    pub fn next_protocol(&self) -> IpProtocol {
        match self {
            Ip::V4(packet) => packet.next_header(),
            Ip::V6 { chain, .. } => chain.protocol,
        }
    }

    /// The captured bytes of the upper layer.
    fn upper_layer(&self) -> &'a [u8] {
        match *self {
            Ip::V4(packet) => packet.payload(),
            Ip::V6 { packet, chain } => packet.as_bytes()
                .get(chain.header_len..)
                .unwrap_or(&[]),
        }
    }
}

impl<'a> Headers<'a> {
    /// Decode a frame starting at its Ethernet header.
    ///
    /// A frame with a network layer other than TCP is not an error, its `tcp` is simply `None`.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let frame = ethernet::new_checked(data)?;
        let ip = match frame.ethertype() {
            EtherType::Ipv4 => Ip::V4(ipv4::new_checked(frame.payload())?),
            EtherType::Ipv6 => {
                let packet = ipv6::new_checked(frame.payload())?;
                let chain = packet.chain()?;
                Ip::V6 { packet, chain }
            },
            other => {
                net_trace!("frame {} -> {} with ethertype {}",
                    frame.src_addr(), frame.dst_addr(), other);
                return Err(Error::UnknownEtherType);
            },
        };

        let tcp = match ip.next_protocol() {
            IpProtocol::Tcp => Some(tcp::new_checked(ip.upper_layer())?),
            _ => None,
        };

        Ok(Headers { frame, ip, tcp })
    }

    /// The link layer frame.
    pub fn frame(&self) -> &'a ethernet {
        self.frame
    }

    /// Return the EtherType of the frame.
    pub fn ethertype(&self) -> EtherType {
        self.frame.ethertype()
    }

    /// The network layer.
    pub fn ip(&self) -> &Ip<'a> {
        &self.ip
    }

    /// The IP version, 4 or 6.
    pub fn version(&self) -> u8 {
        self.ip.version()
    }

    /// Return the IP source address.
    pub fn src_addr(&self) -> IpAddr {
        self.ip.src_addr()
    }

    /// Return the IP destination address.
    pub fn dst_addr(&self) -> IpAddr {
        self.ip.dst_addr()
    }

    /// Return the TTL or hop limit.
    pub fn hop_limit(&self) -> u8 {
        self.ip.hop_limit()
    }

    /// Return the IP payload length as declared by the header.
    pub fn payload_len(&self) -> usize {
        self.ip.payload_len()
    }

    /// Return the upper layer protocol.
    pub fn next_protocol(&self) -> IpProtocol {
        self.ip.next_protocol()
    }

    /// The TCP segment, if the upper layer is TCP.
    pub fn tcp(&self) -> Option<&'a tcp> {
        self.tcp
    }

    /// The declared number of TCP payload bytes, which may exceed the captured bytes.
    pub fn tcp_data_len(&self) -> Option<usize> {
        let tcp = self.tcp?;
        Some(self.ip.segment_len().saturating_sub(tcp.header_len()))
    }
}
