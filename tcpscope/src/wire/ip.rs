use core::fmt;

enum_with_unknown! {
    /// IP datagram encapsulated protocol, also used for IPv6 extension headers.
    pub enum Protocol(u8) {
        /// IPv6 hop-by-hop options.
        HopByHop  = 0x00,
        /// Internet control message protocol.
        Icmp      = 0x01,
        /// Transmission control protocol.
        Tcp       = 0x06,
        /// User datagram protocol.
        Udp       = 0x11,
        /// IPv6 routing header.
        Ipv6Route = 0x2b,
        /// IPv6 fragment header.
        Ipv6Frag  = 0x2c,
        /// Encapsulating security payload.
        Esp       = 0x32,
        /// Authentication header.
        Ah        = 0x33,
        /// Internet control message protocol for IPv6.
        Icmpv6    = 0x3a,
        /// No next header.
        Ipv6NoNxt = 0x3b,
        /// IPv6 destination options.
        Ipv6Opts  = 0x3c,
        /// IPv6 mobility header.
        Mobility  = 0x87,
    }
}

impl Protocol {
    /// Whether this is a protocol that terminates an IPv6 header chain.
    ///
    /// Everything that is not an upper layer is walked over as an extension header.
    pub fn is_upper_layer(self) -> bool {
        match self {
            Protocol::Tcp | Protocol::Udp | Protocol::Icmp | Protocol::Icmpv6
                | Protocol::Esp | Protocol::Ipv6NoNxt => true,
            _ => false,
        }
    }

    /// Whether this is one of the registered IPv6 extension headers.
    pub fn is_ipv6_extension(self) -> bool {
        match self {
            Protocol::HopByHop | Protocol::Ipv6Route | Protocol::Ipv6Frag
                | Protocol::Ah | Protocol::Ipv6Opts | Protocol::Mobility => true,
            _ => false,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Protocol::HopByHop  => write!(f, "Hop-by-Hop"),
            Protocol::Icmp      => write!(f, "ICMP"),
            Protocol::Tcp       => write!(f, "TCP"),
            Protocol::Udp       => write!(f, "UDP"),
            Protocol::Ipv6Route => write!(f, "IPv6-Route"),
            Protocol::Ipv6Frag  => write!(f, "IPv6-Frag"),
            Protocol::Esp       => write!(f, "ESP"),
            Protocol::Ah        => write!(f, "AH"),
            Protocol::Icmpv6    => write!(f, "ICMPv6"),
            Protocol::Ipv6NoNxt => write!(f, "IPv6-NoNxt"),
            Protocol::Ipv6Opts  => write!(f, "IPv6-Opts"),
            Protocol::Mobility  => write!(f, "Mobility"),
            Protocol::Unknown(id) => write!(f, "0x{:02x}", id)
        }
    }
}
