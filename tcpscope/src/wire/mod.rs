/*! Low-level capture and packet access.

# An overview over packet representations

The `wire` module deals with the *representation* of captured bytes. It provides two levels of
functionality.

 * First, it extracts fields from sequences of octets. This happens in the lowercase structures,
   e.g. [`ethernet_frame`], [`ipv4_packet`] or [`tcp_packet`]. Each is a dynamically sized wrapper
   around `[u8]` so that a reference to it is a reference into the capture itself. Nothing is
   copied.
 * Second, it combines those views into a [`Headers`] value describing one captured frame from the
   link layer down to TCP, and a [`pcap`] reader that splits a capture into frames.

[`ethernet_frame`]: struct.ethernet_frame.html
[`ipv4_packet`]: struct.ipv4_packet.html
[`tcp_packet`]: struct.tcp_packet.html
[`Headers`]: struct.Headers.html
[`pcap`]: pcap/index.html

The lowercase views guarantee that, if their `check_len()` method returned `Ok(())`, then no field
accessor will panic. The only way to construct them from untrusted input is `new_checked` which
performs this check. Their payload accessors return the *captured* bytes which may be fewer than
the length fields claim: captures commonly keep only the headers of each frame.

All multi-byte fields are stored in network byte order and read through
`byteorder::NetworkEndian`. The capture container itself has the byte order of the machine that
wrote it, which [`pcap::Endian`] handles explicitly.

[`pcap::Endian`]: pcap/enum.Endian.html

# Examples

To decode the headers of a frame:

```rust
use tcpscope::wire::{EtherType, Headers, IpProtocol};

let frame = [
    // Ethernet
    0x02, 0x00, 0x00, 0x00, 0x00, 0x02, 0x02, 0x00, 0x00, 0x00, 0x00, 0x01, 0x08, 0x00,
    // IPv4
    0x45, 0x00, 0x00, 0x28, 0x00, 0x00, 0x40, 0x00, 0x40, 0x06, 0x00, 0x00,
    0x0a, 0x00, 0x00, 0x01, 0x0a, 0x00, 0x00, 0x02,
    // TCP
    0x9c, 0x40, 0x00, 0x50, 0x00, 0x00, 0x03, 0xe8, 0x00, 0x00, 0x00, 0x00,
    0x50, 0x02, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00,
];

let headers = Headers::parse(&frame).unwrap();
assert_eq!(headers.ethertype(), EtherType::Ipv4);
assert_eq!(headers.next_protocol(), IpProtocol::Tcp);
let tcp = headers.tcp().unwrap();
assert_eq!(tcp.dst_port(), 80);
assert!(tcp.flags().syn());
```
*/

mod error;
mod ethernet;
mod ip;
mod ipv4;
mod ipv6;
mod packet;
pub mod pcap;
mod tcp;

mod field {
    use core::ops;

    pub(crate) type Field = ops::Range<usize>;
    pub(crate) type Rest  = ops::RangeFrom<usize>;
}

pub use self::error::{Error, Result};

pub use self::ethernet::{
    Address as EthernetAddress,
    EtherType,
    ethernet as ethernet_frame};

pub use self::ip::Protocol as IpProtocol;

pub use self::ipv4::{
    HEADER_LEN as IPV4_HEADER_LEN,
    ipv4 as ipv4_packet};

pub use self::ipv6::{
    Chain as Ipv6Chain,
    Extension as Ipv6Extension,
    Extensions as Ipv6Extensions,
    HEADER_LEN as IPV6_HEADER_LEN,
    ipv6 as ipv6_packet};

pub use self::packet::{Headers, Ip};

pub use self::tcp::{
    Flags as TcpFlags,
    InvalidDelta,
    MAX_OPTIONS_LEN as TCP_MAX_OPTIONS_LEN,
    Options as TcpOptions,
    SackBlock,
    SackBlocks,
    SeqNumber as TcpSeqNumber,
    TcpOption,
    HEADER_LEN as TCP_HEADER_LEN,
    tcp as tcp_packet};
