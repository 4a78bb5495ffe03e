use std::net::Ipv4Addr;
use byteorder::{ByteOrder, NetworkEndian};

use super::{Error, IpProtocol, Result};

byte_wrapper! {
    /// A byte sequence representing an IPv4 packet.
    ///
    /// The view covers the captured bytes only. A capture with a small snap length cuts the payload
    /// short so the total length field may well claim more bytes than are present.
    #[derive(Debug, PartialEq, Eq)]
    pub struct ipv4([u8]);
}

mod field {
    use crate::wire::field::Field;

    pub(crate) const VER_IHL:  usize = 0;
    pub(crate) const LENGTH:   Field = 2..4;
    pub(crate) const TTL:      usize = 8;
    pub(crate) const PROTOCOL: usize = 9;
    pub(crate) const SRC_ADDR: Field = 12..16;
    pub(crate) const DST_ADDR: Field = 16..20;
}

/// The length of an IPv4 header without options.
pub const HEADER_LEN: usize = field::DST_ADDR.end;

impl ipv4 {
    /// Imbue a raw octet buffer with IPv4 packet structure.
    pub fn new_unchecked(data: &[u8]) -> &Self {
        Self::__from_macro_new_unchecked(data)
    }

    /// Shorthand for a combination of [new_unchecked] and [check_len].
    ///
    /// [new_unchecked]: #method.new_unchecked
    /// [check_len]: #method.check_len
    pub fn new_checked(data: &[u8]) -> Result<&Self> {
        let packet = Self::new_unchecked(data);
        packet.check_len()?;
        Ok(packet)
    }

    /// Ensure that no accessor method will panic if called.
    ///
    /// Returns `Err(Error::TruncatedIpHeader)` if the buffer is shorter than the fixed header and
    /// `Err(Error::NoIpLayer)` if the version nibble does not announce IPv4. Options are not
    /// interpreted and need not have been captured.
    pub fn check_len(&self) -> Result<()> {
        if self.0.len() < HEADER_LEN {
            Err(Error::TruncatedIpHeader)
        } else if self.version() != 4 {
            Err(Error::NoIpLayer)
        } else {
            Ok(())
        }
    }

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Return the version field.
    pub fn version(&self) -> u8 {
        self.0[field::VER_IHL] >> 4
    }

    /// Return the header length, in octets, including options.
    ///
    /// A nonsensical length field below the fixed header size is treated as the fixed size.
    pub fn header_len(&self) -> usize {
        (usize::from(self.0[field::VER_IHL] & 0x0f) * 4).max(HEADER_LEN)
    }

    /// Return the total length field.
    pub fn total_len(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::LENGTH])
    }

    /// The length of the payload as declared by the header.
    pub fn payload_len(&self) -> usize {
        usize::from(self.total_len()).saturating_sub(self.header_len())
    }

    /// Return the time to live field.
    pub fn hop_limit(&self) -> u8 {
        self.0[field::TTL]
    }

    /// Return the next_header (protocol) field.
    pub fn next_header(&self) -> IpProtocol {
        IpProtocol::from(self.0[field::PROTOCOL])
    }

    /// Return the source address field.
    pub fn src_addr(&self) -> Ipv4Addr {
        let mut bytes = [0; 4];
        bytes.copy_from_slice(&self.0[field::SRC_ADDR]);
        Ipv4Addr::from(bytes)
    }

    /// Return the destination address field.
    pub fn dst_addr(&self) -> Ipv4Addr {
        let mut bytes = [0; 4];
        bytes.copy_from_slice(&self.0[field::DST_ADDR]);
        Ipv4Addr::from(bytes)
    }

    /// Return the captured part of the payload.
    ///
    /// Empty when the options were not completely captured.
    pub fn payload(&self) -> &[u8] {
        self.0.get(self.header_len()..).unwrap_or(&[])
    }
}

impl AsRef<[u8]> for ipv4 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    static PACKET_BYTES: [u8; 30] =
        [0x45, 0x00, 0x00, 0x1e,
         0x01, 0x02, 0x62, 0x03,
         0x1a, 0x06, 0xd5, 0x6e,
         0x11, 0x12, 0x13, 0x14,
         0x21, 0x22, 0x23, 0x24,
         0xaa, 0x00, 0x00, 0x00,
         0x00, 0x00, 0x00, 0x00,
         0x00, 0xff];

    static PAYLOAD_BYTES: [u8; 10] =
        [0xaa, 0x00, 0x00, 0x00,
         0x00, 0x00, 0x00, 0x00,
         0x00, 0xff];

    #[test]
    fn test_deconstruct() {
        let packet = ipv4::new_checked(&PACKET_BYTES[..]).unwrap();
        assert_eq!(packet.version(), 4);
        assert_eq!(packet.header_len(), 20);
        assert_eq!(packet.total_len(), 30);
        assert_eq!(packet.payload_len(), 10);
        assert_eq!(packet.hop_limit(), 0x1a);
        assert_eq!(packet.next_header(), IpProtocol::Tcp);
        assert_eq!(packet.src_addr(), Ipv4Addr::new(0x11, 0x12, 0x13, 0x14));
        assert_eq!(packet.dst_addr(), Ipv4Addr::new(0x21, 0x22, 0x23, 0x24));
        assert_eq!(packet.payload(), &PAYLOAD_BYTES[..]);
    }

    #[test]
    fn test_snap_truncated_payload() {
        // The declared payload length survives a capture that cut the payload.
        let packet = ipv4::new_checked(&PACKET_BYTES[..24]).unwrap();
        assert_eq!(packet.payload_len(), 10);
        assert_eq!(packet.payload(), &PAYLOAD_BYTES[..4]);
    }

    #[test]
    fn test_truncated() {
        assert_eq!(ipv4::new_checked(&PACKET_BYTES[..19]), Err(Error::TruncatedIpHeader));
    }

    #[test]
    fn test_wrong_version() {
        let mut bytes = PACKET_BYTES;
        bytes[0] = 0x65;
        assert_eq!(ipv4::new_checked(&bytes[..]), Err(Error::NoIpLayer));
    }

    #[test]
    fn test_options_header_len() {
        let mut bytes = PACKET_BYTES;
        bytes[0] = 0x46;
        let packet = ipv4::new_checked(&bytes[..]).unwrap();
        assert_eq!(packet.header_len(), 24);
        assert_eq!(packet.payload_len(), 6);
        assert_eq!(packet.payload(), &PAYLOAD_BYTES[4..]);
    }
}
