use std::net::Ipv6Addr;
use byteorder::{ByteOrder, NetworkEndian};

use super::{Error, IpProtocol, Result};

byte_wrapper! {
    /// A byte sequence representing an IPv6 packet.
    #[derive(Debug, PartialEq, Eq)]
    pub struct ipv6([u8]);
}

mod field {
    use crate::wire::field::Field;

    pub(crate) const VER_TC_FLOW: Field = 0..4;
    pub(crate) const LENGTH:      Field = 4..6;
    pub(crate) const NXT_HDR:     usize = 6;
    pub(crate) const HOP_LIMIT:   usize = 7;
    pub(crate) const SRC_ADDR:    Field = 8..24;
    pub(crate) const DST_ADDR:    Field = 24..40;
}

/// The length of the fixed IPv6 header.
pub const HEADER_LEN: usize = field::DST_ADDR.end;

/// One extension header in the chain following the fixed header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extension<'a> {
    /// The type of this header, as announced by the previous header.
    pub kind: IpProtocol,
    /// The complete header, including its own next header and length octets.
    pub data: &'a [u8],
}

impl Extension<'_> {
    /// The type of the header following this one.
    pub fn next_header(&self) -> IpProtocol {
        IpProtocol::from(self.data[0])
    }
}

/// Lazily walks the extension headers of an IPv6 packet.
///
/// Ends when the next header is an upper layer protocol. Every other value, registered as an
/// extension or not, is assumed to have the generic extension layout. Yields an error once if the
/// chain leaves the captured bytes.
#[derive(Debug, Clone)]
pub struct Extensions<'a> {
    data: &'a [u8],
    offset: usize,
    next: IpProtocol,
    done: bool,
}

/// The result of walking the extension header chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chain {
    /// Length of the fixed header and all extension headers.
    pub header_len: usize,
    /// The upper layer protocol the chain ended with.
    pub protocol: IpProtocol,
    /// The number of headers that were not registered extension types.
    pub unknown: u8,
    /// The type of the last such header.
    pub last_unknown: Option<IpProtocol>,
}

impl ipv6 {
    /// Imbue a raw octet buffer with IPv6 packet structure.
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
    /// `Err(Error::NoIpLayer)` if the version does not announce IPv6. The payload is not required
    /// to be complete.
    pub fn check_len(&self) -> Result<()> {
        if self.0.len() < HEADER_LEN {
            Err(Error::TruncatedIpHeader)
        } else if self.version() != 6 {
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
        self.0[field::VER_TC_FLOW.start] >> 4
    }

    /// Return the payload length field.
    ///
    /// Unlike IPv4 the payload length includes all extension headers.
    pub fn payload_len(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::LENGTH])
    }

    /// Return the next header field.
    pub fn next_header(&self) -> IpProtocol {
        IpProtocol::from(self.0[field::NXT_HDR])
    }

    /// Return the hop limit field.
    pub fn hop_limit(&self) -> u8 {
        self.0[field::HOP_LIMIT]
    }

    /// Return the source address field.
    pub fn src_addr(&self) -> Ipv6Addr {
        let mut bytes = [0; 16];
        bytes.copy_from_slice(&self.0[field::SRC_ADDR]);
        Ipv6Addr::from(bytes)
    }

    /// Return the destination address field.
    pub fn dst_addr(&self) -> Ipv6Addr {
        let mut bytes = [0; 16];
        bytes.copy_from_slice(&self.0[field::DST_ADDR]);
        Ipv6Addr::from(bytes)
    }

    /// Iterate over the extension headers.
    pub fn extensions(&self) -> Extensions<'_> {
        Extensions {
            data: &self.0,
            offset: HEADER_LEN,
            next: self.next_header(),
            done: false,
        }
    }

    /// Walk the whole extension chain.
    pub fn chain(&self) -> Result<Chain> {
        let mut extensions = self.extensions();
        let mut chain = Chain {
            header_len: HEADER_LEN,
            protocol: self.next_header(),
            unknown: 0,
            last_unknown: None,
        };

        while let Some(extension) = extensions.next() {
            let extension = extension?;
            if !extension.kind.is_ipv6_extension() {
                net_trace!("ipv6: unrecognized extension header {}", extension.kind);
                chain.unknown = chain.unknown.saturating_add(1);
                chain.last_unknown = Some(extension.kind);
            }
        }

        chain.header_len = extensions.offset;
        chain.protocol = extensions.next;
        Ok(chain)
    }
}

impl<'a> Extensions<'a> {
    fn extension_len(kind: IpProtocol, len_field: u8) -> usize {
        match kind {
            IpProtocol::Ah => (usize::from(len_field) + 2) * 4,
            IpProtocol::Ipv6Frag => 8,
            _ => (usize::from(len_field) + 1) * 8,
        }
    }
}

impl<'a> Iterator for Extensions<'a> {
    type Item = Result<Extension<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.next.is_upper_layer() {
            return None;
        }

        let header = match self.data.get(self.offset..self.offset + 2) {
            Some(header) => header,
            None => {
                self.done = true;
                return Some(Err(Error::TruncatedIpHeader));
            }
        };

        let len = Self::extension_len(self.next, header[1]);
        let data = match self.data.get(self.offset..self.offset + len) {
            Some(data) => data,
            None => {
                self.done = true;
                return Some(Err(Error::TruncatedIpHeader));
            }
        };

        let extension = Extension { kind: self.next, data };
        self.offset += len;
        self.next = extension.next_header();
        Some(Ok(extension))
    }
}

impl AsRef<[u8]> for ipv6 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
