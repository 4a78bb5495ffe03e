use core::{cmp, fmt, ops};
use byteorder::{ByteOrder, NetworkEndian};

use super::{Error, Result};

/// A TCP sequence number.
///
/// A sequence number is a monotonically advancing integer modulo 2<sup>32</sup>.
/// Sequence numbers do not have a discontiguity when compared pairwise across a signed overflow.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SeqNumber(pub u32);

/// The distance between two sequence numbers was too large to be trusted.
///
/// Carries the raw signed distance that was rejected.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct InvalidDelta(pub i32);

impl SeqNumber {
    /// Bound on the magnitude of a distance accepted by [`diff`](#method.diff).
    pub const MAX_DELTA: i32 = 1 << 30;

    /// The signed distance from `earlier` to `self` in sequence space.
    ///
    /// Fails when the distance is not strictly within ±2<sup>30</sup>. Two segments of one
    /// connection are never that far apart so such a distance indicates corrupted data or a packet
    /// that does not belong to the connection, rather than a wrap of the sequence space.
    pub fn diff(self, earlier: SeqNumber) -> core::result::Result<i32, InvalidDelta> {
        let delta = self.0.wrapping_sub(earlier.0) as i32;
        if -Self::MAX_DELTA < delta && delta < Self::MAX_DELTA {
            Ok(delta)
        } else {
            Err(InvalidDelta(delta))
        }
    }
}

impl fmt::Display for SeqNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for InvalidDelta {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "sequence distance {} out of range", self.0)
    }
}

impl ops::Add<u32> for SeqNumber {
    type Output = SeqNumber;

    fn add(self, rhs: u32) -> SeqNumber {
        SeqNumber(self.0.wrapping_add(rhs))
    }
}

impl ops::Sub<u32> for SeqNumber {
    type Output = SeqNumber;

    fn sub(self, rhs: u32) -> SeqNumber {
        SeqNumber(self.0.wrapping_sub(rhs))
    }
}

impl ops::AddAssign<u32> for SeqNumber {
    fn add_assign(&mut self, rhs: u32) {
        *self = *self + rhs;
    }
}

impl cmp::PartialOrd for SeqNumber {
    fn partial_cmp(&self, other: &SeqNumber) -> Option<cmp::Ordering> {
        (self.0.wrapping_sub(other.0) as i32).partial_cmp(&0)
    }
}

/// A set of tcp flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Flags(pub u16);

byte_wrapper! {
    /// A byte sequence representing a TCP segment.
    #[derive(Debug, PartialEq, Eq)]
    pub struct tcp([u8]);
}

mod field {
    use crate::wire::field::Field;

    pub(crate) const SRC_PORT: Field = 0..2;
    pub(crate) const DST_PORT: Field = 2..4;
    pub(crate) const SEQ_NUM:  Field = 4..8;
    pub(crate) const ACK_NUM:  Field = 8..12;
    pub(crate) const FLAGS:    Field = 12..14;
    pub(crate) const WIN_SIZE: Field = 14..16;
    pub(crate) const URGENT:   Field = 18..20;

    pub(crate) const FLG_FIN: u16 = 0x001;
    pub(crate) const FLG_SYN: u16 = 0x002;
    pub(crate) const FLG_RST: u16 = 0x004;
    pub(crate) const FLG_PSH: u16 = 0x008;
    pub(crate) const FLG_ACK: u16 = 0x010;
    pub(crate) const FLG_URG: u16 = 0x020;
    pub(crate) const FLG_ECE: u16 = 0x040;
    pub(crate) const FLG_CWR: u16 = 0x080;
    pub(crate) const FLG_NS:  u16 = 0x100;

    pub(crate) const OPT_END: u8 = 0x00;
    pub(crate) const OPT_NOP: u8 = 0x01;
    pub(crate) const OPT_MSS: u8 = 0x02;
    pub(crate) const OPT_WS:  u8 = 0x03;
    pub(crate) const OPT_SACKPERM: u8 = 0x04;
    pub(crate) const OPT_SACKRNG:  u8 = 0x05;
    pub(crate) const OPT_TSTAMP:   u8 = 0x08;
}

/// The length of a TCP header without options.
pub const HEADER_LEN: usize = field::URGENT.end;

/// The most option bytes a header can carry.
pub const MAX_OPTIONS_LEN: usize = 40;

impl tcp {
    /// Imbue a raw octet buffer with TCP segment structure.
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

    /// Ensure that no header accessor method will panic if called.
    ///
    /// Returns `Err(Error::TruncatedTcpHeader)` if the buffer is shorter than the fixed header,
    /// shorter than the header length including options, or if the header length field has a
    /// value smaller than the fixed header.
    pub fn check_len(&self) -> Result<()> {
        let len = self.0.len();
        if len < HEADER_LEN {
            return Err(Error::TruncatedTcpHeader);
        }

        let header_len = self.header_len();
        if len < header_len || header_len < HEADER_LEN {
            Err(Error::TruncatedTcpHeader)
        } else {
            Ok(())
        }
    }

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Return the source port field.
    #[inline]
    pub fn src_port(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::SRC_PORT])
    }

    /// Return the destination port field.
    #[inline]
    pub fn dst_port(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::DST_PORT])
    }

    /// Return the sequence number field.
    #[inline]
    pub fn seq_number(&self) -> SeqNumber {
        SeqNumber(NetworkEndian::read_u32(&self.0[field::SEQ_NUM]))
    }

    /// Return the acknowledgement number field.
    #[inline]
    pub fn ack_number(&self) -> SeqNumber {
        SeqNumber(NetworkEndian::read_u32(&self.0[field::ACK_NUM]))
    }

    /// Read all flags at once.
    pub fn flags(&self) -> Flags {
        Flags(NetworkEndian::read_u16(&self.0[field::FLAGS]) & 0x1ff)
    }

    /// Return the header length, in octets.
    #[inline]
    pub fn header_len(&self) -> usize {
        let raw = NetworkEndian::read_u16(&self.0[field::FLAGS]);
        usize::from(raw >> 12) * 4
    }

    /// Return the window size field.
    #[inline]
    pub fn window_len(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::WIN_SIZE])
    }

    /// Return the raw option bytes.
    #[inline]
    pub fn option_bytes(&self) -> &[u8] {
        &self.0[HEADER_LEN..self.header_len()]
    }

    /// Iterate over the options.
    pub fn options(&self) -> Options<'_> {
        Options { data: self.option_bytes() }
    }

    /// Return the captured part of the payload.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.0[self.header_len()..]
    }
}

impl AsRef<[u8]> for tcp {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Flags {
    /// The FIN flag.
    pub const FIN: Flags = Flags(field::FLG_FIN);
    /// The SYN flag.
    pub const SYN: Flags = Flags(field::FLG_SYN);
    /// The RST flag.
    pub const RST: Flags = Flags(field::FLG_RST);
    /// The PSH flag.
    pub const PSH: Flags = Flags(field::FLG_PSH);
    /// The ACK flag.
    pub const ACK: Flags = Flags(field::FLG_ACK);
    /// The ECE flag.
    pub const ECE: Flags = Flags(field::FLG_ECE);

    /// Return the FIN flag.
    #[inline]
    pub fn fin(&self) -> bool {
        self.0 & field::FLG_FIN != 0
    }

    /// Return the SYN flag.
    #[inline]
    pub fn syn(&self) -> bool {
        self.0 & field::FLG_SYN != 0
    }

    /// Return the RST flag.
    #[inline]
    pub fn rst(&self) -> bool {
        self.0 & field::FLG_RST != 0
    }

    /// Return the PSH flag.
    #[inline]
    pub fn psh(&self) -> bool {
        self.0 & field::FLG_PSH != 0
    }

    /// Return the ACK flag.
    #[inline]
    pub fn ack(&self) -> bool {
        self.0 & field::FLG_ACK != 0
    }

    /// Return the URG flag.
    #[inline]
    pub fn urg(&self) -> bool {
        self.0 & field::FLG_URG != 0
    }

    /// Return the ECE flag.
    #[inline]
    pub fn ece(&self) -> bool {
        self.0 & field::FLG_ECE != 0
    }

    /// Return the CWR flag.
    #[inline]
    pub fn cwr(&self) -> bool {
        self.0 & field::FLG_CWR != 0
    }

    /// Return the NS flag.
    #[inline]
    pub fn ns(&self) -> bool {
        self.0 & field::FLG_NS != 0
    }

    /// Whether the segment occupies one unit of sequence space due to its flags.
    #[inline]
    pub fn is_syn_or_fin(&self) -> bool {
        self.syn() || self.fin()
    }
}

impl ops::BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

/// A range of sequence space reported by a selective acknowledgement.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct SackBlock {
    /// The first sequence number of the block.
    pub left: SeqNumber,
    /// The sequence number following the block.
    pub right: SeqNumber,
}

/// The blocks of a SACK option, decoded on demand.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct SackBlocks<'a> {
    data: &'a [u8],
}

impl<'a> SackBlocks<'a> {
    /// The number of blocks in the option.
    pub fn len(&self) -> usize {
        self.data.len() / 8
    }

    /// Whether the option contains no blocks at all.
    pub fn is_empty(&self) -> bool {
        self.data.len() < 8
    }
}

impl<'a> Iterator for SackBlocks<'a> {
    type Item = SackBlock;

    fn next(&mut self) -> Option<SackBlock> {
        if self.data.len() < 8 {
            return None;
        }

        // RFC 2018: Each contiguous block of data queued at the data receiver is defined in the
        // SACK option by two 32-bit unsigned integers in network byte order[...]
        let (block, rest) = self.data.split_at(8);
        self.data = rest;
        Some(SackBlock {
            left: SeqNumber(NetworkEndian::read_u32(&block[0..4])),
            right: SeqNumber(NetworkEndian::read_u32(&block[4..8])),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len(), Some(self.len()))
    }
}

impl ExactSizeIterator for SackBlocks<'_> { }

/// A single TCP option.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TcpOption<'a> {
    /// Marks the end of the option list.
    EndOfList,
    /// Padding between options.
    NoOperation,
    /// The maximum segment size the sender is willing to receive.
    MaxSegmentSize(u16),
    /// The shift applied to all windows advertised by the sender after the handshake.
    WindowScale(u8),
    /// The sender accepts selective acknowledgements.
    SackPermitted,
    /// Selectively acknowledged ranges of sequence space.
    Sack(SackBlocks<'a>),
    /// The timestamp option of RFC 7323.
    Timestamps {
        /// The sender's current timestamp clock (TSval).
        value: u32,
        /// The most recent value received from the peer (TSecr).
        echo: u32,
    },
    /// Any other option.
    Unknown {
        /// The option kind.
        kind: u8,
        /// The option data, without kind and length octets.
        data: &'a [u8],
    },
}

impl<'a> TcpOption<'a> {
    /// Parse the first option in `buffer`, returning the remaining bytes as well.
    ///
    /// All length errors are reported as `Error::BadOption`, including options that claim more
    /// bytes than are left in the header.
    pub fn parse(buffer: &'a [u8]) -> Result<(&'a [u8], TcpOption<'a>)> {
        let (length, option);
        match *buffer.get(0).ok_or(Error::BadOption)? {
            field::OPT_END => {
                length = 1;
                option = TcpOption::EndOfList;
            }
            field::OPT_NOP => {
                length = 1;
                option = TcpOption::NoOperation;
            }
            kind => {
                length = *buffer.get(1).ok_or(Error::BadOption)? as usize;
                if length < 2 || length > MAX_OPTIONS_LEN {
                    return Err(Error::BadOption);
                }
                let data = buffer.get(2..length).ok_or(Error::BadOption)?;
                option = match (kind, length) {
                    (field::OPT_MSS, 4) =>
                        TcpOption::MaxSegmentSize(NetworkEndian::read_u16(data)),
                    (field::OPT_WS, 3) =>
                        TcpOption::WindowScale(data[0]),
                    (field::OPT_SACKPERM, 2) =>
                        TcpOption::SackPermitted,
                    (field::OPT_SACKRNG, n) if n >= 10 && (n - 2) % 8 == 0 =>
                        TcpOption::Sack(SackBlocks { data }),
                    (field::OPT_TSTAMP, 10) => TcpOption::Timestamps {
                        value: NetworkEndian::read_u32(&data[0..4]),
                        echo: NetworkEndian::read_u32(&data[4..8]),
                    },
                    (field::OPT_MSS, _) | (field::OPT_WS, _) | (field::OPT_SACKPERM, _)
                        | (field::OPT_SACKRNG, _) | (field::OPT_TSTAMP, _) =>
                        return Err(Error::BadOption),
                    (_, _) =>
                        TcpOption::Unknown { kind, data },
                };
            }
        }
        Ok((&buffer[length..], option))
    }

    /// The option kind as it appears on the wire.
    pub fn kind(&self) -> u8 {
        match self {
            TcpOption::EndOfList => field::OPT_END,
            TcpOption::NoOperation => field::OPT_NOP,
            TcpOption::MaxSegmentSize(_) => field::OPT_MSS,
            TcpOption::WindowScale(_) => field::OPT_WS,
            TcpOption::SackPermitted => field::OPT_SACKPERM,
            TcpOption::Sack(_) => field::OPT_SACKRNG,
            TcpOption::Timestamps { .. } => field::OPT_TSTAMP,
            TcpOption::Unknown { kind, .. } => *kind,
        }
    }
}

/// Iterates the options of a header.
///
/// Padding is skipped and the end of list marker ends the iteration. After an error no further
/// options are produced, as their boundaries are unknown.
#[derive(Debug, Clone)]
pub struct Options<'a> {
    data: &'a [u8],
}

impl<'a> Iterator for Options<'a> {
    type Item = Result<TcpOption<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.data.is_empty() {
                return None;
            }

            match TcpOption::parse(self.data) {
                Ok((_, TcpOption::EndOfList)) => {
                    self.data = &[];
                    return None;
                }
                Ok((rest, TcpOption::NoOperation)) => self.data = rest,
                Ok((rest, option)) => {
                    self.data = rest;
                    return Some(Ok(option));
                }
                Err(err) => {
                    self.data = &[];
                    return Some(Err(err));
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    static PACKET_BYTES: [u8; 28] =
        [0xbf, 0x00, 0x00, 0x50,
         0x01, 0x23, 0x45, 0x67,
         0x89, 0xab, 0xcd, 0xef,
         0x60, 0x35, 0x01, 0x23,
         0x01, 0xb6, 0x02, 0x01,
         0x03, 0x03, 0x0c, 0x01,
         0xaa, 0x00, 0x00, 0xff];

    static OPTION_BYTES: [u8; 4] =
        [0x03, 0x03, 0x0c, 0x01];

    static PAYLOAD_BYTES: [u8; 4] =
        [0xaa, 0x00, 0x00, 0xff];

    #[test]
    fn test_deconstruct() {
        let packet = tcp::new_checked(&PACKET_BYTES[..]).unwrap();
        assert_eq!(packet.src_port(), 48896);
        assert_eq!(packet.dst_port(), 80);
        assert_eq!(packet.seq_number(), SeqNumber(0x01234567));
        assert_eq!(packet.ack_number(), SeqNumber(0x89abcdef));
        assert_eq!(packet.header_len(), 24);
        assert_eq!(packet.flags().fin(), true);
        assert_eq!(packet.flags().syn(), false);
        assert_eq!(packet.flags().rst(), true);
        assert_eq!(packet.flags().psh(), false);
        assert_eq!(packet.flags().ack(), true);
        assert_eq!(packet.flags().urg(), true);
        assert_eq!(packet.window_len(), 0x0123);
        assert_eq!(packet.option_bytes(), &OPTION_BYTES[..]);
        assert_eq!(packet.payload(), &PAYLOAD_BYTES[..]);

        let options: Vec<_> = packet.options().collect();
        assert_eq!(options, vec![Ok(TcpOption::WindowScale(12))]);
    }

    #[test]
    fn test_truncated() {
        assert_eq!(tcp::new_checked(&PACKET_BYTES[..19]), Err(Error::TruncatedTcpHeader));
        // Ends within the options.
        assert_eq!(tcp::new_checked(&PACKET_BYTES[..23]), Err(Error::TruncatedTcpHeader));
        assert!(tcp::new_checked(&PACKET_BYTES[..24]).is_ok());
    }

    #[test]
    fn test_impossible_len() {
        let mut bytes = PACKET_BYTES;
        bytes[12] = 0x40;
        assert_eq!(tcp::new_checked(&bytes[..]), Err(Error::TruncatedTcpHeader));
    }

    static SYN_OPTIONS: [u8; 20] =
        [0x02, 0x04, 0x05, 0xb4,
         0x04, 0x02, 0x08, 0x0a,
         0x00, 0x00, 0x10, 0x00,
         0x00, 0x00, 0x00, 0x00,
         0x01, 0x03, 0x03, 0x07];

    #[test]
    fn test_syn_options() {
        let options: Vec<_> = Options { data: &SYN_OPTIONS }
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(options, vec![
            TcpOption::MaxSegmentSize(1460),
            TcpOption::SackPermitted,
            TcpOption::Timestamps { value: 4096, echo: 0 },
            TcpOption::WindowScale(7),
        ]);
        let kinds: Vec<u8> = options.iter().map(TcpOption::kind).collect();
        assert_eq!(kinds, [2, 4, 8, 3]);
    }

    #[test]
    fn test_end_of_list() {
        let data = [0x01, 0x00, 0x02, 0x04, 0x05, 0xb4];
        assert_eq!(Options { data: &data }.count(), 0);
    }

    #[test]
    fn test_sack_blocks() {
        let data =
            [0x01, 0x01, 0x05, 0x12,
             0x00, 0x00, 0x03, 0xe8,
             0x00, 0x00, 0x07, 0xd0,
             0x00, 0x00, 0x0b, 0xb8,
             0x00, 0x00, 0x0f, 0xa0];
        let mut options = Options { data: &data };
        let blocks = match options.next() {
            Some(Ok(TcpOption::Sack(blocks))) => blocks,
            other => panic!("unexpected option {:?}", other),
        };
        assert_eq!(blocks.len(), 2);
        let blocks: Vec<_> = blocks.collect();
        assert_eq!(blocks, [
            SackBlock { left: SeqNumber(1000), right: SeqNumber(2000) },
            SackBlock { left: SeqNumber(3000), right: SeqNumber(4000) },
        ]);
        assert_eq!(options.next(), None);
    }

    #[test]
    fn test_bad_options() {
        // Length exceeds the remaining bytes.
        assert_eq!(TcpOption::parse(&[0x02, 0x04, 0x05]), Err(Error::BadOption));
        // Length below the kind and length octets.
        assert_eq!(TcpOption::parse(&[0x1e, 0x01, 0x05]), Err(Error::BadOption));
        // Missing length octet.
        assert_eq!(TcpOption::parse(&[0x02]), Err(Error::BadOption));
        // Wrong fixed length.
        assert_eq!(TcpOption::parse(&[0x03, 0x04, 0x05, 0x00]), Err(Error::BadOption));
        // A SACK option with a partial block.
        assert_eq!(TcpOption::parse(&[0x05, 0x06, 0, 0, 0, 0]), Err(Error::BadOption));

        let data = [0x01, 0x02, 0x09, 0x00];
        let mut options = Options { data: &data };
        assert_eq!(options.next(), Some(Err(Error::BadOption)));
        assert_eq!(options.next(), None);
    }

    #[test]
    fn test_unknown_option() {
        let data = [0x1e, 0x04, 0xab, 0xcd];
        let (rest, option) = TcpOption::parse(&data).unwrap();
        assert!(rest.is_empty());
        assert_eq!(option, TcpOption::Unknown { kind: 30, data: &[0xab, 0xcd] });
    }

    #[test]
    fn test_seq_diff() {
        assert_eq!(SeqNumber(1000).diff(SeqNumber(400)), Ok(600));
        assert_eq!(SeqNumber(400).diff(SeqNumber(1000)), Ok(-600));
        assert_eq!(SeqNumber(5).diff(SeqNumber(u32::max_value() - 4)), Ok(10));
        assert_eq!(SeqNumber(1 << 30).diff(SeqNumber(0)), Err(InvalidDelta(1 << 30)));
        assert_eq!(SeqNumber(0).diff(SeqNumber(1 << 30)), Err(InvalidDelta(-(1 << 30))));
        assert_eq!(SeqNumber((1 << 30) - 1).diff(SeqNumber(0)), Ok((1 << 30) - 1));
    }

    #[test]
    fn test_seq_order() {
        assert!(SeqNumber(5) > SeqNumber(u32::max_value()));
        assert!(SeqNumber(10) + 5 == SeqNumber(15));
        assert!(SeqNumber(0) - 1 == SeqNumber(u32::max_value()));
    }
}
