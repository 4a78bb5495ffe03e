//! The classic pcap capture container.
//!
//! A capture starts with a 24 byte file header followed by records of a 16 byte header and the
//! captured bytes of one frame. Both header kinds are written in the byte order of the capturing
//! machine which is announced by the magic number, as is the resolution of the timestamps.
//!
//! ```text
//! +-------+---------+---------+----------+---------+----------+----------+
//! | magic | v major | v minor | thiszone | sigfigs | snaplen  | linktype |
//! | u32   | u16     | u16     | i32      | u32     | u32      | u32      |
//! +-------+---------+---------+----------+---------+----------+----------+
//! ```
use byteorder::{BigEndian, ByteOrder, LittleEndian};

use super::{Error, Result};
use crate::time::Instant;

const MAGIC_MICROS: u32 = 0xa1b2_c3d4;
const MAGIC_NANOS:  u32 = 0xa1b2_3c4d;

/// The link type of Ethernet captures.
pub const LINKTYPE_ETHERNET: u32 = 1;

mod field {
    use crate::wire::field::Field;

    pub(crate) const MAGIC:    Field = 0..4;
    pub(crate) const VERSION_MAJOR: Field = 4..6;
    pub(crate) const VERSION_MINOR: Field = 6..8;
    pub(crate) const SNAPLEN:  Field = 16..20;
    pub(crate) const LINKTYPE: Field = 20..24;

    pub(crate) const TS_SEC:   Field = 0..4;
    pub(crate) const TS_FRAC:  Field = 4..8;
    pub(crate) const CAPLEN:   Field = 8..12;
    pub(crate) const ORIGLEN:  Field = 12..16;
}

/// Length of the file header.
pub const FILE_HEADER_LEN: usize = field::LINKTYPE.end;

/// Length of each record header.
pub const RECORD_HEADER_LEN: usize = field::ORIGLEN.end;

/// The byte order of a capture file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    /// Written by a little endian machine.
    Little,
    /// Written by a big endian machine.
    Big,
}

/// The resolution of record timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The fractional part counts microseconds.
    Micros,
    /// The fractional part counts nanoseconds.
    Nanos,
}

/// The parsed file header of a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    /// Byte order of all headers in the file.
    pub endian: Endian,
    /// Timestamp resolution of all records.
    pub resolution: Resolution,
    /// Major and minor format version.
    pub version: (u16, u16),
    /// The maximum number of bytes captured per frame.
    pub snaplen: u32,
    /// The link layer of all frames.
    pub linktype: u32,
}

/// One captured frame.
///
/// The data borrows from the capture buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawPacket<'a> {
    /// Position of the record within the capture, starting at zero.
    pub index: usize,
    /// The capture time, normalized to nanoseconds.
    pub time: Instant,
    /// The length of the frame on the wire, at least the captured length.
    pub original_len: u32,
    /// The captured bytes.
    pub data: &'a [u8],
}

/// A reader for a capture held in memory.
///
/// Yields every record in order. After an error, no further records are produced since the record
/// boundaries are lost.
#[derive(Debug, Clone)]
pub struct Capture<'a> {
    header: FileHeader,
    data: &'a [u8],
    index: usize,
    failed: bool,
}

impl Endian {
    /// Read a 16-bit field in this byte order.
    pub fn read_u16(self, buf: &[u8]) -> u16 {
        match self {
            Endian::Little => LittleEndian::read_u16(buf),
            Endian::Big => BigEndian::read_u16(buf),
        }
    }

    /// Read a 32-bit field in this byte order.
    pub fn read_u32(self, buf: &[u8]) -> u32 {
        match self {
            Endian::Little => LittleEndian::read_u32(buf),
            Endian::Big => BigEndian::read_u32(buf),
        }
    }
}

impl Resolution {
    fn nanos_per_unit(self) -> i64 {
        match self {
            Resolution::Micros => 1_000,
            Resolution::Nanos => 1,
        }
    }
}

impl FileHeader {
    /// Parse the file header at the start of `data`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let header = data.get(..FILE_HEADER_LEN).ok_or(Error::TruncatedCapture)?;
        let magic = &header[field::MAGIC];

        let (endian, resolution) = match (LittleEndian::read_u32(magic), BigEndian::read_u32(magic)) {
            (MAGIC_MICROS, _) => (Endian::Little, Resolution::Micros),
            (MAGIC_NANOS, _) => (Endian::Little, Resolution::Nanos),
            (_, MAGIC_MICROS) => (Endian::Big, Resolution::Micros),
            (_, MAGIC_NANOS) => (Endian::Big, Resolution::Nanos),
            (other, _) => {
                net_debug!("pcap: unsupported magic number 0x{:08x}", other);
                return Err(Error::UnsupportedMagicNumber);
            },
        };

        Ok(FileHeader {
            endian,
            resolution,
            version: (
                endian.read_u16(&header[field::VERSION_MAJOR]),
                endian.read_u16(&header[field::VERSION_MINOR]),
            ),
            snaplen: endian.read_u32(&header[field::SNAPLEN]),
            linktype: endian.read_u32(&header[field::LINKTYPE]),
        })
    }
}

impl<'a> Capture<'a> {
    /// Start reading a capture from its file header.
    pub fn new(data: &'a [u8]) -> Result<Self> {
        let header = FileHeader::parse(data)?;
        if header.linktype != LINKTYPE_ETHERNET {
            net_debug!("pcap: link type {} is read as ethernet", header.linktype);
        }

        Ok(Capture {
            header,
            data: &data[FILE_HEADER_LEN..],
            index: 0,
            failed: false,
        })
    }

    /// The file header.
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    fn read_record(&mut self) -> Result<RawPacket<'a>> {
        let endian = self.header.endian;
        let record = self.data.get(..RECORD_HEADER_LEN).ok_or(Error::TruncatedCapture)?;

        let secs = i64::from(endian.read_u32(&record[field::TS_SEC]));
        let frac = i64::from(endian.read_u32(&record[field::TS_FRAC]));
        let caplen = endian.read_u32(&record[field::CAPLEN]) as usize;
        let original_len = endian.read_u32(&record[field::ORIGLEN]);

        let end = RECORD_HEADER_LEN.checked_add(caplen).ok_or(Error::TruncatedCapture)?;
        let data = self.data.get(RECORD_HEADER_LEN..end).ok_or(Error::TruncatedCapture)?;
        self.data = &self.data[end..];

        let nanos = secs * 1_000_000_000 + frac * self.header.resolution.nanos_per_unit();
        let packet = RawPacket {
            index: self.index,
            time: Instant::from_nanos(nanos),
            original_len,
            data,
        };
        self.index += 1;
        Ok(packet)
    }
}

impl<'a> Iterator for Capture<'a> {
    type Item = Result<RawPacket<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.data.is_empty() {
            return None;
        }

        let record = self.read_record();
        if let Err(err) = record {
            net_debug!("pcap: record {}: {}", self.index, err);
            self.failed = true;
        }
        Some(record)
    }
}
