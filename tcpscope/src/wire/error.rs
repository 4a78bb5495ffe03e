use core::fmt;

/// The error type for decoding captures and their packets.
///
/// Errors are structural: the bytes at hand can not be interpreted as the layer they are supposed
/// to contain. Whether such an error ends the analysis of the whole capture or only skips a single
/// packet is up to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Error {
    /// The capture container ended in the middle of its file header or of a record.
    TruncatedCapture,

    /// The capture container does not start with a supported magic number.
    UnsupportedMagicNumber,

    /// The frame is shorter than an Ethernet II header.
    TruncatedEthernetHeader,

    /// The frame ended within the IP header, or within an IPv6 extension header.
    TruncatedIpHeader,

    /// The packet ended within the TCP header, including its options.
    TruncatedTcpHeader,

    /// The EtherType of the frame is neither IPv4 nor IPv6.
    UnknownEtherType,

    /// The frame does not contain an IP layer where one was expected.
    ///
    /// E.g. an IPv4 EtherType with a header whose version nibble is not 4.
    NoIpLayer,

    /// A TCP option had an impossible length or an impossible value for its kind.
    BadOption,
}

/// The result type for decoding.
pub type Result<T> = core::result::Result<T, Error>;

impl Error {
    /// Whether the error concerns the capture container instead of a single packet.
    ///
    /// No further packets can be read from a capture after such an error.
    pub fn is_capture_error(self) -> bool {
        match self {
            Error::TruncatedCapture | Error::UnsupportedMagicNumber => true,
            _ => false,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::TruncatedCapture        => write!(f, "truncated capture"),
            Error::UnsupportedMagicNumber  => write!(f, "unsupported capture magic number"),
            Error::TruncatedEthernetHeader => write!(f, "truncated ethernet header"),
            Error::TruncatedIpHeader       => write!(f, "truncated IP header"),
            Error::TruncatedTcpHeader      => write!(f, "truncated TCP header"),
            Error::UnknownEtherType        => write!(f, "unknown ethernet type"),
            Error::NoIpLayer               => write!(f, "no IP layer"),
            Error::BadOption               => write!(f, "bad TCP option"),
        }
    }
}

impl std::error::Error for Error { }
