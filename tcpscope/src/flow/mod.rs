//! Reconstruction of TCP connections from decoded segments.
//!
//! A [`Connection`] receives the packets of a capture in order and attributes each TCP segment to
//! one of two endpoints. Every endpoint owns a [`Tracker`] of the sequence space it sends, which
//! the acknowledgements of its peer are matched against. The result is a [`Summary`] of counters,
//! round trip times and jitter for both directions.
//!
//! For the common case of a capture in memory, [`summarize`] does everything:
//!
//! ```
//! use tcpscope::flow::{summarize, Config};
//!
//! // A capture file consisting only of its header.
//! let capture = [
//!     0xd4, 0xc3, 0xb2, 0xa1, 0x02, 0x00, 0x04, 0x00,
//!     0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
//!     0xff, 0xff, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00,
//! ];
//!
//! let summary = summarize(&capture, &Config::default(), &mut ()).unwrap();
//! assert_eq!(summary.packets, 0);
//! assert!(summary.left.is_none());
//! ```
//!
//! [`Connection`]: struct.Connection.html
//! [`Tracker`]: tracker/struct.Tracker.html
//! [`Summary`]: struct.Summary.html
//! [`summarize`]: fn.summarize.html
mod connection;
mod endpoint;
pub mod histogram;
pub mod jitter;
mod matcher;
mod observer;
pub mod tracker;

pub use self::connection::{
    summarize,
    Connection,
    DecodeErrors,
    Summary};

pub use self::endpoint::{
    Direction,
    EndpointState,
    Stats};

pub use self::histogram::{LogHistogram, Percentiles};

pub use self::matcher::{AckMatcher, Sent};

pub use self::observer::{
    Anomaly,
    LogObserver,
    Observer,
    Sampled,
    Side};

/// What to do with a packet that can not be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Count the error and continue with the next packet.
    Skip,
    /// Stop and return the error.
    Abort,
}

/// Parameters of the analysis.
#[derive(Debug, Clone)]
pub struct Config {
    /// The bins of all round trip time and jitter histograms, in seconds.
    ///
    /// Samples are added to copies, this one stays empty.
    pub histogram: LogHistogram,
    /// Unacknowledged segments remembered per direction.
    pub matcher_capacity: usize,
    /// The treatment of undecodable packets.
    pub on_error: ErrorPolicy,
}

impl Config {
    /// The default number of remembered segments.
    pub const DEFAULT_MATCHER_CAPACITY: usize = 4096;
}

impl Default for Config {
    fn default() -> Self {
        Config {
            histogram: LogHistogram::default(),
            matcher_capacity: Config::DEFAULT_MATCHER_CAPACITY,
            on_error: ErrorPolicy::Skip,
        }
    }
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        ErrorPolicy::Skip
    }
}
