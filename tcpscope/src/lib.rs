//! Offline analysis of TCP connections recorded in packet captures.
//!
//! ## Table of contents
//!
//! 1. [Design](#design-and-relevant-core-concepts)
//! 2. [The wire module](wire/index.html)
//!    1. [Capture containers](wire/pcap/index.html)
//!    1. [Decoded headers](wire/struct.Headers.html)
//! 3. [The flow module](flow/index.html)
//!    1. [Sequence tracking](flow/tracker/index.html)
//!    1. [Latency histograms](flow/histogram/index.html)
//!    1. [Connections and summaries](flow/struct.Connection.html)
//!
//! ## Design and relevant core concepts
//!
//! A capture is a fully materialized byte buffer. Nothing in the decoding path copies packet
//! bytes: every header is a dynamically sized view into the capture buffer whose accessors are
//! valid once its `check_len` succeeded. Structural problems of a packet (a truncated header, an
//! unknown link type) are reported as a [`wire::Error`] and it is up to the caller to skip the
//! packet or to abandon the capture.
//!
//! Everything that happens *between* well-formed packets is not an error. Retransmissions, gaps
//! in the sequence space, nonsensical selective acknowledgements, sends beyond the advertised
//! window: these are the things a capture is interesting for. They are counted in the
//! [`flow::Summary`] and reported to an [`flow::Observer`] chosen by the caller.
//!
//! Processing of one capture is strictly sequential since the state of each direction depends on
//! the order of segments. Independent captures share no state at all and can be summarized on as
//! many threads as desired.
//!
//! ## Features
//!
//! * `log` (default): trace and debug output through the `log` facade. Without it the logging
//!   macros compile to nothing, so `--no-default-features` must keep building as well.
//! * `serde`: `Serialize` for the summary types.
//!
//! [`wire::Error`]: wire/enum.Error.html
//! [`flow::Summary`]: flow/struct.Summary.html
//! [`flow::Observer`]: flow/trait.Observer.html
#![warn(missing_docs)]
#![warn(unreachable_pub)]

#[macro_use] mod macros;
pub mod flow;
pub mod time;
pub mod wire;
