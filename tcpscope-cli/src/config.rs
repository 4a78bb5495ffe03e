use std::path::PathBuf;

use structopt::StructOpt;
use tcpscope::flow::{self, histogram::InvalidRange, ErrorPolicy, LogHistogram};

#[derive(Clone, Debug, StructOpt)]
#[structopt(name = "tcpscope", about = "Summarize the TCP connection recorded in pcap files")]
pub struct Config {
    /// Capture files, possibly gzip compressed.
    #[structopt(parse(from_os_str), required = true)]
    pub captures: Vec<PathBuf>,

    /// Print the summaries as JSON.
    #[structopt(long)]
    pub json: bool,

    /// Fail on the first packet that can not be decoded.
    #[structopt(long)]
    pub strict: bool,

    /// More log output, may be repeated.
    #[structopt(short = "v", long, parse(from_occurrences))]
    pub verbose: u8,

    /// Forward only every n-th packet event to the log.
    #[structopt(long, default_value = "1")]
    pub sample: u64,

    /// Unacknowledged segments remembered per direction.
    #[structopt(long, default_value = "4096")]
    pub matcher_capacity: usize,

    /// Smallest round trip time resolved, in seconds.
    #[structopt(long, default_value = "0.00001")]
    pub rtt_min: f64,

    /// Largest round trip time resolved, in seconds.
    #[structopt(long, default_value = "10")]
    pub rtt_max: f64,

    /// Histogram bins per factor of ten.
    #[structopt(long, default_value = "6")]
    pub bins_per_decade: f64,
}

impl Config {
    pub fn from_args() -> Self {
        StructOpt::from_args()
    }

    /// The analysis parameters.
    pub fn flow(&self) -> Result<flow::Config, InvalidRange> {
        Ok(flow::Config {
            histogram: LogHistogram::new(self.rtt_min, self.rtt_max, self.bins_per_decade)?,
            matcher_capacity: self.matcher_capacity,
            on_error: if self.strict { ErrorPolicy::Abort } else { ErrorPolicy::Skip },
        })
    }

    /// The default log filter for the verbosity.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}
