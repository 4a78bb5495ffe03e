use core::fmt;
use std::path::PathBuf;

use serde_json::{json, Value};
use tcpscope::flow::{Side, Summary};

/// The outcome of analyzing one capture file.
pub struct Report {
    /// The capture file.
    pub path: PathBuf,
    /// Its summary, or why there is none.
    pub outcome: anyhow::Result<Summary>,
}

impl Report {
    pub fn new(path: PathBuf, outcome: anyhow::Result<Summary>) -> Self {
        Report { path, outcome }
    }

    /// Retransmitted segments of the left and the right side.
    fn retransmits(summary: &Summary) -> (u64, u64) {
        let count = |side| summary.direction(side)
            .map_or(0, |direction| direction.seq.retransmit_packets);
        (count(Side::Left), count(Side::Right))
    }

    fn elapsed_secs(summary: &Summary) -> f64 {
        summary.duration().map_or(0.0, |duration| duration.as_secs_f64())
    }

    /// The report as a JSON document.
    pub fn to_json(&self) -> Value {
        match &self.outcome {
            Ok(summary) => json!({
                "path": self.path.display().to_string(),
                "summary": summary,
            }),
            Err(err) => json!({
                "path": self.path.display().to_string(),
                "error": format!("{:#}", err),
            }),
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let summary = match &self.outcome {
            Ok(summary) => summary,
            Err(err) => return write!(f, "[{}] failed: {:#}", self.path.display(), err),
        };

        // One line per file first, in the spirit of a transfer report:
        //
        // ```text
        // [trace.pcap] 0.000-12.345 sec   336 packets   11/8 retransmits   0 errors
        // ```
        let (left, right) = Report::retransmits(summary);
        writeln!(
            f,
            "[{path}] 0.000-{end:.3} sec\t{packets} packets\t{left}/{right} retransmits\t{errors} errors",
            path = self.path.display(),
            end = Report::elapsed_secs(summary),
            packets = summary.packets,
            left = left,
            right = right,
            errors = summary.decode_errors.total(),
        )?;
        write!(f, "{}", summary)
    }
}

#[cfg(test)]
mod test {
    use anyhow::anyhow;
    use tcpscope::flow::{summarize, Config};
    use super::*;

    static HEADER_ONLY: [u8; 24] = [
        0xd4, 0xc3, 0xb2, 0xa1, 0x02, 0x00, 0x04, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0xff, 0xff, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00,
    ];

    fn empty() -> Summary {
        summarize(&HEADER_ONLY, &Config::default(), &mut ()).unwrap()
    }

    #[test]
    fn display() {
        let report = Report::new("empty.pcap".into(), Ok(empty()));
        let text = report.to_string();
        assert!(text.starts_with("[empty.pcap] 0.000-0.000 sec\t0 packets\t0/0 retransmits\t0 errors\n"));

        let report = Report::new("gone.pcap".into(), Err(anyhow!("no such file")));
        assert_eq!(report.to_string(), "[gone.pcap] failed: no such file");
    }

    #[test]
    fn json() {
        let report = Report::new("empty.pcap".into(), Ok(empty()));
        let value = report.to_json();
        assert_eq!(value["path"], "empty.pcap");
        assert_eq!(value["summary"]["packets"], 0);
        assert_eq!(value["summary"]["truncated_capture"], false);
        assert!(value["summary"]["left"].is_null());

        let report = Report::new("gone.pcap".into(), Err(anyhow!("no such file")));
        assert_eq!(report.to_json()["error"], "no such file");
    }
}
