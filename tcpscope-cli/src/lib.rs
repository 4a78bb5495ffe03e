//! Summaries of the TCP connections recorded in capture files.
//!
//! Every capture is analyzed on its own thread. A capture may be gzip compressed, which is
//! detected from its first bytes rather than its name.
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{anyhow, Context};
use flate2::read::GzDecoder;
use tcpscope::flow::{self, LogObserver, Sampled, Summary};

mod report;

pub mod config;
pub use report::Report;

/// The magic bytes of a gzip stream.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Decompress the data if it is a gzip stream.
pub fn decompress(data: Vec<u8>) -> anyhow::Result<Vec<u8>> {
    if !data.starts_with(&GZIP_MAGIC) {
        return Ok(data);
    }

    let mut plain = Vec::with_capacity(data.len() * 4);
    GzDecoder::new(&data[..])
        .read_to_end(&mut plain)
        .context("decompressing gzip stream")?;
    Ok(plain)
}

/// Read a capture file into memory.
pub fn load(path: &Path) -> anyhow::Result<Vec<u8>> {
    let data = fs::read(path)
        .with_context(|| format!("reading {}", path.display()))?;
    decompress(data)
        .with_context(|| format!("loading {}", path.display()))
}

/// Summarize a single capture file.
pub fn analyze(path: &Path, config: &flow::Config, sample: u64) -> anyhow::Result<Summary> {
    let data = load(path)?;
    log::info!("{}: {} bytes of capture", path.display(), data.len());

    let mut observer = Sampled::new(LogObserver, sample);
    let summary = flow::summarize(&data, config, &mut observer)
        .with_context(|| format!("analyzing {}", path.display()))?;
    if summary.truncated_capture {
        log::warn!("{}: capture ends within a record", path.display());
    }
    Ok(summary)
}

/// Analyze all captures of the configuration concurrently.
///
/// Reports are in the order of the paths. A capture that fails does not affect the others.
pub fn run(config: &config::Config) -> anyhow::Result<Vec<Report>> {
    let flow = config.flow()?;
    let flow = &flow;

    thread::scope(|scope| {
        let workers: Vec<_> = config.captures.iter()
            .map(|path| scope.spawn(move || {
                Report::new(path.clone(), analyze(path, flow, config.sample))
            }))
            .collect();

        workers.into_iter()
            .zip(&config.captures)
            .map(|(worker, path)| worker.join()
                .map_err(|_| anyhow!("analysis of {} panicked", path.display())))
            .collect()
    })
}

/// The paths of all failed analyses.
pub fn failures(reports: &[Report]) -> Vec<&PathBuf> {
    reports.iter()
        .filter(|report| report.outcome.is_err())
        .map(|report| &report.path)
        .collect()
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use flate2::{write::GzEncoder, Compression};
    use super::*;

    static HEADER_ONLY: [u8; 24] = [
        0xd4, 0xc3, 0xb2, 0xa1, 0x02, 0x00, 0x04, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0xff, 0xff, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00,
    ];

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn plain_passes_through() {
        assert_eq!(decompress(HEADER_ONLY.to_vec()).unwrap(), &HEADER_ONLY[..]);
    }

    #[test]
    fn gzip_is_detected() {
        let compressed = gzip(&HEADER_ONLY);
        assert_eq!(&compressed[..2], &GZIP_MAGIC);
        assert_eq!(decompress(compressed).unwrap(), &HEADER_ONLY[..]);
    }

    #[test]
    fn broken_gzip() {
        let mut compressed = gzip(&HEADER_ONLY);
        compressed.truncate(12);
        assert!(decompress(compressed).is_err());
    }

    #[test]
    fn analyze_files() {
        let dir = std::env::temp_dir().join(format!("tcpscope-cli-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let plain = dir.join("plain.pcap");
        let compressed = dir.join("compressed.pcap.gz");
        let missing = dir.join("missing.pcap");
        fs::write(&plain, &HEADER_ONLY[..]).unwrap();
        fs::write(&compressed, gzip(&HEADER_ONLY)).unwrap();

        let config = flow::Config::default();
        assert_eq!(analyze(&plain, &config, 1).unwrap().packets, 0);
        assert_eq!(analyze(&compressed, &config, 1).unwrap(), analyze(&plain, &config, 1).unwrap());
        assert!(analyze(&missing, &config, 1).is_err());

        let cli = config::Config {
            captures: vec![plain.clone(), missing.clone(), compressed.clone()],
            json: false,
            strict: false,
            verbose: 0,
            sample: 1,
            matcher_capacity: 16,
            rtt_min: 0.001,
            rtt_max: 1.0,
            bins_per_decade: 4.0,
        };
        let reports = run(&cli).unwrap();
        assert_eq!(reports.len(), 3);
        assert_eq!(reports[2].path, compressed);
        assert_eq!(failures(&reports), [&missing]);

        fs::remove_dir_all(&dir).unwrap();
    }
}
