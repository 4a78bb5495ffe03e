//! Summarize the TCP connection of one or more capture files.
//!
//! Call example:
//!
//! * `tcpscope -v trace.pcap other.pcap.gz`
//! * `RUST_LOG=tcpscope=trace tcpscope --json --sample 100 trace.pcap`
use std::process;

use tcpscope_cli::config::Config;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let config = Config::from_args();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| config.log_filter().into()))
        .with_writer(std::io::stderr)
        .init();

    let reports = tcpscope_cli::run(&config)?;

    if config.json {
        let documents: Vec<_> = reports.iter().map(|report| report.to_json()).collect();
        println!("{}", serde_json::to_string_pretty(&documents)?);
    } else {
        for report in &reports {
            println!("{}\n", report);
        }
    }

    let failed = tcpscope_cli::failures(&reports);
    if !failed.is_empty() {
        log::error!("{} of {} captures failed", failed.len(), reports.len());
        process::exit(1);
    }
    Ok(())
}
