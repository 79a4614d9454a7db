//! `srtp-decrypt` entry point.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use srtp_decrypt::config::{Config, RunConfig};
use srtp_decrypt::dtls_srtp::DtlsRole;
use srtp_decrypt::log::{LogLevel, LogSink, LogTarget, Logger};
use srtp_decrypt::pipeline::{MalformedPolicy, StreamlessPolicy, UnknownPolicy};
use srtp_decrypt::run::run;
use srtp_decrypt::srtp::SrtpProfile;
use srtp_decrypt::stream::{DirectionSelection, EndpointFilter};

const LOG_QUEUE_CAP: usize = 8192;

/// Decrypt captured DTLS-SRTP media with exported keying material.
#[derive(Parser, Debug)]
#[command(name = "srtp-decrypt")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// File with the 60-byte DTLS-SRTP exporter output, hex or base64
    #[arg(short = 'k', long = "keys", value_name = "FILE")]
    keys: PathBuf,

    /// Capture to decrypt (pcap or pcapng)
    #[arg(short = 'i', long = "input", value_name = "FILE")]
    input: PathBuf,

    /// Where to write the decrypted capture
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    output: PathBuf,

    /// INI-style run configuration; flags below override it
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// SRTP protection profile, e.g. aes128-cm-sha1-80 or aes128-cm-sha1-32
    #[arg(long = "profile")]
    profile: Option<SrtpProfile>,

    /// DTLS role of the local side: client or server
    #[arg(long = "role")]
    role: Option<DtlsRole>,

    /// Which streams to decrypt: in, out or both
    #[arg(long = "direction")]
    direction: Option<DirectionSelection>,

    /// Packets that are neither SRTP nor SRTCP: drop or pass
    #[arg(long = "unknown")]
    unknown: Option<UnknownPolicy>,

    /// Packets that fail to decrypt: drop, pass or raise
    #[arg(long = "malformed")]
    malformed: Option<MalformedPolicy>,

    /// Packets no stream matches: drop or pass
    #[arg(long = "streamless")]
    streamless: Option<StreamlessPolicy>,

    /// Local receiving endpoint, e.g. 192.168.1.10:50000, *:50000 or *
    #[arg(long = "inbound", value_name = "ENDPOINT")]
    inbound: Option<EndpointFilter>,

    /// Peer receiving endpoint
    #[arg(long = "outbound", value_name = "ENDPOINT")]
    outbound: Option<EndpointFilter>,

    /// Minimum log level: trace, debug, info, warn or error
    #[arg(long = "log-level")]
    log_level: Option<LogLevel>,

    /// Append logs to this file instead of stderr
    #[arg(long = "log-file", value_name = "FILE")]
    log_file: Option<PathBuf>,
}

impl Cli {
    /// Config file values, then command-line overrides.
    fn run_config(&self) -> Result<RunConfig> {
        let file = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::empty(),
        };
        let mut config = RunConfig::from_config(&file)
            .with_context(|| format!("bad configuration in {:?}", self.config))?;

        if let Some(v) = self.profile {
            config.profile = v;
        }
        if let Some(v) = self.role {
            config.dtls_role = v;
        }
        if let Some(v) = self.direction {
            config.direction = v;
        }
        if let Some(v) = self.unknown {
            config.policies.unknown = v;
        }
        if let Some(v) = self.malformed {
            config.policies.malformed = v;
        }
        if let Some(v) = self.streamless {
            config.policies.streamless = v;
        }
        if let Some(v) = self.inbound {
            config.inbound = v;
        }
        if let Some(v) = self.outbound {
            config.outbound = v;
        }
        if let Some(v) = self.log_level {
            config.log_level = v;
        }
        if let Some(v) = &self.log_file {
            config.log_path = Some(v.clone());
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.run_config()?;

    let target = match &config.log_path {
        Some(path) => LogTarget::File(path.clone()),
        None => LogTarget::Stderr,
    };
    let logger = Logger::start(target, LOG_QUEUE_CAP, config.log_level)
        .context("failed to start logger")?;

    let result = {
        let sink: Arc<dyn LogSink> = Arc::new(logger.handle());
        run(&cli.keys, &cli.input, &cli.output, &config, sink)
    };
    // Every handle clone is gone once `run` returns.
    logger.shutdown();

    let summary =
        result.with_context(|| format!("failed to decrypt {}", cli.input.display()))?;
    eprintln!("{}: {summary}", cli.output.display());
    Ok(())
}
