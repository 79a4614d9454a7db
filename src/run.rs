//! One offline decryption run: keys + capture in, decrypted capture out.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;

use crate::capture::{CaptureError, CaptureReader, CaptureWriter};
use crate::config::RunConfig;
use crate::dtls_srtp::KeyingMaterial;
use crate::error::{Error, Result};
use crate::log::LogSink;
use crate::pipeline::{DecryptPipeline, RunSummary};
use crate::srtp::CryptoError;
use crate::stream::{Direction, Stream};
use crate::{sink_debug, sink_error, sink_info};

/// Streams for every direction `config` selects, inbound first.
pub fn build_streams(
    keys: &KeyingMaterial,
    config: &RunConfig,
    logger: &Arc<dyn LogSink>,
) -> Result<Vec<Stream>, CryptoError> {
    config
        .direction
        .directions()
        .iter()
        .map(|&direction| {
            let filter = match direction {
                Direction::Inbound => config.inbound,
                Direction::Outbound => config.outbound,
            };
            Stream::from_keying_material(keys, direction, filter, Arc::clone(logger))
        })
        .collect()
}

/// Decrypts `input` into `output`, keeping the input's container format.
///
/// Records are written as they come out of the pipeline. On a fatal error the
/// records already produced are flushed and nothing after them is written.
pub fn decrypt_capture<R: Read, W: Write>(
    input: R,
    output: W,
    keys: &KeyingMaterial,
    config: &RunConfig,
    logger: Arc<dyn LogSink>,
) -> Result<RunSummary> {
    let reader = CaptureReader::new(input)?;
    let format = reader.format();
    let mut writer = CaptureWriter::new(output, reader.header())?;

    let streams = build_streams(keys, config, &logger)?;
    sink_info!(
        logger,
        "[Run] decrypting {} capture: {} ({:#06x}), role {}, {} stream(s)",
        format,
        keys.profile(),
        keys.profile().id(),
        config.dtls_role,
        streams.len()
    );
    for s in &streams {
        sink_debug!(logger, "[Run] {} stream filter {}", s.direction(), s.filter());
    }

    let mut pipeline = DecryptPipeline::new(reader, streams, config.policies, Arc::clone(&logger));
    let mut outcome = Ok(());
    for record in pipeline.by_ref() {
        let written = record
            .map_err(Error::from)
            .and_then(|r| writer.write_record(&r).map_err(Error::from));
        if let Err(e) = written {
            outcome = Err(e);
            break;
        }
    }

    writer.into_inner().flush().map_err(CaptureError::from)?;

    let summary = *pipeline.summary();
    match outcome {
        Ok(()) => {
            sink_info!(logger, "[Run] done: {}", summary);
            Ok(summary)
        }
        Err(e) => {
            sink_error!(logger, "[Run] stopped after {} packets: {}", summary.packets, e);
            Err(e)
        }
    }
}

/// File-based wrapper around [`decrypt_capture`].
///
/// The keys are read and checked before the output file is created.
pub fn run(
    keys_path: &Path,
    input_path: &Path,
    output_path: &Path,
    config: &RunConfig,
    logger: Arc<dyn LogSink>,
) -> Result<RunSummary> {
    let keys = KeyingMaterial::from_file(keys_path, config.profile, config.dtls_role)?;
    sink_debug!(logger, "[Run] keying material loaded from {}", keys_path.display());

    let input = File::open(input_path).map_err(|source| Error::Open {
        path: input_path.to_path_buf(),
        source,
    })?;
    let output = File::create(output_path).map_err(|source| Error::Open {
        path: output_path.to_path_buf(),
        source,
    })?;

    decrypt_capture(input, BufWriter::new(output), &keys, config, logger)
}
