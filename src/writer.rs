//! Single-threaded buffered OPL writer.
//!
//! [`DirectWriter`] encodes records as they are visited, collects the text in
//! an in-memory buffer and hands it to the sink once the buffer grows past the
//! flush threshold. Output order is call order.
//!
//! ```
//! use oplstream::{DirectWriter, Meta, Point, Record};
//!
//! # fn main() -> oplstream::Result<()> {
//! let mut w = DirectWriter::new(Vec::new());
//! w.write_record(&Record::Point(Point { meta: Meta::new(7), location: None }))?;
//! let out = w.into_inner()?;
//! assert_eq!(out, b"n7 v0 dV c0 t i0 u x y T\n");
//! # Ok(())
//! # }
//! ```

use crate::config::OplConfig;
use crate::encode::OplEncoder;
use crate::entity::{Block, Record};
use crate::error::{OplError, Result};
use crate::sink::reliable_write;
use std::io::Write;
use tracing::{debug, info, warn};

// Upper bound on the buffer reserved up front; larger thresholds grow on demand.
const MAX_RESERVE: usize = 8 * 1024 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriterState {
    Open,
    Closed,
    /// A sink write failed. Nothing more is written, not even on drop.
    Failed,
}

pub struct DirectWriter<W: Write> {
    sink: Option<W>,
    encoder: OplEncoder,
    buf: String,
    flush_threshold: usize,
    state: WriterState,
    failure: Option<String>,
    bytes_written: u64,
    records: u64,
    flushes: u64,
}

impl<W: Write> DirectWriter<W> {
    /// Writer with the default configuration (1 MiB threshold, byte escaping).
    pub fn new(sink: W) -> Self {
        Self::with_config(sink, &OplConfig::default())
    }

    pub fn with_config(sink: W, config: &OplConfig) -> Self {
        let flush_threshold = config.flush_threshold.max(1);
        Self {
            sink: Some(sink),
            encoder: OplEncoder::new(config.direct_escape),
            buf: String::with_capacity(flush_threshold.saturating_mul(2).min(MAX_RESERVE)),
            flush_threshold,
            state: WriterState::Open,
            failure: None,
            bytes_written: 0,
            records: 0,
            flushes: 0,
        }
    }

    /// Encode one record into the buffer, flushing if the threshold is passed.
    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        self.check_open()?;
        self.encoder.encode_into(record, &mut self.buf)?;
        self.records += 1;
        if self.buf.len() > self.flush_threshold {
            self.flush_buffer()?;
        }
        Ok(())
    }

    /// Visit every record of `block` in order.
    pub fn write_block(&mut self, block: &Block) -> Result<()> {
        self.check_open()?;
        for (index, record) in block.iter().enumerate() {
            self.write_record(record).map_err(|e| match e {
                OplError::Encoding { .. } => e.in_block(index),
                other => other,
            })?;
        }
        Ok(())
    }

    /// Final flush, then release the sink. A second call does nothing.
    pub fn close(&mut self) -> Result<()> {
        self.shutdown().map(drop)
    }

    /// Close and hand back the sink.
    pub fn into_inner(mut self) -> Result<W> {
        self.shutdown()?.ok_or(OplError::Closed)
    }

    /// Flush everything and take the sink out. `None` if already closed.
    pub(crate) fn shutdown(&mut self) -> Result<Option<W>> {
        match self.state {
            WriterState::Closed => return Ok(None),
            WriterState::Failed => return Err(self.failed()),
            WriterState::Open => {}
        }
        self.flush_buffer()?;
        if let Some(sink) = self.sink.as_mut()
            && let Err(e) = sink.flush()
        {
            return Err(self.poison(e.into()));
        }
        self.state = WriterState::Closed;
        info!(
            records = self.records,
            bytes = self.bytes_written,
            flushes = self.flushes,
            "direct OPL writer closed"
        );
        Ok(self.sink.take())
    }

    pub fn get_ref(&self) -> Option<&W> {
        self.sink.as_ref()
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    /// Bytes handed to the sink so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Bytes encoded but not yet flushed.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn flushes(&self) -> u64 {
        self.flushes
    }

    fn flush_buffer(&mut self) -> Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let sink = self.sink.as_mut().ok_or(OplError::Closed)?;
        let n = match reliable_write(sink, self.buf.as_bytes()) {
            Ok(n) => n,
            // part of the buffer may already be in the sink
            Err(e) => return Err(self.poison(e)),
        };
        self.bytes_written += n as u64;
        self.flushes += 1;
        self.buf.clear();
        debug!(bytes = n, total = self.bytes_written, "flushed OPL buffer");
        Ok(())
    }

    fn check_open(&self) -> Result<()> {
        match self.state {
            WriterState::Open => Ok(()),
            WriterState::Closed => Err(OplError::Closed),
            WriterState::Failed => Err(self.failed()),
        }
    }

    fn poison(&mut self, error: OplError) -> OplError {
        warn!(error = %error, buffered = self.buf.len(), "sink write failed; writer disabled");
        self.state = WriterState::Failed;
        self.failure = Some(error.to_string());
        error
    }

    fn failed(&self) -> OplError {
        OplError::Failed(self.failure.clone().unwrap_or_else(|| "sink write".into()))
    }
}

impl<W: Write> Drop for DirectWriter<W> {
    fn drop(&mut self) {
        if self.state == WriterState::Open
            && !self.buf.is_empty()
            && let Err(e) = self.close()
        {
            warn!(error = %e, "OPL writer dropped without close; final flush failed");
        }
    }
}
