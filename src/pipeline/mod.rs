//! Ordered parallel block encoding.
//!
//! [`BlockPipeline`] hands every submitted [`Block`] to a fixed rayon pool and
//! queues a [`PendingResult`] for it in a FIFO. A dedicated drain thread takes
//! the oldest pending result, waits for it and writes its text to the sink, so
//! the output follows submission order no matter which worker finishes first.
//!
//! Memory is bounded by a counting gate: at most `max_in_flight` blocks may be
//! submitted but not yet written. A `submit` past that point sleeps on a
//! condition variable until the drain writes a block out, the pipeline is
//! cancelled through a [`PipelineHandle`], or the optional submit timeout
//! expires.
//!
//! ```
//! use oplstream::{Block, BlockPipeline, Meta, Point, Record};
//!
//! # fn main() -> oplstream::Result<()> {
//! let mut p = BlockPipeline::new(Vec::new())?;
//! for id in 1..=3 {
//!     let rec = Record::Point(Point { meta: Meta::new(id), location: None });
//!     p.submit(Block::new(vec![rec]))?;
//! }
//! let out = String::from_utf8(p.finish()?).unwrap();
//! assert_eq!(out.lines().count(), 3);
//! assert!(out.starts_with("n1 "));
//! # Ok(())
//! # }
//! ```

mod gate;
mod pending;

pub use pending::PendingResult;

use crate::config::OplConfig;
use crate::encode::{BlockEncoder, OplEncoder};
use crate::entity::Block;
use crate::error::{OplError, Result};
use crate::sink::reliable_write;
use crossbeam_channel::{Receiver, Sender, unbounded};
use gate::Gate;
use std::io::Write;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    Open,
    Closing,
    Closed,
}

/// Point-in-time counters of a running pipeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub submitted: u64,
    pub drained: u64,
    pub bytes_written: u64,
    /// Blocks submitted but not yet written to the sink.
    pub in_flight: usize,
    /// Highest `in_flight` seen so far.
    pub peak_in_flight: usize,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    drained: AtomicU64,
    bytes_written: AtomicU64,
}

/// Cloneable control handle, usable from other threads.
#[derive(Clone)]
pub struct PipelineHandle {
    gate: Arc<Gate>,
}

impl PipelineHandle {
    /// Wake any `submit` blocked on backpressure with [`OplError::Cancelled`]
    /// and reject further submissions. Already queued blocks still drain on close.
    pub fn cancel(&self) {
        self.gate.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.gate.is_cancelled()
    }

    pub fn in_flight(&self) -> usize {
        self.gate.levels().0
    }
}

pub struct BlockPipeline<W: Write + Send + 'static> {
    encoder: Arc<dyn BlockEncoder>,
    pool: rayon::ThreadPool,
    queue: Option<Sender<PendingResult>>,
    drain: Option<JoinHandle<Result<W>>>,
    gate: Arc<Gate>,
    counters: Arc<Counters>,
    state: PipelineState,
    submit_timeout: Option<Duration>,
    next_seq: u64,
}

impl<W: Write + Send + 'static> BlockPipeline<W> {
    /// Pipeline with the default configuration and the OPL encoder.
    pub fn new(sink: W) -> Result<Self> {
        Self::with_config(sink, &OplConfig::default())
    }

    pub fn with_config(sink: W, config: &OplConfig) -> Result<Self> {
        Self::with_encoder(sink, config, Arc::new(OplEncoder::new(config.block_escape)))
    }

    /// Pipeline driven by a custom block encoder.
    pub fn with_encoder(
        sink: W,
        config: &OplConfig,
        encoder: Arc<dyn BlockEncoder>,
    ) -> Result<Self> {
        config.validate()?;
        let workers = config.worker_count();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("opl-encode-{i}"))
            .build()
            .map_err(|e| OplError::Pool(e.to_string()))?;

        let gate = Arc::new(Gate::new(config.max_in_flight));
        let counters = Arc::new(Counters::default());
        let (tx, rx) = unbounded();

        let drain = {
            let gate = Arc::clone(&gate);
            let counters = Arc::clone(&counters);
            std::thread::Builder::new()
                .name("opl-drain".into())
                .spawn(move || drain_loop(sink, rx, gate, counters))
                .map_err(|e| OplError::Pool(format!("spawn drain thread: {e}")))?
        };

        debug!(workers, max_in_flight = config.max_in_flight, "OPL block pipeline started");
        Ok(Self {
            encoder,
            pool,
            queue: Some(tx),
            drain: Some(drain),
            gate,
            counters,
            state: PipelineState::Open,
            submit_timeout: config.submit_timeout(),
            next_seq: 0,
        })
    }

    /// Queue a block for encoding.
    ///
    /// Blocks the caller while `max_in_flight` blocks are waiting to be written.
    ///
    /// # Errors
    /// [`OplError::Closed`] after `close`, [`OplError::Cancelled`] after
    /// [`PipelineHandle::cancel`], [`OplError::BackpressureTimeout`] when the
    /// configured submit timeout expires, [`OplError::Failed`] once an earlier
    /// block failed at drain time.
    pub fn submit(&mut self, block: Block) -> Result<()> {
        if self.state != PipelineState::Open {
            return Err(OplError::Closed);
        }
        if let Err(e) = self.gate.acquire(self.submit_timeout) {
            warn!(error = %e, "block submit rejected");
            return Err(e);
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        let (resolver, pending) = PendingResult::channel(seq);
        let encoder = Arc::clone(&self.encoder);
        self.pool.spawn(move || {
            let result = catch_unwind(AssertUnwindSafe(|| encoder.encode_block(&block)))
                .unwrap_or_else(|_| Err(OplError::WorkerLost));
            resolver.resolve(result);
        });

        let sent = self
            .queue
            .as_ref()
            .ok_or(OplError::Closed)
            .and_then(|q| {
                q.send(pending)
                    .map_err(|_| OplError::Failed("drain stopped".into()))
            });
        if let Err(e) = sent {
            self.gate.release();
            return Err(e);
        }
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Drain everything submitted so far, flush the sink and release it.
    ///
    /// Returns the first drain-time failure, if any. Calling it again is a no-op.
    pub fn close(&mut self) -> Result<()> {
        self.shutdown().map(drop)
    }

    /// Close and hand back the sink.
    pub fn finish(mut self) -> Result<W> {
        self.shutdown()?.ok_or(OplError::Closed)
    }

    /// Drain, flush and take the sink out. `None` if already closed.
    pub(crate) fn shutdown(&mut self) -> Result<Option<W>> {
        if self.state != PipelineState::Open {
            return Ok(None);
        }
        self.state = PipelineState::Closing;

        if let Some(queue) = self.queue.take() {
            // Fails only if the drain already stopped; its error surfaces from join.
            let _ = queue.send(PendingResult::sentinel(self.next_seq));
        }
        let joined = match self.drain.take() {
            Some(handle) => handle
                .join()
                .unwrap_or_else(|_| Err(OplError::Failed("drain thread panicked".into()))),
            None => Err(OplError::Closed),
        };
        self.state = PipelineState::Closed;

        let mut sink = joined?;
        sink.flush()?;

        let stats = self.stats();
        info!(
            blocks = stats.drained,
            bytes = stats.bytes_written,
            peak_in_flight = stats.peak_in_flight,
            "OPL block pipeline closed"
        );
        Ok(Some(sink))
    }

    pub fn handle(&self) -> PipelineHandle {
        PipelineHandle {
            gate: Arc::clone(&self.gate),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn max_in_flight(&self) -> usize {
        self.gate.limit()
    }

    pub fn stats(&self) -> PipelineStats {
        let (in_flight, peak_in_flight) = self.gate.levels();
        PipelineStats {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            drained: self.counters.drained.load(Ordering::Relaxed),
            bytes_written: self.counters.bytes_written.load(Ordering::Relaxed),
            in_flight,
            peak_in_flight,
        }
    }
}

impl<W: Write + Send + 'static> Drop for BlockPipeline<W> {
    fn drop(&mut self) {
        if self.state == PipelineState::Open
            && let Err(e) = self.close()
        {
            warn!(error = %e, "OPL block pipeline dropped without close; drain failed");
        }
    }
}

fn drain_loop<W: Write>(
    mut sink: W,
    queue: Receiver<PendingResult>,
    gate: Arc<Gate>,
    counters: Arc<Counters>,
) -> Result<W> {
    for pending in queue.iter() {
        if pending.is_terminal() {
            break;
        }
        let seq = pending.seq();
        let written = pending
            .wait()
            .and_then(|text| reliable_write(&mut sink, text.as_bytes()));
        match written {
            Ok(n) => {
                counters.drained.fetch_add(1, Ordering::Relaxed);
                counters.bytes_written.fetch_add(n as u64, Ordering::Relaxed);
                gate.release();
                debug!(seq, bytes = n, "drained block");
            }
            Err(e) => {
                warn!(seq, error = %e, "block failed; stopping drain");
                gate.fail(format!("block {seq}: {e}"));
                return Err(e);
            }
        }
    }
    Ok(sink)
}
