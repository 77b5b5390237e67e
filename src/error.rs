//! Error types shared by the encoder, the direct writer and the block pipeline.

use std::time::Duration;
use thiserror::Error;

/// Result alias used throughout the encoding core.
pub type Result<T> = std::result::Result<T, OplError>;

/// Everything that can go wrong while turning records into OPL text.
#[derive(Debug, Error)]
pub enum OplError {
    /// A record field violates an encoding precondition.
    #[error("cannot encode field `{field}`: {reason}")]
    Encoding { field: &'static str, reason: String },
    /// A record inside a block failed to encode; `index` is its position in the block.
    #[error("record #{index} of block: {source}")]
    Block {
        index: usize,
        #[source]
        source: Box<OplError>,
    },
    /// The output sink refused a write or stopped making progress.
    #[error("sink write failed: {0}")]
    SinkWrite(#[from] std::io::Error),
    /// A submit waited longer than the configured backpressure timeout.
    #[error("backpressure wait exceeded {0:?}")]
    BackpressureTimeout(Duration),
    /// The pipeline was cancelled while a caller was waiting on it.
    #[error("pipeline cancelled")]
    Cancelled,
    /// Use after `close()`.
    #[error("writer is closed")]
    Closed,
    /// A worker dropped its result without resolving it.
    #[error("encode worker exited without producing a result")]
    WorkerLost,
    /// An earlier write failed; the writer or pipeline no longer accepts work.
    #[error("failed earlier: {0}")]
    Failed(String),
    /// The worker pool could not be started.
    #[error("worker pool: {0}")]
    Pool(String),
    /// Invalid configuration values.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl OplError {
    pub(crate) fn encoding(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Encoding {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn in_block(self, index: usize) -> Self {
        Self::Block {
            index,
            source: Box::new(self),
        }
    }

    /// `true` for errors raised by bad record content rather than I/O or lifecycle.
    pub fn is_encoding(&self) -> bool {
        match self {
            Self::Encoding { .. } => true,
            Self::Block { source, .. } => source.is_encoding(),
            _ => false,
        }
    }
}
