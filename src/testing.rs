//! Testing utilities for OPL writers.
//!
//! - **Fixtures**: ready-made records and blocks ([`sample_point`], [`sample_blocks`], ...)
//! - **Mock I/O**: sinks that share their buffer, write short, or fail on cue
//! - **Delayed encoders**: force blocks to finish out of submission order
//!
//! ```
//! use oplstream::testing::*;
//! use oplstream::{BlockPipeline, OplConfig, OplEncoder};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # fn main() -> oplstream::Result<()> {
//! let cfg = OplConfig { workers: Some(4), ..OplConfig::default() };
//! let slow_first = DelayedEncoder::reversed(OplEncoder::default(), 31, Duration::from_millis(1));
//! let mut p = BlockPipeline::with_encoder(Vec::new(), &cfg, Arc::new(slow_first))?;
//! for block in sample_blocks(4, 8) {
//!     p.submit(block)?;
//! }
//! let out = String::from_utf8(p.finish()?).unwrap();
//! assert!(out.starts_with("n1 "));
//! # Ok(())
//! # }
//! ```

pub mod delay;
pub mod fixtures;
pub mod mock_io;

pub use delay::DelayedEncoder;
pub use fixtures::*;
pub use mock_io::{FailingSink, FailureMode, SharedSink, ShortWriteSink};
