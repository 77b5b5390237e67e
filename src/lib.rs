//! # oplstream
//!
//! Streaming encoder from OSM-style entity records (points, ways, relations,
//! changesets) to **OPL**, a line-oriented, percent-escaped text format: one
//! entity per line, diff-friendly, append-only.
//!
//! ## Key Features
//!
//! - **Byte-exact encoding** - fixed seven-decimal coordinates, order-preserving
//!   tag/node/member lists, two escaping schemes ([`EscapeScheme`])
//! - **Direct writer** - single-threaded, buffered, flushes every 1 MiB
//! - **Block pipeline** - encodes blocks on a rayon pool and writes them in
//!   submission order, with bounded in-flight memory
//! - **Pluggable outputs** - explicit format and compression registries
//!
//! ## Quick Start
//!
//! ```
//! use oplstream::*;
//!
//! # fn main() -> oplstream::Result<()> {
//! let point = Point {
//!     meta: Meta::new(1)
//!         .version(1)
//!         .changeset(1)
//!         .timestamp(Timestamp::from_secs(1_388_534_400))
//!         .user(1, "u")
//!         .tag("a", "1"),
//!     location: Some(Location::new(1.0, 2.0)),
//! };
//! let line = encode(&Record::Point(point))?;
//! assert_eq!(line, "n1 v1 dV c1 t2014-01-01T00:00:00Z i1 uu x1.0000000 y2.0000000 Ta=1\n");
//! # Ok(())
//! # }
//! ```
//!
//! ## Choosing a strategy
//!
//! - [`DirectWriter`] - record at a time, lowest latency, no parallelism.
//!   Defaults to [`EscapeScheme::Bytes`].
//! - [`BlockPipeline`] - block at a time, CPU-parallel, output order equals
//!   submission order. Defaults to [`EscapeScheme::Unicode`].
//!
//! Both use the same encoder, so with the same [`EscapeScheme`] they produce
//! identical bytes (see [`OplConfig::with_escape`]).
//!
//! ## Module Overview
//!
//! - [`entity`] - records, tags, blocks
//! - [`encode`] - OPL line encoding and escaping
//! - [`writer`] - the direct writer
//! - [`pipeline`] - the ordered parallel block pipeline
//! - [`output`] - output formats, format registry, file outputs
//! - [`io`] - compression codecs
//! - [`index`] - key to multi-value storage
//! - [`testing`] - fixtures and mock sinks

pub mod config;
pub mod encode;
pub mod entity;
pub mod error;
pub mod index;
pub mod io;
pub mod output;
pub mod pipeline;
pub mod sink;
pub mod testing;
pub mod writer;

pub use config::OplConfig;
pub use encode::{BlockEncoder, EscapeScheme, OplEncoder, encode, encode_block, escape, unescape};
pub use entity::{
    Block, BoundingBox, Changeset, Location, Member, MemberType, Meta, Point, Record, Relation,
    Tag, TagList, Timestamp, Way,
};
pub use error::{OplError, Result};
pub use index::{Multimap, VecMultimap};
pub use output::{FormatRegistry, OutputFormat, create_output};
pub use pipeline::{BlockPipeline, PendingResult, PipelineHandle, PipelineState, PipelineStats};
pub use sink::reliable_write;
pub use writer::{DirectWriter, WriterState};
