//! Output formats and file outputs.
//!
//! Both delivery strategies implement [`OutputFormat`]. A [`FormatRegistry`]
//! maps format names to constructors; the application builds one at startup,
//! fills it with [`FormatRegistry::with_defaults`] or its own entries, and
//! passes it to [`create_output`].
//!
//! | name         | strategy                                   |
//! |--------------|--------------------------------------------|
//! | `opl`        | [`BlockPipeline`] (parallel, ordered)      |
//! | `opl-direct` | [`DirectWriter`] (single-threaded)         |
//!
//! ```no_run
//! use oplstream::OplConfig;
//! use oplstream::io::compression::CodecRegistry;
//! use oplstream::output::{FormatRegistry, create_output};
//! use oplstream::testing::sample_blocks;
//!
//! # fn main() -> anyhow::Result<()> {
//! let formats = FormatRegistry::with_defaults();
//! let codecs = CodecRegistry::with_defaults();
//! let mut out = create_output("planet.opl.gz", "opl", &formats, &codecs, &OplConfig::default())?;
//! for block in sample_blocks(4, 100) {
//!     out.write_block(block)?;
//! }
//! out.close()?;
//! # Ok(())
//! # }
//! ```

use crate::config::OplConfig;
use crate::entity::Block;
use crate::error::Result;
use crate::io::compression::{CodecRegistry, FinishWrite};
use crate::pipeline::BlockPipeline;
use crate::writer::DirectWriter;
use anyhow::{Context, anyhow};
use std::collections::BTreeMap;
use std::fs::{File, create_dir_all};
use std::path::Path;

/// A destination that accepts whole blocks.
pub trait OutputFormat: Send {
    fn write_block(&mut self, block: Block) -> Result<()>;

    /// Flush everything, finish the sink (compression trailers included) and
    /// release it. Idempotent.
    fn close(&mut self) -> Result<()>;
}

impl<W: FinishWrite> OutputFormat for DirectWriter<W> {
    fn write_block(&mut self, block: Block) -> Result<()> {
        DirectWriter::write_block(self, &block)
    }

    fn close(&mut self) -> Result<()> {
        finish_sink(self.shutdown()?)
    }
}

impl<W: FinishWrite + 'static> OutputFormat for BlockPipeline<W> {
    fn write_block(&mut self, block: Block) -> Result<()> {
        self.submit(block)
    }

    fn close(&mut self) -> Result<()> {
        finish_sink(self.shutdown()?)
    }
}

fn finish_sink<W: FinishWrite>(sink: Option<W>) -> Result<()> {
    if let Some(mut sink) = sink {
        sink.finish()?;
    }
    Ok(())
}

/// Sink type handed to format constructors.
pub type BoxedSink = Box<dyn FinishWrite>;

/// Builds an output format on top of a sink.
pub type FormatConstructor =
    Box<dyn Fn(BoxedSink, &OplConfig) -> Result<Box<dyn OutputFormat>> + Send + Sync>;

#[derive(Default)]
pub struct FormatRegistry {
    formats: BTreeMap<String, FormatConstructor>,
}

impl FormatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `opl` and `opl-direct`.
    pub fn with_defaults() -> Self {
        let mut reg = Self::new();
        reg.register_defaults();
        reg
    }

    pub fn register_defaults(&mut self) {
        self.register(
            "opl",
            Box::new(|sink: BoxedSink, cfg: &OplConfig| {
                let pipeline = BlockPipeline::with_config(sink, cfg)?;
                Ok(Box::new(pipeline) as Box<dyn OutputFormat>)
            }),
        );
        self.register(
            "opl-direct",
            Box::new(|sink: BoxedSink, cfg: &OplConfig| {
                Ok(Box::new(DirectWriter::with_config(sink, cfg)) as Box<dyn OutputFormat>)
            }),
        );
    }

    /// Add or replace a format. Returns `true` if a previous entry was replaced.
    pub fn register(&mut self, name: impl Into<String>, ctor: FormatConstructor) -> bool {
        self.formats.insert(name.into(), ctor).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.formats.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.formats.keys().map(String::as_str)
    }

    pub fn create(
        &self,
        name: &str,
        sink: BoxedSink,
        config: &OplConfig,
    ) -> anyhow::Result<Box<dyn OutputFormat>> {
        let ctor = self
            .formats
            .get(name)
            .ok_or_else(|| anyhow!("unknown output format `{name}`"))?;
        ctor(sink, config).with_context(|| format!("construct `{name}` output"))
    }
}

/// Create `path` (and missing parent directories), wrap it with the codec its
/// extension names, and build format `format` on top.
pub fn create_output(
    path: impl AsRef<Path>,
    format: &str,
    formats: &FormatRegistry,
    codecs: &CodecRegistry,
    config: &OplConfig,
) -> anyhow::Result<Box<dyn OutputFormat>> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let sink = codecs
        .wrap_writer(file, path)
        .with_context(|| format!("setup compression for {}", path.display()))?;
    formats.create(format, sink, config)
}
