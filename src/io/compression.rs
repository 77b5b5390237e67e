//! Pluggable output compression.
//!
//! Compression is applied by the sink, transparently to the encoders: an
//! output path ending in `.gz`, `.bz2`, `.zst` or `.xz` gets its writer wrapped
//! by the matching [`CompressionCodec`]. Codecs live in an explicit
//! [`CodecRegistry`] built by the application; there is no process-wide table.
//!
//! Wrapped writers are [`FinishWrite`]: closing an output calls
//! [`FinishWrite::finish`], which writes the codec trailer and reports any
//! error instead of leaving it to `Drop`.
//!
//! ## Built-in Codecs
//!
//! When enabled via feature flags, [`CodecRegistry::with_defaults`] registers:
//! - **Gzip** (`.gz`) - via `flate2` (feature: `compression-gzip`)
//! - **Zstd** (`.zst`) - via `zstd` (feature: `compression-zstd`)
//! - **Bzip2** (`.bz2`) - via `bzip2` (feature: `compression-bzip2`)
//! - **Xz** (`.xz`) - via `xz2` (feature: `compression-xz`)
//!
//! ### Custom Codec Implementation
//! ```
//! use oplstream::io::compression::{CodecRegistry, CompressionCodec, FinishWrite, PlainSink};
//! use std::io::Write;
//! use std::sync::Arc;
//!
//! struct Passthrough;
//!
//! impl CompressionCodec for Passthrough {
//!     fn name(&self) -> &str { "passthrough" }
//!     fn extensions(&self) -> &[&str] { &[".raw"] }
//!     fn wrap_writer(&self, w: Box<dyn Write + Send>) -> std::io::Result<Box<dyn FinishWrite>> {
//!         Ok(Box::new(PlainSink::new(w)))
//!     }
//! }
//!
//! let mut codecs = CodecRegistry::new();
//! codecs.register(Arc::new(Passthrough));
//! assert_eq!(codecs.detect("out.opl.raw").map(|c| c.name().to_string()), Some("passthrough".into()));
//! ```

use anyhow::{Context, Result};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

/// A writer with an explicit end of stream.
pub trait FinishWrite: Write + Send {
    /// Write any trailer and flush everything down to the underlying sink.
    /// Writes after `finish` are an error.
    fn finish(&mut self) -> io::Result<()>;
}

impl<F: FinishWrite + ?Sized> FinishWrite for Box<F> {
    fn finish(&mut self) -> io::Result<()> {
        (**self).finish()
    }
}

/// Uncompressed sink; finishing it is a flush.
pub struct PlainSink<W: Write + Send>(W);

impl<W: Write + Send> PlainSink<W> {
    pub fn new(inner: W) -> Self {
        Self(inner)
    }

    pub fn into_inner(self) -> W {
        self.0
    }
}

impl<W: Write + Send> Write for PlainSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl<W: Write + Send> FinishWrite for PlainSink<W> {
    fn finish(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

/// A compression algorithm usable as an output wrapper.
///
/// Implementations must be `Send + Sync`; the registry may be shared between
/// threads and the wrapped writer is moved onto the pipeline's drain thread.
pub trait CompressionCodec: Send + Sync {
    /// Human-readable codec name (e.g., "gzip").
    fn name(&self) -> &str;

    /// File extensions, lowercase with the leading dot (e.g., `&[".gz"]`).
    fn extensions(&self) -> &[&str];

    /// Wrap a writer so that everything written through it is compressed.
    /// [`FinishWrite::finish`] ends the compressed stream.
    fn wrap_writer(&self, writer: Box<dyn Write + Send>) -> io::Result<Box<dyn FinishWrite>>;
}

/// Ordered set of codecs; the first one whose extension matches wins.
#[derive(Clone, Default)]
pub struct CodecRegistry {
    codecs: Vec<Arc<dyn CompressionCodec>>,
}

impl CodecRegistry {
    /// An empty registry: every path is written uncompressed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every codec enabled at compile time.
    pub fn with_defaults() -> Self {
        let mut reg = Self::new();
        #[cfg(feature = "compression-gzip")]
        reg.register(Arc::new(GzipCodec));
        #[cfg(feature = "compression-zstd")]
        reg.register(Arc::new(ZstdCodec));
        #[cfg(feature = "compression-bzip2")]
        reg.register(Arc::new(Bzip2Codec));
        #[cfg(feature = "compression-xz")]
        reg.register(Arc::new(XzCodec));
        reg
    }

    pub fn register(&mut self, codec: Arc<dyn CompressionCodec>) {
        self.codecs.push(codec);
    }

    pub fn names(&self) -> Vec<&str> {
        self.codecs.iter().map(|c| c.name()).collect()
    }

    /// Codec for `path` by extension, case-insensitively.
    pub fn detect(&self, path: impl AsRef<Path>) -> Option<Arc<dyn CompressionCodec>> {
        let path_str = path.as_ref().to_string_lossy().to_lowercase();
        self.codecs
            .iter()
            .find(|codec| codec.extensions().iter().any(|ext| path_str.ends_with(ext)))
            .cloned()
    }

    /// Wrap `writer` with the codec matching `path_hint`, or pass it through plainly.
    pub fn wrap_writer<W: Write + Send + 'static>(
        &self,
        writer: W,
        path_hint: impl AsRef<Path>,
    ) -> Result<Box<dyn FinishWrite>> {
        if let Some(codec) = self.detect(&path_hint) {
            return codec
                .wrap_writer(Box::new(BufWriter::new(writer)))
                .with_context(|| format!("wrap writer with {} codec", codec.name()));
        }
        Ok(Box::new(PlainSink::new(writer)))
    }
}

// ============================================================================
// Built-in Codec Implementations
// ============================================================================

#[cfg(feature = "compression-gzip")]
struct GzipCodec;

#[cfg(feature = "compression-gzip")]
impl CompressionCodec for GzipCodec {
    fn name(&self) -> &str {
        "gzip"
    }

    fn extensions(&self) -> &[&str] {
        &[".gz", ".gzip"]
    }

    fn wrap_writer(&self, writer: Box<dyn Write + Send>) -> io::Result<Box<dyn FinishWrite>> {
        use flate2::Compression;
        use flate2::write::GzEncoder;
        Ok(Box::new(GzEncoder::new(writer, Compression::default())))
    }
}

#[cfg(feature = "compression-gzip")]
impl FinishWrite for flate2::write::GzEncoder<Box<dyn Write + Send>> {
    fn finish(&mut self) -> io::Result<()> {
        self.try_finish()?;
        self.get_mut().flush()
    }
}

#[cfg(feature = "compression-zstd")]
struct ZstdCodec;

#[cfg(feature = "compression-zstd")]
impl CompressionCodec for ZstdCodec {
    fn name(&self) -> &str {
        "zstd"
    }

    fn extensions(&self) -> &[&str] {
        &[".zst", ".zstd"]
    }

    fn wrap_writer(&self, writer: Box<dyn Write + Send>) -> io::Result<Box<dyn FinishWrite>> {
        zstd::stream::write::Encoder::new(writer, 3)
            .map(|e| Box::new(ZstdFinishOnDrop(Some(e))) as Box<dyn FinishWrite>)
    }
}

// zstd frames are not finished on drop unless wrapped.
#[cfg(feature = "compression-zstd")]
struct ZstdFinishOnDrop(Option<zstd::stream::write::Encoder<'static, Box<dyn Write + Send>>>);

#[cfg(feature = "compression-zstd")]
impl Write for ZstdFinishOnDrop {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.0.as_mut() {
            Some(enc) => enc.write(buf),
            None => Err(io::ErrorKind::BrokenPipe.into()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.0.as_mut() {
            Some(enc) => enc.flush(),
            None => Ok(()),
        }
    }
}

#[cfg(feature = "compression-zstd")]
impl FinishWrite for ZstdFinishOnDrop {
    fn finish(&mut self) -> io::Result<()> {
        match self.0.take() {
            Some(enc) => enc.finish()?.flush(),
            None => Ok(()),
        }
    }
}

#[cfg(feature = "compression-zstd")]
impl Drop for ZstdFinishOnDrop {
    fn drop(&mut self) {
        if let Some(enc) = self.0.take()
            && let Err(e) = enc.finish().and_then(|mut inner| inner.flush())
        {
            tracing::warn!(error = %e, "finishing zstd stream failed");
        }
    }
}

#[cfg(feature = "compression-bzip2")]
struct Bzip2Codec;

#[cfg(feature = "compression-bzip2")]
impl CompressionCodec for Bzip2Codec {
    fn name(&self) -> &str {
        "bzip2"
    }

    fn extensions(&self) -> &[&str] {
        &[".bz2", ".bzip2"]
    }

    fn wrap_writer(&self, writer: Box<dyn Write + Send>) -> io::Result<Box<dyn FinishWrite>> {
        use bzip2::Compression;
        use bzip2::write::BzEncoder;
        Ok(Box::new(BzEncoder::new(writer, Compression::default())))
    }
}

#[cfg(feature = "compression-bzip2")]
impl FinishWrite for bzip2::write::BzEncoder<Box<dyn Write + Send>> {
    fn finish(&mut self) -> io::Result<()> {
        self.try_finish()?;
        self.get_mut().flush()
    }
}

#[cfg(feature = "compression-xz")]
struct XzCodec;

#[cfg(feature = "compression-xz")]
impl CompressionCodec for XzCodec {
    fn name(&self) -> &str {
        "xz"
    }

    fn extensions(&self) -> &[&str] {
        &[".xz"]
    }

    fn wrap_writer(&self, writer: Box<dyn Write + Send>) -> io::Result<Box<dyn FinishWrite>> {
        use xz2::write::XzEncoder;
        Ok(Box::new(XzEncoder::new(writer, 6)))
    }
}

#[cfg(feature = "compression-xz")]
impl FinishWrite for xz2::write::XzEncoder<Box<dyn Write + Send>> {
    fn finish(&mut self) -> io::Result<()> {
        self.try_finish()?;
        self.get_mut().flush()
    }
}
