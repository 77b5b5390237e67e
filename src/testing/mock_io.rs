//! In-memory sinks with scripted misbehaviour.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

/// A `Vec<u8>` sink that stays readable after being moved into a writer.
#[derive(Clone, Default)]
pub struct SharedSink {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything written so far.
    #[must_use]
    pub fn contents(&self) -> Vec<u8> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Contents as UTF-8 text (lossy).
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }
}

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Accepts at most `chunk` bytes per call and, if asked, fails every other
/// call with `Interrupted`.
pub struct ShortWriteSink {
    pub data: Vec<u8>,
    chunk: usize,
    interrupt: bool,
    calls: usize,
}

impl ShortWriteSink {
    #[must_use]
    pub fn new(chunk: usize) -> Self {
        Self {
            data: Vec::new(),
            chunk: chunk.max(1),
            interrupt: false,
            calls: 0,
        }
    }

    #[must_use]
    pub fn interrupting(mut self) -> Self {
        self.interrupt = true;
        self
    }

    /// Number of `write` calls seen, including interrupted ones.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl Write for ShortWriteSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.calls += 1;
        if self.interrupt && self.calls % 2 == 1 {
            return Err(io::ErrorKind::Interrupted.into());
        }
        let n = buf.len().min(self.chunk);
        self.data.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// How a [`FailingSink`] behaves once its budget is spent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureMode {
    /// Return `Ok(0)`, i.e. stop making progress.
    Stall,
    /// Return a `BrokenPipe` error.
    Error,
    /// Return one `BrokenPipe` error, then accept everything.
    ErrorOnce,
}

/// Accepts `budget` bytes, then fails according to its [`FailureMode`].
///
/// Accepted bytes land in a [`SharedSink`], readable through
/// [`output`](Self::output) even after the sink itself was dropped.
pub struct FailingSink {
    out: SharedSink,
    budget: usize,
    mode: FailureMode,
    failed: bool,
}

impl FailingSink {
    #[must_use]
    pub fn new(budget: usize, mode: FailureMode) -> Self {
        Self {
            out: SharedSink::new(),
            budget,
            mode,
            failed: false,
        }
    }

    /// Handle to everything accepted so far.
    #[must_use]
    pub fn output(&self) -> SharedSink {
        self.out.clone()
    }
}

impl Write for FailingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.budget == 0 {
            match self.mode {
                FailureMode::Stall => return Ok(0),
                FailureMode::Error => {
                    return Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"));
                }
                FailureMode::ErrorOnce if !self.failed => {
                    self.failed = true;
                    return Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink hiccup"));
                }
                FailureMode::ErrorOnce => return self.out.write(buf),
            }
        }
        let n = buf.len().min(self.budget);
        self.budget -= n;
        self.out.write(&buf[..n])
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
