//! Tunables for the direct writer and the block pipeline.
//!
//! ```
//! use oplstream::OplConfig;
//!
//! let cfg = OplConfig::from_json_str(r#"{ "workers": 4, "max_in_flight": 16 }"#).unwrap();
//! assert_eq!(cfg.worker_count(), 4);
//! assert_eq!(cfg.flush_threshold, 1024 * 1024);
//! ```

use crate::encode::EscapeScheme;
use crate::error::{OplError, Result};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default number of blocks allowed between submission and drain.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 10;

/// Default size at which the direct writer flushes its buffer.
pub const DEFAULT_FLUSH_THRESHOLD: usize = 1024 * 1024;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OplConfig {
    /// Encode workers for the block pipeline. `None` uses every available core.
    pub workers: Option<usize>,
    /// Upper bound on submitted-but-not-yet-written blocks.
    pub max_in_flight: usize,
    /// The direct writer flushes once its buffer grows past this many bytes.
    pub flush_threshold: usize,
    /// Escaping used by the direct writer.
    pub direct_escape: EscapeScheme,
    /// Escaping used by the block pipeline.
    pub block_escape: EscapeScheme,
    /// Give up on a backpressured submit after this many milliseconds.
    pub submit_timeout_ms: Option<u64>,
}

impl Default for OplConfig {
    fn default() -> Self {
        Self {
            workers: None,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            direct_escape: EscapeScheme::Bytes,
            block_escape: EscapeScheme::Unicode,
            submit_timeout_ms: None,
        }
    }
}

impl OplConfig {
    /// Parse a JSON document; missing keys keep their defaults.
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let cfg: Self = serde_json::from_str(json).context("parse OPL config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("load config {}", path.display()))
    }

    /// Use the same escaping for both strategies.
    pub fn with_escape(mut self, scheme: EscapeScheme) -> Self {
        self.direct_escape = scheme;
        self.block_escape = scheme;
        self
    }

    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get).max(1)
    }

    pub fn submit_timeout(&self) -> Option<Duration> {
        self.submit_timeout_ms.map(Duration::from_millis)
    }

    /// Reject values that would stall or disable a writer.
    pub fn validate(&self) -> Result<()> {
        if self.workers == Some(0) {
            return Err(OplError::Config("workers must be at least 1".into()));
        }
        if self.max_in_flight == 0 {
            return Err(OplError::Config("max_in_flight must be at least 1".into()));
        }
        if self.flush_threshold == 0 {
            return Err(OplError::Config("flush_threshold must be at least 1".into()));
        }
        Ok(())
    }
}
