//! Encoders that finish out of order.

use crate::encode::{BlockEncoder, OplEncoder};
use crate::entity::Block;
use crate::error::Result;
use std::time::Duration;

type DelayFn = Box<dyn Fn(&Block) -> Duration + Send + Sync>;

/// Wraps an [`OplEncoder`] and sleeps before encoding each block for as long as
/// `delay_for(block)` says. Useful for making late submissions finish first.
pub struct DelayedEncoder {
    inner: OplEncoder,
    delay_for: DelayFn,
}

impl DelayedEncoder {
    pub fn new(
        inner: OplEncoder,
        delay_for: impl Fn(&Block) -> Duration + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner,
            delay_for: Box::new(delay_for),
        }
    }

    /// Earlier blocks (lower first id) sleep longer: block whose first record
    /// has id `k` sleeps `(max_id - k) * step`, clamped at zero.
    pub fn reversed(inner: OplEncoder, max_id: i64, step: Duration) -> Self {
        Self::new(inner, move |block| {
            let first = block
                .records()
                .first()
                .and_then(|r| r.meta().map(|m| m.id))
                .unwrap_or(max_id);
            let steps = u32::try_from((max_id - first).max(0)).unwrap_or(u32::MAX);
            step.saturating_mul(steps)
        })
    }
}

impl BlockEncoder for DelayedEncoder {
    fn encode_block(&self, block: &Block) -> Result<String> {
        let delay = (self.delay_for)(block);
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        self.inner.encode_block(block)
    }
}
