//! Counting gate bounding the number of blocks between submit and drain.

use crate::error::{OplError, Result};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Default)]
struct GateState {
    in_flight: usize,
    peak: usize,
    cancelled: bool,
    failed: Option<String>,
}

/// Submitters take a slot before dispatching a block; the drain gives it back
/// once the block's text is in the sink. Waiters are woken by the condition
/// variable on every release, cancel or failure.
pub(crate) struct Gate {
    limit: usize,
    state: Mutex<GateState>,
    cond: Condvar,
}

impl Gate {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            state: Mutex::new(GateState::default()),
            cond: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn acquire(&self, timeout: Option<Duration>) -> Result<()> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut st = self.lock();
        loop {
            if st.cancelled {
                return Err(OplError::Cancelled);
            }
            if let Some(reason) = &st.failed {
                return Err(OplError::Failed(reason.clone()));
            }
            if st.in_flight < self.limit {
                st.in_flight += 1;
                st.peak = st.peak.max(st.in_flight);
                return Ok(());
            }
            st = match (deadline, timeout) {
                (Some(deadline), Some(timeout)) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(OplError::BackpressureTimeout(timeout));
                    }
                    self.cond
                        .wait_timeout(st, deadline - now)
                        .map(|(guard, _)| guard)
                        .unwrap_or_else(|e| e.into_inner().0)
                }
                _ => self.cond.wait(st).unwrap_or_else(PoisonError::into_inner),
            };
        }
    }

    pub(crate) fn release(&self) {
        let mut st = self.lock();
        st.in_flight = st.in_flight.saturating_sub(1);
        drop(st);
        self.cond.notify_all();
    }

    pub(crate) fn cancel(&self) {
        self.lock().cancelled = true;
        self.cond.notify_all();
    }

    pub(crate) fn fail(&self, reason: String) {
        let mut st = self.lock();
        if st.failed.is_none() {
            st.failed = Some(reason);
        }
        drop(st);
        self.cond.notify_all();
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.lock().cancelled
    }

    pub(crate) fn limit(&self) -> usize {
        self.limit
    }

    /// `(in_flight, peak)`
    pub(crate) fn levels(&self) -> (usize, usize) {
        let st = self.lock();
        (st.in_flight, st.peak)
    }
}
