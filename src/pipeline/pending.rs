use crate::error::{OplError, Result};
use crossbeam_channel::{Receiver, Sender, bounded};

/// Handle to the encoded text of one submitted block.
///
/// Created at submission, resolved once by a worker through its [`Resolver`],
/// consumed once by the drain.
pub struct PendingResult {
    seq: u64,
    terminal: bool,
    rx: Receiver<Result<String>>,
}

/// Write side of a [`PendingResult`].
pub(crate) struct Resolver {
    tx: Sender<Result<String>>,
}

impl PendingResult {
    pub(crate) fn channel(seq: u64) -> (Resolver, Self) {
        let (tx, rx) = bounded(1);
        (
            Resolver { tx },
            Self {
                seq,
                terminal: false,
                rx,
            },
        )
    }

    /// Already resolved with empty text; tells the drain to stop after it.
    pub(crate) fn sentinel(seq: u64) -> Self {
        let (tx, rx) = bounded(1);
        let _ = tx.send(Ok(String::new()));
        Self {
            seq,
            terminal: true,
            rx,
        }
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    /// Block until the worker resolves the result.
    pub fn wait(self) -> Result<String> {
        self.rx.recv().unwrap_or_else(|_| Err(OplError::WorkerLost))
    }
}

impl Resolver {
    pub(crate) fn resolve(self, result: Result<String>) {
        // The drain may already have stopped after an earlier failure.
        let _ = self.tx.send(result);
    }
}
