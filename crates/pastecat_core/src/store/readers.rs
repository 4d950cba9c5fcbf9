//! In-flight reader accounting for a single stored paste.
//!
//! Every read handle holds a [`ReadGuard`]. Deletion closes the gate so no new
//! reader can enter, then blocks until the guards already handed out are
//! dropped.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;

#[derive(Debug, Default)]
struct GateState {
    readers: usize,
    closing: bool,
}

/// Join barrier between readers of a paste and its deletion.
#[derive(Debug, Default)]
pub struct ReaderGate {
    state: Mutex<GateState>,
    drained: Condvar,
}

/// Reservation against a [`ReaderGate`], released on drop.
#[derive(Debug)]
pub struct ReadGuard {
    gate: Arc<ReaderGate>,
}

impl Drop for ReadGuard {
    fn drop(&mut self) {
        let mut state = self.gate.state.lock();
        state.readers = state.readers.saturating_sub(1);
        if state.readers == 0 {
            self.gate.drained.notify_all();
        }
    }
}

impl ReaderGate {
    /// Create an open gate with no readers.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a reader.
    ///
    /// # Returns
    /// `None` once the gate has been closed for deletion.
    pub fn enter(self: &Arc<Self>) -> Option<ReadGuard> {
        let mut state = self.state.lock();
        if state.closing {
            return None;
        }
        state.readers += 1;
        Some(ReadGuard {
            gate: Arc::clone(self),
        })
    }

    /// Refuse new readers.
    ///
    /// # Returns
    /// `false` if another caller already closed the gate.
    pub fn close(&self) -> bool {
        let mut state = self.state.lock();
        if state.closing {
            return false;
        }
        state.closing = true;
        true
    }

    /// Accept readers again after a deletion attempt failed.
    pub fn reopen(&self) {
        self.state.lock().closing = false;
    }

    /// Block until every outstanding [`ReadGuard`] has been dropped.
    pub fn wait_drained(&self) {
        let mut state = self.state.lock();
        while state.readers > 0 {
            self.drained.wait(&mut state);
        }
    }

    /// Number of outstanding readers.
    pub fn readers(&self) -> usize {
        self.state.lock().readers
    }
}
