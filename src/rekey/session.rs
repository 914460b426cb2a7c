//! Inputs of one re-key run and the handle a supervisor uses to watch it.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use zeroize::Zeroizing;

use crate::store::record::SecretKind;

/// The two passwords of a master password change, plus an optional handle.
///
/// Both passwords are wiped when the session is dropped.
pub struct ReKeySession {
    current_password: Zeroizing<String>,
    new_password: Zeroizing<String>,
    handle: Option<Arc<TaskHandle>>,
}

impl ReKeySession {
    pub fn new(current_password: impl Into<String>, new_password: impl Into<String>) -> Self {
        Self {
            current_password: Zeroizing::new(current_password.into()),
            new_password: Zeroizing::new(new_password.into()),
            handle: None,
        }
    }

    pub fn with_handle(mut self, handle: Arc<TaskHandle>) -> Self {
        self.handle = Some(handle);
        self
    }

    pub fn current_password(&self) -> &[u8] {
        self.current_password.as_bytes()
    }

    pub fn new_password(&self) -> &[u8] {
        self.new_password.as_bytes()
    }

    pub fn handle(&self) -> Option<&TaskHandle> {
        self.handle.as_deref()
    }
}

impl fmt::Debug for ReKeySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReKeySession")
            .field("current_password", &"[REDACTED]")
            .field("new_password", &"[REDACTED]")
            .field("handle", &self.handle)
            .finish()
    }
}

/// Where the engine is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Verifying,
    Processing(SecretKind),
    Aggregating,
    Done,
    Aborted,
}

/// Shared view of a running re-key: progress counters and a cancel flag.
///
/// Cancellation is honoured between records, never inside one.
#[derive(Debug)]
pub struct TaskHandle {
    cancelled: AtomicBool,
    processed: AtomicUsize,
    total: AtomicUsize,
    state: Mutex<EngineState>,
}

impl Default for TaskHandle {
    fn default() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            processed: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
            state: Mutex::new(EngineState::Idle),
        }
    }
}

impl TaskHandle {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// `(processed, total)` records.
    pub fn progress(&self) -> (usize, usize) {
        (
            self.processed.load(Ordering::SeqCst),
            self.total.load(Ordering::SeqCst),
        )
    }

    pub fn state(&self) -> EngineState {
        match self.state.lock() {
            Ok(state) => *state,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub(crate) fn set_state(&self, state: EngineState) {
        match self.state.lock() {
            Ok(mut current) => *current = state,
            Err(poisoned) => *poisoned.into_inner() = state,
        }
    }

    pub(crate) fn set_total(&self, total: usize) {
        self.total.store(total, Ordering::SeqCst);
    }

    pub(crate) fn advance(&self) {
        self.processed.fetch_add(1, Ordering::SeqCst);
    }
}
