//! One-shot gate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

struct Gate {
    resumed: AtomicBool,
    notify: Notify,
}

/// Gate that suspends callers of [`Waiter::wait`] until [`Waiter::resume`]
/// has been called once.
///
/// Resuming is idempotent and permanent: once resumed, every current and
/// future `wait` returns immediately. Clones share the same gate.
#[derive(Clone)]
pub struct Waiter {
    gate: Arc<Gate>,
}

impl Waiter {
    pub fn new() -> Self {
        Self {
            gate: Arc::new(Gate {
                resumed: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Suspend until the gate is opened.
    pub async fn wait(&self) {
        loop {
            let notified = self.gate.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a concurrent resume cannot be missed.
            notified.as_mut().enable();

            if self.is_resumed() {
                return;
            }
            notified.await;
        }
    }

    /// Open the gate, releasing every waiter.
    pub fn resume(&self) {
        if !self.gate.resumed.swap(true, Ordering::SeqCst) {
            self.gate.notify.notify_waiters();
        }
    }

    pub fn is_resumed(&self) -> bool {
        self.gate.resumed.load(Ordering::SeqCst)
    }

    /// Whether both handles refer to the same gate.
    pub fn is_same(&self, other: &Waiter) -> bool {
        Arc::ptr_eq(&self.gate, &other.gate)
    }
}

impl Default for Waiter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Waiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Waiter")
            .field("resumed", &self.is_resumed())
            .finish()
    }
}
