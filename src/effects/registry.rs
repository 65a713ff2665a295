//! Live child machines of one `on_action_start_state_machine` slot.

use crate::sync::AtomicCounter;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Handle on a running child: its identity, the token cancelling its
/// collector and forwarder, the child machine's own token, and the queue
/// feeding its forwarder.
pub(crate) struct ChildEntry<A> {
    id: Uuid,
    token: CancellationToken,
    machine: CancellationToken,
    actions: mpsc::UnboundedSender<A>,
}

impl<A> ChildEntry<A> {
    pub(crate) fn new(
        id: Uuid,
        token: CancellationToken,
        machine: CancellationToken,
        actions: mpsc::UnboundedSender<A>,
    ) -> Self {
        Self {
            id,
            token,
            machine,
            actions,
        }
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    /// Queue an action for the child. Returns `false` if the child is gone.
    pub(crate) fn send(&self, action: A) -> bool {
        self.actions.send(action).is_ok()
    }

    /// Stop the child machine along with its collector and forwarder, even
    /// if other handles on the child are still alive.
    fn cancel(&self) {
        self.token.cancel();
        self.machine.cancel();
    }
}

struct Children<K, A> {
    entries: Mutex<HashMap<K, ChildEntry<A>>>,
    live: AtomicCounter,
}

/// Children keyed by the trigger that started them. At most one child per
/// key is live. Clones share the registry.
pub(crate) struct ChildRegistry<K, A> {
    children: Arc<Children<K, A>>,
}

impl<K, A> ChildRegistry<K, A>
where
    K: Eq + Hash + Debug,
    A: Clone,
{
    pub(crate) fn new() -> Self {
        Self {
            children: Arc::new(Children {
                entries: Mutex::new(HashMap::new()),
                live: AtomicCounter::new(0),
            }),
        }
    }

    /// Register `entry` under `key`, cancelling the child it replaces.
    ///
    /// Returns the id of the replaced child, if any.
    pub(crate) fn cancel_previous_and_add_new(&self, key: K, entry: ChildEntry<A>) -> Option<Uuid> {
        let mut entries = self.children.entries.lock();
        match entries.insert(key, entry) {
            Some(previous) => {
                previous.cancel();
                Some(previous.id)
            }
            None => {
                self.children.live.increment_and_get();
                None
            }
        }
    }

    /// Remove the child registered under `key` if it is still the child
    /// `id`. A newer child under the same key is left alone.
    pub(crate) fn remove(&self, key: &K, id: Uuid) -> bool {
        let mut entries = self.children.entries.lock();
        let current = entries.get(key).map(ChildEntry::id);
        if current != Some(id) {
            return false;
        }
        if let Some(entry) = entries.remove(key) {
            entry.cancel();
            self.children.live.decrement_and_get();
        }
        true
    }

    /// Queue `action` for every live child. Returns how many accepted it.
    pub(crate) fn forward(&self, action: &A) -> usize {
        let entries = self.children.entries.lock();
        entries
            .values()
            .filter(|entry| entry.send(action.clone()))
            .count()
    }

    pub(crate) fn len(&self) -> usize {
        self.children.live.get()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cancel every child and forget them.
    pub(crate) fn clear(&self) {
        let mut entries = self.children.entries.lock();
        for (_, entry) in entries.drain() {
            entry.cancel();
            self.children.live.decrement_and_get();
        }
    }
}

impl<K, A> Clone for ChildRegistry<K, A> {
    fn clone(&self) -> Self {
        Self {
            children: Arc::clone(&self.children),
        }
    }
}
