//! Append-only log with independent readers.
//!
//! Every reader sees every entry appended after it subscribed, in append
//! order, without blocking the writer. Entries are dropped once no reader
//! needs them any more.

use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Notify;

struct Entries<T> {
    items: VecDeque<T>,
    /// Sequence number of `items[0]`.
    first: u64,
    /// Sequence number the next pushed item gets.
    next: u64,
    cursors: HashMap<u64, u64>,
    next_reader: u64,
    /// How many of the newest entries are kept for late subscribers.
    retain: u64,
    closed: bool,
}

impl<T> Entries<T> {
    fn trim(&mut self) {
        let oldest_needed = self.cursors.values().copied().min().unwrap_or(self.next);
        let keep_from = oldest_needed.min(self.next.saturating_sub(self.retain));
        while self.first < keep_from && self.items.pop_front().is_some() {
            self.first += 1;
        }
    }

    fn register(&mut self, cursor: u64) -> u64 {
        let id = self.next_reader;
        self.next_reader += 1;
        self.cursors.insert(id, cursor);
        id
    }
}

struct Shared<T> {
    entries: Mutex<Entries<T>>,
    appended: Notify,
}

/// Multi-reader log. Clones append to the same log.
pub(crate) struct SharedLog<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Clone + Send + 'static> SharedLog<T> {
    /// Log that keeps no entries for late subscribers.
    pub(crate) fn new() -> Self {
        Self::with_retained(0)
    }

    /// Log that keeps the newest `retain` entries for late subscribers.
    pub(crate) fn with_retained(retain: u64) -> Self {
        Self {
            shared: Arc::new(Shared {
                entries: Mutex::new(Entries {
                    items: VecDeque::new(),
                    first: 0,
                    next: 0,
                    cursors: HashMap::new(),
                    next_reader: 0,
                    retain,
                    closed: false,
                }),
                appended: Notify::new(),
            }),
        }
    }

    /// Append an item. Ignored once the log is closed.
    pub(crate) fn push(&self, item: T) {
        {
            let mut entries = self.shared.entries.lock();
            if entries.closed {
                return;
            }
            entries.items.push_back(item);
            entries.next += 1;
            entries.trim();
        }
        self.shared.appended.notify_waiters();
    }

    /// End every reader once it has drained the entries it has not seen.
    pub(crate) fn close(&self) {
        self.shared.entries.lock().closed = true;
        self.shared.appended.notify_waiters();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.shared.entries.lock().closed
    }

    /// Newest entry, if it is still retained.
    pub(crate) fn latest(&self) -> Option<T> {
        let entries = self.shared.entries.lock();
        if entries.next > entries.first {
            entries.items.back().cloned()
        } else {
            None
        }
    }

    /// Reader of every entry appended from now on.
    pub(crate) fn subscribe(&self) -> LogReader<T> {
        let mut entries = self.shared.entries.lock();
        let cursor = entries.next;
        let id = entries.register(cursor);
        LogReader {
            shared: Arc::clone(&self.shared),
            id,
        }
    }

    /// Reader that first replays the newest retained entry, if any.
    pub(crate) fn subscribe_latest(&self) -> LogReader<T> {
        let mut entries = self.shared.entries.lock();
        let cursor = entries.next.saturating_sub(1).max(entries.first);
        let id = entries.register(cursor);
        LogReader {
            shared: Arc::clone(&self.shared),
            id,
        }
    }

    #[cfg(test)]
    fn retained(&self) -> usize {
        self.shared.entries.lock().items.len()
    }
}

impl<T> Clone for SharedLog<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Cursor into a [`SharedLog`]. Dropping it releases its entries.
pub(crate) struct LogReader<T> {
    shared: Arc<Shared<T>>,
    id: u64,
}

impl<T: Clone + Send + 'static> LogReader<T> {
    /// Next entry, or `None` once the log is closed and drained.
    pub(crate) async fn next(&mut self) -> Option<T> {
        loop {
            let appended = self.shared.appended.notified();
            tokio::pin!(appended);
            appended.as_mut().enable();

            {
                let mut entries = self.shared.entries.lock();
                let cursor = *entries.cursors.get(&self.id).unwrap_or(&entries.next);
                if cursor < entries.next {
                    let index = (cursor - entries.first) as usize;
                    let item = entries.items[index].clone();
                    entries.cursors.insert(self.id, cursor + 1);
                    entries.trim();
                    return Some(item);
                }
                if entries.closed {
                    return None;
                }
            }

            appended.await;
        }
    }

    pub(crate) fn into_stream(self) -> BoxStream<'static, T> {
        stream::unfold(self, |mut reader| async move {
            let item = reader.next().await?;
            Some((item, reader))
        })
        .boxed()
    }
}

impl<T> Drop for LogReader<T> {
    fn drop(&mut self) {
        let mut entries = self.shared.entries.lock();
        entries.cursors.remove(&self.id);
        entries.trim();
    }
}
