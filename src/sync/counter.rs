//! Lock-free counter.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Integer counter with atomic get, increment and decrement.
///
/// # Example
///
/// ```rust
/// use flowstate::sync::AtomicCounter;
///
/// let counter = AtomicCounter::new(0);
/// assert_eq!(counter.increment_and_get(), 1);
/// assert_eq!(counter.decrement_and_get(), 0);
/// assert_eq!(counter.get(), 0);
/// ```
#[derive(Debug, Default)]
pub struct AtomicCounter {
    value: AtomicUsize,
}

impl AtomicCounter {
    pub fn new(initial: usize) -> Self {
        Self {
            value: AtomicUsize::new(initial),
        }
    }

    pub fn get(&self) -> usize {
        self.value.load(Ordering::SeqCst)
    }

    pub fn increment_and_get(&self) -> usize {
        self.value.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Decrement and return the new value. Saturates at zero.
    pub fn decrement_and_get(&self) -> usize {
        let previous = self
            .value
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| {
                Some(v.saturating_sub(1))
            })
            .unwrap_or(0);
        previous.saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn counts_up_and_down() {
        let counter = AtomicCounter::new(2);

        assert_eq!(counter.increment_and_get(), 3);
        assert_eq!(counter.decrement_and_get(), 2);
        assert_eq!(counter.decrement_and_get(), 1);
        assert_eq!(counter.get(), 1);
    }

    #[test]
    fn decrement_saturates_at_zero() {
        let counter = AtomicCounter::default();

        assert_eq!(counter.decrement_and_get(), 0);
        assert_eq!(counter.get(), 0);
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let counter = Arc::new(AtomicCounter::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counter = Arc::clone(&counter);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        counter.increment_and_get();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(counter.get(), 8000);
    }
}
