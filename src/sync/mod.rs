//! Small concurrency primitives shared by the runtime.
//!
//! - [`AtomicCounter`]: lock-free integer used for live-entry bookkeeping
//! - [`Waiter`]: one-shot gate that many tasks can await

mod counter;
mod waiter;

pub use counter::AtomicCounter;
pub use waiter::Waiter;
