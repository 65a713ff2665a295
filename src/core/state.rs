//! Bounds for state and action types.
//!
//! The runtime moves states and actions between tasks, fans them out to
//! several observers and prints them in diagnostics. These traits name that
//! contract once; they are implemented automatically for every type that
//! satisfies it.

use std::fmt::Debug;

/// Trait for state machine states.
///
/// States are immutable values. The runtime clones them to hand snapshots to
/// handlers and observers, so cheap clones (or `Arc` inside) pay off.
///
/// # Required Traits
///
/// - `Clone`: snapshots are handed to handlers and observers
/// - `Debug`: states appear in log records
/// - `Send` + `Sync` + `'static`: states cross task boundaries
///
/// # Example
///
/// ```rust
/// use flowstate::core::State;
///
/// #[derive(Clone, Debug, PartialEq)]
/// enum TaskState {
///     Pending,
///     Running { progress: u8 },
///     Complete,
/// }
///
/// fn assert_state<S: State>() {}
/// assert_state::<TaskState>();
/// ```
pub trait State: Clone + Debug + Send + Sync + 'static {}

impl<T> State for T where T: Clone + Debug + Send + Sync + 'static {}

/// Trait for actions dispatched into a state machine.
///
/// Actions are broadcast to every side effect, so each subscriber receives
/// its own clone.
pub trait Action: Clone + Debug + Send + Sync + 'static {}

impl<T> Action for T where T: Clone + Debug + Send + Sync + 'static {}
