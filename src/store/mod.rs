//! Reducer/store loop.
//!
//! [`redux_store`] turns a stream of actions into a stream of states. Every
//! action, whether it came from upstream or from a side effect, is reduced
//! against the current state and then broadcast to every side effect.

mod cell;
mod redux;

pub(crate) use cell::StateCell;
pub use redux::redux_store;
pub(crate) use redux::redux_store_with_logger;

use crate::error::FlowError;
use futures::stream::BoxStream;
use std::sync::Arc;

/// Reads the store's current state.
pub type GetState<S> = Arc<dyn Fn() -> S + Send + Sync>;

/// Actions a side effect observes, in the order the store reduced them.
pub type ActionStream<A> = BoxStream<'static, A>;

/// Actions a side effect feeds back into the store. An error terminates the
/// store.
pub type EffectStream<A> = BoxStream<'static, Result<A, FlowError>>;

/// Side effect of a store, invoked exactly once when the store starts.
///
/// # Example
///
/// ```rust
/// use flowstate::store::SideEffect;
/// use futures::StreamExt;
///
/// // Answers every `1` with a `10`.
/// let echo: SideEffect<String, u32> = Box::new(|actions, _state| {
///     actions
///         .filter_map(|action| async move { (action == 1).then_some(Ok(10)) })
///         .boxed()
/// });
/// ```
pub type SideEffect<S, A> =
    Box<dyn FnOnce(ActionStream<A>, GetState<S>) -> EffectStream<A> + Send>;

/// Stream of states emitted by a store or state machine.
pub type StateStream<S> = BoxStream<'static, Result<S, FlowError>>;
